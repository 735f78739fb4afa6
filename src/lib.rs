// src/lib.rs
//! Reference-data loader for the SETS build planner.
//!
//! Pulls ships, equipment, traits, duty officers and modifiers from the STO wiki
//! (Cargo export API first, page scraping as a fallback), normalizes them into
//! uniform records, keeps a local cache with expiry, and downloads icons.

#[macro_use]
pub mod macros;
#[macro_use]
pub mod log;

pub mod assets;
pub mod category;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod normalize;
pub mod progress;
pub mod record;
pub mod router;
pub mod runner;
pub mod source;
pub mod specs;
pub mod store;

pub use assets::{AssetFetcher, AssetOutcome, AssetReference, AssetReport, AssetTally, derive_assets};
pub use category::DomainCategory;
pub use config::options::{LoadOptions, RetryPolicy, SourceDescriptor};
pub use core::net::{CancelToken, HttpTransport, Transport};
pub use error::{AssetError, CacheError, LoadError, MalformedRecord, SourceError};
pub use normalize::{normalize, Normalized};
pub use progress::{LoadEvent, NullProgress, Progress};
pub use record::{NormalizedRecord, Value};
pub use router::{LoadResult, Outcome, Resolution, SourceFailure, SourceRouter};
pub use runner::{Loader, RefreshHandle};
pub use source::{RawPayload, SourceAdapter, SourceKind};
pub use store::{CacheEntry, CacheStore};
