// src/source/mod.rs
//! Source adapters: one closed set of access methods behind a single `fetch`.
//!
//! Adding a source kind means adding a variant here; the router's control flow
//! does not change.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::category::DomainCategory;
use crate::config::options::SourceDescriptor;
use crate::core::net::{CancelToken, Pacer, Transport};
use crate::error::SourceError;

pub mod api;
pub mod scrape;

pub use api::ApiAdapter;
pub use scrape::ScrapeAdapter;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Api,
    Scrape,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            SourceKind::Api => "api",
            SourceKind::Scrape => "scrape",
        })
    }
}

/// What an adapter hands to the normalizer: rows of field maps, untouched.
#[derive(Clone, Debug, PartialEq)]
pub struct RawPayload {
    pub kind: SourceKind,
    pub rows: Vec<serde_json::Value>,
}

impl RawPayload {
    pub fn new(kind: SourceKind, rows: Vec<serde_json::Value>) -> Self {
        Self { kind, rows }
    }
}

pub enum SourceAdapter {
    Api(ApiAdapter),
    Scrape(ScrapeAdapter),
}

impl SourceAdapter {
    /// Build the adapter a descriptor names. `spacing` is the minimum gap between
    /// requests this adapter issues within one fetch.
    pub fn from_descriptor(
        desc: &SourceDescriptor,
        transport: Arc<dyn Transport>,
        spacing: Duration,
    ) -> Self {
        let pacer = Pacer::new(spacing);
        match desc.kind {
            SourceKind::Api => SourceAdapter::Api(ApiAdapter::new(&desc.endpoint, transport, pacer)),
            SourceKind::Scrape => {
                SourceAdapter::Scrape(ScrapeAdapter::new(&desc.endpoint, transport, pacer))
            }
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            SourceAdapter::Api(_) => SourceKind::Api,
            SourceAdapter::Scrape(_) => SourceKind::Scrape,
        }
    }

    /// `cancel` is checked before every request; a cancelled fetch stops at the
    /// next request boundary with `SourceError::Cancelled`.
    pub fn fetch(
        &self,
        category: DomainCategory,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<RawPayload, SourceError> {
        match self {
            SourceAdapter::Api(a) => a.fetch(category, timeout, cancel),
            SourceAdapter::Scrape(s) => s.fetch(category, timeout, cancel),
        }
    }
}
