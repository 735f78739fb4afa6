// src/error.rs
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::category::DomainCategory;

/// Failure of one source adapter for one category.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    /// Network failure, timeout or a transient status. Retryable.
    #[error("source unavailable at {url}: {reason}")]
    SourceUnavailable { url: String, reason: String },
    /// Non-success status, blocked, or not the kind of document we asked for.
    #[error("source rejected request to {url}: {reason}")]
    SourceRejected { url: String, reason: String },
    /// Reached the source fine but it had nothing for the category.
    #[error("source returned no {category} records")]
    SourceEmpty { category: DomainCategory },
    /// Document fetched but the expected markup is gone.
    #[error("page structure changed at {url}: {detail}")]
    StructureChanged { url: String, detail: String },
    /// Refresh was cancelled between requests. Never retried.
    #[error("fetch cancelled before {url}")]
    Cancelled { url: String },
}

impl SourceError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SourceError::SourceUnavailable { .. })
    }

    pub fn unavailable(url: impl Into<String>, reason: impl ToString) -> Self {
        SourceError::SourceUnavailable { url: url.into(), reason: reason.to_string() }
    }

    pub fn rejected(url: impl Into<String>, reason: impl ToString) -> Self {
        SourceError::SourceRejected { url: url.into(), reason: reason.to_string() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MalformedReason {
    NotAnObject,
    MissingIdentity(&'static str),
    DuplicateKey(String),
}

/// A raw entry the normalizer refused. The rest of the payload still goes through.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("malformed {category} record #{index}: {}", describe(.reason))]
pub struct MalformedRecord {
    pub category: DomainCategory,
    pub index: usize,
    pub reason: MalformedReason,
}

fn describe(reason: &MalformedReason) -> String {
    match reason {
        MalformedReason::NotAnObject => s!("entry is not a field map"),
        MalformedReason::MissingIdentity(f) => format!("missing identity field '{f}'"),
        MalformedReason::DuplicateKey(k) => format!("duplicate key '{k}'"),
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache io on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    /// Unreadable entry. Readers treat this as absent.
    #[error("cache entry {} is corrupt: {detail}", path.display())]
    CacheCorrupt { path: PathBuf, detail: String },
    #[error("failed to encode cache entry: {0}")]
    Encode(#[from] serde_json::Error),
}

impl CacheError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CacheError::Io { path: path.into(), source }
    }
}

/// Per-asset failure. Never aborts the batch.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset fetch failed for {url}: {source}")]
    AssetFetchFailed { url: String, source: SourceError },
    #[error(transparent)]
    Store(#[from] CacheError),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("refresh thread panicked")]
    WorkerPanicked,
}
