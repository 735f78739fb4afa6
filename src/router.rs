// src/router.rs
//! Per-category source selection: fresh cache, then sources by priority, then
//! whatever the cache still holds.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::assets::AssetTally;
use crate::category::DomainCategory;
use crate::config::options::{LoadOptions, RetryPolicy, SourceDescriptor};
use crate::core::net::{CancelToken, Transport};
use crate::error::SourceError;
use crate::normalize::normalize;
use crate::record::NormalizedRecord;
use crate::source::{RawPayload, SourceAdapter, SourceKind};
use crate::store::{CacheEntry, CacheStore};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Fresh,
    CacheHit,
    Failed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Fresh => "fresh",
            Outcome::CacheHit => "cache hit",
            Outcome::Failed => "failed",
        })
    }
}

/// One source that did not produce records in this run.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceFailure {
    pub kind: SourceKind,
    pub priority: i32,
    pub attempts: u32,
    pub error: SourceError,
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (priority {}, {} attempt(s)): {}", self.kind, self.priority, self.attempts, self.error)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoadResult {
    pub category: DomainCategory,
    pub outcome: Outcome,
    pub record_count: usize,
    /// Served from cache after every source failed (or was skipped).
    pub stale: bool,
    /// Source the records came from. For cache hits, the source that wrote them.
    pub source: Option<SourceKind>,
    pub written_at: Option<DateTime<Utc>>,
    /// Present iff `outcome` is `Failed`.
    pub error: Option<String>,
    pub source_failures: Vec<SourceFailure>,
    /// Raw entries the normalizer skipped.
    pub rejected_records: usize,
    pub assets: AssetTally,
}

impl LoadResult {
    pub fn failed(category: DomainCategory, error: impl Into<String>) -> Self {
        Self {
            category,
            outcome: Outcome::Failed,
            record_count: 0,
            stale: false,
            source: None,
            written_at: None,
            error: Some(error.into()),
            source_failures: Vec::new(),
            rejected_records: 0,
            assets: AssetTally::default(),
        }
    }

    pub fn from_cache(entry: &CacheEntry, stale: bool) -> Self {
        Self {
            category: entry.category,
            outcome: Outcome::CacheHit,
            record_count: entry.records.len(),
            stale,
            source: Some(entry.source),
            written_at: Some(entry.written_at),
            error: None,
            source_failures: Vec::new(),
            rejected_records: 0,
            assets: AssetTally::default(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.outcome == Outcome::Failed
    }
}

/// Records plus the result describing where they came from.
#[derive(Clone, Debug)]
pub struct Resolution {
    pub records: Vec<NormalizedRecord>,
    pub result: LoadResult,
}

struct Route {
    kind: SourceKind,
    priority: i32,
    adapter: SourceAdapter,
}

enum Attempt {
    Trying(u32),
    Backoff(u32, SourceError),
    Done(u32, Result<RawPayload, SourceError>),
}

pub struct SourceRouter {
    store: Arc<CacheStore>,
    routes: BTreeMap<DomainCategory, Vec<Route>>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl SourceRouter {
    /// Disabled descriptors are dropped; the rest are ordered by ascending
    /// priority (ties keep configuration order).
    pub fn new(
        store: Arc<CacheStore>,
        sources: &[SourceDescriptor],
        transport: Arc<dyn Transport>,
        retry: RetryPolicy,
        timeout: Duration,
        spacing: Duration,
    ) -> Self {
        let mut routes: BTreeMap<DomainCategory, Vec<Route>> = BTreeMap::new();
        for d in sources.iter().filter(|d| d.enabled) {
            routes.entry(d.category).or_default().push(Route {
                kind: d.kind,
                priority: d.priority,
                adapter: SourceAdapter::from_descriptor(d, Arc::clone(&transport), spacing),
            });
        }
        for list in routes.values_mut() {
            list.sort_by_key(|r| r.priority);
        }
        Self { store, routes, retry, timeout }
    }

    pub fn from_options(store: Arc<CacheStore>, opts: &LoadOptions, transport: Arc<dyn Transport>) -> Self {
        Self::new(store, &opts.sources, transport, opts.retry, opts.request_timeout, opts.request_spacing)
    }

    /// `(kind, priority)` in the order `resolve` tries them.
    pub fn order(&self, category: DomainCategory) -> Vec<(SourceKind, i32)> {
        self.routes
            .get(&category)
            .map(|list| list.iter().map(|r| (r.kind, r.priority)).collect())
            .unwrap_or_default()
    }

    /// Fresh cache, else the first source that yields records, else the cache
    /// regardless of age, else `Failed`. Holds the category lock throughout.
    pub fn resolve(&self, category: DomainCategory, max_age: Duration, cancel: &CancelToken) -> Resolution {
        let _guard = self.store.category_lock(category);

        if !self.store.is_stale(category, max_age)
            && let Some(entry) = self.store.read(category)
        {
            logd!("{category}: cache is fresh ({} records)", entry.records.len());
            let result = LoadResult::from_cache(&entry, false);
            return Resolution { records: entry.records, result };
        }

        let mut failures = Vec::new();
        let mut cancelled = false;
        for route in self.routes.get(&category).map(Vec::as_slice).unwrap_or_default() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let (attempts, res) = self.fetch_with_retry(&route.adapter, category, cancel);
            let fail = |error: SourceError| SourceFailure { kind: route.kind, priority: route.priority, attempts, error };

            let raw = match res {
                Ok(raw) => raw,
                Err(err @ SourceError::Cancelled { .. }) => {
                    logd!("{category}: {} fetch abandoned: {err}", route.kind);
                    failures.push(fail(err));
                    cancelled = true;
                    break;
                }
                Err(err) => {
                    logw!("{category}: {} source failed: {err}", route.kind);
                    failures.push(fail(err));
                    continue;
                }
            };

            let normalized = normalize(&raw, category);
            for m in &normalized.rejected {
                logd!("{m}");
            }
            if !normalized.rejected.is_empty() {
                logw!("{category}: skipped {} malformed records from {}", normalized.rejected.len(), route.kind);
            }
            if normalized.records.is_empty() {
                logw!("{category}: {} source produced no usable records", route.kind);
                failures.push(fail(SourceError::SourceEmpty { category }));
                continue;
            }

            let records = normalized.records;
            let written_at = match self.store.write(category, records.clone(), route.kind) {
                Ok(entry) => Some(entry.written_at),
                Err(err) => {
                    loge!("{category}: fetched but could not cache: {err}");
                    None
                }
            };
            logf!("{category}: {} records from {}", records.len(), route.kind);
            let result = LoadResult {
                category,
                outcome: Outcome::Fresh,
                record_count: records.len(),
                stale: false,
                source: Some(route.kind),
                written_at,
                error: None,
                source_failures: failures,
                rejected_records: normalized.rejected.len(),
                assets: AssetTally::default(),
            };
            return Resolution { records, result };
        }

        // every source exhausted (or cancelled): last known good, any age
        if let Some(entry) = self.store.read(category) {
            logw!("{category}: serving {} cached records (stale)", entry.records.len());
            let mut result = LoadResult::from_cache(&entry, true);
            result.source_failures = failures;
            return Resolution { records: entry.records, result };
        }

        let detail = if cancelled {
            s!("cancelled")
        } else if failures.is_empty() {
            format!("no enabled sources for {category} and nothing cached")
        } else {
            failures.iter().map(|f| f.to_string()).collect::<Vec<_>>().join("; ")
        };
        loge!("{category}: failed: {detail}");
        let mut result = LoadResult::failed(category, detail);
        result.source_failures = failures;
        Resolution { records: Vec::new(), result }
    }

    /// Attempting → (success | retryable → backoff → attempting) | done.
    /// Only `SourceUnavailable` is retried, at most `retry.max_retries` times.
    fn fetch_with_retry(
        &self,
        adapter: &SourceAdapter,
        category: DomainCategory,
        cancel: &CancelToken,
    ) -> (u32, Result<RawPayload, SourceError>) {
        let mut state = Attempt::Trying(0);
        loop {
            state = match state {
                Attempt::Trying(n) => match adapter.fetch(category, self.timeout, cancel) {
                    Ok(raw) => Attempt::Done(n + 1, Ok(raw)),
                    Err(e) if e.is_retryable() && n < self.retry.max_retries && !cancel.is_cancelled() => {
                        Attempt::Backoff(n, e)
                    }
                    Err(e) => Attempt::Done(n + 1, Err(e)),
                },
                Attempt::Backoff(n, e) => {
                    let wait = self.retry.delay(n);
                    logd!("{category}: {} retry {} in {wait:?} after: {e}", adapter.kind(), n + 1);
                    thread::sleep(wait);
                    Attempt::Trying(n + 1)
                }
                Attempt::Done(attempts, res) => return (attempts, res),
            };
        }
    }
}
