// src/assets.rs
//! Icon references derived from records, and the bounded downloader for them.

use std::collections::HashSet;
use std::sync::{
    Arc, mpsc,
    atomic::{AtomicUsize, Ordering},
};
use std::thread;
use std::time::Duration;

use chrono::Utc;

use crate::category::DomainCategory;
use crate::config::options::RetryPolicy;
use crate::core::net::{CancelToken, Pacer, Transport};
use crate::core::sanitize::{asset_filename, encode_filename, wiki_file_from_src, wiki_title};
use crate::error::{AssetError, SourceError};
use crate::record::{NormalizedRecord, Value};
use crate::store::CacheStore;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AssetReference {
    pub url: String,
    /// Flat file name under the assets directory.
    pub local_filename: String,
    pub category: DomainCategory,
}

/// Asset references for a set of records that normalized successfully.
///
/// Ships point at their `image` file, equipment and traits follow the wiki's
/// `<name>_icon.png` convention, and scraped rows bring their own `icons`.
/// Local names come from the wiki file being requested, so one file never
/// lands under two names and two files never share one. Duplicates (by local
/// file name) are dropped; first occurrence wins.
pub fn derive_assets(
    category: DomainCategory,
    records: &[NormalizedRecord],
    file_path_base: &str,
) -> Vec<AssetReference> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut push = |url: String, local_filename: String| {
        if is_plain_name(&local_filename) && seen.insert(local_filename.clone()) {
            out.push(AssetReference { url, local_filename, category });
        }
    };

    for r in records {
        match category {
            DomainCategory::Ship => {
                if let Some(image) = r.text("image") {
                    let url = join!(file_path_base, &encode_filename(&wiki_title(image)));
                    push(url, asset_filename(image));
                }
            }
            DomainCategory::Equipment | DomainCategory::Trait | DomainCategory::StarshipTrait => {
                if let Some(name) = r.text("name") {
                    let file = join!(&wiki_title(name), "_icon.png");
                    let url = join!(file_path_base, &encode_filename(&file));
                    push(url, asset_filename(&file));
                }
            }
            DomainCategory::DutyOfficer | DomainCategory::Modifier => {}
        }

        for src in r.get("icons").and_then(Value::as_list).unwrap_or_default() {
            let Some(src) = src.as_map().and_then(|m| m.get("src")).and_then(Value::as_str) else {
                continue;
            };
            let Some(file) = wiki_file_from_src(src) else { continue };
            push(s!(src), asset_filename(&file));
        }
    }
    out
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssetOutcome {
    Fetched,
    /// Already on disk; nothing downloaded.
    Cached,
    /// Failed recently, or the run was cancelled before it started.
    Skipped,
    Failed(String),
}

impl AssetOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AssetOutcome::Fetched | AssetOutcome::Cached)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AssetReport {
    pub reference: AssetReference,
    pub outcome: AssetOutcome,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AssetTally {
    pub fetched: usize,
    pub cached: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl AssetTally {
    pub fn from_reports(reports: &[AssetReport]) -> Self {
        let mut t = AssetTally::default();
        for r in reports {
            match r.outcome {
                AssetOutcome::Fetched => t.fetched += 1,
                AssetOutcome::Cached => t.cached += 1,
                AssetOutcome::Skipped => t.skipped += 1,
                AssetOutcome::Failed(_) => t.failed += 1,
            }
        }
        t
    }

    pub fn total(&self) -> usize {
        self.fetched + self.cached + self.skipped + self.failed
    }
}

pub struct AssetFetcher {
    store: Arc<CacheStore>,
    transport: Arc<dyn Transport>,
    /// Shared by every worker, so the source sees one request per spacing.
    pacer: Pacer,
    timeout: Duration,
    retry: RetryPolicy,
    /// Assets that failed within this window are not retried.
    cooldown: Duration,
}

impl AssetFetcher {
    pub fn new(
        store: Arc<CacheStore>,
        transport: Arc<dyn Transport>,
        spacing: Duration,
        timeout: Duration,
        retry: RetryPolicy,
        cooldown: Duration,
    ) -> Self {
        Self { store, transport, pacer: Pacer::new(spacing), timeout, retry, cooldown }
    }

    /// Download every reference with at most `limit` in flight. Reports come back
    /// in input order; one bad asset never stops the others.
    ///
    /// `on_progress(done, total)` runs on the calling thread.
    pub fn fetch_all(
        &self,
        refs: &[AssetReference],
        limit: usize,
        cancel: &CancelToken,
        on_progress: &mut dyn FnMut(usize, usize),
    ) -> Vec<AssetReport> {
        let total = refs.len();
        if total == 0 {
            return Vec::new();
        }

        let now = Utc::now();
        let cooldown = self.cooldown.as_secs() as i64;
        let ledger = self.store.failed_assets();
        let recently_failed = |r: &AssetReference| {
            ledger
                .get(&r.local_filename)
                .is_some_and(|&at| now.timestamp() - at < cooldown)
        };

        let mut outcomes: Vec<Option<AssetOutcome>> = vec![None; total];
        let next = AtomicUsize::new(0);
        let (tx, rx) = mpsc::channel::<(usize, AssetOutcome)>();
        let workers = limit.min(total).max(1);

        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let next = &next;
                let recently_failed = &recently_failed;
                scope.spawn(move || {
                    loop {
                        let i = next.fetch_add(1, Ordering::Relaxed);
                        if i >= total {
                            break;
                        }
                        let r = &refs[i];
                        let outcome = if self.store.has_asset(r) {
                            AssetOutcome::Cached
                        } else if cancel.is_cancelled() || recently_failed(r) {
                            AssetOutcome::Skipped
                        } else {
                            match self.fetch_one(r, cancel) {
                                Ok(()) => AssetOutcome::Fetched,
                                Err(err) => {
                                    logw!("{err}");
                                    AssetOutcome::Failed(err.to_string())
                                }
                            }
                        };
                        if tx.send((i, outcome)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);

            let mut done = 0usize;
            for (i, outcome) in rx {
                outcomes[i] = Some(outcome);
                done += 1;
                on_progress(done, total);
            }
        });

        let reports: Vec<AssetReport> = refs
            .iter()
            .zip(outcomes)
            .map(|(r, o)| AssetReport {
                reference: r.clone(),
                outcome: o.unwrap_or(AssetOutcome::Skipped),
            })
            .collect();

        let failed: Vec<&str> = reports
            .iter()
            .filter(|r| matches!(r.outcome, AssetOutcome::Failed(_)))
            .map(|r| r.reference.local_filename.as_str())
            .collect();
        let cleared: Vec<&str> = reports
            .iter()
            .filter(|r| r.outcome == AssetOutcome::Fetched)
            .map(|r| r.reference.local_filename.as_str())
            .collect();
        if let Err(err) = self.store.update_failed_assets(&failed, &cleared, now, self.cooldown) {
            logw!("could not update failed-asset ledger: {err}");
        }
        reports
    }

    /// One download: bounded retries on transient failures, then an atomic write.
    fn fetch_one(&self, r: &AssetReference, cancel: &CancelToken) -> Result<(), AssetError> {
        let failed = |source: SourceError| AssetError::AssetFetchFailed { url: r.url.clone(), source };
        let mut attempt = 0u32;
        let bytes = loop {
            self.pacer.wait();
            match self.transport.get(&r.url, self.timeout) {
                Ok(b) if b.is_empty() => return Err(failed(SourceError::rejected(&r.url, "empty body"))),
                Ok(b) => break b,
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries && !cancel.is_cancelled() => {
                    logd!("{}: retrying after {e}", r.local_filename);
                    thread::sleep(self.retry.delay(attempt));
                    attempt += 1;
                }
                Err(e) => return Err(failed(e)),
            }
        };
        self.store.write_asset(r, &bytes)?;
        Ok(())
    }
}
