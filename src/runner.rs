// src/runner.rs
//! Full refresh across categories: a small worker pool runs the router and then
//! the asset fetcher per category while the coordinating thread feeds the
//! progress sink.

use std::collections::{BTreeMap, HashSet};
use std::sync::{
    Arc, mpsc,
    atomic::{AtomicUsize, Ordering},
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use url::Url;

use crate::assets::{AssetFetcher, AssetTally, derive_assets};
use crate::category::DomainCategory;
use crate::config::options::LoadOptions;
use crate::core::net::{CancelToken, HttpTransport, Transport};
use crate::error::{CacheError, LoadError};
use crate::progress::{LoadEvent, Progress};
use crate::record::NormalizedRecord;
use crate::router::{LoadResult, Outcome, SourceRouter};
use crate::store::{CacheEntry, CacheStore};

/// Share of a category's progress bar taken by the record fetch; assets get the rest.
const RECORDS_SHARE: f32 = 0.5;

enum WorkerMsg {
    Progress(DomainCategory, f32),
    Done(usize, LoadResult),
}

/// Entry point for the consuming application. Cheap to clone; clones share the
/// cache, the sources and their pacing.
#[derive(Clone)]
pub struct Loader {
    opts: Arc<LoadOptions>,
    store: Arc<CacheStore>,
    router: Arc<SourceRouter>,
    fetcher: Arc<AssetFetcher>,
}

impl Loader {
    /// Production loader over HTTP.
    pub fn new(opts: LoadOptions) -> Result<Self, LoadError> {
        Self::with_transport(opts, Arc::new(HttpTransport::new()))
    }

    pub fn with_transport(opts: LoadOptions, transport: Arc<dyn Transport>) -> Result<Self, LoadError> {
        check_options(&opts)?;
        let store = Arc::new(CacheStore::new(&opts.cache_dir));
        let router = SourceRouter::from_options(Arc::clone(&store), &opts, Arc::clone(&transport));
        let fetcher = AssetFetcher::new(
            Arc::clone(&store),
            transport,
            opts.asset_spacing,
            opts.asset_timeout,
            opts.asset_retry,
            opts.failed_asset_cooldown,
        );
        Ok(Self {
            opts: Arc::new(opts),
            store,
            router: Arc::new(router),
            fetcher: Arc::new(fetcher),
        })
    }

    pub fn options(&self) -> &LoadOptions {
        &self.opts
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn router(&self) -> &SourceRouter {
        &self.router
    }

    /// Cache only; never touches the network.
    pub fn get_cached_records(&self, category: DomainCategory) -> Option<CacheEntry> {
        self.store.read(category)
    }

    /// Cached records keyed by identity.
    pub fn get_cached_map(&self, category: DomainCategory) -> BTreeMap<String, NormalizedRecord> {
        self.store
            .read(category)
            .map(|e| e.records.into_iter().map(|r| (r.key.clone(), r)).collect())
            .unwrap_or_default()
    }

    /// The next refresh of `category` skips the freshness check.
    pub fn invalidate(&self, category: DomainCategory) -> Result<(), CacheError> {
        self.store.invalidate(category)
    }

    /// Refresh every configured category on a background thread. `sink` is fed
    /// from that thread; the caller keeps control immediately.
    pub fn run_full_refresh<P>(&self, max_age: Duration, mut sink: P) -> RefreshHandle
    where
        P: Progress + Send + 'static,
    {
        let cancel = CancelToken::new();
        let loader = self.clone();
        let token = cancel.clone();
        let thread = thread::Builder::new()
            .name(s!("sets-refresh"))
            .spawn(move || loader.refresh(max_age, &mut sink, &token));
        match thread {
            Ok(handle) => RefreshHandle { cancel, thread: Some(handle) },
            Err(err) => {
                loge!("could not start refresh thread: {err}");
                RefreshHandle { cancel, thread: None }
            }
        }
    }

    /// Background refresh publishing `LoadEvent`s on the returned receiver.
    pub fn spawn_refresh(&self, max_age: Duration) -> (RefreshHandle, mpsc::Receiver<LoadEvent>) {
        let (tx, rx) = mpsc::channel();
        (self.run_full_refresh(max_age, tx), rx)
    }

    /// Blocking refresh. One result per requested category, in requested order.
    pub fn refresh(&self, max_age: Duration, progress: &mut dyn Progress, cancel: &CancelToken) -> Vec<LoadResult> {
        let mut seen = HashSet::new();
        let categories: Vec<DomainCategory> =
            self.opts.categories.iter().copied().filter(|c| seen.insert(*c)).collect();
        let total = categories.len();

        progress.begin(total);
        logf!("refresh: {total} categories, max age {}h", max_age.as_secs() / 3600);
        if total == 0 {
            progress.finish(&[]);
            return Vec::new();
        }

        let mut results: Vec<Option<LoadResult>> = vec![None; total];
        let next = AtomicUsize::new(0);
        let (tx, rx) = mpsc::channel::<WorkerMsg>();
        let workers = self.opts.category_workers.min(total).max(1);

        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let next = &next;
                let categories = &categories;
                scope.spawn(move || {
                    loop {
                        let i = next.fetch_add(1, Ordering::Relaxed);
                        if i >= categories.len() {
                            break;
                        }
                        let category = categories[i];
                        let result = if cancel.is_cancelled() {
                            self.not_started(category)
                        } else {
                            self.run_category(category, max_age, cancel, &tx)
                        };
                        let _ = tx.send(WorkerMsg::Done(i, result));
                    }
                });
            }
            drop(tx);

            for msg in rx {
                match msg {
                    WorkerMsg::Progress(category, fraction) => progress.category_progress(category, fraction),
                    WorkerMsg::Done(i, result) => {
                        progress.log(&summary_line(&result));
                        progress.category_done(&result);
                        results[i] = Some(result);
                    }
                }
            }
        });

        let results: Vec<LoadResult> = results
            .into_iter()
            .zip(&categories)
            .map(|(r, &c)| r.unwrap_or_else(|| LoadResult::failed(c, "worker stopped")))
            .collect();

        let failed = results.iter().filter(|r| r.is_failed()).count();
        logf!("refresh finished: {} ok, {failed} failed", total - failed);
        progress.finish(&results);
        results
    }

    fn run_category(
        &self,
        category: DomainCategory,
        max_age: Duration,
        cancel: &CancelToken,
        tx: &mpsc::Sender<WorkerMsg>,
    ) -> LoadResult {
        let report = |f: f32| {
            let _ = tx.send(WorkerMsg::Progress(category, f));
        };
        report(0.0);

        let resolution = self.router.resolve(category, max_age, cancel);
        let mut result = resolution.result;
        report(RECORDS_SHARE);

        // cache write (inside resolve) happens-before any asset download
        if self.opts.fetch_assets && result.outcome != Outcome::Failed && !cancel.is_cancelled() {
            let refs = derive_assets(category, &resolution.records, &self.opts.file_path_base());
            if !refs.is_empty() {
                logd!("{category}: {} assets referenced", refs.len());
                let reports = self.fetcher.fetch_all(
                    &refs,
                    self.opts.asset_concurrency,
                    cancel,
                    &mut |done, total| report(RECORDS_SHARE + (1.0 - RECORDS_SHARE) * done as f32 / total as f32),
                );
                result.assets = AssetTally::from_reports(&reports);
            }
        }
        report(1.0);
        result
    }

    /// Result for a category the refresh never started (cancelled).
    fn not_started(&self, category: DomainCategory) -> LoadResult {
        match self.store.read(category) {
            Some(entry) => LoadResult::from_cache(&entry, true),
            None => LoadResult::failed(category, "cancelled"),
        }
    }
}

fn check_options(opts: &LoadOptions) -> Result<(), LoadError> {
    if opts.cache_dir.as_os_str().is_empty() {
        return Err(LoadError::Configuration(s!("cache directory is empty")));
    }
    for d in &opts.sources {
        if Url::parse(&d.endpoint).is_err() {
            return Err(LoadError::Configuration(format!(
                "{} source for {} has an invalid endpoint '{}'",
                d.kind, d.category, d.endpoint
            )));
        }
    }
    Url::parse(&opts.file_path_base())
        .map(|_| ())
        .map_err(|e| LoadError::Configuration(format!("invalid wiki base '{}': {e}", opts.wiki_base)))
}

fn summary_line(r: &LoadResult) -> String {
    let mut line = format!("{}: {} ({} records", r.category, r.outcome, r.record_count);
    if r.stale {
        line.push_str(", stale");
    }
    if r.assets.total() > 0 {
        line.push_str(&format!(", {} assets fetched, {} failed", r.assets.fetched, r.assets.failed));
    }
    line.push(')');
    if let Some(e) = &r.error {
        line.push_str(": ");
        line.push_str(e);
    }
    line
}

/// Owner's side of a background refresh. Dropping it detaches the thread.
pub struct RefreshHandle {
    cancel: CancelToken,
    thread: Option<JoinHandle<Vec<LoadResult>>>,
}

impl RefreshHandle {
    /// Stop starting new categories and abandon retries. Finished categories keep
    /// their results.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(|t| t.is_finished())
    }

    pub fn join(mut self) -> Result<Vec<LoadResult>, LoadError> {
        match self.thread.take() {
            Some(t) => t.join().map_err(|_| LoadError::WorkerPanicked),
            None => Err(LoadError::WorkerPanicked),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::options::SourceDescriptor;

    #[test]
    fn rejects_bad_endpoint() {
        let opts = LoadOptions::default().with_sources(vec![SourceDescriptor::api(
            DomainCategory::Ship,
            1,
            "not a url",
        )]);
        assert!(matches!(Loader::new(opts), Err(LoadError::Configuration(_))));
    }

    #[test]
    fn summary_mentions_staleness_and_error() {
        let mut r = LoadResult::failed(DomainCategory::Modifier, "api (priority 1): boom");
        assert_eq!(summary_line(&r), "modifier: failed (0 records): api (priority 1): boom");
        r.outcome = Outcome::CacheHit;
        r.stale = true;
        r.error = None;
        r.record_count = 4;
        assert_eq!(summary_line(&r), "modifier: cache hit (4 records, stale)");
    }
}
