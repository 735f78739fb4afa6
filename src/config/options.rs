// src/config/options.rs
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use super::consts::*;
use crate::category::DomainCategory;
use crate::source::SourceKind;

/// One configured origin for one category.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub category: DomainCategory,
    pub kind: SourceKind,
    /// Lower is tried first.
    pub priority: i32,
    pub enabled: bool,
    /// Cargo export URL for `Api`, wiki page prefix for `Scrape`.
    pub endpoint: String,
}

impl SourceDescriptor {
    pub fn api(category: DomainCategory, priority: i32, endpoint: impl Into<String>) -> Self {
        Self { category, kind: SourceKind::Api, priority, enabled: true, endpoint: endpoint.into() }
    }

    pub fn scrape(category: DomainCategory, priority: i32, endpoint: impl Into<String>) -> Self {
        Self { category, kind: SourceKind::Scrape, priority, enabled: true, endpoint: endpoint.into() }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Bounded retry with exponential backoff.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub const NONE: RetryPolicy = RetryPolicy { max_retries: 0, backoff: Duration::ZERO };

    /// Delay before retry number `attempt` (0-based): backoff, 2x, 4x, ...
    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(1u32 << attempt.min(6))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: RETRIES, backoff: Duration::from_millis(BACKOFF_MS) }
    }
}

#[derive(Clone, Debug)]
pub struct LoadOptions {
    pub cache_dir: PathBuf,
    pub wiki_base: String,
    /// Categories a full refresh covers, in result order.
    pub categories: Vec<DomainCategory>,
    pub sources: Vec<SourceDescriptor>,
    pub max_age: Duration,
    pub request_timeout: Duration,
    pub asset_timeout: Duration,
    pub retry: RetryPolicy,
    pub asset_retry: RetryPolicy,
    pub category_workers: usize,
    pub asset_concurrency: usize,
    pub request_spacing: Duration,
    pub asset_spacing: Duration,
    pub fetch_assets: bool,
    pub failed_asset_cooldown: Duration,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(CACHE_DIR),
            wiki_base: s!(WIKI_BASE),
            categories: DomainCategory::ALL.to_vec(),
            sources: default_sources(WIKI_BASE),
            max_age: Duration::from_secs(MAX_AGE_SECS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            asset_timeout: Duration::from_secs(ASSET_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
            asset_retry: RetryPolicy::default(),
            category_workers: WORKERS,
            asset_concurrency: ASSET_WORKERS,
            request_spacing: Duration::from_millis(REQUEST_PAUSE_MS),
            asset_spacing: Duration::from_millis(ASSET_PAUSE_MS),
            fetch_assets: true,
            failed_asset_cooldown: Duration::from_secs(FAILED_ASSET_COOLDOWN_SECS),
        }
    }
}

impl LoadOptions {
    /// Defaults with `SETS_CACHE_DIR` / `SETS_WIKI_BASE` applied.
    pub fn from_env() -> Self {
        let mut opts = Self::default();
        if let Ok(dir) = env::var(ENV_CACHE_DIR)
            && !dir.trim().is_empty()
        {
            opts.cache_dir = PathBuf::from(dir.trim());
        }
        if let Ok(base) = env::var(ENV_WIKI_BASE)
            && !base.trim().is_empty()
        {
            opts = opts.with_wiki_base(base.trim());
        }
        opts
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Point every default source at another wiki host.
    pub fn with_wiki_base(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.wiki_base = s!(base);
        self.sources = default_sources(base);
        self
    }

    pub fn with_sources(mut self, sources: Vec<SourceDescriptor>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_categories(mut self, categories: Vec<DomainCategory>) -> Self {
        self.categories = categories;
        self
    }

    /// Base URL icons resolve against.
    pub fn file_path_base(&self) -> String {
        join!(&self.wiki_base, FILE_PATH_PREFIX)
    }

    pub fn sources_for(&self, category: DomainCategory) -> impl Iterator<Item = &SourceDescriptor> {
        self.sources.iter().filter(move |d| d.category == category)
    }
}

/// Cargo API for every category; page scraping behind it where a page spec exists.
pub fn default_sources(wiki_base: &str) -> Vec<SourceDescriptor> {
    let api = join!(wiki_base, CARGO_EXPORT_PATH);
    let pages = join!(wiki_base, WIKI_PAGE_PATH);
    let mut out = Vec::new();
    for c in DomainCategory::ALL {
        out.push(SourceDescriptor::api(c, 1, api.as_str()));
        if crate::specs::pages::for_category(c).is_some() {
            out.push(SourceDescriptor::scrape(c, 2, pages.as_str()));
        }
    }
    out
}
