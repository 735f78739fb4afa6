// src/config/consts.rs

// Net config
pub const WIKI_BASE: &str = "https://stowiki.net";
pub const CARGO_EXPORT_PATH: &str = "/wiki/Special:CargoExport";
pub const WIKI_PAGE_PATH: &str = "/wiki/";
pub const FILE_PATH_PREFIX: &str = "/wiki/Special:FilePath/";
pub const USER_AGENT: &str = "sets_data/0.1 (SETS build planner; read-only reference loader)";
pub const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

// Local cache
pub const CACHE_DIR: &str = ".cache";
pub const ASSETS_SUBDIR: &str = "assets";
pub const FAILED_ASSETS_FILE: &str = "failed.json";
pub const CACHE_FORMAT: u32 = 1;

// Freshness
pub const MAX_AGE_SECS: u64 = 7 * 24 * 60 * 60;
pub const FAILED_ASSET_COOLDOWN_SECS: u64 = 24 * 60 * 60;

// Requests
pub const REQUEST_TIMEOUT_SECS: u64 = 30;
pub const ASSET_TIMEOUT_SECS: u64 = 10;
pub const RETRIES: u32 = 2;
pub const BACKOFF_MS: u64 = 500;
pub const CARGO_PAGE_LIMIT: usize = 2500;
pub const CARGO_MAX_PAGES: usize = 20;

// Concurrency
pub const WORKERS: usize = 2; // categories in flight
pub const ASSET_WORKERS: usize = 8;
pub const REQUEST_PAUSE_MS: u64 = 250; // be polite
pub const ASSET_PAUSE_MS: u64 = 25;

// Env overrides
pub const ENV_CACHE_DIR: &str = "SETS_CACHE_DIR";
pub const ENV_WIKI_BASE: &str = "SETS_WIKI_BASE";
