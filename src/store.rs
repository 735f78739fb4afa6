// src/store.rs
//! On-disk cache: one JSON document per category plus binary assets.
//!
//! The store is the only owner of cache files. Callers get entries by value.
//! Every replace goes through [`atomic_write`], so a crash leaves either the old
//! file or the new one, never a mix.

use std::collections::{BTreeMap, HashSet};
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::assets::AssetReference;
use crate::category::DomainCategory;
use crate::config::consts::{ASSETS_SUBDIR, CACHE_FORMAT, FAILED_ASSETS_FILE};
use crate::error::CacheError;
use crate::record::NormalizedRecord;
use crate::source::SourceKind;

const BACKUP_SUFFIX: &str = ".bak";
const MARKER_EXT: &str = "invalid";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub format: u32,
    pub category: DomainCategory,
    pub written_at: DateTime<Utc>,
    pub source: SourceKind,
    pub records: Vec<NormalizedRecord>,
}

impl CacheEntry {
    pub fn get(&self, key: &str) -> Option<&NormalizedRecord> {
        self.records.iter().find(|r| r.key == key)
    }

    /// `now - written_at > max_age`. Exactly `max_age` old is still fresh.
    pub fn is_expired_at(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        let max = TimeDelta::from_std(max_age).unwrap_or(TimeDelta::MAX);
        now.signed_duration_since(self.written_at) > max
    }
}

pub struct CacheStore {
    root: PathBuf,
    locks: [Mutex<()>; DomainCategory::COUNT],
    ledger: Mutex<()>,
}

impl CacheStore {
    /// No I/O happens until the first read or write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: std::array::from_fn(|_| Mutex::new(())),
            ledger: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entry_path(&self, category: DomainCategory) -> PathBuf {
        self.root.join(format!("{}.json", category.slug()))
    }

    fn backup_path(&self, category: DomainCategory) -> PathBuf {
        with_suffix(&self.entry_path(category), BACKUP_SUFFIX)
    }

    fn marker_path(&self, category: DomainCategory) -> PathBuf {
        self.root.join(format!("{}.{MARKER_EXT}", category.slug()))
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join(ASSETS_SUBDIR)
    }

    /// Serializes refreshes of one category. Other categories are not blocked.
    pub fn category_lock(&self, category: DomainCategory) -> MutexGuard<'_, ()> {
        self.locks[category.index()]
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /* ---------- records ---------- */

    /// Current entry, or the backup when the current file is corrupt.
    /// Never touches the network and never fails: unreadable means absent.
    pub fn read(&self, category: DomainCategory) -> Option<CacheEntry> {
        match load_entry(&self.entry_path(category), category) {
            Ok(Some(entry)) => return Some(entry),
            Ok(None) => return None,
            Err(err) => logw!("{err}; trying backup"),
        }
        match load_entry(&self.backup_path(category), category) {
            Ok(entry) => entry,
            Err(err) => {
                logw!("{err}");
                None
            }
        }
    }

    /// Does the current file parse into well-formed records?
    pub fn validate(&self, category: DomainCategory) -> bool {
        matches!(load_entry(&self.entry_path(category), category), Ok(Some(_)))
    }

    /// Replace the category's entry. The previous good entry is kept as the
    /// backup, `written_at` never goes backwards and an invalidation marker is
    /// cleared.
    pub fn write(
        &self,
        category: DomainCategory,
        records: Vec<NormalizedRecord>,
        source: SourceKind,
    ) -> Result<CacheEntry, CacheError> {
        self.write_at(category, records, source, Utc::now())
    }

    pub fn write_at(
        &self,
        category: DomainCategory,
        records: Vec<NormalizedRecord>,
        source: SourceKind,
        now: DateTime<Utc>,
    ) -> Result<CacheEntry, CacheError> {
        fs::create_dir_all(&self.root).map_err(|e| CacheError::io(&self.root, e))?;
        let path = self.entry_path(category);

        let previous = load_entry(&path, category).ok().flatten();
        let mut written_at = now;
        if let Some(prev) = &previous {
            if written_at <= prev.written_at {
                written_at = prev.written_at + TimeDelta::milliseconds(1);
            }
            let bytes = fs::read(&path).map_err(|e| CacheError::io(&path, e))?;
            atomic_write(&self.backup_path(category), &bytes)?;
        }

        let entry = CacheEntry { format: CACHE_FORMAT, category, written_at, source, records };
        let bytes = serde_json::to_vec_pretty(&entry)?;
        atomic_write(&path, &bytes)?;

        remove_if_exists(&self.marker_path(category))?;
        logd!("{category}: cached {} records at {}", entry.records.len(), path.display());
        Ok(entry)
    }

    pub fn is_stale(&self, category: DomainCategory, max_age: Duration) -> bool {
        self.is_stale_at(category, max_age, Utc::now())
    }

    /// Absent, corrupt, invalidated or older than `max_age` at `now`.
    pub fn is_stale_at(&self, category: DomainCategory, max_age: Duration, now: DateTime<Utc>) -> bool {
        if self.is_invalidated(category) {
            return true;
        }
        match load_entry(&self.entry_path(category), category) {
            Ok(Some(entry)) => entry.is_expired_at(max_age, now),
            _ => true,
        }
    }

    /// Force the next refresh past the staleness check. Data stays readable.
    pub fn invalidate(&self, category: DomainCategory) -> Result<(), CacheError> {
        fs::create_dir_all(&self.root).map_err(|e| CacheError::io(&self.root, e))?;
        let marker = self.marker_path(category);
        fs::write(&marker, Utc::now().to_rfc3339()).map_err(|e| CacheError::io(&marker, e))
    }

    pub fn is_invalidated(&self, category: DomainCategory) -> bool {
        self.marker_path(category).exists()
    }

    /* ---------- assets ---------- */

    pub fn asset_path(&self, reference: &AssetReference) -> Result<PathBuf, CacheError> {
        let name = reference.local_filename.as_str();
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            let dir = self.assets_dir();
            return Err(CacheError::io(
                dir,
                io::Error::new(io::ErrorKind::InvalidInput, format!("bad asset file name '{name}'")),
            ));
        }
        Ok(self.assets_dir().join(name))
    }

    /// Presence by file name. Contents are not checked.
    pub fn has_asset(&self, reference: &AssetReference) -> bool {
        self.asset_path(reference).is_ok_and(|p| p.is_file())
    }

    pub fn read_asset(&self, reference: &AssetReference) -> Option<Vec<u8>> {
        fs::read(self.asset_path(reference).ok()?).ok()
    }

    pub fn write_asset(&self, reference: &AssetReference, bytes: &[u8]) -> Result<(), CacheError> {
        let path = self.asset_path(reference)?;
        let dir = self.assets_dir();
        fs::create_dir_all(&dir).map_err(|e| CacheError::io(&dir, e))?;
        atomic_write(&path, bytes)
    }

    fn ledger_path(&self) -> PathBuf {
        self.assets_dir().join(FAILED_ASSETS_FILE)
    }

    /// Asset file name → unix seconds of its last failed download.
    pub fn failed_assets(&self) -> BTreeMap<String, i64> {
        let _g = self.ledger.lock().unwrap_or_else(|e| e.into_inner());
        self.load_ledger()
    }

    fn load_ledger(&self) -> BTreeMap<String, i64> {
        let path = self.ledger_path();
        match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                logw!("ignoring unreadable {}: {err}", path.display());
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        }
    }

    /// Record this batch's failures, forget the ones that now succeeded, and
    /// drop entries whose cooldown has run out.
    pub fn update_failed_assets(
        &self,
        failed: &[&str],
        cleared: &[&str],
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> Result<(), CacheError> {
        let _g = self.ledger.lock().unwrap_or_else(|e| e.into_inner());
        let mut ledger = self.load_ledger();
        let before = ledger.clone();
        let cutoff = now.timestamp().saturating_sub(i64::try_from(cooldown.as_secs()).unwrap_or(i64::MAX));
        ledger.retain(|_, at| *at > cutoff);
        for name in cleared {
            ledger.remove(*name);
        }
        for name in failed {
            ledger.insert(s!(*name), now.timestamp());
        }
        if ledger == before {
            return Ok(());
        }
        let dir = self.assets_dir();
        fs::create_dir_all(&dir).map_err(|e| CacheError::io(&dir, e))?;
        atomic_write(&self.ledger_path(), &serde_json::to_vec_pretty(&ledger)?)
    }
}

/// Parse and check one entry file. `Ok(None)` when the file does not exist.
fn load_entry(path: &Path, category: DomainCategory) -> Result<Option<CacheEntry>, CacheError> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CacheError::io(path, e)),
    };
    let corrupt = |detail: String| CacheError::CacheCorrupt { path: path.to_path_buf(), detail };

    let entry: CacheEntry = serde_json::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))?;
    if entry.format != CACHE_FORMAT {
        return Err(corrupt(format!("format {} (expected {CACHE_FORMAT})", entry.format)));
    }
    if entry.category != category {
        return Err(corrupt(format!("holds {} records", entry.category)));
    }
    let mut keys = HashSet::with_capacity(entry.records.len());
    for r in &entry.records {
        if r.key.is_empty() {
            return Err(corrupt(s!("record with empty key")));
        }
        if !keys.insert(r.key.as_str()) {
            return Err(corrupt(format!("duplicate key '{}'", r.key)));
        }
    }
    Ok(Some(entry))
}

/// Write to a uniquely named temp file beside `path`, fsync, rename over
/// `path`. Concurrent writers of the same path each get their own temp file;
/// the last rename wins. A failed write leaves no temp file behind.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let result = (|| -> io::Result<()> {
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    })();
    result.map_err(|e| CacheError::io(path, e))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

fn remove_if_exists(path: &Path) -> Result<(), CacheError> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(CacheError::io(path, e)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const DAY: Duration = Duration::from_secs(24 * 3600);

    fn ships(names: &[&str]) -> Vec<NormalizedRecord> {
        names.iter().map(|n| NormalizedRecord::new(*n).with("Page", *n)).collect()
    }

    #[test]
    fn write_then_read() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        assert!(store.read(DomainCategory::Ship).is_none());

        let written = store.write(DomainCategory::Ship, ships(&["A", "B"]), SourceKind::Api).unwrap();
        let read = store.read(DomainCategory::Ship).unwrap();
        assert_eq!(read, written);
        assert_eq!(read.get("B").unwrap().text("Page"), Some("B"));
        assert!(store.validate(DomainCategory::Ship));
    }

    #[test]
    fn backup_serves_when_current_is_corrupt() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        store.write(DomainCategory::Trait, ships(&["old"]), SourceKind::Api).unwrap();
        store.write(DomainCategory::Trait, ships(&["new"]), SourceKind::Scrape).unwrap();
        fs::write(store.entry_path(DomainCategory::Trait), b"{\"format\":1,").unwrap();

        assert!(!store.validate(DomainCategory::Trait));
        let e = store.read(DomainCategory::Trait).unwrap();
        assert_eq!(e.records[0].key, "old");
        assert_eq!(e.source, SourceKind::Api);
    }

    #[test]
    fn entry_for_other_category_is_corrupt() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        store.write(DomainCategory::Ship, ships(&["A"]), SourceKind::Api).unwrap();
        fs::copy(store.entry_path(DomainCategory::Ship), store.entry_path(DomainCategory::Equipment)).unwrap();
        assert!(store.read(DomainCategory::Equipment).is_none());
    }

    #[test]
    fn asset_names_cannot_escape() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let bad = AssetReference {
            url: s!("https://x/y"),
            local_filename: s!(".."),
            category: DomainCategory::Ship,
        };
        assert!(store.write_asset(&bad, b"x").is_err());
        assert!(!store.has_asset(&bad));
    }

    #[test]
    fn ledger_records_and_clears() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let now = Utc::now();
        store.update_failed_assets(&["a.png", "b.png"], &[], now, DAY).unwrap();
        store.update_failed_assets(&[], &["a.png"], now, DAY).unwrap();
        let ledger = store.failed_assets();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger["b.png"], now.timestamp());
    }

    #[test]
    fn concurrent_atomic_writes_to_one_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Foo.png");
        std::thread::scope(|s| {
            for i in 0..8u8 {
                let path = &path;
                s.spawn(move || {
                    for _ in 0..25 {
                        atomic_write(path, &[i; 64]).unwrap();
                    }
                });
            }
        });
        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 64);
        assert!(bytes.iter().all(|b| *b == bytes[0]));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn ledger_prunes_expired_entries() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let then = Utc::now() - TimeDelta::days(3);
        store.update_failed_assets(&["old.png"], &[], then, DAY).unwrap();
        store.update_failed_assets(&["recent.png"], &[], then + TimeDelta::days(2), DAY).unwrap();
        // nothing failed or cleared in this batch; expiry alone rewrites the ledger
        store.update_failed_assets(&[], &[], then + TimeDelta::days(2) + TimeDelta::hours(1), DAY).unwrap();
        let ledger = store.failed_assets();
        assert_eq!(ledger.keys().collect::<Vec<_>>(), vec!["recent.png"]);
    }
}
