//! # Disk Cache
//!
//! Persistent, byte-range-aware cache for remote media resources, keyed by
//! URL and bounded by an LRU byte budget.
//!
//! ## Layout
//!
//! ```text
//! <root>/<sha256(key)>/meta.json     key, resource length, last access
//! <root>/<sha256(key)>/<offset>.seg  immutable segment starting at offset
//! ```
//!
//! Segments are written to a temporary file and renamed into place, and the
//! in-memory index only learns about a segment after the rename. A reader
//! therefore sees a range either fully cached or not cached at all.
//!
//! ## Locking
//!
//! The index lives behind a `parking_lot` mutex that is never held across
//! an await. Each key also has a `tokio` read/write lock: readers share it,
//! writers and evictions take it exclusively. A task holds at most one key
//! lock at a time, so eviction triggered by a write runs only after the
//! writer has released its own key.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bridge_traits::storage::FileSystemAccess;
use bridge_traits::time::Clock;
use bytes::{Bytes, BytesMut};
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use core_runtime::logging::redact_url;
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::cache::config::DiskCacheConfig;
use crate::cache::range::SegmentMap;
use crate::cache::stats::CacheStats;
use crate::error::{PlaybackError, Result};

const MANIFEST_FILE: &str = "meta.json";
const SEGMENT_EXTENSION: &str = "seg";
const TEMP_EXTENSION: &str = "tmp";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryManifest {
    key: String,
    resource_length: Option<u64>,
    last_access_ms: i64,
}

#[derive(Debug)]
struct CacheEntry {
    dir: PathBuf,
    segments: SegmentMap,
    resource_length: Option<u64>,
    last_access_ms: i64,
    /// Access time or length changed since the manifest was written.
    dirty: bool,
}

impl CacheEntry {
    fn new(dir: PathBuf, now_ms: i64) -> Self {
        Self {
            dir,
            segments: SegmentMap::new(),
            resource_length: None,
            last_access_ms: now_ms,
            dirty: false,
        }
    }

    fn manifest(&self, key: &str) -> EntryManifest {
        EntryManifest {
            key: key.to_string(),
            resource_length: self.resource_length,
            last_access_ms: self.last_access_ms,
        }
    }
}

struct CacheIndex {
    /// Most recently used first.
    entries: LruCache<String, CacheEntry>,
    total_bytes: u64,
}

/// Byte-range disk cache with LRU eviction.
pub struct DiskCache {
    root: PathBuf,
    budget_bytes: u64,
    fs: Arc<dyn FileSystemAccess>,
    clock: Arc<dyn Clock>,
    event_bus: Option<Arc<EventBus>>,
    index: Mutex<CacheIndex>,
    key_locks: Mutex<HashMap<String, Arc<RwLock<()>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl DiskCache {
    /// Open the cache under `cache_root`, rebuilding the index from disk.
    ///
    /// Entries whose manifest cannot be decoded are deleted. Leftover
    /// temporary files from interrupted writes are removed. If the rebuilt
    /// cache exceeds the budget, the least recently used entries go first.
    #[instrument(skip(fs, clock, cache_root, event_bus, config), fields(root = %cache_root.display()))]
    pub async fn open(
        fs: Arc<dyn FileSystemAccess>,
        clock: Arc<dyn Clock>,
        cache_root: &Path,
        config: &DiskCacheConfig,
        event_bus: Option<Arc<EventBus>>,
    ) -> Result<Self> {
        config.validate().map_err(PlaybackError::CacheError)?;

        let root = cache_root.join(&config.directory_name);
        fs.create_dir_all(&root).await?;

        let cache = Self {
            root,
            budget_bytes: config.budget_bytes,
            fs,
            clock,
            event_bus,
            index: Mutex::new(CacheIndex {
                entries: LruCache::unbounded(),
                total_bytes: 0,
            }),
            key_locks: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        };

        cache.rebuild_index().await?;
        cache.enforce_budget().await?;

        info!(
            entries = cache.entry_count(),
            total_bytes = cache.total_bytes(),
            budget_bytes = cache.budget_bytes,
            "Disk cache opened"
        );
        Ok(cache)
    }

    async fn rebuild_index(&self) -> Result<()> {
        let mut loaded = Vec::new();
        for path in self.fs.list_directory(&self.root).await? {
            let is_dir = match self.fs.metadata(&path).await {
                Ok(meta) => meta.is_directory,
                Err(_) => false,
            };
            if !is_dir {
                continue;
            }
            match self.load_entry(&path).await {
                Ok(entry) => loaded.push(entry),
                Err(e) => {
                    warn!(dir = %path.display(), error = %e, "Dropping unreadable cache entry");
                    if let Err(e) = self.fs.delete_dir_all(&path).await {
                        warn!(dir = %path.display(), error = %e, "Failed to delete cache entry");
                    }
                }
            }
        }

        // Oldest first, so the most recent access ends up most recently used.
        loaded.sort_by_key(|(_, entry)| entry.last_access_ms);

        let mut index = self.index.lock();
        for (key, entry) in loaded {
            index.total_bytes += entry.segments.total_bytes();
            index.entries.put(key, entry);
        }
        Ok(())
    }

    async fn load_entry(&self, dir: &Path) -> Result<(String, CacheEntry)> {
        let raw = self.fs.read_file(&dir.join(MANIFEST_FILE)).await?;
        let manifest: EntryManifest = serde_json::from_slice(&raw)
            .map_err(|e| PlaybackError::CorruptEntry(format!("{}: {}", dir.display(), e)))?;

        if self.entry_dir(&manifest.key) != dir {
            return Err(PlaybackError::CorruptEntry(format!(
                "{}: manifest key does not match directory",
                dir.display()
            )));
        }

        let mut entry = CacheEntry::new(dir.to_path_buf(), manifest.last_access_ms);
        entry.resource_length = manifest.resource_length;

        for path in self.fs.list_directory(dir).await? {
            let extension = path.extension().and_then(|e| e.to_str());
            match extension {
                Some(TEMP_EXTENSION) => {
                    debug!(file = %path.display(), "Removing interrupted segment write");
                    self.fs.delete_file(&path).await?;
                }
                Some(SEGMENT_EXTENSION) => {
                    let start = path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .and_then(|s| s.parse::<u64>().ok());
                    let size = self.fs.metadata(&path).await?.size;
                    let accepted = match start {
                        Some(start) => entry.segments.insert(start, size),
                        None => false,
                    };
                    if !accepted {
                        debug!(file = %path.display(), "Removing stray segment");
                        self.fs.delete_file(&path).await?;
                    }
                }
                _ => {}
            }
        }

        Ok((manifest.key, entry))
    }

    // ------------------------------------------------------------------------
    // Paths and locks
    // ------------------------------------------------------------------------

    fn entry_dir(&self, key: &str) -> PathBuf {
        self.root.join(hex::encode(Sha256::digest(key.as_bytes())))
    }

    fn segment_path(dir: &Path, start: u64) -> PathBuf {
        dir.join(format!("{}.{}", start, SEGMENT_EXTENSION))
    }

    fn key_lock(&self, key: &str) -> Arc<RwLock<()>> {
        self.key_locks
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// Forget the lock of a removed key unless another task still holds it.
    fn release_key_lock(&self, key: &str, lock: Arc<RwLock<()>>) {
        let mut locks = self.key_locks.lock();
        if Arc::strong_count(&lock) <= 2 {
            locks.remove(key);
        }
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Cache(event));
        }
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Store `data` at `position` of the resource identified by `key`.
    ///
    /// Only bytes not already cached are written. Returns the number of new
    /// bytes stored. The budget is enforced after the write completes.
    #[instrument(skip(self, key, data), fields(key = %redact_url(key), len = data.len()))]
    pub async fn write(&self, key: &str, position: u64, data: Bytes) -> Result<u64> {
        if data.is_empty() {
            return Ok(0);
        }

        let (added, outcome) = {
            let lock = self.key_lock(key);
            let _guard = lock.write().await;
            self.write_locked(key, position, data).await
        };

        self.enforce_budget().await?;
        outcome.map(|_| added)
    }

    async fn write_locked(&self, key: &str, position: u64, data: Bytes) -> (u64, Result<()>) {
        let end = position + data.len() as u64;
        let (dir, gaps, is_new) = {
            let index = self.index.lock();
            match index.entries.peek(key) {
                Some(entry) => (entry.dir.clone(), entry.segments.gaps(position, end), false),
                None => (self.entry_dir(key), vec![position..end], true),
            }
        };

        let now_ms = self.clock.unix_timestamp_millis();
        if gaps.is_empty() {
            // Nothing new to store, but the write still counts as an access.
            if let Some(entry) = self.index.lock().entries.get_mut(key) {
                entry.last_access_ms = now_ms;
                entry.dirty = true;
            }
            return (0, Ok(()));
        }

        if is_new {
            let manifest = CacheEntry::new(dir.clone(), now_ms).manifest(key);
            let created = match self.fs.create_dir_all(&dir).await {
                Ok(()) => self.write_manifest(&dir, &manifest).await,
                Err(e) => Err(e.into()),
            };
            if let Err(e) = created {
                self.delete_entry_files(&dir).await;
                return (0, Err(e));
            }
        }

        let mut published = Vec::with_capacity(gaps.len());
        let mut outcome = Ok(());
        for gap in gaps {
            let slice = data.slice((gap.start - position) as usize..(gap.end - position) as usize);
            match self.publish_segment(&dir, gap.start, slice).await {
                Ok(()) => published.push((gap.start, gap.end - gap.start)),
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }

        if published.is_empty() && is_new {
            self.delete_entry_files(&dir).await;
            return (0, outcome);
        }

        let mut guard = self.index.lock();
        let index = &mut *guard;
        if !index.entries.contains(key) {
            index
                .entries
                .put(key.to_string(), CacheEntry::new(dir, now_ms));
        }
        let mut added = 0;
        if let Some(entry) = index.entries.get_mut(key) {
            for (start, len) in published {
                if entry.segments.insert(start, len) {
                    added += len;
                }
            }
            entry.last_access_ms = now_ms;
            entry.dirty = true;
        }
        index.total_bytes += added;

        (added, outcome)
    }

    async fn publish_segment(&self, dir: &Path, start: u64, data: Bytes) -> Result<()> {
        let target = Self::segment_path(dir, start);
        let temp = dir.join(format!("{}.{}.{}", start, SEGMENT_EXTENSION, TEMP_EXTENSION));

        self.fs.write_file(&temp, data).await?;
        if let Err(e) = self.fs.rename(&temp, &target).await {
            let _ = self.fs.delete_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn write_manifest(&self, dir: &Path, manifest: &EntryManifest) -> Result<()> {
        let encoded = serde_json::to_vec(manifest)
            .map_err(|e| PlaybackError::CacheError(format!("manifest encoding: {}", e)))?;
        let temp = dir.join(format!("{}.{}", MANIFEST_FILE, TEMP_EXTENSION));
        self.fs.write_file(&temp, Bytes::from(encoded)).await?;
        self.fs.rename(&temp, &dir.join(MANIFEST_FILE)).await?;
        Ok(())
    }

    /// Record the full length of the resource, learned from the server.
    pub async fn set_resource_length(&self, key: &str, length: u64) -> Result<()> {
        let lock = self.key_lock(key);
        let _guard = lock.write().await;

        let manifest = {
            let mut index = self.index.lock();
            match index.entries.peek_mut(key) {
                Some(entry) if entry.resource_length != Some(length) => {
                    entry.resource_length = Some(length);
                    entry.dirty = false;
                    Some((entry.dir.clone(), entry.manifest(key)))
                }
                _ => None,
            }
        };

        if let Some((dir, manifest)) = manifest {
            self.write_manifest(&dir, &manifest).await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Read `[position, position + length)`. Returns `Ok(None)` unless the
    /// whole range is cached. A hit marks the entry most recently used.
    pub async fn read(&self, key: &str, position: u64, length: u64) -> Result<Option<Bytes>> {
        if length == 0 {
            return Ok(Some(Bytes::new()));
        }
        if !self.index.lock().entries.contains(key) {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        }

        let lock = self.key_lock(key);
        let _guard = lock.read().await;

        let plan = {
            let now_ms = self.clock.unix_timestamp_millis();
            let mut index = self.index.lock();
            index.entries.get_mut(key).and_then(|entry| {
                let slices = entry.segments.slices(position, position + length)?;
                entry.last_access_ms = now_ms;
                entry.dirty = true;
                Some((entry.dir.clone(), slices))
            })
        };

        let Some((dir, slices)) = plan else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        };
        self.hits.fetch_add(1, Ordering::Relaxed);

        let mut out = BytesMut::with_capacity(length as usize);
        for slice in slices {
            let path = Self::segment_path(&dir, slice.segment_start);
            let bytes = self
                .fs
                .read_range(&path, slice.offset_in_segment, slice.length)
                .await?;
            if bytes.len() as u64 != slice.length {
                return Err(PlaybackError::CorruptEntry(format!(
                    "{}: short segment read",
                    path.display()
                )));
            }
            out.extend_from_slice(&bytes);
        }
        Ok(Some(out.freeze()))
    }

    /// `true` when every byte in `[0, total_length)` is cached. A zero
    /// length is never considered cached.
    pub fn is_fully_cached(&self, key: &str, total_length: u64) -> bool {
        if total_length == 0 {
            return false;
        }
        self.index
            .lock()
            .entries
            .peek(key)
            .map(|entry| entry.segments.covers(0, total_length))
            .unwrap_or(false)
    }

    /// Cached bytes within `[0, total_length)`.
    pub fn cached_bytes(&self, key: &str, total_length: u64) -> u64 {
        self.index
            .lock()
            .entries
            .peek(key)
            .map(|entry| entry.segments.covered_within(total_length))
            .unwrap_or(0)
    }

    /// Fraction of `[0, total_length)` that is cached, in `[0, 1]`.
    pub fn cache_progress(&self, key: &str, total_length: u64) -> f64 {
        if total_length == 0 {
            return 0.0;
        }
        self.cached_bytes(key, total_length) as f64 / total_length as f64
    }

    /// First uncached offset at or after `from`.
    pub fn contiguous_end(&self, key: &str, from: u64) -> u64 {
        self.index
            .lock()
            .entries
            .peek(key)
            .map(|entry| entry.segments.contiguous_end(from))
            .unwrap_or(from)
    }

    pub fn resource_length(&self, key: &str) -> Option<u64> {
        self.index
            .lock()
            .entries
            .peek(key)
            .and_then(|entry| entry.resource_length)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.lock().entries.contains(key)
    }

    // ------------------------------------------------------------------------
    // Eviction
    // ------------------------------------------------------------------------

    async fn enforce_budget(&self) -> Result<()> {
        self.evict_until(self.budget_bytes).await.map(|_| ())
    }

    /// Evict least recently used entries until at most `target_bytes` remain.
    /// Returns the bytes freed.
    #[instrument(skip(self))]
    pub async fn trim_to(&self, target_bytes: u64) -> Result<u64> {
        let freed = self.evict_until(target_bytes).await?;
        if freed > 0 {
            info!(freed_bytes = freed, total_bytes = self.total_bytes(), "Cache trimmed");
        }
        Ok(freed)
    }

    async fn evict_until(&self, target_bytes: u64) -> Result<u64> {
        let mut freed = 0;
        loop {
            let victim = {
                let index = self.index.lock();
                if index.total_bytes <= target_bytes {
                    break;
                }
                index.entries.peek_lru().map(|(key, _)| key.clone())
            };
            let Some(key) = victim else {
                break;
            };

            let lock = self.key_lock(&key);
            let removed = {
                let _guard = lock.write().await;
                let entry = {
                    let mut index = self.index.lock();
                    let still_lru = index
                        .entries
                        .peek_lru()
                        .map(|(lru_key, _)| *lru_key == key)
                        .unwrap_or(false);
                    if index.total_bytes > target_bytes && still_lru {
                        index.entries.pop_lru().map(|(_, entry)| {
                            index.total_bytes -= entry.segments.total_bytes();
                            entry
                        })
                    } else {
                        None
                    }
                };
                if let Some(entry) = &entry {
                    self.delete_entry_files(&entry.dir).await;
                }
                entry
            };
            self.release_key_lock(&key, lock);

            if let Some(entry) = removed {
                let bytes = entry.segments.total_bytes();
                freed += bytes;
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(key = %redact_url(&key), bytes, "Evicted cache entry");
                self.emit(CacheEvent::Evicted { key, bytes });
            }
        }
        Ok(freed)
    }

    async fn delete_entry_files(&self, dir: &Path) {
        if let Err(e) = self.fs.delete_dir_all(dir).await {
            warn!(dir = %dir.display(), error = %e, "Failed to delete cache entry files");
        }
    }

    /// Remove one entry. Returns `false` if the key was not cached.
    pub async fn remove(&self, key: &str) -> Result<bool> {
        let lock = self.key_lock(key);
        let removed = {
            let _guard = lock.write().await;
            let entry = {
                let mut index = self.index.lock();
                index.entries.pop(key).map(|entry| {
                    index.total_bytes -= entry.segments.total_bytes();
                    entry
                })
            };
            if let Some(entry) = &entry {
                self.delete_entry_files(&entry.dir).await;
            }
            entry.is_some()
        };
        self.release_key_lock(key, lock);
        Ok(removed)
    }

    /// Remove every entry. Returns the bytes freed.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<u64> {
        let before = self.total_bytes();
        for key in self.keys() {
            self.remove(&key).await?;
        }
        let freed = before.saturating_sub(self.total_bytes());
        info!(freed_bytes = freed, "Cache cleared");
        self.emit(CacheEvent::Cleared { freed_bytes: freed });
        Ok(freed)
    }

    /// Persist pending access times.
    pub async fn flush(&self) -> Result<()> {
        for key in self.keys() {
            let lock = self.key_lock(&key);
            let _guard = lock.write().await;
            let manifest = {
                let mut index = self.index.lock();
                match index.entries.peek_mut(&key) {
                    Some(entry) if entry.dirty => {
                        entry.dirty = false;
                        Some((entry.dir.clone(), entry.manifest(&key)))
                    }
                    _ => None,
                }
            };
            if let Some((dir, manifest)) = manifest {
                self.write_manifest(&dir, &manifest).await?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------------

    pub fn budget_bytes(&self) -> u64 {
        self.budget_bytes
    }

    pub fn total_bytes(&self) -> u64 {
        self.index.lock().total_bytes
    }

    pub fn total_megabytes(&self) -> f64 {
        self.total_bytes() as f64 / (1024.0 * 1024.0)
    }

    pub fn entry_count(&self) -> usize {
        self.index.lock().entries.len()
    }

    /// Cached keys, most recently used first.
    pub fn keys(&self) -> Vec<String> {
        self.index
            .lock()
            .entries
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn stats(&self) -> CacheStats {
        let index = self.index.lock();
        CacheStats {
            entries: index.entries.len(),
            total_bytes: index.total_bytes,
            budget_bytes: self.budget_bytes,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            calculated_at: self.clock.unix_timestamp_millis(),
        }
    }
}

impl std::fmt::Debug for DiskCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskCache")
            .field("root", &self.root)
            .field("budget_bytes", &self.budget_bytes)
            .field("total_bytes", &self.total_bytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{clock, manual_clock, resource_bytes, MemoryFs};

    async fn open(fs: Arc<MemoryFs>, budget: u64) -> DiskCache {
        DiskCache::open(
            fs,
            clock(),
            Path::new("/cache"),
            &DiskCacheConfig::new(budget),
            None,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_write_then_read_range() {
        let cache = open(MemoryFs::new(), 10_000).await;
        let data = resource_bytes(1000);

        assert_eq!(cache.write("k", 0, data.clone()).await.unwrap(), 1000);
        let read = cache.read("k", 100, 200).await.unwrap().unwrap();
        assert_eq!(read, data.slice(100..300));
        assert!(cache.read("k", 900, 200).await.unwrap().is_none());
        assert!(cache.read("other", 0, 10).await.unwrap().is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
    }

    #[tokio::test]
    async fn test_overlapping_write_only_fills_gaps() {
        let cache = open(MemoryFs::new(), 10_000).await;
        let data = resource_bytes(300);

        cache.write("k", 0, data.slice(0..100)).await.unwrap();
        cache.write("k", 200, data.slice(200..300)).await.unwrap();
        let added = cache.write("k", 50, data.slice(50..250)).await.unwrap();

        assert_eq!(added, 100);
        assert_eq!(cache.total_bytes(), 300);
        assert_eq!(cache.read("k", 0, 300).await.unwrap().unwrap(), data);
    }

    #[tokio::test]
    async fn test_fully_cached_and_progress() {
        let cache = open(MemoryFs::new(), 10_000).await;
        cache.write("k", 0, resource_bytes(500)).await.unwrap();

        assert!(cache.is_fully_cached("k", 500));
        assert!(!cache.is_fully_cached("k", 1000));
        assert!(!cache.is_fully_cached("k", 0));
        assert_eq!(cache.cached_bytes("k", 1000), 500);
        assert_eq!(cache.cache_progress("k", 1000), 0.5);
        assert_eq!(cache.contiguous_end("k", 0), 500);
    }

    #[tokio::test]
    async fn test_lru_eviction_keeps_recently_read_entry() {
        let clock = manual_clock();
        let fs = MemoryFs::new();
        let cache = DiskCache::open(
            fs,
            clock.clone(),
            Path::new("/cache"),
            &DiskCacheConfig::new(300),
            None,
        )
        .await
        .unwrap();

        for key in ["a", "b", "c"] {
            cache.write(key, 0, resource_bytes(100)).await.unwrap();
            clock.advance_millis(10);
        }
        assert!(cache.read("a", 0, 100).await.unwrap().is_some());

        cache.write("d", 0, resource_bytes(100)).await.unwrap();

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
        assert!(cache.contains("d"));
        assert!(cache.total_bytes() <= 300);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_rewriting_cached_bytes_refreshes_lru() {
        let clock = manual_clock();
        let cache = DiskCache::open(
            MemoryFs::new(),
            clock.clone(),
            Path::new("/cache"),
            &DiskCacheConfig::new(300),
            None,
        )
        .await
        .unwrap();

        for key in ["a", "b", "c"] {
            cache.write(key, 0, resource_bytes(100)).await.unwrap();
            clock.advance_millis(10);
        }
        let added = cache.write("a", 0, resource_bytes(100)).await.unwrap();
        assert_eq!(added, 0);

        cache.write("d", 0, resource_bytes(100)).await.unwrap();

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
        assert!(cache.contains("d"));
    }

    #[tokio::test]
    async fn test_total_never_exceeds_budget() {
        let cache = open(MemoryFs::new(), 1000).await;
        for i in 0..20 {
            cache
                .write(&format!("k{}", i), 0, resource_bytes(170))
                .await
                .unwrap();
            assert!(cache.total_bytes() <= 1000);
        }
        assert_eq!(cache.entry_count(), 5);
    }

    #[tokio::test]
    async fn test_trim_and_clear() {
        let cache = open(MemoryFs::new(), 10_000).await;
        for key in ["a", "b", "c", "d"] {
            cache.write(key, 0, resource_bytes(100)).await.unwrap();
        }

        assert_eq!(cache.trim_to(200).await.unwrap(), 200);
        assert_eq!(cache.keys(), vec!["d".to_string(), "c".to_string()]);

        assert_eq!(cache.clear().await.unwrap(), 200);
        assert_eq!(cache.entry_count(), 0);
        assert_eq!(cache.total_bytes(), 0);
    }

    #[tokio::test]
    async fn test_reopen_restores_entries_and_lengths() {
        let fs = MemoryFs::new();
        let data = resource_bytes(400);
        {
            let cache = open(fs.clone(), 10_000).await;
            cache.write("k", 0, data.slice(0..200)).await.unwrap();
            cache.set_resource_length("k", 400).await.unwrap();
            cache.flush().await.unwrap();
        }

        let cache = open(fs, 10_000).await;
        assert_eq!(cache.total_bytes(), 200);
        assert_eq!(cache.resource_length("k"), Some(400));
        assert_eq!(cache.read("k", 0, 200).await.unwrap().unwrap(), data.slice(0..200));
    }

    #[tokio::test]
    async fn test_reopen_drops_corrupt_manifest_and_temp_files() {
        let fs = MemoryFs::new();
        let dir = {
            let cache = open(fs.clone(), 10_000).await;
            cache.write("good", 0, resource_bytes(10)).await.unwrap();
            cache.write("bad", 0, resource_bytes(10)).await.unwrap();
            cache.entry_dir("bad")
        };
        fs.write_file(&dir.join(MANIFEST_FILE), Bytes::from_static(b"{not json"))
            .await
            .unwrap();
        let good_dir = open(fs.clone(), 10_000).await.entry_dir("good");
        fs.write_file(&good_dir.join("10.seg.tmp"), resource_bytes(5))
            .await
            .unwrap();

        let cache = open(fs.clone(), 10_000).await;
        assert!(cache.contains("good"));
        assert!(!cache.contains("bad"));
        assert!(fs.file_names_under(&dir).is_empty());
        assert!(!fs.file_names_under(&good_dir).iter().any(|p| p.extension().is_some_and(|e| e == "tmp")));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_entry() {
        let fs = MemoryFs::new();
        let cache = open(fs.clone(), 10_000).await;
        fs.set_fail_writes(true);

        assert!(cache.write("k", 0, resource_bytes(10)).await.is_err());
        assert!(!cache.contains("k"));
        assert_eq!(cache.total_bytes(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_writers_same_key() {
        let cache = Arc::new(open(MemoryFs::new(), 100_000).await);
        let data = resource_bytes(4000);

        let mut handles = Vec::new();
        for i in 0..4u64 {
            let cache = cache.clone();
            let chunk = data.slice((i * 1000) as usize..((i + 1) * 1000) as usize);
            handles.push(tokio::spawn(async move {
                cache.write("k", i * 1000, chunk).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(cache.total_bytes(), 4000);
        assert_eq!(cache.read("k", 0, 4000).await.unwrap().unwrap(), data);
    }
}
