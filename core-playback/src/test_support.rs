//! In-memory bridges shared by the unit tests.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::http::{ByteRange, HttpClient, HttpRequest, HttpResponse, HttpStream};
use bridge_traits::playback::{
    BufferTargets, EngineEvent, EngineEventStream, EngineRepeatMode, EngineState,
    MediaByteSource, MediaEngine, MediaItem,
};
use bridge_traits::storage::{FileMetadata, FileSystemAccess, StorageTelemetry};
use bridge_traits::time::{Clock, ManualClock};
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use futures::StreamExt;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tokio_util::io::StreamReader;

pub(crate) fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    ))
}

pub(crate) fn clock() -> Arc<dyn Clock> {
    manual_clock()
}

/// Deterministic resource bytes, so reads can be checked against offsets.
pub(crate) fn resource_bytes(len: usize) -> Bytes {
    Bytes::from((0..len).map(|i| (i % 251) as u8).collect::<Vec<u8>>())
}

// ============================================================================
// File system
// ============================================================================

#[derive(Default)]
pub(crate) struct MemoryFs {
    files: Mutex<BTreeMap<PathBuf, Bytes>>,
    dirs: Mutex<BTreeSet<PathBuf>>,
    fail_writes: AtomicBool,
    failing_entries: Mutex<Vec<String>>,
}

impl MemoryFs {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Fail every write inside the cache entry directory of `key`.
    pub(crate) fn fail_writes_for_key(&self, key: &str) {
        self.failing_entries
            .lock()
            .push(hex::encode(Sha256::digest(key.as_bytes())));
    }

    pub(crate) fn file_names_under(&self, dir: &Path) -> Vec<PathBuf> {
        self.files
            .lock()
            .keys()
            .filter(|p| p.starts_with(dir))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl FileSystemAccess for MemoryFs {
    async fn get_cache_directory(&self) -> Result<PathBuf> {
        Ok(PathBuf::from("/cache"))
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.files.lock().contains_key(path) || self.dirs.lock().contains(path))
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        if let Some(data) = self.files.lock().get(path) {
            return Ok(FileMetadata {
                size: data.len() as u64,
                modified_at: None,
                is_directory: false,
            });
        }
        if self.dirs.lock().contains(path) {
            return Ok(FileMetadata {
                size: 0,
                modified_at: None,
                is_directory: true,
            });
        }
        Err(BridgeError::NotFound(path.display().to_string()))
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut dirs = self.dirs.lock();
        for ancestor in path.ancestors() {
            dirs.insert(ancestor.to_path_buf());
        }
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> Result<Bytes> {
        self.files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(path.display().to_string()))
    }

    async fn read_range(&self, path: &Path, offset: u64, length: u64) -> Result<Bytes> {
        let data = self.read_file(path).await?;
        let start = (offset as usize).min(data.len());
        let end = (start + length as usize).min(data.len());
        Ok(data.slice(start..end))
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()> {
        let in_failing_entry = self
            .failing_entries
            .lock()
            .iter()
            .any(|dir| path.components().any(|c| c.as_os_str() == dir.as_str()));
        if self.fail_writes.load(Ordering::SeqCst) || in_failing_entry {
            return Err(BridgeError::OperationFailed("disk full".to_string()));
        }
        self.files.lock().insert(path.to_path_buf(), data);
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let mut files = self.files.lock();
        let data = files
            .remove(from)
            .ok_or_else(|| BridgeError::NotFound(from.display().to_string()))?;
        files.insert(to.to_path_buf(), data);
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        self.files.lock().remove(path);
        Ok(())
    }

    async fn delete_dir_all(&self, path: &Path) -> Result<()> {
        self.files.lock().retain(|p, _| !p.starts_with(path));
        self.dirs.lock().retain(|p| !p.starts_with(path));
        Ok(())
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut children: Vec<PathBuf> = self
            .files
            .lock()
            .keys()
            .filter(|p| p.parent() == Some(path))
            .cloned()
            .collect();
        children.extend(
            self.dirs
                .lock()
                .iter()
                .filter(|p| p.parent() == Some(path))
                .cloned(),
        );
        Ok(children)
    }
}

pub(crate) struct FixedTelemetry(pub Option<u64>);

#[async_trait]
impl StorageTelemetry for FixedTelemetry {
    async fn available_bytes(&self) -> Result<u64> {
        self.0
            .ok_or_else(|| BridgeError::NotAvailable("statvfs".to_string()))
    }
}

// ============================================================================
// HTTP
// ============================================================================

/// Serves registered resources, honouring `Range` unless told otherwise.
#[derive(Default)]
pub(crate) struct ScriptedHttp {
    resources: Mutex<HashMap<String, Bytes>>,
    requests: Mutex<Vec<(String, Option<ByteRange>)>>,
    failing: Mutex<HashSet<String>>,
    stall_after: Mutex<Option<usize>>,
    ignore_range: AtomicBool,
}

impl ScriptedHttp {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn add_resource(&self, url: &str, len: usize) -> Bytes {
        let data = resource_bytes(len);
        self.resources.lock().insert(url.to_string(), data.clone());
        data
    }

    pub(crate) fn fail(&self, url: &str) {
        self.failing.lock().insert(url.to_string());
    }

    /// Bodies yield this many bytes, then never complete.
    pub(crate) fn stall_after(&self, bytes: usize) {
        *self.stall_after.lock() = Some(bytes);
    }

    pub(crate) fn ignore_range(&self) {
        self.ignore_range.store(true, Ordering::SeqCst);
    }

    pub(crate) fn requests(&self) -> Vec<(String, Option<ByteRange>)> {
        self.requests.lock().clone()
    }

    pub(crate) fn request_count(&self, url: &str) -> usize {
        self.requests.lock().iter().filter(|(u, _)| u == url).count()
    }
}

#[async_trait]
impl HttpClient for ScriptedHttp {
    async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse> {
        Err(BridgeError::NotAvailable("execute".to_string()))
    }

    async fn download_stream(&self, request: HttpRequest) -> Result<HttpStream> {
        self.requests
            .lock()
            .push((request.url.clone(), request.range));

        if self.failing.lock().contains(&request.url) {
            return Err(BridgeError::Http {
                status: 503,
                message: "unavailable".to_string(),
            });
        }

        let data = self
            .resources
            .lock()
            .get(&request.url)
            .cloned()
            .ok_or_else(|| BridgeError::Http {
                status: 404,
                message: request.url.clone(),
            })?;
        let total = data.len() as u64;

        let (status, body) = match request.range {
            Some(range) if !self.ignore_range.load(Ordering::SeqCst) => {
                let start = range.start.min(total);
                let end = range
                    .length
                    .map(|len| (start + len).min(total))
                    .unwrap_or(total);
                (206, data.slice(start as usize..end as usize))
            }
            _ => (200, data),
        };
        let content_length = Some(body.len() as u64);
        let reader: Box<dyn tokio::io::AsyncRead + Send + Unpin> = match *self.stall_after.lock() {
            Some(limit) => {
                let head = body.slice(..limit.min(body.len()));
                let stream = futures::stream::iter(vec![Ok::<_, std::io::Error>(head)])
                    .chain(futures::stream::pending());
                Box::new(StreamReader::new(Box::pin(stream)))
            }
            None => Box::new(Cursor::new(body.to_vec())),
        };

        Ok(HttpStream {
            status,
            content_length,
            total_length: Some(total),
            body: reader,
        })
    }
}

// ============================================================================
// Engine
// ============================================================================

struct ChannelEvents(mpsc::UnboundedReceiver<EngineEvent>);

#[async_trait]
impl EngineEventStream for ChannelEvents {
    async fn next(&mut self) -> Option<EngineEvent> {
        self.0.recv().await
    }
}

/// Records every transport call; events are injected by the test.
pub(crate) struct FakeEngine {
    calls: Mutex<Vec<String>>,
    items: Mutex<Vec<MediaItem>>,
    position_ms: AtomicU64,
    playing: AtomicBool,
    events_tx: mpsc::UnboundedSender<EngineEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<EngineEvent>>>,
    buffering: Mutex<Option<BufferTargets>>,
    has_byte_source: AtomicBool,
}

impl FakeEngine {
    pub(crate) fn new() -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            items: Mutex::new(Vec::new()),
            position_ms: AtomicU64::new(0),
            playing: AtomicBool::new(false),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            buffering: Mutex::new(None),
            has_byte_source: AtomicBool::new(false),
        })
    }

    pub(crate) fn emit(&self, event: EngineEvent) {
        let _ = self.events_tx.send(event);
    }

    pub(crate) fn set_position(&self, position_ms: u64) {
        self.position_ms.store(position_ms, Ordering::SeqCst);
    }

    pub(crate) fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub(crate) fn items(&self) -> Vec<MediaItem> {
        self.items.lock().clone()
    }

    pub(crate) fn buffering(&self) -> Option<BufferTargets> {
        *self.buffering.lock()
    }

    pub(crate) fn has_byte_source(&self) -> bool {
        self.has_byte_source.load(Ordering::SeqCst)
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl MediaEngine for FakeEngine {
    fn attach_byte_source(&self, _source: Arc<dyn MediaByteSource>) {
        self.has_byte_source.store(true, Ordering::SeqCst);
    }

    fn configure_buffering(&self, targets: BufferTargets) {
        *self.buffering.lock() = Some(targets);
    }

    fn events(&self) -> Box<dyn EngineEventStream> {
        match self.events_rx.lock().take() {
            Some(rx) => Box::new(ChannelEvents(rx)),
            None => {
                let (_tx, rx) = mpsc::unbounded_channel();
                Box::new(ChannelEvents(rx))
            }
        }
    }

    async fn set_media_items(&self, items: Vec<MediaItem>) -> Result<()> {
        self.record(format!("set_media_items:{}", items.len()));
        *self.items.lock() = items;
        Ok(())
    }

    async fn set_media_item(&self, item: MediaItem) -> Result<()> {
        self.record(format!("set_media_item:{}", item.media_id));
        *self.items.lock() = vec![item];
        Ok(())
    }

    async fn clear_media_items(&self) -> Result<()> {
        self.record("clear_media_items".to_string());
        self.items.lock().clear();
        Ok(())
    }

    async fn prepare(&self) -> Result<()> {
        self.record("prepare".to_string());
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.record("play".to_string());
        self.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.record("pause".to_string());
        self.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.record("stop".to_string());
        self.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn seek_to(&self, position_ms: u64) -> Result<()> {
        self.record(format!("seek_to:{}", position_ms));
        self.position_ms.store(position_ms, Ordering::SeqCst);
        Ok(())
    }

    async fn seek_to_item(&self, index: usize, position_ms: u64) -> Result<()> {
        self.record(format!("seek_to_item:{}:{}", index, position_ms));
        self.position_ms.store(position_ms, Ordering::SeqCst);
        Ok(())
    }

    async fn set_repeat_mode(&self, mode: EngineRepeatMode) -> Result<()> {
        self.record(format!("set_repeat_mode:{:?}", mode));
        Ok(())
    }

    async fn set_shuffle_enabled(&self, enabled: bool) -> Result<()> {
        self.record(format!("set_shuffle_enabled:{}", enabled));
        Ok(())
    }

    fn current_position_ms(&self) -> u64 {
        self.position_ms.load(Ordering::SeqCst)
    }

    fn duration_ms(&self) -> Option<u64> {
        Some(180_000)
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn state(&self) -> EngineState {
        EngineState::Ready
    }

    async fn release(&self) -> Result<()> {
        self.record("release".to_string());
        Ok(())
    }
}
