//! Shared fixtures for the pipeline integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_desktop::TokioFileSystem;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, HttpStream};
use bridge_traits::playback::{
    BufferTargets, EngineEvent, EngineEventStream, EngineRepeatMode, EngineState,
    MediaByteSource, MediaEngine, MediaItem,
};
use bridge_traits::time::SystemClock;
use bytes::Bytes;
use core_playback::cache::{CachingDataSource, DataSourceConfig, DiskCache, DiskCacheConfig};
use core_playback::{PrefetchScheduler, Track};
use parking_lot::Mutex;
use tokio::sync::mpsc;

pub const TRACK_LEN: usize = 8_000;
pub const PARTIAL_BYTES: u64 = 3_000;

pub fn track(i: usize) -> Track {
    Track {
        id: format!("t{}", i),
        title: format!("Track {}", i),
        artist: "Artist".to_string(),
        duration_ms: 200_000,
        stream_url: format!("https://media.example.com/tracks/{}.mp3", i),
        artwork_url: format!("https://media.example.com/art/{}.jpg", i),
        album_id: Some("album-1".to_string()),
    }
}

pub fn tracks(count: usize) -> Vec<Track> {
    (0..count).map(track).collect()
}

fn body_for(url: &str, len: usize) -> Bytes {
    let seed = url.len() as u8;
    Bytes::from(
        (0..len)
            .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
            .collect::<Vec<u8>>(),
    )
}

/// Range-honouring HTTP server over in-memory bodies.
#[derive(Default)]
pub struct StaticHttp {
    bodies: Mutex<HashMap<String, Bytes>>,
    hits: Mutex<HashMap<String, usize>>,
}

impl StaticHttp {
    pub fn with_tracks(tracks: &[Track]) -> Arc<Self> {
        let http = Self::default();
        for t in tracks {
            http.bodies
                .lock()
                .insert(t.stream_url.clone(), body_for(&t.stream_url, TRACK_LEN));
        }
        Arc::new(http)
    }

    pub fn body(&self, url: &str) -> Bytes {
        self.bodies.lock().get(url).cloned().unwrap_or_default()
    }

    pub fn hits(&self, url: &str) -> usize {
        self.hits.lock().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl HttpClient for StaticHttp {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        Err(BridgeError::NotAvailable(format!("execute {}", request.url)))
    }

    async fn download_stream(&self, request: HttpRequest) -> Result<HttpStream> {
        *self.hits.lock().entry(request.url.clone()).or_default() += 1;
        let body = self.bodies.lock().get(&request.url).cloned().ok_or_else(|| {
            BridgeError::Http {
                status: 404,
                message: request.url.clone(),
            }
        })?;

        let total = body.len() as u64;
        let (start, end) = match request.range {
            Some(range) => {
                let start = range.start.min(total);
                let end = range.length.map_or(total, |len| (start + len).min(total));
                (start, end)
            }
            None => (0, total),
        };
        let slice = body.slice(start as usize..end as usize);

        Ok(HttpStream {
            status: if request.range.is_some() { 206 } else { 200 },
            content_length: Some(slice.len() as u64),
            total_length: Some(total),
            body: Box::new(Cursor::new(slice.to_vec())),
        })
    }
}

struct QueuedEvents(mpsc::UnboundedReceiver<EngineEvent>);

#[async_trait]
impl EngineEventStream for QueuedEvents {
    async fn next(&mut self) -> Option<EngineEvent> {
        self.0.recv().await
    }
}

/// Engine double: records transport calls and lets the test push events.
pub struct TestEngine {
    calls: Mutex<Vec<String>>,
    position_ms: AtomicU64,
    playing: AtomicBool,
    source: Mutex<Option<Arc<dyn MediaByteSource>>>,
    events_tx: mpsc::UnboundedSender<EngineEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<EngineEvent>>>,
}

impl TestEngine {
    pub fn new() -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            position_ms: AtomicU64::new(0),
            playing: AtomicBool::new(false),
            source: Mutex::new(None),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        })
    }

    pub fn push(&self, event: EngineEvent) {
        let _ = self.events_tx.send(event);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// The byte source the adapter attached.
    pub fn source(&self) -> Option<Arc<dyn MediaByteSource>> {
        self.source.lock().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }
}

#[async_trait]
impl MediaEngine for TestEngine {
    fn attach_byte_source(&self, source: Arc<dyn MediaByteSource>) {
        *self.source.lock() = Some(source);
    }

    fn configure_buffering(&self, _targets: BufferTargets) {}

    fn events(&self) -> Box<dyn EngineEventStream> {
        let rx = self
            .events_rx
            .lock()
            .take()
            .unwrap_or_else(|| mpsc::unbounded_channel().1);
        Box::new(QueuedEvents(rx))
    }

    async fn set_media_items(&self, items: Vec<MediaItem>) -> Result<()> {
        self.record(format!("set_media_items:{}", items.len()));
        Ok(())
    }

    async fn set_media_item(&self, item: MediaItem) -> Result<()> {
        self.record(format!("set_media_item:{}", item.media_id));
        Ok(())
    }

    async fn clear_media_items(&self) -> Result<()> {
        self.record("clear_media_items");
        Ok(())
    }

    async fn prepare(&self) -> Result<()> {
        self.record("prepare");
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.record("play");
        self.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.record("pause");
        self.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.record("stop");
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
        Some(200_000)
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn state(&self) -> EngineState {
        EngineState::Ready
    }

    async fn release(&self) -> Result<()> {
        self.record("release");
        Ok(())
    }
}

/// Open a disk cache rooted in `dir` on the real file system.
pub async fn open_cache(dir: &Path, budget: u64) -> Arc<DiskCache> {
    let fs = Arc::new(TokioFileSystem::with_cache_directory(dir.to_path_buf()));
    let cache = DiskCache::open(
        fs,
        Arc::new(SystemClock),
        dir,
        &DiskCacheConfig::new(budget),
        None,
    )
    .await
    .expect("open cache");
    Arc::new(cache)
}

pub fn data_source(http: Arc<StaticHttp>, cache: Arc<DiskCache>) -> Arc<CachingDataSource> {
    Arc::new(CachingDataSource::new(
        http,
        cache,
        DataSourceConfig::default().with_chunk_size(1_024),
    ))
}

/// Wait until no preload job is idle or fetching.
pub async fn settle(scheduler: &PrefetchScheduler) {
    for _ in 0..2_000 {
        if scheduler.status().live_jobs() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("preload jobs did not settle: {:?}", scheduler.status());
}
