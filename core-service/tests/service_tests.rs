use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_desktop::TokioFileSystem;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, HttpStream};
use bridge_traits::playback::{
    BufferTargets, EngineEvent, EngineEventStream, EngineRepeatMode, EngineState,
    MediaByteSource, MediaEngine, MediaItem,
};
use bridge_traits::storage::StorageTelemetry;
use bridge_traits::system::{MemoryPressure, SystemSignal, SystemSignalSource, SystemSignalStream};
use core_playback::{
    compute_budget, Album, CatalogError, CatalogRepository, CatalogResult, CommandReply,
    PlaybackError, Track, TrimOutcome,
};
use core_service::{CoreConfig, CoreError, PlaybackService};
use mockall::mock;
use parking_lot::Mutex;
use tokio::sync::mpsc;

const GIB: u64 = 1024 * 1024 * 1024;

mock! {
    Telemetry {}

    #[async_trait]
    impl StorageTelemetry for Telemetry {
        async fn available_bytes(&self) -> BridgeResult<u64>;
    }
}

fn telemetry(free: u64) -> Arc<MockTelemetry> {
    let mut mock = MockTelemetry::new();
    mock.expect_available_bytes().returning(move || Ok(free));
    Arc::new(mock)
}

fn album_tracks() -> Vec<Track> {
    (0..6)
        .map(|i| Track {
            id: format!("t{}", i),
            title: format!("Song {}", i),
            artist: "Band".to_string(),
            duration_ms: 240_000,
            stream_url: format!("https://media.example.com/a1/{}.mp3", i),
            artwork_url: "https://media.example.com/a1/cover.jpg".to_string(),
            album_id: Some("album-1".to_string()),
        })
        .collect()
}

struct FixedCatalog {
    tracks: Vec<Track>,
}

#[async_trait]
impl CatalogRepository for FixedCatalog {
    async fn get_albums(&self, _page: u32, _limit: u32) -> CatalogResult<Vec<Album>> {
        Ok(vec![])
    }

    async fn get_album_by_id(&self, album_id: &str) -> CatalogResult<Album> {
        Err(CatalogError::NotFound(album_id.to_string()))
    }

    async fn get_tracks_by_album_id(&self, album_id: &str) -> CatalogResult<Vec<Track>> {
        match album_id {
            "album-1" => Ok(self.tracks.clone()),
            "offline" => Err(CatalogError::Network("connection refused".to_string())),
            _ => Ok(vec![]),
        }
    }

    async fn get_track_by_id(&self, track_id: &str) -> CatalogResult<Track> {
        self.tracks
            .iter()
            .find(|t| t.id == track_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(track_id.to_string()))
    }
}

struct ZeroHttp;

#[async_trait]
impl HttpClient for ZeroHttp {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        Err(BridgeError::NotAvailable(request.url))
    }

    async fn download_stream(&self, request: HttpRequest) -> BridgeResult<HttpStream> {
        let total = 50_000u64;
        let (start, len) = match request.range {
            Some(range) => {
                let start = range.start.min(total);
                (start, range.length.unwrap_or(total - start).min(total - start))
            }
            None => (0, total),
        };
        Ok(HttpStream {
            status: 206,
            content_length: Some(len),
            total_length: Some(total),
            body: Box::new(Cursor::new(vec![0u8; len as usize])),
        })
    }
}

struct Events(mpsc::UnboundedReceiver<EngineEvent>);

#[async_trait]
impl EngineEventStream for Events {
    async fn next(&mut self) -> Option<EngineEvent> {
        self.0.recv().await
    }
}

struct LoggingEngine {
    calls: Mutex<Vec<String>>,
    playing: AtomicBool,
    events: Mutex<Option<mpsc::UnboundedReceiver<EngineEvent>>>,
    _events_tx: mpsc::UnboundedSender<EngineEvent>,
}

impl LoggingEngine {
    fn new() -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            playing: AtomicBool::new(false),
            events: Mutex::new(Some(rx)),
            _events_tx: tx,
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn log(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }
}

#[async_trait]
impl MediaEngine for LoggingEngine {
    fn attach_byte_source(&self, _source: Arc<dyn MediaByteSource>) {}
    fn configure_buffering(&self, _targets: BufferTargets) {}

    fn events(&self) -> Box<dyn EngineEventStream> {
        let rx = self
            .events
            .lock()
            .take()
            .unwrap_or_else(|| mpsc::unbounded_channel().1);
        Box::new(Events(rx))
    }

    async fn set_media_items(&self, items: Vec<MediaItem>) -> BridgeResult<()> {
        self.log(format!("set_media_items:{}", items.len()));
        Ok(())
    }
    async fn set_media_item(&self, item: MediaItem) -> BridgeResult<()> {
        self.log(format!("set_media_item:{}", item.media_id));
        Ok(())
    }
    async fn clear_media_items(&self) -> BridgeResult<()> {
        self.log("clear_media_items");
        Ok(())
    }
    async fn prepare(&self) -> BridgeResult<()> {
        self.log("prepare");
        Ok(())
    }
    async fn play(&self) -> BridgeResult<()> {
        self.log("play");
        self.playing.store(true, Ordering::SeqCst);
        Ok(())
    }
    async fn pause(&self) -> BridgeResult<()> {
        self.log("pause");
        self.playing.store(false, Ordering::SeqCst);
        Ok(())
    }
    async fn stop(&self) -> BridgeResult<()> {
        self.log("stop");
        Ok(())
    }
    async fn seek_to(&self, position_ms: u64) -> BridgeResult<()> {
        self.log(format!("seek_to:{}", position_ms));
        Ok(())
    }
    async fn seek_to_item(&self, index: usize, position_ms: u64) -> BridgeResult<()> {
        self.log(format!("seek_to_item:{}:{}", index, position_ms));
        Ok(())
    }
    async fn set_repeat_mode(&self, _mode: EngineRepeatMode) -> BridgeResult<()> {
        Ok(())
    }
    async fn set_shuffle_enabled(&self, _enabled: bool) -> BridgeResult<()> {
        Ok(())
    }
    fn current_position_ms(&self) -> u64 {
        0
    }
    fn duration_ms(&self) -> Option<u64> {
        None
    }
    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }
    fn state(&self) -> EngineState {
        EngineState::Ready
    }
    async fn release(&self) -> BridgeResult<()> {
        self.log("release");
        Ok(())
    }
}

struct SignalStream(mpsc::UnboundedReceiver<SystemSignal>);

#[async_trait]
impl SystemSignalStream for SignalStream {
    async fn next(&mut self) -> Option<SystemSignal> {
        self.0.recv().await
    }
}

struct Signals(Mutex<Option<mpsc::UnboundedReceiver<SystemSignal>>>);

#[async_trait]
impl SystemSignalSource for Signals {
    async fn subscribe(&self) -> BridgeResult<Box<dyn SystemSignalStream>> {
        let rx = self
            .0
            .lock()
            .take()
            .ok_or_else(|| BridgeError::OperationFailed("already subscribed".to_string()))?;
        Ok(Box::new(SignalStream(rx)))
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    service: Arc<PlaybackService>,
    engine: Arc<LoggingEngine>,
    signals: mpsc::UnboundedSender<SystemSignal>,
}

async fn start(free_bytes: u64) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let (signals, rx) = mpsc::unbounded_channel();
    let config = CoreConfig::builder()
        .cache_dir(dir.path())
        .http_client(Arc::new(ZeroHttp))
        .file_system(Arc::new(TokioFileSystem::with_cache_directory(
            dir.path().to_path_buf(),
        )))
        .storage_telemetry(telemetry(free_bytes))
        .system_signals(Arc::new(Signals(Mutex::new(Some(rx)))))
        .build()
        .unwrap();

    let engine = LoggingEngine::new();
    let catalog = Arc::new(FixedCatalog {
        tracks: album_tracks(),
    });
    let service = PlaybackService::start(config, engine.clone(), catalog)
        .await
        .unwrap();

    Harness {
        _dir: dir,
        service,
        engine,
        signals,
    }
}

async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..2_000 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn test_budget_follows_free_space() {
    let h = start(10 * GIB).await;
    assert_eq!(h.service.cache().budget_bytes(), compute_budget(10 * GIB));
    h.service.shutdown().await.unwrap();

    let low = start(GIB).await;
    assert_eq!(low.service.cache().budget_bytes(), 50 * 1024 * 1024);
    low.service.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_play_album_starts_at_selected_track_and_preloads() {
    let h = start(10 * GIB).await;
    h.service.play_album("album-1", Some("t3")).await.unwrap();

    assert_eq!(h.service.player().current_index(), 3);
    assert!(h.engine.calls().contains(&"seek_to_item:3:0".to_string()));

    let scheduler = h.service.scheduler().clone();
    eventually(|| scheduler.current_index() == 3).await;
    assert_eq!(scheduler.status().indices(), vec![0, 1, 2, 4, 5]);

    let reply = h.service.command_client().play_preloaded("t4").await.unwrap();
    assert_eq!(reply, CommandReply::Success);
    assert_eq!(h.service.player().current_index(), 4);
    eventually(|| scheduler.current_index() == 4).await;
    assert_eq!(scheduler.status().indices(), vec![0, 1, 2, 3, 5]);
    h.service.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_catalog_and_lookup_failures() {
    let h = start(10 * GIB).await;

    let missing = h.service.play_album("album-1", Some("t99")).await.unwrap_err();
    assert!(matches!(missing, CoreError::NotFound(_)));

    let empty = h.service.play_album("album-2", None).await.unwrap_err();
    assert!(matches!(empty, CoreError::NotFound(_)));

    let offline = h.service.album_tracks("offline").await.unwrap_err();
    assert_eq!(offline.to_string(), "Network error: connection refused");

    assert_eq!(h.service.track("t2").await.unwrap().title, "Song 2");
    h.service.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_system_signals_drive_pause_and_trim() {
    let h = start(512 * 1024 * 1024).await;
    h.service.play_track("t1").await.unwrap();
    assert!(h.engine.is_playing());

    h.signals.send(SystemSignal::AudioBecomingNoisy).unwrap();
    let engine = h.engine.clone();
    eventually(|| !engine.is_playing()).await;
    assert_eq!(h.engine.calls().last().unwrap(), "pause");

    let outcome = h.service.on_trim_memory(MemoryPressure::Critical).await.unwrap();
    assert!(matches!(
        outcome,
        TrimOutcome::Skipped { .. } | TrimOutcome::Trimmed { .. }
    ));
    h.service.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_is_idempotent_and_final() {
    let h = start(10 * GIB).await;
    let client = h.service.command_client();

    h.service.shutdown().await.unwrap();
    h.service.shutdown().await.unwrap();

    assert!(!h.service.is_running());
    assert_eq!(
        h.engine.calls().iter().filter(|c| *c == "release").count(),
        1
    );
    assert!(matches!(
        client.reset_preload().await.unwrap_err(),
        PlaybackError::ChannelClosed
    ));
    assert!(matches!(
        h.service.on_trim_memory(MemoryPressure::Low).await.unwrap_err(),
        CoreError::ShutDown
    ));
}
