//! Process-wide wiring of the preload pipeline.

use std::sync::Arc;

use bridge_traits::playback::MediaEngine;
use bridge_traits::system::{MemoryPressure, SystemSignal, SystemSignalStream};
use core_playback::cache::{
    CacheBudgetPolicy, CacheStats, CacheTrimController, CachingDataSource, DataSourceConfig,
    DiskCache, DiskCacheConfig, TrimOutcome,
};
use core_playback::command::{command_channel, CommandClient, CommandReply, DEFAULT_COMMAND_CAPACITY};
use core_playback::{
    Album, CatalogRepository, PlaybackEngineAdapter, PlayerConfig, PrefetchScheduler,
    PreloadCommandHandler, PreloadConfig, Track,
};
use core_runtime::events::{CoreEvent, EventBus, EventStream};
use core_runtime::CoreConfig;
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{CoreError, Result};

/// Owns the cache, scheduler, player adapter and command server for the
/// lifetime of the playback process.
pub struct PlaybackService {
    config: CoreConfig,
    event_bus: Arc<EventBus>,
    cache: Arc<DiskCache>,
    scheduler: Arc<PrefetchScheduler>,
    player: Arc<PlaybackEngineAdapter>,
    trim: Arc<CacheTrimController>,
    catalog: Arc<dyn CatalogRepository>,
    commands: CommandClient,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl PlaybackService {
    /// Build every pipeline component from `config` and start the
    /// background tasks.
    ///
    /// The cache budget is recomputed from current free space on every
    /// start, so a device low on storage gets a smaller cache.
    #[instrument(skip_all, fields(cache_dir = %config.cache_dir.display()))]
    pub async fn start(
        config: CoreConfig,
        engine: Arc<dyn MediaEngine>,
        catalog: Arc<dyn CatalogRepository>,
    ) -> Result<Arc<Self>> {
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));

        let budget = CacheBudgetPolicy::from(config.cache_budget)
            .resolve(config.storage_telemetry.as_ref())
            .await;
        let cache = Arc::new(
            DiskCache::open(
                config.file_system.clone(),
                config.clock.clone(),
                &config.cache_dir,
                &DiskCacheConfig::new(budget),
                Some(event_bus.clone()),
            )
            .await?,
        );
        let source = Arc::new(CachingDataSource::new(
            config.http_client.clone(),
            cache.clone(),
            DataSourceConfig::from_core(&config),
        ));

        let mut scheduler =
            PrefetchScheduler::new(source.clone(), PreloadConfig::from_settings(&config.preload))
                .with_event_bus(event_bus.clone());
        if let Some(preparer) = &config.source_preparer {
            scheduler = scheduler.with_source_preparer(preparer.clone());
        }
        let scheduler = Arc::new(scheduler);

        let player = PlaybackEngineAdapter::new(
            engine,
            source,
            PlayerConfig::from_core(&config),
            Some(event_bus.clone()),
        );
        let trim = Arc::new(
            CacheTrimController::new(cache.clone(), config.storage_telemetry.clone())
                .with_threshold(config.low_storage_trim_threshold_bytes)
                .with_event_bus(event_bus.clone()),
        );

        let handler = PreloadCommandHandler::new(scheduler.clone(), player.clone());
        let (commands, server) = command_channel(handler, DEFAULT_COMMAND_CAPACITY);
        let shutdown = CancellationToken::new();

        let mut tasks = vec![
            tokio::spawn(server.run(shutdown.clone())),
            spawn_index_follower(player.subscribe_index(), commands.clone(), shutdown.clone()),
        ];
        if let Some(signals) = &config.system_signals {
            let stream = signals.subscribe().await?;
            tasks.push(spawn_signal_listener(
                stream,
                player.clone(),
                trim.clone(),
                shutdown.clone(),
            ));
        }

        info!(
            budget_bytes = budget,
            cached_entries = cache.entry_count(),
            "Playback service started"
        );

        Ok(Arc::new(Self {
            config,
            event_bus,
            cache,
            scheduler,
            player,
            trim,
            catalog,
            commands,
            shutdown,
            tasks: Mutex::new(tasks),
        }))
    }

    // ------------------------------------------------------------------------
    // Components
    // ------------------------------------------------------------------------

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn player(&self) -> &Arc<PlaybackEngineAdapter> {
        &self.player
    }

    pub fn scheduler(&self) -> &Arc<PrefetchScheduler> {
        &self.scheduler
    }

    pub fn cache(&self) -> &Arc<DiskCache> {
        &self.cache
    }

    /// Client for the command channel; hand clones to controllers.
    pub fn command_client(&self) -> CommandClient {
        self.commands.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_stream(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    // ------------------------------------------------------------------------
    // OS signals
    // ------------------------------------------------------------------------

    pub async fn on_trim_memory(&self, level: MemoryPressure) -> Result<TrimOutcome> {
        self.ensure_running()?;
        Ok(self.trim.on_memory_pressure(level).await?)
    }

    pub async fn on_audio_becoming_noisy(&self) -> Result<()> {
        self.ensure_running()?;
        Ok(self.player.on_audio_becoming_noisy().await?)
    }

    // ------------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------------

    pub async fn albums(&self, page: u32, limit: u32) -> Result<Vec<Album>> {
        Ok(self.catalog.get_albums(page, limit).await?)
    }

    pub async fn album(&self, album_id: &str) -> Result<Album> {
        Ok(self.catalog.get_album_by_id(album_id).await?)
    }

    pub async fn album_tracks(&self, album_id: &str) -> Result<Vec<Track>> {
        Ok(self.catalog.get_tracks_by_album_id(album_id).await?)
    }

    pub async fn track(&self, track_id: &str) -> Result<Track> {
        Ok(self.catalog.get_track_by_id(track_id).await?)
    }

    /// Load an album as the play-list and start at `start_track_id`, or at
    /// the first track when `None`.
    #[instrument(skip(self))]
    pub async fn play_album(&self, album_id: &str, start_track_id: Option<&str>) -> Result<()> {
        self.ensure_running()?;
        let tracks = self.catalog.get_tracks_by_album_id(album_id).await?;
        if tracks.is_empty() {
            return Err(CoreError::NotFound(format!("album {} has no tracks", album_id)));
        }

        let start = match start_track_id {
            Some(id) => tracks
                .iter()
                .position(|t| t.id == id)
                .ok_or_else(|| CoreError::NotFound(format!("track {} in album {}", id, album_id)))?,
            None => 0,
        };

        self.player.set_playlist(tracks).await?;
        self.player.play_at(start).await?;
        Ok(())
    }

    /// Fetch one track and play it, inside the current play-list when it is
    /// already there.
    pub async fn play_track(&self, track_id: &str) -> Result<()> {
        self.ensure_running()?;
        let track = self.catalog.get_track_by_id(track_id).await?;
        self.player.play(track).await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled()
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(CoreError::ShutDown)
        }
    }

    /// Stop background tasks, cancel all preload jobs, release the engine and
    /// persist cache access times. Calling it again is a no-op.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Ok(());
        }
        self.shutdown.cancel();

        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Service task ended abnormally");
            }
        }

        self.scheduler.release().await;
        self.player.release().await?;
        self.cache.flush().await?;
        info!("Playback service stopped");
        Ok(())
    }
}

impl Drop for PlaybackService {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Ask for a new preload window whenever the player's index moves.
fn spawn_index_follower(
    mut index: watch::Receiver<i64>,
    commands: CommandClient,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                changed = index.changed() => if changed.is_err() { break },
            }
            let current = *index.borrow_and_update();
            if current < 0 {
                continue;
            }

            match commands.preload_adjacent_tracks(current).await {
                Ok(CommandReply::Success) => {}
                Ok(reply) => debug!(?reply, index = current, "Preload request not applied"),
                Err(e) => {
                    debug!(error = %e, "Command channel closed, index follower stopping");
                    break;
                }
            }
        }
    })
}

fn spawn_signal_listener(
    mut stream: Box<dyn SystemSignalStream>,
    player: Arc<PlaybackEngineAdapter>,
    trim: Arc<CacheTrimController>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let signal = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                signal = stream.next() => signal,
            };
            let Some(signal) = signal else {
                debug!("System signal source closed");
                break;
            };

            match signal {
                SystemSignal::TrimMemory(level) => {
                    if let Err(e) = trim.on_memory_pressure(level).await {
                        warn!(error = %e, "Cache trim failed");
                    }
                }
                SystemSignal::AudioBecomingNoisy => {
                    if let Err(e) = player.on_audio_becoming_noisy().await {
                        warn!(error = %e, "Failed to pause on noisy audio");
                    }
                }
            }
        }
    })
}
