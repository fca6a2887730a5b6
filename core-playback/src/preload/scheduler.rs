//! # Prefetch Scheduler
//!
//! Keeps one job per neighbour of the current play-list index, tiered by
//! distance. On every index change the jobs that fell out of the window, or
//! whose tier changed, are cancelled and awaited before the jobs of the new
//! window start. Jobs that already exist for a track are left alone, and a
//! job that completed or failed is not retried while its track stays in the
//! window.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use bridge_traits::playback::{MediaItem, SourcePreparer};
use core_runtime::events::{CoreEvent, EventBus, PreloadEvent};
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::cache::data_source::CachingDataSource;
use crate::error::{PlaybackError, Result};
use crate::models::INDEX_UNSET;
use crate::preload::config::PreloadConfig;
use crate::preload::job::{JobHandle, JobProgress, JobState, PreloadStatus};
use crate::preload::policy::{plan_window, PlannedJob, PreloadTier};

pub struct PrefetchScheduler {
    source: Arc<CachingDataSource>,
    preparer: Option<Arc<dyn SourcePreparer>>,
    config: PreloadConfig,
    event_bus: Option<Arc<EventBus>>,
    jobs: Mutex<HashMap<String, JobHandle>>,
    current_index: AtomicI64,
    /// Serializes window changes, cancellations and resets.
    schedule_lock: tokio::sync::Mutex<()>,
    fetch_permits: Arc<Semaphore>,
    released: AtomicBool,
}

impl PrefetchScheduler {
    pub fn new(source: Arc<CachingDataSource>, config: PreloadConfig) -> Self {
        let permits = config.max_concurrent_fetches.max(1);
        Self {
            source,
            preparer: None,
            config,
            event_bus: None,
            jobs: Mutex::new(HashMap::new()),
            current_index: AtomicI64::new(INDEX_UNSET),
            schedule_lock: tokio::sync::Mutex::new(()),
            fetch_permits: Arc::new(Semaphore::new(permits)),
            released: AtomicBool::new(false),
        }
    }

    pub fn with_source_preparer(mut self, preparer: Arc<dyn SourcePreparer>) -> Self {
        self.preparer = Some(preparer);
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn config(&self) -> &PreloadConfig {
        &self.config
    }

    pub fn current_index(&self) -> i64 {
        self.current_index.load(Ordering::SeqCst)
    }

    fn emit(&self, event: PreloadEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Preload(event));
        }
    }

    /// Re-plan the window around `index`.
    ///
    /// An empty list, a negative index or one past the end is ignored.
    #[instrument(skip(self, items), fields(len = items.len()))]
    pub async fn on_index_changed(&self, items: &[MediaItem], index: i64) -> Result<()> {
        if self.released.load(Ordering::SeqCst) {
            return Err(PlaybackError::Released);
        }
        if items.is_empty() || index < 0 || index as usize >= items.len() {
            debug!("Ignoring preload request outside the play-list");
            return Ok(());
        }
        let current = index as usize;

        let _guard = self.schedule_lock.lock().await;
        self.current_index.store(index, Ordering::SeqCst);

        // Nearest occurrence wins when a track appears more than once.
        let current_id = items[current].media_id.as_str();
        let mut wanted: Vec<PlannedJob> = Vec::new();
        for planned in plan_window(items.len(), current, &self.config) {
            let id = items[planned.index].media_id.as_str();
            if id != current_id && !wanted.iter().any(|p| items[p.index].media_id == id) {
                wanted.push(planned);
            }
        }
        let wanted_by_id: HashMap<&str, PlannedJob> = wanted
            .iter()
            .map(|p| (items[p.index].media_id.as_str(), *p))
            .collect();

        let stale: Vec<JobHandle> = {
            let mut jobs = self.jobs.lock();
            let stale_ids: Vec<String> = jobs
                .iter()
                .filter(|(id, job)| match wanted_by_id.get(id.as_str()) {
                    Some(planned) => planned.tier != job.plan.tier,
                    None => true,
                })
                .map(|(id, _)| id.clone())
                .collect();
            let stale = stale_ids.iter().filter_map(|id| jobs.remove(id)).collect();
            for (id, job) in jobs.iter_mut() {
                if let Some(planned) = wanted_by_id.get(id.as_str()) {
                    job.plan = *planned;
                }
            }
            stale
        };

        for job in stale {
            self.stop_job(job).await;
        }

        let mut jobs = self.jobs.lock();
        for planned in wanted {
            let item = &items[planned.index];
            if jobs.contains_key(&item.media_id) {
                continue;
            }
            let job = self.spawn_job(item.clone(), planned);
            debug!(
                track_id = %item.media_id,
                index = planned.index,
                distance = planned.distance,
                tier = planned.tier.name(),
                "Preload scheduled"
            );
            self.emit(PreloadEvent::Scheduled {
                track_id: item.media_id.clone(),
                index: planned.index,
                distance: planned.distance,
                tier: planned.tier.name().to_string(),
            });
            jobs.insert(item.media_id.clone(), job);
        }
        Ok(())
    }

    fn spawn_job(&self, item: MediaItem, plan: PlannedJob) -> JobHandle {
        let progress = Arc::new(JobProgress::new());
        let cancel = CancellationToken::new();
        let worker = JobWorker {
            source: self.source.clone(),
            preparer: self.preparer.clone(),
            permits: self.fetch_permits.clone(),
            event_bus: self.event_bus.clone(),
            item: item.clone(),
            tier: plan.tier,
            cancel: cancel.clone(),
            progress: progress.clone(),
        };
        let task = tokio::spawn(worker.run());

        JobHandle {
            item,
            plan,
            progress,
            cancel,
            task: Some(task),
        }
    }

    async fn stop_job(&self, mut job: JobHandle) {
        job.cancel.cancel();
        if let Some(task) = job.task.take() {
            if let Err(e) = task.await {
                warn!(track_id = %job.item.media_id, error = %e, "Preload task ended abnormally");
            }
        }
    }

    /// Cancel the job for `track_id`. Returns `false` if there was none.
    pub async fn cancel_preload(&self, track_id: &str) -> bool {
        let _guard = self.schedule_lock.lock().await;
        let job = self.jobs.lock().remove(track_id);
        match job {
            Some(job) => {
                self.stop_job(job).await;
                true
            }
            None => false,
        }
    }

    /// Cancel every job and wait for them to stop.
    pub async fn cancel_all(&self) {
        let _guard = self.schedule_lock.lock().await;
        self.cancel_all_locked().await;
    }

    async fn cancel_all_locked(&self) {
        let jobs: Vec<JobHandle> = self.jobs.lock().drain().map(|(_, job)| job).collect();
        for job in jobs {
            self.stop_job(job).await;
        }
    }

    /// Drop all jobs and forget the current index.
    #[instrument(skip(self))]
    pub async fn reset(&self) {
        let _guard = self.schedule_lock.lock().await;
        self.cancel_all_locked().await;
        self.current_index.store(INDEX_UNSET, Ordering::SeqCst);
        info!("Preload state reset");
        self.emit(PreloadEvent::Reset);
    }

    /// Reset and refuse further scheduling.
    pub async fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
        self.reset().await;
        self.fetch_permits.close();
    }

    pub fn status(&self) -> PreloadStatus {
        let mut jobs: Vec<_> = self.jobs.lock().values().map(JobHandle::snapshot).collect();
        jobs.sort_by_key(|job| (job.distance, job.direction, job.index));
        PreloadStatus {
            current_index: self.current_index(),
            jobs,
        }
    }

    pub fn job_state(&self, track_id: &str) -> Option<JobState> {
        self.jobs.lock().get(track_id).map(|job| job.progress.state())
    }
}

impl Drop for PrefetchScheduler {
    fn drop(&mut self) {
        for job in self.jobs.get_mut().values() {
            job.cancel.cancel();
        }
    }
}

/// Everything one job's task needs; owned by the task.
struct JobWorker {
    source: Arc<CachingDataSource>,
    preparer: Option<Arc<dyn SourcePreparer>>,
    permits: Arc<Semaphore>,
    event_bus: Option<Arc<EventBus>>,
    item: MediaItem,
    tier: PreloadTier,
    cancel: CancellationToken,
    progress: Arc<JobProgress>,
}

impl JobWorker {
    async fn run(self) {
        let track_id = self.item.media_id.clone();
        let event = match self.execute().await {
            Ok(bytes) => {
                self.progress.set_state(JobState::Completed);
                info!(track_id = %track_id, bytes, tier = self.tier.name(), "Preload completed");
                PreloadEvent::Completed { track_id, bytes }
            }
            Err(PlaybackError::Cancelled) => {
                self.progress.set_state(JobState::Cancelled);
                debug!(track_id = %track_id, tier = self.tier.name(), "Preload cancelled");
                if let (Some(preparer), Some(_)) = (&self.preparer, self.tier.prepare_stage()) {
                    if let Err(e) = preparer.discard(&self.item).await {
                        debug!(track_id = %track_id, error = %e, "Discarding prepared source failed");
                    }
                }
                PreloadEvent::Cancelled { track_id }
            }
            Err(e) => {
                let message = e.to_string();
                self.progress.set_state(JobState::Failed {
                    message: message.clone(),
                });
                warn!(track_id = %track_id, error = %message, "Preload failed");
                PreloadEvent::Failed { track_id, message }
            }
        };

        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Preload(event));
        }
    }

    async fn execute(&self) -> Result<u64> {
        if self.cancel.is_cancelled() {
            return Err(PlaybackError::Cancelled);
        }

        match self.tier {
            PreloadTier::Partial { .. } | PreloadTier::Full => {
                let _permit = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(PlaybackError::Cancelled),
                    permit = self.permits.acquire() => permit.map_err(|_| PlaybackError::Released)?,
                };
                self.progress.set_state(JobState::Fetching);

                let length = match self.tier {
                    PreloadTier::Partial { bytes } => Some(bytes),
                    _ => None,
                };
                let progress = self.progress.clone();
                self.source
                    .cache_range(&self.item.uri, 0, length, &self.cancel, move |bytes| {
                        progress.set_bytes(bytes)
                    })
                    .await
            }
            PreloadTier::TracksSelected | PreloadTier::SourcePrepared => {
                self.progress.set_state(JobState::Fetching);
                let (Some(preparer), Some(stage)) = (&self.preparer, self.tier.prepare_stage()) else {
                    return Ok(0);
                };
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Err(PlaybackError::Cancelled),
                    prepared = preparer.prepare(&self.item, stage) => prepared.map(|_| 0).map_err(PlaybackError::from),
                }
            }
        }
    }
}
