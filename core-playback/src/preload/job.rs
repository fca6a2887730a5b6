//! Prefetch job state.

use std::sync::atomic::{AtomicU64, Ordering};

use bridge_traits::playback::MediaItem;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::preload::policy::{Direction, PlannedJob, PreloadTier};

/// `Idle -> Fetching -> {Completed | Cancelled | Failed}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Fetching,
    Completed,
    Cancelled,
    Failed { message: String },
}

impl JobState {
    pub fn is_live(&self) -> bool {
        matches!(self, JobState::Idle | JobState::Fetching)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub track_id: String,
    pub index: usize,
    pub distance: usize,
    pub direction: Direction,
    pub tier: PreloadTier,
    pub state: JobState,
    pub bytes_cached: u64,
}

/// Scheduler state reported to command clients.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PreloadStatus {
    pub current_index: i64,
    /// Nearest first.
    pub jobs: Vec<JobSnapshot>,
}

impl PreloadStatus {
    pub fn job(&self, track_id: &str) -> Option<&JobSnapshot> {
        self.jobs.iter().find(|job| job.track_id == track_id)
    }

    pub fn live_jobs(&self) -> usize {
        self.jobs.iter().filter(|job| job.state.is_live()).count()
    }

    pub fn indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.jobs.iter().map(|job| job.index).collect();
        indices.sort_unstable();
        indices
    }
}

/// Shared between a job's task and the scheduler.
#[derive(Debug)]
pub(crate) struct JobProgress {
    state: Mutex<JobState>,
    bytes: AtomicU64,
}

impl JobProgress {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(JobState::Idle),
            bytes: AtomicU64::new(0),
        }
    }

    pub(crate) fn state(&self) -> JobState {
        self.state.lock().clone()
    }

    pub(crate) fn set_state(&self, state: JobState) {
        *self.state.lock() = state;
    }

    pub(crate) fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub(crate) fn set_bytes(&self, bytes: u64) {
        self.bytes.store(bytes, Ordering::Relaxed);
    }
}

pub(crate) struct JobHandle {
    pub(crate) item: MediaItem,
    pub(crate) plan: PlannedJob,
    pub(crate) progress: std::sync::Arc<JobProgress>,
    pub(crate) cancel: CancellationToken,
    pub(crate) task: Option<JoinHandle<()>>,
}

impl JobHandle {
    pub(crate) fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            track_id: self.item.media_id.clone(),
            index: self.plan.index,
            distance: self.plan.distance,
            direction: self.plan.direction,
            tier: self.plan.tier,
            state: self.progress.state(),
            bytes_cached: self.progress.bytes(),
        }
    }
}
