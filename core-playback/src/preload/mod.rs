//! # Adjacent-Track Preloading
//!
//! Warms the neighbours of the current play-list index so skipping forward
//! or back starts from disk instead of the network.
//!
//! - [`policy`] maps a neighbour's distance to the work done for it
//! - [`scheduler`] owns the jobs and re-plans them on every index change
//! - [`job`] holds job state and the status snapshot served to clients

pub mod config;
pub mod job;
pub mod policy;
pub mod scheduler;

pub use config::PreloadConfig;
pub use job::{JobSnapshot, JobState, PreloadStatus};
pub use policy::{plan_window, tier_for, Direction, PlannedJob, PreloadTier, MAX_PRELOAD_DISTANCE};
pub use scheduler::PrefetchScheduler;
