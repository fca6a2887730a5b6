//! Distance-tiered preload policy.
//!
//! | distance | work                                     |
//! |----------|------------------------------------------|
//! | 1        | fetch a prefix (or the whole next track) |
//! | 2        | prepare the source and select tracks     |
//! | 3..=4    | prepare the source only                  |
//! | >= 5     | nothing; existing jobs are cancelled     |

use bridge_traits::playback::PrepareStage;
use serde::{Deserialize, Serialize};

use crate::preload::config::PreloadConfig;

/// Farthest neighbour that still gets a job.
pub const MAX_PRELOAD_DISTANCE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Next,
    Previous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "tier", rename_all = "snake_case")]
pub enum PreloadTier {
    /// Cache the first `bytes` of the resource.
    Partial { bytes: u64 },
    /// Cache the whole resource.
    Full,
    TracksSelected,
    SourcePrepared,
}

impl PreloadTier {
    pub fn name(&self) -> &'static str {
        match self {
            PreloadTier::Partial { .. } => "partial",
            PreloadTier::Full => "full",
            PreloadTier::TracksSelected => "tracks_selected",
            PreloadTier::SourcePrepared => "source_prepared",
        }
    }

    /// `true` for tiers that download bytes into the cache.
    pub fn fetches_bytes(&self) -> bool {
        matches!(self, PreloadTier::Partial { .. } | PreloadTier::Full)
    }

    pub fn prepare_stage(&self) -> Option<PrepareStage> {
        match self {
            PreloadTier::TracksSelected => Some(PrepareStage::TracksSelected),
            PreloadTier::SourcePrepared => Some(PrepareStage::SourcePrepared),
            _ => None,
        }
    }
}

/// Tier for a neighbour at `distance` in `direction`, or `None` if it is
/// outside the window.
pub fn tier_for(distance: usize, direction: Direction, config: &PreloadConfig) -> Option<PreloadTier> {
    match distance {
        1 if direction == Direction::Next && config.full_next_track => Some(PreloadTier::Full),
        1 => Some(PreloadTier::Partial {
            bytes: config.partial_bytes,
        }),
        2 => Some(PreloadTier::TracksSelected),
        3..=MAX_PRELOAD_DISTANCE => Some(PreloadTier::SourcePrepared),
        _ => None,
    }
}

/// One neighbour the scheduler should have a job for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedJob {
    pub index: usize,
    pub distance: usize,
    pub direction: Direction,
    pub tier: PreloadTier,
}

/// Jobs for the neighbours of `current` in a list of `len` items, nearest
/// first and the next track before the previous one. The current index
/// itself never gets a job.
pub fn plan_window(len: usize, current: usize, config: &PreloadConfig) -> Vec<PlannedJob> {
    let mut plan = Vec::new();
    if current >= len {
        return plan;
    }

    for distance in 1..=MAX_PRELOAD_DISTANCE {
        let neighbours = [
            (current.checked_add(distance).filter(|i| *i < len), Direction::Next),
            (current.checked_sub(distance), Direction::Previous),
        ];
        for (index, direction) in neighbours {
            let (Some(index), Some(tier)) = (index, tier_for(distance, direction, config)) else {
                continue;
            };
            plan.push(PlannedJob {
                index,
                distance,
                direction,
                tier,
            });
        }
    }
    plan
}
