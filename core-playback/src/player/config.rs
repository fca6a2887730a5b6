//! Player configuration

use std::time::Duration;

use bridge_traits::playback::BufferTargets;
use core_runtime::config::{CoreConfig, DEFAULT_POSITION_POLL_INTERVAL};

/// Position at or below which "previous" goes to the previous track instead
/// of restarting the current one.
pub const PREVIOUS_TRACK_THRESHOLD_MS: u64 = 5_000;

/// Engine buffer targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferingConfig {
    /// Minimum buffered media (default: 30s)
    pub min_buffer: Duration,

    /// Maximum buffered media (default: 120s)
    pub max_buffer: Duration,

    /// Buffered media needed to start playback (default: 1.5s)
    pub buffer_for_playback: Duration,

    /// Buffered media needed to resume after a stall (default: 3s)
    pub buffer_for_playback_after_rebuffer: Duration,

    /// Media kept behind the play head (default: 30s)
    pub back_buffer: Duration,

    /// Keep the back buffer across seeks (default: true)
    pub retain_back_buffer_from_keyframe: bool,
}

impl Default for BufferingConfig {
    fn default() -> Self {
        Self {
            min_buffer: Duration::from_secs(30),
            max_buffer: Duration::from_secs(120),
            buffer_for_playback: Duration::from_millis(1_500),
            buffer_for_playback_after_rebuffer: Duration::from_secs(3),
            back_buffer: Duration::from_secs(30),
            retain_back_buffer_from_keyframe: true,
        }
    }
}

impl BufferingConfig {
    pub fn to_targets(&self) -> BufferTargets {
        BufferTargets {
            min_buffer: self.min_buffer,
            max_buffer: self.max_buffer,
            buffer_for_playback: self.buffer_for_playback,
            buffer_for_playback_after_rebuffer: self.buffer_for_playback_after_rebuffer,
            back_buffer: self.back_buffer,
            retain_back_buffer_from_keyframe: self.retain_back_buffer_from_keyframe,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.min_buffer > self.max_buffer {
            return Err("min_buffer cannot exceed max_buffer".to_string());
        }

        if self.buffer_for_playback > self.min_buffer
            || self.buffer_for_playback_after_rebuffer > self.min_buffer
        {
            return Err("playback start thresholds cannot exceed min_buffer".to_string());
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerConfig {
    pub buffering: BufferingConfig,

    /// How often the position is sampled while playing (default: 100ms)
    pub position_poll_interval: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            buffering: BufferingConfig::default(),
            position_poll_interval: DEFAULT_POSITION_POLL_INTERVAL,
        }
    }
}

impl PlayerConfig {
    pub fn from_core(config: &CoreConfig) -> Self {
        Self {
            position_poll_interval: config.position_poll_interval,
            ..Self::default()
        }
    }

    pub fn with_buffering(mut self, buffering: BufferingConfig) -> Self {
        self.buffering = buffering;
        self
    }

    pub fn with_position_poll_interval(mut self, interval: Duration) -> Self {
        self.position_poll_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        self.buffering.validate()?;

        if self.position_poll_interval.is_zero() {
            return Err("position_poll_interval must be greater than 0".to_string());
        }

        Ok(())
    }
}
