//! # Playback Configuration

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables of validation, failover and the playback session.
///
/// Every field has a serde default, so hosts may ship a partial document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// How long a probe may take before the candidate counts as invalid.
    ///
    /// Default: 5000 ms.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: Duration,

    /// Delay between a fatal failure and the automatic skip.
    ///
    /// Default: 500 ms.
    #[serde(default = "default_auto_skip_delay")]
    pub auto_skip_delay: Duration,

    /// Skips allowed in one failure burst before auto-skip halts.
    ///
    /// Default: 5.
    #[serde(default = "default_max_auto_skip_attempts")]
    pub max_auto_skip_attempts: u32,

    /// Output fade-in when playback becomes ready behind the tuning effect.
    ///
    /// Default: 300 ms.
    #[serde(default = "default_fade_in_duration")]
    pub fade_in_duration: Duration,

    /// Default: 20.
    #[serde(default = "default_fade_in_steps")]
    pub fade_in_steps: u32,

    /// Target output volume in `0.0..=1.0`.
    ///
    /// Default: 0.7.
    #[serde(default = "default_volume")]
    pub default_volume: f32,

    /// Wait between the initial selection on a new candidate set and autoplay.
    ///
    /// Default: 500 ms.
    #[serde(default = "default_initial_selection_delay")]
    pub initial_selection_delay: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            probe_timeout: default_probe_timeout(),
            auto_skip_delay: default_auto_skip_delay(),
            max_auto_skip_attempts: default_max_auto_skip_attempts(),
            fade_in_duration: default_fade_in_duration(),
            fade_in_steps: default_fade_in_steps(),
            default_volume: default_volume(),
            initial_selection_delay: default_initial_selection_delay(),
        }
    }
}

impl PlaybackConfig {
    pub fn validate(&self) -> Result<()> {
        if self.probe_timeout.is_zero() {
            return Err(PlaybackError::Config(
                "probe_timeout must be greater than 0".to_string(),
            ));
        }

        if self.max_auto_skip_attempts == 0 {
            return Err(PlaybackError::Config(
                "max_auto_skip_attempts must be greater than 0".to_string(),
            ));
        }

        if self.fade_in_steps == 0 {
            return Err(PlaybackError::Config(
                "fade_in_steps must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.default_volume) {
            return Err(PlaybackError::InvalidVolume(self.default_volume));
        }

        Ok(())
    }

    /// Interval between two fade-in steps.
    pub fn fade_in_step(&self) -> Duration {
        self.fade_in_duration / self.fade_in_steps.max(1)
    }
}

fn default_probe_timeout() -> Duration {
    Duration::from_millis(5000)
}

fn default_auto_skip_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_auto_skip_attempts() -> u32 {
    5
}

fn default_fade_in_duration() -> Duration {
    Duration::from_millis(300)
}

fn default_fade_in_steps() -> u32 {
    20
}

fn default_volume() -> f32 {
    0.7
}

fn default_initial_selection_delay() -> Duration {
    Duration::from_millis(500)
}
