//! # Tuning Effect Configuration

use crate::error::{Result, TuningError};
use crate::preset::PresetChoice;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables of the tuning effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningConfig {
    /// Overall effect volume in `0.0..=1.0`; preset stage volumes are relative to it.
    ///
    /// Default: 0.4.
    #[serde(default = "default_volume")]
    pub volume: f32,

    /// Default: random preset on every start.
    #[serde(default)]
    pub preset: PresetChoice,

    /// Default fade-out used when stopping after playback becomes ready.
    ///
    /// Default: 300 ms.
    #[serde(default = "default_fade_out")]
    pub fade_out: Duration,

    /// Extra wait after the fade before the graph is disposed.
    ///
    /// Default: 100 ms.
    #[serde(default = "default_dispose_margin")]
    pub dispose_margin: Duration,

    /// Number of sweep cycles scheduled ahead at start.
    ///
    /// Default: 100.
    #[serde(default = "default_sweep_cycles")]
    pub sweep_cycles: u32,

    /// Default: 2.0 s.
    #[serde(default = "default_noise_loop_secs")]
    pub noise_loop_secs: f32,

    /// Default: 1.5 s.
    #[serde(default = "default_crackle_loop_secs")]
    pub crackle_loop_secs: f32,

    /// Crackle low-pass resonance in dB. Default: 0.5.
    #[serde(default = "default_crackle_q")]
    pub crackle_q: f32,

    #[serde(default = "default_short_fade_in")]
    pub sweep_fade_in: Duration,

    #[serde(default = "default_noise_fade_in")]
    pub noise_fade_in: Duration,

    #[serde(default = "default_short_fade_in")]
    pub crackle_fade_in: Duration,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            preset: PresetChoice::default(),
            fade_out: default_fade_out(),
            dispose_margin: default_dispose_margin(),
            sweep_cycles: default_sweep_cycles(),
            noise_loop_secs: default_noise_loop_secs(),
            crackle_loop_secs: default_crackle_loop_secs(),
            crackle_q: default_crackle_q(),
            sweep_fade_in: default_short_fade_in(),
            noise_fade_in: default_noise_fade_in(),
            crackle_fade_in: default_short_fade_in(),
        }
    }
}

impl TuningConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(TuningError::InvalidVolume(self.volume));
        }

        if self.sweep_cycles == 0 {
            return Err(TuningError::Config(
                "sweep_cycles must be greater than 0".to_string(),
            ));
        }

        if self.noise_loop_secs <= 0.0 || self.crackle_loop_secs <= 0.0 {
            return Err(TuningError::Config(
                "noise buffers must be longer than 0 seconds".to_string(),
            ));
        }

        Ok(())
    }
}

fn default_volume() -> f32 {
    0.4
}

fn default_fade_out() -> Duration {
    Duration::from_millis(300)
}

fn default_dispose_margin() -> Duration {
    Duration::from_millis(100)
}

fn default_sweep_cycles() -> u32 {
    100
}

fn default_noise_loop_secs() -> f32 {
    2.0
}

fn default_crackle_loop_secs() -> f32 {
    1.5
}

fn default_crackle_q() -> f32 {
    0.5
}

fn default_short_fade_in() -> Duration {
    Duration::from_millis(100)
}

fn default_noise_fade_in() -> Duration {
    Duration::from_millis(150)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::PresetName;

    #[test]
    fn test_defaults() {
        let config = TuningConfig::default();
        assert_eq!(config.volume, 0.4);
        assert_eq!(config.preset, PresetChoice::Random);
        assert_eq!(config.fade_out, Duration::from_millis(300));
        assert_eq!(config.dispose_margin, Duration::from_millis(100));
        assert_eq!(config.sweep_cycles, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TuningConfig =
            serde_json::from_str(r#"{"volume": 0.2, "preset": "slow-analog"}"#).unwrap();
        assert_eq!(config.volume, 0.2);
        assert_eq!(config.preset, PresetChoice::Fixed(PresetName::SlowAnalog));
        assert_eq!(config.noise_fade_in, Duration::from_millis(150));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let loud = TuningConfig {
            volume: 1.5,
            ..TuningConfig::default()
        };
        assert!(matches!(loud.validate(), Err(TuningError::InvalidVolume(_))));

        let no_cycles = TuningConfig {
            sweep_cycles: 0,
            ..TuningConfig::default()
        };
        assert!(matches!(no_cycles.validate(), Err(TuningError::Config(_))));
    }
}
