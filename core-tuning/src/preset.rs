//! Tuning sound presets.

use crate::error::TuningError;
use crate::nodes::Waveform;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PresetName {
    Classic,
    AmRough,
    FastDigital,
    VintageShortwave,
    SlowAnalog,
}

impl PresetName {
    pub const ALL: [PresetName; 5] = [
        PresetName::Classic,
        PresetName::AmRough,
        PresetName::FastDigital,
        PresetName::VintageShortwave,
        PresetName::SlowAnalog,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PresetName::Classic => "classic",
            PresetName::AmRough => "am-rough",
            PresetName::FastDigital => "fast-digital",
            PresetName::VintageShortwave => "vintage-shortwave",
            PresetName::SlowAnalog => "slow-analog",
        }
    }

    pub fn preset(self) -> &'static TuningPreset {
        match self {
            PresetName::Classic => &CLASSIC,
            PresetName::AmRough => &AM_ROUGH,
            PresetName::FastDigital => &FAST_DIGITAL,
            PresetName::VintageShortwave => &VINTAGE_SHORTWAVE,
            PresetName::SlowAnalog => &SLOW_ANALOG,
        }
    }
}

impl fmt::Display for PresetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PresetName {
    type Err = TuningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PresetName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| TuningError::UnknownPreset(s.to_string()))
    }
}

/// Preset selection for one `start` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PresetChoice {
    /// Pick uniformly among all presets on every start.
    #[default]
    Random,
    Fixed(PresetName),
}

impl PresetChoice {
    pub fn resolve<R: Rng + ?Sized>(self, rng: &mut R) -> PresetName {
        match self {
            PresetChoice::Fixed(name) => name,
            PresetChoice::Random => *PresetName::ALL
                .choose(rng)
                .unwrap_or(&PresetName::Classic),
        }
    }
}

impl From<PresetName> for PresetChoice {
    fn from(name: PresetName) -> Self {
        PresetChoice::Fixed(name)
    }
}

impl FromStr for PresetChoice {
    type Err = TuningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "random" {
            Ok(PresetChoice::Random)
        } else {
            s.parse().map(PresetChoice::Fixed)
        }
    }
}

impl TryFrom<String> for PresetChoice {
    type Error = TuningError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PresetChoice> for String {
    fn from(choice: PresetChoice) -> Self {
        match choice {
            PresetChoice::Random => "random".to_string(),
            PresetChoice::Fixed(name) => name.as_str().to_string(),
        }
    }
}

/// Sound parameters of one preset. Volumes are relative and get multiplied
/// by the effect volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuningPreset {
    pub name: PresetName,
    pub label: &'static str,
    /// Length of one sweep cycle in seconds.
    pub sweep_duration: f64,
    pub sweep_start_hz: f32,
    pub sweep_end_hz: f32,
    pub waveform: Waveform,
    pub sweep_volume: f32,
    pub noise_volume: f32,
    pub crackle_volume: f32,
    pub crackle_filter_hz: f32,
}

const CLASSIC: TuningPreset = TuningPreset {
    name: PresetName::Classic,
    label: "Classic FM Sweep",
    sweep_duration: 2.5,
    sweep_start_hz: 500.0,
    sweep_end_hz: 5000.0,
    waveform: Waveform::Sine,
    sweep_volume: 0.3,
    noise_volume: 0.6,
    crackle_volume: 0.2,
    crackle_filter_hz: 800.0,
};

const AM_ROUGH: TuningPreset = TuningPreset {
    name: PresetName::AmRough,
    label: "AM Rough Scan",
    sweep_duration: 3.0,
    sweep_start_hz: 300.0,
    sweep_end_hz: 3000.0,
    waveform: Waveform::Square,
    sweep_volume: 0.25,
    noise_volume: 0.75,
    crackle_volume: 0.35,
    crackle_filter_hz: 600.0,
};

const FAST_DIGITAL: TuningPreset = TuningPreset {
    name: PresetName::FastDigital,
    label: "Fast Digital Scan",
    sweep_duration: 1.5,
    sweep_start_hz: 800.0,
    sweep_end_hz: 8000.0,
    waveform: Waveform::Sawtooth,
    sweep_volume: 0.4,
    noise_volume: 0.5,
    crackle_volume: 0.15,
    crackle_filter_hz: 1200.0,
};

const VINTAGE_SHORTWAVE: TuningPreset = TuningPreset {
    name: PresetName::VintageShortwave,
    label: "Vintage Shortwave",
    sweep_duration: 3.5,
    sweep_start_hz: 400.0,
    sweep_end_hz: 4500.0,
    waveform: Waveform::Triangle,
    sweep_volume: 0.28,
    noise_volume: 0.7,
    crackle_volume: 0.4,
    crackle_filter_hz: 500.0,
};

const SLOW_ANALOG: TuningPreset = TuningPreset {
    name: PresetName::SlowAnalog,
    label: "Slow Analog Tuning",
    sweep_duration: 4.0,
    sweep_start_hz: 350.0,
    sweep_end_hz: 4000.0,
    waveform: Waveform::Sine,
    sweep_volume: 0.35,
    noise_volume: 0.55,
    crackle_volume: 0.25,
    crackle_filter_hz: 700.0,
};
