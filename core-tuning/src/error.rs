//! # Tuning Error Types

use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TuningError {
    /// The host refused to connect the render source.
    #[error("Audio output error: {0}")]
    AudioOutput(#[from] BridgeError),

    #[error("Unknown tuning preset: {0}")]
    UnknownPreset(String),

    #[error("Invalid effect volume: {0} (must be between 0.0 and 1.0)")]
    InvalidVolume(f32),

    #[error("Invalid tuning configuration: {0}")]
    Config(String),
}

impl TuningError {
    /// Errors caused by the host rather than by the caller's arguments.
    pub fn is_host_error(&self) -> bool {
        matches!(self, TuningError::AudioOutput(_))
    }
}

pub type Result<T> = std::result::Result<T, TuningError>;
