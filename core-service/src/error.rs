use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Player initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Playback error: {0}")]
    Playback(#[from] core_playback::PlaybackError),

    #[error("Tuning effect error: {0}")]
    Tuning(#[from] core_tuning::TuningError),
}

impl ServiceError {
    /// Returns `true` if the error carries a message meant for the listener.
    pub fn is_user_visible(&self) -> bool {
        matches!(self, ServiceError::Playback(e) if e.is_user_visible())
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
