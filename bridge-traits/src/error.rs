use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Audio output error: {0}")]
    AudioOutput(String),

    #[error("Station directory error: {0}")]
    Directory(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
