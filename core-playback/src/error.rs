//! # Playback Error Types
//!
//! One variant per failure class of the radio engine, plus the operational
//! errors of its public API. Only exhaustion-class errors are meant for the
//! listener; everything else is recovered silently and logged.

use bridge_traits::{BridgeError, MediaError, MediaErrorKind};
use thiserror::Error;

pub const NO_PLAYABLE_STATIONS: &str = "No playable stations found";
pub const NO_PLAYABLE_STATIONS_IN_REGION: &str = "No playable stations found in this region";

#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Stream Failures
    // ========================================================================
    /// A superseding load interrupted a pending one.
    #[error("Playback aborted by a newer load")]
    Aborted,

    /// The runtime refused to start audio without a user gesture.
    #[error("Playback blocked by autoplay policy")]
    AutoplayBlocked,

    /// Network, format or unsupported-source failure.
    #[error("Stream failed for station {station_id}: {message}")]
    ProtocolFatal { station_id: String, message: String },

    /// A probe did not answer within the timeout.
    #[error("Validation of station {station_id} timed out after {timeout_ms} ms")]
    ValidationTimeout { station_id: String, timeout_ms: u64 },

    // ========================================================================
    // Exhaustion
    // ========================================================================
    /// No candidate in the set validated.
    #[error("{0}")]
    Exhausted(String),

    /// Auto-skip gave up; it stays off until the candidate set changes.
    #[error("No playable stations found in this area")]
    WatchdogLimitExceeded { attempts: u32 },

    // ========================================================================
    // Operational Errors
    // ========================================================================
    #[error("Invalid volume: {0} (must be between 0.0 and 1.0)")]
    InvalidVolume(f32),

    #[error("Station not found: {0}")]
    StationNotFound(String),

    #[error("No stream URL available for station {0}")]
    NoStreamUrl(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("Invalid playback configuration: {0}")]
    Config(String),
}

impl PlaybackError {
    pub fn exhausted() -> Self {
        PlaybackError::Exhausted(NO_PLAYABLE_STATIONS.to_string())
    }

    /// Exhaustion during the initial selection of a new candidate set.
    pub fn exhausted_in_region() -> Self {
        PlaybackError::Exhausted(NO_PLAYABLE_STATIONS_IN_REGION.to_string())
    }

    /// Classify a host media error raised while playing `station_id`.
    pub fn from_media(station_id: &str, error: &MediaError) -> Self {
        match error.kind {
            MediaErrorKind::Aborted => PlaybackError::Aborted,
            MediaErrorKind::AutoplayBlocked => PlaybackError::AutoplayBlocked,
            _ => PlaybackError::ProtocolFatal {
                station_id: station_id.to_string(),
                message: error.message.clone(),
            },
        }
    }

    /// Returns `true` if the error should be shown to the listener.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            PlaybackError::Exhausted(_) | PlaybackError::WatchdogLimitExceeded { .. }
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_error_classification() {
        let abort = MediaError::new(MediaErrorKind::Aborted, "interrupted");
        assert!(matches!(
            PlaybackError::from_media("a", &abort),
            PlaybackError::Aborted
        ));

        let blocked = MediaError::new(MediaErrorKind::AutoplayBlocked, "gesture");
        assert!(matches!(
            PlaybackError::from_media("a", &blocked),
            PlaybackError::AutoplayBlocked
        ));

        let network = MediaError::new(MediaErrorKind::Network, "cors");
        let err = PlaybackError::from_media("a", &network);
        assert!(matches!(err, PlaybackError::ProtocolFatal { .. }));
        assert!(err.to_string().contains("cors"));
    }

    #[test]
    fn test_only_exhaustion_is_user_visible() {
        assert!(PlaybackError::exhausted().is_user_visible());
        assert!(PlaybackError::WatchdogLimitExceeded { attempts: 5 }.is_user_visible());
        assert!(!PlaybackError::Aborted.is_user_visible());
        assert!(!PlaybackError::AutoplayBlocked.is_user_visible());
        assert!(!PlaybackError::ValidationTimeout {
            station_id: "a".into(),
            timeout_ms: 5000
        }
        .is_user_visible());
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            PlaybackError::exhausted().to_string(),
            "No playable stations found"
        );
        assert_eq!(
            PlaybackError::exhausted_in_region().to_string(),
            "No playable stations found in this region"
        );
        assert_eq!(
            PlaybackError::WatchdogLimitExceeded { attempts: 5 }.to_string(),
            "No playable stations found in this area"
        );
    }
}
