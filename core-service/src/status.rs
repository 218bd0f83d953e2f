//! Observable player state.

use core_playback::{EngineState, Epoch, StationId};
use serde::Serialize;

/// Point-in-time snapshot for the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStatus {
    pub current_index: usize,
    pub station_id: Option<StationId>,
    pub station_name: Option<String>,
    pub state: EngineState,
    pub is_playing: bool,
    /// Searching, loading, or buffering.
    pub is_loading: bool,
    /// A failover search is running.
    pub is_validating: bool,
    /// Only exhaustion-class messages ever land here.
    pub last_error: Option<String>,
    pub auto_skip_attempts: u32,
    pub auto_skip_halted: bool,
    pub candidate_count: usize,
    pub epoch: Epoch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_for_the_ui() {
        let status = PlayerStatus {
            current_index: 2,
            station_id: Some(StationId::from("st-2")),
            station_name: Some("Jazz FM".to_string()),
            state: EngineState::Blocked,
            is_playing: false,
            is_loading: false,
            is_validating: false,
            last_error: None,
            auto_skip_attempts: 0,
            auto_skip_halted: false,
            candidate_count: 3,
            epoch: Epoch::new(4),
        };

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["currentIndex"], 2);
        assert_eq!(json["stationId"], "st-2");
        assert_eq!(json["state"], "blocked");
        assert_eq!(json["autoSkipHalted"], false);
        assert_eq!(json["epoch"], 4);
        assert!(json["lastError"].is_null());
    }
}
