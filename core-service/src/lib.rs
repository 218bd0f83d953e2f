//! # Radio Player Service
//!
//! [`RadioPlayer`] composes the stream validator, the failover controller,
//! the playback engine, the auto-skip watchdog and the tuning synthesizer
//! behind the operations a UI needs:
//!
//! | Operation | Effect |
//! |---|---|
//! | [`replace_stations`](RadioPlayer::replace_stations) | New candidate set, new epoch, initial selection |
//! | [`next`](RadioPlayer::next) / [`previous`](RadioPlayer::previous) | Failover search from the neighbour, then load |
//! | [`select_station`](RadioPlayer::select_station) | Failover search from the chosen station |
//! | [`play`](RadioPlayer::play) / [`pause`](RadioPlayer::pause) / [`toggle_play_pause`](RadioPlayer::toggle_play_pause) | Transport |
//! | [`set_volume`](RadioPlayer::set_volume) | Target output volume |
//! | [`status`](RadioPlayer::status) | [`PlayerStatus`] snapshot |
//!
//! State changes are also published as [`RadioEvent`](core_runtime::events::RadioEvent)s
//! on the player's event bus.

pub mod error;
pub mod player;
pub mod status;

pub use error::{Result, ServiceError};
pub use player::RadioPlayer;
pub use status::PlayerStatus;

pub use core_playback::{EngineState, PlaybackConfig, StationId, StationRecord};
pub use core_runtime::config::{CoreConfig, FeatureFlags};
pub use core_runtime::events::{EventBus, RadioEvent};
pub use core_tuning::TuningConfig;
