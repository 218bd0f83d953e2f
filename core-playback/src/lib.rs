//! # Station Playback
//!
//! Everything between a candidate list of stations and a single audible
//! stream:
//!
//! - [`station`] - Station records, ids, epochs and candidate sets
//! - [`cache`] - Write-once, epoch-scoped validation results
//! - [`validator`] - Muted, time-boxed probes (one in flight at a time)
//! - [`failover`] - Circular search for the next playable candidate
//! - [`sink`] - Protocol sniffing and stream sink selection
//! - [`engine`] - The playback session and its state machine
//! - [`watchdog`] - Bounded auto-skip after fatal failures
//!
//! The orchestration of these pieces lives in `core-service`.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod failover;
pub mod sink;
pub mod station;
pub mod validator;
pub mod watchdog;

pub use cache::ValidationCache;
pub use config::PlaybackConfig;
pub use engine::{EngineSignal, EngineState, PlaybackEngine, SessionId};
pub use error::{PlaybackError, Result};
pub use failover::{FailoverController, SearchOutcome};
pub use sink::{SinkKind, StreamProtocol, StreamSink};
pub use station::{Epoch, StationId, StationRecord, StationSet};
pub use validator::{StreamValidator, Validation};
pub use watchdog::{AutoSkipWatchdog, WatchdogDecision};
