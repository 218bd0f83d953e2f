//! # Host Bridge Traits
//!
//! Platform abstraction traits that each host (browser shell, desktop app,
//! mobile app) implements for the radio core.
//!
//! ## Traits
//!
//! ### Playback
//! - [`MediaBackend`](media::MediaBackend) - Factory for playback/probe elements and adaptive demuxers
//! - [`MediaElement`](media::MediaElement) - One host playback resource
//! - [`AdaptiveDemuxer`](media::AdaptiveDemuxer) - Segment demuxer attached in front of an element
//!
//! ### Synthesized audio
//! - [`AudioOutput`](audio::AudioOutput) - Real-time output pulling from a [`RenderSource`](audio::RenderSource)
//!
//! ### Data
//! - [`StationDirectory`](directory::StationDirectory) - URL resolution and click reporting
//!
//! ### Utilities
//! - [`LoggerSink`](log::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! Bridge calls return [`BridgeError`]. Media failures that are part of normal
//! stream handling travel as [`MediaError`](media::MediaError) values inside
//! [`MediaEvent`](media::MediaEvent)s instead, so the core can classify them.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`; the core shares handles across
//! tokio tasks and the audio render callback.

pub mod audio;
pub mod directory;
pub mod error;
pub mod log;
pub mod media;

#[cfg(feature = "testing")]
pub mod testing;

pub use error::BridgeError;

pub use audio::{AudioOutput, RenderSource};
pub use directory::StationDirectory;
pub use log::{LogEntry, LogLevel, LoggerSink};
pub use media::{
    media_event_channel, AdaptiveDemuxer, ElementRole, MediaBackend, MediaCapabilities,
    MediaElement, MediaError, MediaErrorKind, MediaEvent, MediaEventReceiver, MediaEventSender,
    SourceHint,
};
