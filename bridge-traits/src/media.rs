//! Media playback bridge traits.
//!
//! The host owns the actual decoding/output hardware. The core asks it for
//! disposable media elements (one per playback session or probe), optionally
//! wires an adaptive-stream demuxer in front of them, and consumes everything
//! the host reports through one [`MediaEvent`] channel per element.
//!
//! ```text
//! ┌────────────────┐ create_element(role, tx) ┌──────────────────┐
//! │      core      ├─────────────────────────>│   MediaBackend   │
//! │ (engine/probe) │ create_demuxer(role, tx) │      (host)      │
//! └───────▲────────┘                          └────────┬─────────┘
//!         │           MediaEvent (rx)                  │
//!         └────────────────────────────────────────────┘
//! ```
//!
//! Dropping the receiving half of the channel is how the core stops listening
//! to a superseded element; hosts must tolerate `send` failures silently.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Sending half of a media event channel, handed to the host.
pub type MediaEventSender = mpsc::UnboundedSender<MediaEvent>;

/// Receiving half of a media event channel, kept by the core.
pub type MediaEventReceiver = mpsc::UnboundedReceiver<MediaEvent>;

/// Create a fresh event channel for one element and its demuxer.
pub fn media_event_channel() -> (MediaEventSender, MediaEventReceiver) {
    mpsc::unbounded_channel()
}

/// Why an element is being created.
///
/// Probe elements must stay inaudible and may be configured for fast startup;
/// playback elements drive the speakers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementRole {
    Playback,
    Probe,
}

/// Adaptive-streaming features offered by the host runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MediaCapabilities {
    /// A software demuxer can be attached to an element (HLS via MSE and the like).
    pub adaptive_demuxer: bool,
    /// Elements play adaptive manifests natively when given their URL.
    pub native_adaptive: bool,
}

impl MediaCapabilities {
    pub fn progressive_only() -> Self {
        Self::default()
    }

    pub fn with_demuxer() -> Self {
        Self {
            adaptive_demuxer: true,
            native_adaptive: false,
        }
    }

    pub fn with_native_adaptive() -> Self {
        Self {
            adaptive_demuxer: false,
            native_adaptive: true,
        }
    }
}

/// How a URL assigned to an element should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceHint {
    /// Plain progressive/direct resource (Icecast, MP3, AAC...).
    Progressive,
    /// Adaptive manifest handed to the element's native player.
    NativeAdaptive,
    /// Internal source installed by an attached demuxer.
    Attached,
}

/// Host-reported failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaErrorKind {
    /// The operation was interrupted by a newer request on the same element.
    Aborted,
    /// Transport failure, including cross-origin rejections.
    Network,
    /// The payload could not be decoded.
    Decode,
    /// The source type is not playable here.
    SourceNotSupported,
    /// The runtime refused to start audio without a user gesture.
    AutoplayBlocked,
    /// Error raised by an attached demuxer.
    Demuxer,
    Other,
}

/// Error reported by an element, a demuxer, or a rejected `play()`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind:?} media error: {message}")]
pub struct MediaError {
    pub kind: MediaErrorKind,
    pub message: String,
    /// Non-fatal errors are recovered by the host itself and only logged.
    pub fatal: bool,
}

impl MediaError {
    pub fn new(kind: MediaErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            fatal: true,
        }
    }

    pub fn non_fatal(kind: MediaErrorKind, message: impl Into<String>) -> Self {
        Self {
            fatal: false,
            ..Self::new(kind, message)
        }
    }

    pub fn is_abort(&self) -> bool {
        self.kind == MediaErrorKind::Aborted
    }

    pub fn is_autoplay_blocked(&self) -> bool {
        self.kind == MediaErrorKind::AutoplayBlocked
    }
}

/// Lifecycle notifications from an element or its attached demuxer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    LoadStart,
    /// Enough data is buffered to start playback.
    CanPlay,
    Playing,
    Paused,
    Waiting,
    Stalled,
    /// The attached demuxer parsed the manifest.
    ManifestParsed { variants: usize },
    Error(MediaError),
}

/// One host playback resource (an `<audio>` element, an AVPlayer item...).
#[async_trait::async_trait]
pub trait MediaElement: Send + Sync {
    fn set_source(&self, url: &str, hint: SourceHint);

    /// Begin fetching the current source.
    fn load(&self);

    /// Start audible playback. Rejections carry `AutoplayBlocked` or
    /// `Aborted` where the runtime distinguishes them.
    async fn play(&self) -> std::result::Result<(), MediaError>;

    fn pause(&self);

    /// Output gain in `0.0..=1.0`.
    fn set_volume(&self, volume: f32);

    fn volume(&self) -> f32;

    /// Drop the current source and release network/decoder resources.
    fn clear_source(&self);
}

/// Host adaptive-stream demuxer that feeds segments into an element.
pub trait AdaptiveDemuxer: Send + Sync {
    fn load_source(&self, url: &str);

    fn attach(&self, element: Arc<dyn MediaElement>);

    fn detach(&self);

    /// Release every resource. Must be safe to call more than once.
    fn destroy(&self);
}

/// Factory for host media resources.
pub trait MediaBackend: Send + Sync {
    fn capabilities(&self) -> MediaCapabilities;

    fn create_element(
        &self,
        role: ElementRole,
        events: MediaEventSender,
    ) -> Result<Arc<dyn MediaElement>>;

    fn create_demuxer(
        &self,
        role: ElementRole,
        events: MediaEventSender,
    ) -> Result<Box<dyn AdaptiveDemuxer>>;
}
