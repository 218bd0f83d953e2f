//! Audio output bridge for synthesized sound.
//!
//! The host runs a real-time callback (CoreAudio, WASAPI, an `AudioWorklet`...)
//! and pulls mono `f32` frames from whatever [`RenderSource`] the core
//! connected. Frames are produced on the host's clock, so anything the core
//! schedules in sample time keeps running even when the async runtime is busy.

use crate::error::Result;
use std::sync::Arc;

/// Pull-based producer of mono PCM frames in `[-1.0, 1.0]`.
pub trait RenderSource: Send + Sync {
    /// Fill `out` completely. Silence is written when there is nothing to play.
    fn render(&self, out: &mut [f32]);
}

/// Host audio output mixed alongside the media elements.
pub trait AudioOutput: Send + Sync {
    /// Frames per second the host callback runs at.
    fn sample_rate(&self) -> u32;

    /// Start pulling from `source`. Replaces any previous source.
    fn connect(&self, source: Arc<dyn RenderSource>) -> Result<()>;

    fn disconnect(&self);
}
