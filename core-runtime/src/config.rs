//! # Core Configuration Module
//!
//! Holds the host capabilities and feature switches the radio core needs.
//!
//! ## Overview
//!
//! `CoreConfig` is assembled with [`CoreConfigBuilder`], which fails fast when
//! a capability required by the enabled features is missing. Timing and
//! retry tunables live next to the components they tune
//! (`core_playback::PlaybackConfig`, `core_tuning::TuningConfig`).
//!
//! ## Required Capabilities
//!
//! - `MediaBackend` - playback and probe elements
//! - `AudioOutput` - only when the tuning effect is enabled
//!
//! ## Optional Capabilities
//!
//! - `StationDirectory` - stream URL resolution and click reporting
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .media_backend(Arc::new(MyMediaBackend))
//!     .audio_output(Arc::new(MyAudioOutput))
//!     .station_directory(Arc::new(MyDirectory))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Panics: no MediaBackend was provided
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing media backend");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{AudioOutput, MediaBackend, StationDirectory};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Host capabilities and switches for one radio core instance.
#[derive(Clone)]
pub struct CoreConfig {
    /// Factory for playback/probe elements and demuxers (required)
    pub media_backend: Arc<dyn MediaBackend>,

    /// Real-time output for the synthesized tuning sound
    pub audio_output: Option<Arc<dyn AudioOutput>>,

    /// URL resolution and click reporting
    pub station_directory: Option<Arc<dyn StationDirectory>>,

    pub features: FeatureFlags,

    /// Capacity of the UI event bus
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("media_backend", &"MediaBackend { ... }")
            .field(
                "audio_output",
                &self.audio_output.as_ref().map(|_| "AudioOutput { ... }"),
            )
            .field(
                "station_directory",
                &self
                    .station_directory
                    .as_ref()
                    .map(|_| "StationDirectory { ... }"),
            )
            .field("features", &self.features)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

/// Optional behaviour of the radio core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    /// Play the synthesized tuning sound while navigating (requires AudioOutput)
    pub tuning_effect: bool,

    /// Start playing the first valid station when a new candidate set arrives
    pub autoplay_on_new_stations: bool,

    /// Report station loads to the directory (requires StationDirectory to have any effect)
    pub register_clicks: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            tuning_effect: true,
            autoplay_on_new_stations: true,
            register_clicks: true,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Checks feature flags against the provided capabilities.
    pub fn validate(&self) -> Result<()> {
        if self.features.tuning_effect && self.audio_output.is_none() {
            return Err(audio_output_missing_error());
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn media_backend_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "MediaBackend".to_string(),
        message: "MediaBackend implementation is required for stream playback and probing. \
                 Web: wrap HTMLAudioElement (plus hls.js for adaptive streams). \
                 Mobile: wrap AVPlayer / ExoPlayer."
            .to_string(),
    }
}

fn audio_output_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "AudioOutput".to_string(),
        message: "Tuning effect enabled but no AudioOutput provided. \
                 Disable the feature with .enable_tuning_effect(false) or inject an AudioOutput implementation."
            .to_string(),
    }
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    media_backend: Option<Arc<dyn MediaBackend>>,
    audio_output: Option<Arc<dyn AudioOutput>>,
    station_directory: Option<Arc<dyn StationDirectory>>,
    features: Option<FeatureFlags>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the media backend implementation (required).
    pub fn media_backend(mut self, backend: Arc<dyn MediaBackend>) -> Self {
        self.media_backend = Some(backend);
        self
    }

    /// Sets the audio output used by the tuning effect.
    pub fn audio_output(mut self, output: Arc<dyn AudioOutput>) -> Self {
        self.audio_output = Some(output);
        self
    }

    /// Sets the station directory implementation (optional).
    pub fn station_directory(mut self, directory: Arc<dyn StationDirectory>) -> Self {
        self.station_directory = Some(directory);
        self
    }

    pub fn enable_tuning_effect(mut self, enabled: bool) -> Self {
        self.features_mut().tuning_effect = enabled;
        self
    }

    pub fn enable_autoplay_on_new_stations(mut self, enabled: bool) -> Self {
        self.features_mut().autoplay_on_new_stations = enabled;
        self
    }

    pub fn enable_click_registration(mut self, enabled: bool) -> Self {
        self.features_mut().register_clicks = enabled;
        self
    }

    /// Replaces all feature flags at once.
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = Some(features);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    fn features_mut(&mut self) -> &mut FeatureFlags {
        self.features.get_or_insert_with(FeatureFlags::default)
    }

    /// Builds the final `CoreConfig`, returning an actionable
    /// [`Error::CapabilityMissing`] when a required bridge is absent.
    pub fn build(self) -> Result<CoreConfig> {
        let media_backend = self
            .media_backend
            .ok_or_else(media_backend_missing_error)?;

        let config = CoreConfig {
            media_backend,
            audio_output: self.audio_output,
            station_directory: self.station_directory,
            features: self.features.unwrap_or_default(),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::testing::{FakeMediaBackend, ManualAudioOutput};
    use bridge_traits::MediaCapabilities;

    fn backend() -> Arc<dyn MediaBackend> {
        Arc::new(FakeMediaBackend::new(MediaCapabilities::progressive_only()))
    }

    #[test]
    fn test_builder_requires_media_backend() {
        let result = CoreConfig::builder()
            .audio_output(Arc::new(ManualAudioOutput::new(48_000)))
            .build();

        let err = result.unwrap_err();
        assert!(err.is_capability_missing());
        assert!(err.to_string().contains("MediaBackend"));
    }

    #[test]
    fn test_tuning_effect_requires_audio_output() {
        let err = CoreConfig::builder()
            .media_backend(backend())
            .build()
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("AudioOutput"));
        assert!(message.contains("enable_tuning_effect(false)"));
    }

    #[test]
    fn test_tuning_effect_disabled_needs_no_output() {
        let config = CoreConfig::builder()
            .media_backend(backend())
            .enable_tuning_effect(false)
            .build()
            .unwrap();

        assert!(!config.features.tuning_effect);
        assert!(config.features.autoplay_on_new_stations);
        assert!(config.audio_output.is_none());
    }

    #[test]
    fn test_default_feature_flags() {
        let flags = FeatureFlags::default();
        assert!(flags.tuning_effect);
        assert!(flags.autoplay_on_new_stations);
        assert!(flags.register_clicks);
    }

    #[test]
    fn test_feature_flags_deserialize_with_defaults() {
        let flags: FeatureFlags = serde_json::from_str(r#"{"register_clicks": false}"#).unwrap();
        assert!(flags.tuning_effect);
        assert!(!flags.register_clicks);
    }

    #[test]
    fn test_zero_event_buffer_rejected() {
        let err = CoreConfig::builder()
            .media_backend(backend())
            .enable_tuning_effect(false)
            .event_buffer_size(0)
            .build()
            .unwrap_err();

        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_debug_hides_bridges() {
        let config = CoreConfig::builder()
            .media_backend(backend())
            .audio_output(Arc::new(ManualAudioOutput::new(44_100)))
            .build()
            .unwrap();

        let debug = format!("{:?}", config);
        assert!(debug.contains("MediaBackend { ... }"));
        assert!(debug.contains("AudioOutput { ... }"));
        assert!(debug.contains("station_directory: None"));
    }
}
