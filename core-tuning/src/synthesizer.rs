//! Tuning effect lifecycle.
//!
//! At most one graph exists at a time. `start` disposes a running effect
//! synchronously before building the next one. `stop` fades the stages out on
//! the render clock, waits for the fade plus a margin on the tokio clock, then
//! disposes. Every `start` bumps a generation counter; a pending `stop` only
//! disposes the generation it faded, so a newer effect started during the
//! wait survives.

use crate::config::TuningConfig;
use crate::context::SynthContext;
use crate::error::{Result, TuningError};
use crate::graph::TuningGraph;
use crate::preset::{PresetChoice, PresetName};
use bridge_traits::AudioOutput;
use core_runtime::events::{EventBus, RadioEvent, TuningEvent};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Per-call overrides for [`TuningSynthesizer::start`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StartOptions {
    /// Falls back to `TuningConfig::volume`.
    pub volume: Option<f32>,
    /// Falls back to `TuningConfig::preset`.
    pub preset: Option<PresetChoice>,
}

impl StartOptions {
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn with_preset(mut self, preset: impl Into<PresetChoice>) -> Self {
        self.preset = Some(preset.into());
        self
    }
}

#[derive(Debug, Default)]
struct Lifecycle {
    generation: u64,
    active: bool,
    connected: bool,
    preset: Option<PresetName>,
}

pub struct TuningSynthesizer {
    output: Arc<dyn AudioOutput>,
    context: SynthContext,
    config: TuningConfig,
    lifecycle: Mutex<Lifecycle>,
    rng: Mutex<StdRng>,
    events: Option<EventBus>,
}

impl TuningSynthesizer {
    pub fn new(output: Arc<dyn AudioOutput>, config: TuningConfig) -> Result<Self> {
        config.validate()?;
        let context = SynthContext::new(output.sample_rate());
        Ok(Self {
            output,
            context,
            config,
            lifecycle: Mutex::new(Lifecycle::default()),
            rng: Mutex::new(StdRng::from_entropy()),
            events: None,
        })
    }

    /// Publish lifecycle events on `bus`.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    /// Deterministic preset choice and noise.
    pub fn with_seed(self, seed: u64) -> Self {
        *self.rng.lock() = StdRng::seed_from_u64(seed);
        self
    }

    pub fn config(&self) -> &TuningConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle.lock().active
    }

    pub fn current_preset(&self) -> Option<PresetName> {
        self.lifecycle.lock().preset
    }

    /// Nodes currently alive in the render context.
    pub fn active_node_count(&self) -> usize {
        self.context.active_node_count()
    }

    /// Render-clock time in seconds.
    pub fn current_time(&self) -> f64 {
        self.context.current_time()
    }

    /// Start a fresh effect, replacing any running one.
    pub fn start(&self, options: StartOptions) -> Result<PresetName> {
        let volume = options.volume.unwrap_or(self.config.volume);
        if !(0.0..=1.0).contains(&volume) {
            return Err(TuningError::InvalidVolume(volume));
        }

        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.active {
            debug!("Stopping previous tuning effect before starting a new one");
            self.context.dispose();
            lifecycle.active = false;
        }

        if !lifecycle.connected {
            self.output.connect(self.context.render_source())?;
            lifecycle.connected = true;
        }

        let mut rng = self.rng.lock();
        let name = options
            .preset
            .unwrap_or(self.config.preset)
            .resolve(&mut *rng);
        let graph = TuningGraph::build(
            name.preset(),
            volume,
            self.context.current_time(),
            self.context.sample_rate(),
            &self.config,
            &mut *rng,
        );
        drop(rng);

        self.context.install(graph);
        lifecycle.generation += 1;
        lifecycle.active = true;
        lifecycle.preset = Some(name);
        drop(lifecycle);

        info!(preset = %name, label = name.preset().label, "Starting tuning effect");
        self.emit(TuningEvent::Started {
            preset: name.to_string(),
        });
        Ok(name)
    }

    /// Fade out with the configured duration.
    pub async fn stop_default(&self) {
        self.stop(self.config.fade_out).await
    }

    /// Fade every stage to silence over `fade`, then dispose the graph.
    ///
    /// Resolves immediately when nothing is running. Calling it again while
    /// a fade is pending is harmless.
    pub async fn stop(&self, fade: Duration) {
        let generation = {
            let lifecycle = self.lifecycle.lock();
            if !lifecycle.active {
                return;
            }
            lifecycle.generation
        };

        let faded = self
            .context
            .with_graph(|graph, now| graph.fade_out(now, fade.as_secs_f64()));
        if faded.is_none() {
            return;
        }
        debug!(fade_ms = fade.as_millis() as u64, "Fading out tuning effect");
        self.emit(TuningEvent::FadingOut {
            fade_ms: fade.as_millis() as u64,
        });

        tokio::time::sleep(fade + self.config.dispose_margin).await;

        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.generation != generation || !lifecycle.active {
            return;
        }
        self.context.dispose();
        lifecycle.active = false;
        lifecycle.preset = None;
        drop(lifecycle);

        debug!("Tuning effect stopped");
        self.emit(TuningEvent::Disposed);
    }

    /// Tear the effect down immediately, without a fade.
    pub fn dispose(&self) {
        let mut lifecycle = self.lifecycle.lock();
        let had_graph = self.context.dispose().is_some();
        lifecycle.active = false;
        lifecycle.preset = None;
        // Invalidate any pending stop.
        lifecycle.generation += 1;
        drop(lifecycle);

        if had_graph {
            self.emit(TuningEvent::Disposed);
        }
    }

    /// Dispose and detach from the audio output.
    pub fn shutdown(&self) {
        self.dispose();
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.connected {
            self.output.disconnect();
            lifecycle.connected = false;
        }
    }

    fn emit(&self, event: TuningEvent) {
        if let Some(bus) = &self.events {
            let _ = bus.emit(RadioEvent::Tuning(event));
        }
    }
}

impl std::fmt::Debug for TuningSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TuningSynthesizer")
            .field("output", &"AudioOutput { ... }")
            .field("lifecycle", &*self.lifecycle.lock())
            .field("config", &self.config)
            .finish()
    }
}
