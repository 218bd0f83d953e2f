//! # Tuning Effect Synthesizer
//!
//! Procedurally generated "radio tuning" sound played while the player hunts
//! for a working station.
//!
//! ## Overview
//!
//! One effect instance is a small node graph:
//!
//! ```text
//! Oscillator (sweep) ──> Gain ──────────────┐
//! BufferSource (noise) ──> Gain ────────────┼──> Gain (master) ──> AudioOutput
//! BufferSource (crackle) ──> Biquad LP ──> Gain ┘
//! ```
//!
//! Parameters are automated on the render clock ([`context::SynthContext`]),
//! which only advances as the host pulls samples. Sweep cycles are scheduled
//! up front, so they keep running on time even when the async scheduler
//! stalls. Only disposal after a fade-out uses a tokio timer.
//!
//! [`TuningSynthesizer`] owns the lifecycle: at most one graph exists at any
//! time, `start` replaces a running effect, and `stop` is idempotent.

pub mod config;
pub mod context;
pub mod error;
pub mod graph;
pub mod nodes;
pub mod param;
pub mod preset;
pub mod synthesizer;

pub use config::TuningConfig;
pub use error::{Result, TuningError};
pub use preset::{PresetChoice, PresetName, TuningPreset};
pub use synthesizer::{StartOptions, TuningSynthesizer};
