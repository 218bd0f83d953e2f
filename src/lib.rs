//! Workspace façade crate.
//!
//! Hosts depend on `tuner-workspace` and pick features instead of wiring each
//! crate individually. The default `service` feature exposes the
//! [`RadioPlayer`](core_service::RadioPlayer) orchestrator; `tuning-effect`
//! additionally re-exports the synthesizer crate for hosts that drive it on
//! their own.

#[cfg(feature = "service")]
pub use core_service::*;

#[cfg(feature = "tuning-effect")]
pub use core_tuning as tuning;
