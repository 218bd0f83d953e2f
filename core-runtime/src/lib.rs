//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the tuner crates:
//! - Logging and tracing setup
//! - Capability configuration (`CoreConfig`)
//! - Typed event bus for UI subscribers
//!
//! Every other `core-*` crate depends on this one for its logging conventions
//! and event types; it depends only on `bridge-traits`.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
