//! Station directory bridge.
//!
//! The directory supplies candidate sequences to the host UI, which hands them
//! to the core wholesale. The core only calls back for the two lookups below.

use crate::error::Result;

#[async_trait::async_trait]
pub trait StationDirectory: Send + Sync {
    /// Look up a playable URL for a station whose record carries none.
    async fn resolve_stream_url(&self, station_id: &str) -> Result<Option<String>>;

    /// Report that a station was started (popularity tracking).
    async fn register_click(&self, _station_id: &str) -> Result<()> {
        Ok(())
    }
}
