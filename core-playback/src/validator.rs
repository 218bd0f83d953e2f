//! Stream Validator.
//!
//! Probes a candidate on a disposable, muted element and memoizes the answer
//! per epoch. One probe may be in flight at a time; a request that arrives
//! while another probe is running returns [`Validation::Busy`] immediately.

use crate::cache::ValidationCache;
use crate::error::PlaybackError;
use crate::sink::{SinkKind, StreamSink};
use crate::station::{Epoch, StationId, StationRecord};
use bridge_traits::{
    media_event_channel, ElementRole, MediaBackend, MediaElement, MediaEvent, MediaEventReceiver,
};
use core_runtime::logging::redact_url;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Valid,
    Invalid,
    /// Another probe is in flight; nothing was probed or cached.
    Busy,
}

impl Validation {
    fn from_valid(valid: bool) -> Self {
        if valid {
            Validation::Valid
        } else {
            Validation::Invalid
        }
    }
}

/// Clears the in-flight flag when the probe finishes, times out or is dropped.
struct ProbeGuard<'a>(&'a AtomicBool);

impl<'a> ProbeGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ProbeGuard(flag))
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Host resources of one probe, released on drop.
struct ProbeResources {
    element: Arc<dyn MediaElement>,
    sink: Option<StreamSink>,
}

impl Drop for ProbeResources {
    fn drop(&mut self) {
        self.element.pause();
        if let Some(sink) = self.sink.take() {
            sink.close();
        }
        self.element.clear_source();
    }
}

pub struct StreamValidator {
    backend: Arc<dyn MediaBackend>,
    cache: Mutex<ValidationCache>,
    probe_in_flight: AtomicBool,
    probe_timeout: Duration,
    probes_started: AtomicUsize,
}

impl StreamValidator {
    pub fn new(backend: Arc<dyn MediaBackend>, probe_timeout: Duration) -> Self {
        Self {
            backend,
            cache: Mutex::new(ValidationCache::default()),
            probe_in_flight: AtomicBool::new(false),
            probe_timeout,
            probes_started: AtomicUsize::new(0),
        }
    }

    pub fn epoch(&self) -> Epoch {
        self.cache.lock().epoch()
    }

    /// Drop every cached result and start `epoch`.
    pub fn begin_epoch(&self, epoch: Epoch) {
        self.cache.lock().reset(epoch);
        debug!(%epoch, "Validation cache reset");
    }

    /// Cached result for `id` in the current epoch.
    pub fn cached(&self, id: &StationId) -> Option<bool> {
        let cache = self.cache.lock();
        cache.get(cache.epoch(), id)
    }

    pub fn is_probing(&self) -> bool {
        self.probe_in_flight.load(Ordering::Acquire)
    }

    /// Probes started since construction.
    pub fn probes_started(&self) -> usize {
        self.probes_started.load(Ordering::Relaxed)
    }

    /// Validate `station` for `epoch`.
    #[instrument(skip(self, station), fields(station_id = %station.id, %epoch))]
    pub async fn validate(&self, epoch: Epoch, station: &StationRecord) -> Validation {
        if let Some(valid) = self.cache.lock().get(epoch, &station.id) {
            return Validation::from_valid(valid);
        }

        let Some(url) = station.stream_url() else {
            debug!("Station has no stream URL, marking invalid");
            self.record(epoch, &station.id, false);
            return Validation::Invalid;
        };

        let Some(_guard) = ProbeGuard::acquire(&self.probe_in_flight) else {
            debug!("Probe already in flight, skipping");
            return Validation::Busy;
        };

        // A probe for the same id may have finished while we were queued.
        if let Some(valid) = self.cache.lock().get(epoch, &station.id) {
            return Validation::from_valid(valid);
        }

        self.probes_started.fetch_add(1, Ordering::Relaxed);
        debug!(url = %redact_url(url), "Probing stream");

        let valid = match tokio::time::timeout(self.probe_timeout, self.probe(url)).await {
            Ok(valid) => valid,
            Err(_) => {
                let err = PlaybackError::ValidationTimeout {
                    station_id: station.id.to_string(),
                    timeout_ms: self.probe_timeout.as_millis() as u64,
                };
                warn!(error = %err, "Probe timed out");
                false
            }
        };

        self.record(epoch, &station.id, valid);
        debug!(valid, "Probe finished");
        Validation::from_valid(valid)
    }

    fn record(&self, epoch: Epoch, id: &StationId, valid: bool) {
        if !self.cache.lock().record(epoch, id.clone(), valid) {
            debug!(station_id = %id, "Discarding probe result for a stale epoch");
        }
    }

    async fn probe(&self, url: &str) -> bool {
        let (tx, rx) = media_event_channel();
        let element = match self.backend.create_element(ElementRole::Probe, tx.clone()) {
            Ok(element) => element,
            Err(e) => {
                warn!(error = %e, "Could not create probe element");
                return false;
            }
        };
        element.set_volume(0.0);

        let mut resources = ProbeResources {
            element,
            sink: None,
        };
        let kind = SinkKind::for_url(url, self.backend.capabilities());
        match StreamSink::open(
            kind,
            self.backend.as_ref(),
            ElementRole::Probe,
            &resources.element,
            url,
            tx,
        ) {
            Ok(sink) => resources.sink = Some(sink),
            Err(e) => {
                warn!(error = %e, "Could not open probe source");
                return false;
            }
        }

        Self::await_verdict(rx).await
    }

    async fn await_verdict(mut rx: MediaEventReceiver) -> bool {
        while let Some(event) = rx.recv().await {
            match event {
                MediaEvent::ManifestParsed { variants } => return variants > 0,
                MediaEvent::CanPlay => return true,
                MediaEvent::Error(e) if e.fatal => {
                    debug!(error = %e, "Probe failed");
                    return false;
                }
                MediaEvent::Error(e) => debug!(error = %e, "Ignoring non-fatal probe error"),
                _ => {}
            }
        }
        false
    }
}

impl std::fmt::Debug for StreamValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamValidator")
            .field("backend", &"MediaBackend { ... }")
            .field("cache", &*self.cache.lock())
            .field("probe_in_flight", &self.is_probing())
            .field("probe_timeout", &self.probe_timeout)
            .finish()
    }
}
