//! Failover Controller.
//!
//! Walks the candidate set circularly from a start index and stops at the
//! first station the validator accepts. At most one search runs at a time;
//! `find_valid_station` called during a search returns
//! [`SearchOutcome::Busy`] without touching anything.

use crate::station::StationSet;
use crate::validator::{StreamValidator, Validation};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    Found(usize),
    /// Every candidate was tried and none validated.
    Exhausted,
    /// Another search or probe is running.
    Busy,
    /// The candidate set was replaced while searching.
    Superseded,
}

#[derive(Debug)]
pub struct FailoverController {
    validator: Arc<StreamValidator>,
    search: Mutex<()>,
}

impl FailoverController {
    pub fn new(validator: Arc<StreamValidator>) -> Self {
        Self {
            validator,
            search: Mutex::new(()),
        }
    }

    pub fn validator(&self) -> &Arc<StreamValidator> {
        &self.validator
    }

    pub fn is_searching(&self) -> bool {
        self.search.try_lock().is_err()
    }

    /// Search from `start`, or return `Busy` if a search is already running.
    pub async fn find_valid_station(&self, stations: &StationSet, start: usize) -> SearchOutcome {
        let Ok(_search) = self.search.try_lock() else {
            debug!(start, "Search already in progress");
            return SearchOutcome::Busy;
        };
        self.search_from(stations, start).await
    }

    /// Search from `start`, waiting for a running search to finish first.
    ///
    /// Used for the initial selection on a new candidate set, where the
    /// running search belongs to the previous set and is about to give up.
    pub async fn find_valid_station_queued(
        &self,
        stations: &StationSet,
        start: usize,
    ) -> SearchOutcome {
        let _search = self.search.lock().await;
        self.search_from(stations, start).await
    }

    #[instrument(skip(self, stations), fields(epoch = %stations.epoch(), count = stations.len()))]
    async fn search_from(&self, stations: &StationSet, start: usize) -> SearchOutcome {
        let count = stations.len();
        if count == 0 {
            return SearchOutcome::Exhausted;
        }

        let mut index = start % count;
        for _ in 0..count {
            if self.validator.epoch() != stations.epoch() {
                debug!("Candidate set replaced, abandoning search");
                return SearchOutcome::Superseded;
            }

            let Some(station) = stations.get(index) else {
                break;
            };
            match self.validator.validate(stations.epoch(), station).await {
                Validation::Valid => {
                    info!(index, station_id = %station.id, "Found playable station");
                    return SearchOutcome::Found(index);
                }
                Validation::Invalid => {
                    debug!(index, station_id = %station.id, "Station failed validation");
                }
                Validation::Busy => {
                    warn!(index, "Validator busy outside of a search");
                    return SearchOutcome::Busy;
                }
            }
            index = stations.wrap_next(index);
        }

        warn!(start, "No playable station in candidate set");
        SearchOutcome::Exhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::station::{Epoch, StationRecord};
    use bridge_traits::testing::{FakeMediaBackend, StreamScript};
    use bridge_traits::MediaCapabilities;
    use std::time::Duration;

    fn stations(urls: &[&str]) -> StationSet {
        StationSet::new(
            Epoch::default(),
            urls.iter()
                .enumerate()
                .map(|(i, url)| StationRecord::new(format!("s{i}"), format!("S{i}"), *url))
                .collect(),
        )
    }

    fn controller(backend: &FakeMediaBackend) -> FailoverController {
        FailoverController::new(Arc::new(StreamValidator::new(
            Arc::new(backend.clone()),
            Duration::from_millis(5000),
        )))
    }

    #[tokio::test(start_paused = true)]
    async fn test_wraps_around_from_start() {
        let backend = FakeMediaBackend::new(MediaCapabilities::progressive_only());
        backend.set_default_script(StreamScript::unreachable());
        backend.script("http://a", StreamScript::healthy());
        let set = stations(&["http://a", "http://b", "http://c"]);

        let outcome = controller(&backend).find_valid_station(&set, 1).await;
        assert_eq!(outcome, SearchOutcome::Found(0));
        assert_eq!(backend.total_probes(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_set_is_exhausted() {
        let backend = FakeMediaBackend::new(MediaCapabilities::progressive_only());
        let outcome = controller(&backend)
            .find_valid_station(&StationSet::default(), 0)
            .await;
        assert_eq!(outcome, SearchOutcome::Exhausted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replaced_set_supersedes_search() {
        let backend = FakeMediaBackend::new(MediaCapabilities::progressive_only());
        let controller = controller(&backend);
        let set = stations(&["http://a"]);
        controller.validator().begin_epoch(Epoch::new(7));

        let outcome = controller.find_valid_station(&set, 0).await;
        assert_eq!(outcome, SearchOutcome::Superseded);
        assert_eq!(backend.total_probes(), 0);
    }
}
