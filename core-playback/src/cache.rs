//! Epoch-scoped validation results.
//!
//! Entries are write-once within an epoch. Moving to a new epoch drops every
//! entry at once, and writes tagged with an older epoch are discarded so a
//! probe that outlives its candidate set cannot leak into the next one.

use crate::station::{Epoch, StationId};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct ValidationCache {
    epoch: Epoch,
    entries: HashMap<StationId, bool>,
}

impl ValidationCache {
    pub fn new(epoch: Epoch) -> Self {
        Self {
            epoch,
            entries: HashMap::new(),
        }
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Invalidate everything and start `epoch`.
    pub fn reset(&mut self, epoch: Epoch) {
        self.epoch = epoch;
        self.entries.clear();
    }

    pub fn get(&self, epoch: Epoch, id: &StationId) -> Option<bool> {
        if epoch != self.epoch {
            return None;
        }
        self.entries.get(id).copied()
    }

    /// Store a result. Returns `false` when the epoch is stale or the entry
    /// already exists; the first result always wins.
    pub fn record(&mut self, epoch: Epoch, id: StationId, valid: bool) -> bool {
        if epoch != self.epoch || self.entries.contains_key(&id) {
            return false;
        }
        self.entries.insert(id, valid);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_once() {
        let mut cache = ValidationCache::new(Epoch::new(1));
        let id = StationId::from("a");

        assert!(cache.record(Epoch::new(1), id.clone(), false));
        assert!(!cache.record(Epoch::new(1), id.clone(), true));
        assert_eq!(cache.get(Epoch::new(1), &id), Some(false));
    }

    #[test]
    fn test_reset_is_wholesale() {
        let mut cache = ValidationCache::new(Epoch::new(1));
        cache.record(Epoch::new(1), "a".into(), true);
        cache.record(Epoch::new(1), "b".into(), false);
        assert_eq!(cache.len(), 2);

        cache.reset(Epoch::new(2));
        assert!(cache.is_empty());
        assert_eq!(cache.get(Epoch::new(2), &"a".into()), None);
    }

    #[test]
    fn test_stale_epoch_is_ignored() {
        let mut cache = ValidationCache::new(Epoch::new(3));
        assert!(!cache.record(Epoch::new(2), "a".into(), true));
        assert!(cache.is_empty());

        cache.record(Epoch::new(3), "a".into(), true);
        assert_eq!(cache.get(Epoch::new(2), &"a".into()), None);
    }
}
