//! Station records and candidate sets.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Directory-assigned station identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationId(String);

impl StationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for StationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One entry from the station directory. Never mutated once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRecord {
    pub id: StationId,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub url_resolved: Option<String>,
    #[serde(default)]
    pub codec: Option<String>,
    /// kbps
    #[serde(default)]
    pub bitrate: Option<u32>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl StationRecord {
    pub fn new(id: impl Into<StationId>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            url_resolved: None,
            codec: None,
            bitrate: None,
            country: None,
            country_code: None,
            tags: Vec::new(),
        }
    }

    pub fn with_resolved_url(mut self, url: impl Into<String>) -> Self {
        self.url_resolved = Some(url.into());
        self
    }

    pub fn with_codec(mut self, codec: impl Into<String>, bitrate: Option<u32>) -> Self {
        self.codec = Some(codec.into());
        self.bitrate = bitrate;
        self
    }

    pub fn with_country(mut self, country: impl Into<String>, code: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self.country_code = Some(code.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// The URL to play: the resolved URL when non-blank, else the primary one.
    pub fn stream_url(&self) -> Option<&str> {
        self.url_resolved
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .or_else(|| Some(self.url.trim()).filter(|url| !url.is_empty()))
    }
}

/// Identity of one candidate sequence. Bumped whenever the sequence is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Epoch(u64);

impl Epoch {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable candidate sequence bound to its epoch. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct StationSet {
    epoch: Epoch,
    stations: Arc<[Arc<StationRecord>]>,
}

impl StationSet {
    pub fn new(epoch: Epoch, stations: Vec<StationRecord>) -> Self {
        Self {
            epoch,
            stations: stations.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<StationRecord>> {
        self.stations.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<StationRecord>> {
        self.stations.iter()
    }

    pub fn index_of(&self, id: &StationId) -> Option<usize> {
        self.stations.iter().position(|station| &station.id == id)
    }

    /// `true` when `stations` carries exactly the same ids in the same order.
    pub fn same_ids(&self, stations: &[StationRecord]) -> bool {
        self.stations.len() == stations.len()
            && self
                .stations
                .iter()
                .zip(stations)
                .all(|(current, other)| current.id == other.id)
    }

    /// Index after `index`, wrapping at the end.
    pub fn wrap_next(&self, index: usize) -> usize {
        if self.is_empty() {
            0
        } else {
            (index + 1) % self.len()
        }
    }

    /// Index before `index`, wrapping at the start.
    pub fn wrap_prev(&self, index: usize) -> usize {
        match self.len() {
            0 => 0,
            n => (index % n + n - 1) % n,
        }
    }
}
