//! # Event Bus System
//!
//! Typed, broadcast-based notifications from the radio core to UI
//! subscribers, built on `tokio::sync::broadcast`.
//!
//! ```text
//! ┌─────────────────┐   emit    ┌───────────┐  subscribe  ┌────────────┐
//! │ Playback Engine ├──────────>│           ├────────────>│ UI layer   │
//! └─────────────────┘           │ EventBus  │             └────────────┘
//! ┌─────────────────┐   emit    │ (broadcast│
//! │ Watchdog/Tuning ├──────────>│  channel) │  subscribe  ┌────────────┐
//! └─────────────────┘           │           ├────────────>│ Diagnostics│
//!                               └───────────┘             └────────────┘
//! ```
//!
//! Subscribers that fall behind receive `RecvError::Lagged(n)` and may keep
//! reading; `RecvError::Closed` means the core shut down.
//!
//! ```rust
//! use core_runtime::events::{EventBus, NavigationEvent, RadioEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(RadioEvent::Navigation(NavigationEvent::StationSelected {
//!     index: 1,
//!     station_id: "b".to_string(),
//! }))
//! .ok();
//!
//! assert!(matches!(rx.recv().await, Ok(RadioEvent::Navigation(_))));
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Event Types
// ============================================================================

/// Top-level event published through the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum RadioEvent {
    Playback(PlaybackEvent),
    Navigation(NavigationEvent),
    Tuning(TuningEvent),
    Watchdog(WatchdogEvent),
}

impl RadioEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            RadioEvent::Playback(e) => e.description(),
            RadioEvent::Navigation(e) => e.description(),
            RadioEvent::Tuning(e) => e.description(),
            RadioEvent::Watchdog(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            RadioEvent::Navigation(NavigationEvent::Exhausted { .. }) => EventSeverity::Error,
            RadioEvent::Watchdog(WatchdogEvent::Halted { .. }) => EventSeverity::Error,
            RadioEvent::Playback(PlaybackEvent::Failed { .. }) => EventSeverity::Warning,
            RadioEvent::Playback(PlaybackEvent::Downgraded { .. }) => EventSeverity::Warning,
            RadioEvent::Playback(PlaybackEvent::Playing { .. }) => EventSeverity::Info,
            RadioEvent::Playback(PlaybackEvent::Blocked { .. }) => EventSeverity::Info,
            RadioEvent::Navigation(NavigationEvent::StationSelected { .. }) => EventSeverity::Info,
            RadioEvent::Navigation(NavigationEvent::CandidatesReplaced { .. }) => {
                EventSeverity::Info
            }
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Playback engine lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    Loading { station_id: String },
    Playing { station_id: String },
    Paused { station_id: String },
    /// The runtime refused to start audio without a user gesture.
    Blocked { station_id: String },
    /// Buffering started (`true`) or ended (`false`) without a state change.
    Buffering { station_id: String, buffering: bool },
    /// An adaptive attempt failed and the same URL is retried as progressive.
    Downgraded { station_id: String },
    Failed { station_id: String, message: String },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::Loading { .. } => "Station loading",
            PlaybackEvent::Playing { .. } => "Station playing",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Blocked { .. } => "Playback blocked by autoplay policy",
            PlaybackEvent::Buffering { .. } => "Playback buffering changed",
            PlaybackEvent::Downgraded { .. } => "Adaptive stream downgraded to progressive",
            PlaybackEvent::Failed { .. } => "Playback failed",
        }
    }
}

/// Candidate set and cursor movement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum NavigationEvent {
    /// A new candidate sequence started a new validation epoch.
    CandidatesReplaced { epoch: u64, count: usize },
    SearchStarted { start_index: usize },
    StationSelected { index: usize, station_id: String },
    /// No candidate in the set validated.
    Exhausted { message: String },
}

impl NavigationEvent {
    fn description(&self) -> &str {
        match self {
            NavigationEvent::CandidatesReplaced { .. } => "Candidate stations replaced",
            NavigationEvent::SearchStarted { .. } => "Searching for a playable station",
            NavigationEvent::StationSelected { .. } => "Station selected",
            NavigationEvent::Exhausted { .. } => "No playable station found",
        }
    }
}

/// Tuning effect lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum TuningEvent {
    Started { preset: String },
    FadingOut { fade_ms: u64 },
    Disposed,
}

impl TuningEvent {
    fn description(&self) -> &str {
        match self {
            TuningEvent::Started { .. } => "Tuning effect started",
            TuningEvent::FadingOut { .. } => "Tuning effect fading out",
            TuningEvent::Disposed => "Tuning effect disposed",
        }
    }
}

/// Auto-skip decisions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum WatchdogEvent {
    SkipScheduled { attempt: u32, delay_ms: u64 },
    /// Retry ceiling reached; auto-skip stays off until the candidate set changes.
    Halted { attempts: u32, message: String },
    Reset,
}

impl WatchdogEvent {
    fn description(&self) -> &str {
        match self {
            WatchdogEvent::SkipScheduled { .. } => "Auto-skip scheduled",
            WatchdogEvent::Halted { .. } => "Auto-skip halted",
            WatchdogEvent::Reset => "Auto-skip counters reset",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel. Cloning shares the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RadioEvent>,
}

impl EventBus {
    /// Creates a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event; errors only when nobody is subscribed.
    pub fn emit(&self, event: RadioEvent) -> Result<usize, SendError<RadioEvent>> {
        self.sender.send(event)
    }

    /// New receiver for future events. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<RadioEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&RadioEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate.
///
/// ```rust
/// use core_runtime::events::{EventBus, EventStream, EventSeverity};
///
/// let bus = EventBus::new(16);
/// let errors_only = EventStream::new(bus.subscribe())
///     .filter(|event| event.severity() >= EventSeverity::Error);
/// ```
pub struct EventStream {
    receiver: Receiver<RadioEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<RadioEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&RadioEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &RadioEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Next event passing the filter.
    pub async fn recv(&mut self) -> Result<RadioEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Returns `None` if no matching event is currently queued.
    pub fn try_recv(&mut self) -> Option<Result<RadioEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
