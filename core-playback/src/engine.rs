//! Playback Engine.
//!
//! Owns the single live playback session. Every host callback for the
//! session's element (and its demuxer) arrives on one [`MediaEvent`] channel
//! that a per-session driver task consumes; each event is mapped to an
//! [`EngineInput`] and run through [`transition`], the only place that
//! decides state changes.
//!
//! ```text
//!            load                 ready
//!  (any) ──────────> Loading ─────────────> Playing
//!                      │  │                   │
//!     autoplay refused │  │ fatal error       │ fatal error
//!                      v  v                   v
//!                 Blocked  [adaptive, first failure] ──> Loading (progressive)
//!                          [otherwise] ───────────────> Failed
//! ```
//!
//! `load` tears the previous session down synchronously (driver aborted,
//! element paused, demuxer destroyed, source cleared) before creating the
//! next one, so two sessions never coexist.

use crate::config::PlaybackConfig;
use crate::error::{PlaybackError, Result};
use crate::sink::{SinkKind, StreamSink};
use crate::station::{StationId, StationRecord};
use bridge_traits::{
    media_event_channel, ElementRole, MediaBackend, MediaElement, MediaError, MediaEvent,
    MediaEventReceiver, MediaEventSender,
};
use core_runtime::events::{EventBus, PlaybackEvent, RadioEvent};
use core_runtime::logging::redact_url;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

const SIGNAL_BUFFER_SIZE: usize = 64;

// ============================================================================
// State Machine
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Idle,
    Loading,
    Playing,
    Paused,
    /// Autoplay refused. Left only by an explicit retry.
    Blocked,
    Failed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Idle => "idle",
            EngineState::Loading => "loading",
            EngineState::Playing => "playing",
            EngineState::Paused => "paused",
            EngineState::Blocked => "blocked",
            EngineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineInput {
    Load,
    /// Enough data buffered, or the element started playing.
    Ready,
    Pause,
    AutoplayRejected,
    /// Interrupted by a superseding load.
    Aborted,
    /// Network, decode or unsupported-source failure.
    Fatal { can_downgrade: bool },
    Teardown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    To(EngineState),
    /// Reopen the same URL as a progressive source; the state becomes `Loading`.
    Downgrade,
    Ignore,
}

pub fn transition(state: EngineState, input: EngineInput) -> Transition {
    use EngineInput as I;
    use EngineState as S;

    match (state, input) {
        (_, I::Load) => Transition::To(S::Loading),
        (_, I::Teardown) => Transition::To(S::Idle),
        (_, I::Aborted) => Transition::Ignore,

        (S::Loading, I::Ready) => Transition::To(S::Playing),
        (S::Loading | S::Playing, I::Pause) => Transition::To(S::Paused),
        (S::Loading | S::Playing, I::AutoplayRejected) => Transition::To(S::Blocked),
        (S::Loading | S::Playing, I::Fatal { can_downgrade: true }) => Transition::Downgrade,
        (S::Loading | S::Playing, I::Fatal { can_downgrade: false }) => {
            Transition::To(S::Failed)
        }

        _ => Transition::Ignore,
    }
}

// ============================================================================
// Signals
// ============================================================================

/// Identity of one playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Engine notifications for the orchestrator.
///
/// Entering `Failed` is reported as [`EngineSignal::Failed`] rather than
/// `StateChanged`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineSignal {
    StateChanged {
        session: SessionId,
        station_id: StationId,
        state: EngineState,
    },
    Buffering {
        session: SessionId,
        station_id: StationId,
        buffering: bool,
    },
    Downgraded {
        session: SessionId,
        station_id: StationId,
    },
    Failed {
        session: SessionId,
        station_id: StationId,
        message: String,
    },
}

impl EngineSignal {
    pub fn session(&self) -> SessionId {
        match self {
            EngineSignal::StateChanged { session, .. }
            | EngineSignal::Buffering { session, .. }
            | EngineSignal::Downgraded { session, .. }
            | EngineSignal::Failed { session, .. } => *session,
        }
    }
}

// ============================================================================
// Session
// ============================================================================

struct PlaybackSession {
    id: SessionId,
    station: Arc<StationRecord>,
    url: String,
    element: Arc<dyn MediaElement>,
    events: MediaEventSender,
    sink: StreamSink,
    downgraded: bool,
    fade_in: bool,
    fading: bool,
    driver: Option<JoinHandle<()>>,
    fade: Option<JoinHandle<()>>,
}

impl PlaybackSession {
    /// Stop, detach and clear. Consumes the session.
    fn release(self) {
        if let Some(driver) = self.driver {
            driver.abort();
        }
        if let Some(fade) = self.fade {
            fade.abort();
        }
        self.element.pause();
        self.sink.close();
        self.element.clear_source();
        debug!(session = %self.id, station_id = %self.station.id, "Playback session released");
    }
}

struct EngineCore {
    state: EngineState,
    buffering: bool,
    volume: f32,
    current: Option<SessionId>,
    session: Option<PlaybackSession>,
}

enum ErrorOutcome {
    Ignored,
    Blocked,
    Downgraded,
    Failed,
}

struct EngineInner {
    backend: Arc<dyn MediaBackend>,
    config: PlaybackConfig,
    core: Mutex<EngineCore>,
    signals: broadcast::Sender<EngineSignal>,
    events: EventBus,
}

impl EngineInner {
    fn signal(&self, signal: EngineSignal) {
        let _ = self.signals.send(signal);
    }

    fn publish(&self, event: PlaybackEvent) {
        let _ = self.events.emit(RadioEvent::Playback(event));
    }

    /// Record `state` and announce it. `Failed` is announced by the caller.
    fn enter(&self, core: &mut EngineCore, session: SessionId, station_id: &StationId, state: EngineState) {
        if core.state == state {
            return;
        }
        core.state = state;
        let id = station_id.to_string();
        match state {
            EngineState::Loading => self.publish(PlaybackEvent::Loading { station_id: id }),
            EngineState::Playing => self.publish(PlaybackEvent::Playing { station_id: id }),
            EngineState::Paused => self.publish(PlaybackEvent::Paused { station_id: id }),
            EngineState::Blocked => self.publish(PlaybackEvent::Blocked { station_id: id }),
            EngineState::Idle | EngineState::Failed => {}
        }
        if state != EngineState::Failed {
            self.signal(EngineSignal::StateChanged {
                session,
                station_id: station_id.clone(),
                state,
            });
        }
    }

    fn set_buffering(&self, core: &mut EngineCore, session: SessionId, station_id: &StationId, buffering: bool) {
        if core.buffering == buffering {
            return;
        }
        core.buffering = buffering;
        self.publish(PlaybackEvent::Buffering {
            station_id: station_id.to_string(),
            buffering,
        });
        self.signal(EngineSignal::Buffering {
            session,
            station_id: station_id.clone(),
            buffering,
        });
    }

    fn fail(&self, core: &mut EngineCore, session: SessionId, station_id: &StationId, error: &PlaybackError) {
        warn!(%session, %station_id, error = %error, "Playback failed");
        core.state = EngineState::Failed;
        core.buffering = false;
        let message = error.to_string();
        self.publish(PlaybackEvent::Failed {
            station_id: station_id.to_string(),
            message: message.clone(),
        });
        self.signal(EngineSignal::Failed {
            session,
            station_id: station_id.clone(),
            message,
        });
    }

    /// Whether the driver should call `play()` after the manifest parsed.
    fn awaiting_play(&self, session: SessionId) -> bool {
        let core = self.core.lock();
        core.current == Some(session) && core.state == EngineState::Loading
    }

    fn on_media_event(self: &Arc<Self>, session: SessionId, event: &MediaEvent) {
        let mut guard = self.core.lock();
        let core = &mut *guard;
        let Some(current) = core.session.as_ref().filter(|s| s.id == session) else {
            return;
        };
        let station_id = current.station.id.clone();

        match event {
            MediaEvent::Waiting | MediaEvent::Stalled => {
                self.set_buffering(core, session, &station_id, true);
            }
            MediaEvent::CanPlay | MediaEvent::Playing => {
                self.set_buffering(core, session, &station_id, false);
                if let Transition::To(EngineState::Playing) = transition(core.state, EngineInput::Ready) {
                    info!(%station_id, "Playback ready");
                    self.enter(core, session, &station_id, EngineState::Playing);
                    self.start_fade_in(core, session);
                }
            }
            _ => {}
        }
    }

    fn start_fade_in(self: &Arc<Self>, core: &mut EngineCore, session: SessionId) {
        let Some(current) = core.session.as_mut().filter(|s| s.id == session) else {
            return;
        };
        if !current.fade_in || current.fade.is_some() {
            return;
        }
        current.fading = true;
        current.fade = Some(tokio::spawn(fade_in(
            Arc::downgrade(self),
            session,
            Arc::clone(&current.element),
            self.config.fade_in_steps,
            self.config.fade_in_step(),
        )));
    }

    fn on_error(&self, session: SessionId, error: &MediaError) -> ErrorOutcome {
        let mut guard = self.core.lock();
        let core = &mut *guard;
        let Some(current) = core.session.as_mut().filter(|s| s.id == session) else {
            return ErrorOutcome::Ignored;
        };
        let station_id = current.station.id.clone();
        let classified = PlaybackError::from_media(station_id.as_str(), error);
        let input = match classified {
            PlaybackError::Aborted => EngineInput::Aborted,
            PlaybackError::AutoplayBlocked => EngineInput::AutoplayRejected,
            _ => EngineInput::Fatal {
                can_downgrade: !current.downgraded && current.sink.kind().downgrade().is_some(),
            },
        };

        match transition(core.state, input) {
            Transition::Ignore => {
                debug!(%station_id, error = %error, state = %core.state, "Ignoring media error");
                ErrorOutcome::Ignored
            }
            Transition::To(EngineState::Blocked) => {
                info!(%station_id, "Playback blocked until user interaction");
                self.enter(core, session, &station_id, EngineState::Blocked);
                ErrorOutcome::Blocked
            }
            Transition::Downgrade => {
                let from = current.sink.kind();
                current.sink.close();
                current.downgraded = true;
                match StreamSink::open(
                    SinkKind::Progressive,
                    self.backend.as_ref(),
                    ElementRole::Playback,
                    &current.element,
                    &current.url,
                    current.events.clone(),
                ) {
                    Ok(sink) => current.sink = sink,
                    Err(e) => {
                        self.fail(core, session, &station_id, &PlaybackError::from(e));
                        return ErrorOutcome::Failed;
                    }
                }
                info!(%station_id, ?from, error = %error, "Adaptive playback failed, retrying as progressive");
                self.publish(PlaybackEvent::Downgraded {
                    station_id: station_id.to_string(),
                });
                self.signal(EngineSignal::Downgraded {
                    session,
                    station_id: station_id.clone(),
                });
                self.enter(core, session, &station_id, EngineState::Loading);
                ErrorOutcome::Downgraded
            }
            Transition::To(_) => {
                self.fail(core, session, &station_id, &classified);
                ErrorOutcome::Failed
            }
        }
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        if let Some(session) = self.core.get_mut().session.take() {
            session.release();
        }
    }
}

// ============================================================================
// Session Driver
// ============================================================================

enum Flow {
    Continue,
    Retry,
    Stop,
}

struct SessionDriver {
    engine: Weak<EngineInner>,
    session: SessionId,
    element: Arc<dyn MediaElement>,
    play_requested: bool,
}

impl SessionDriver {
    async fn run(mut self, kind: SinkKind, mut events: MediaEventReceiver) {
        // A demuxed stream starts once its manifest is parsed.
        if kind != SinkKind::Demuxed && !self.play().await {
            return;
        }

        while let Some(event) = events.recv().await {
            let Some(engine) = self.engine.upgrade() else {
                return;
            };

            match event {
                MediaEvent::ManifestParsed { variants } => {
                    debug!(session = %self.session, variants, "Manifest parsed");
                    if !self.play_requested && engine.awaiting_play(self.session) {
                        drop(engine);
                        if !self.play().await {
                            return;
                        }
                    }
                }
                MediaEvent::Error(error) if !error.fatal => {
                    debug!(session = %self.session, error = %error, "Non-fatal media error");
                }
                MediaEvent::Error(error) => {
                    drop(engine);
                    match self.handle_error(&error) {
                        Flow::Continue => {}
                        Flow::Retry => {
                            if !self.play().await {
                                return;
                            }
                        }
                        Flow::Stop => return,
                    }
                }
                other => engine.on_media_event(self.session, &other),
            }
        }
    }

    /// Call `play()`, following downgrades. Returns `false` once the session
    /// is finished.
    async fn play(&mut self) -> bool {
        loop {
            self.play_requested = true;
            let Err(error) = self.element.play().await else {
                return true;
            };
            match self.handle_error(&error) {
                Flow::Continue => return true,
                Flow::Retry => continue,
                Flow::Stop => return false,
            }
        }
    }

    fn handle_error(&mut self, error: &MediaError) -> Flow {
        let Some(engine) = self.engine.upgrade() else {
            return Flow::Stop;
        };
        match engine.on_error(self.session, error) {
            ErrorOutcome::Ignored | ErrorOutcome::Blocked => Flow::Continue,
            ErrorOutcome::Downgraded => Flow::Retry,
            ErrorOutcome::Failed => Flow::Stop,
        }
    }
}

async fn fade_in(
    engine: Weak<EngineInner>,
    session: SessionId,
    element: Arc<dyn MediaElement>,
    steps: u32,
    step: Duration,
) {
    for i in 1..=steps {
        tokio::time::sleep(step).await;
        let Some(inner) = engine.upgrade() else {
            return;
        };
        let mut core = inner.core.lock();
        let target = core.volume;
        let Some(current) = core.session.as_mut().filter(|s| s.id == session) else {
            return;
        };
        element.set_volume(target * i as f32 / steps as f32);
        if i == steps {
            current.fading = false;
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

pub struct PlaybackEngine {
    inner: Arc<EngineInner>,
}

impl PlaybackEngine {
    pub fn new(backend: Arc<dyn MediaBackend>, config: PlaybackConfig, events: EventBus) -> Result<Self> {
        config.validate()?;
        let (signals, _) = broadcast::channel(SIGNAL_BUFFER_SIZE);
        Ok(Self {
            inner: Arc::new(EngineInner {
                backend,
                core: Mutex::new(EngineCore {
                    state: EngineState::Idle,
                    buffering: false,
                    volume: config.default_volume,
                    current: None,
                    session: None,
                }),
                config,
                signals,
                events,
            }),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineSignal> {
        self.inner.signals.subscribe()
    }

    pub fn state(&self) -> EngineState {
        self.inner.core.lock().state
    }

    /// Waiting or stalled without a state change.
    pub fn is_buffering(&self) -> bool {
        self.inner.core.lock().buffering
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.inner.core.lock().current
    }

    pub fn current_station(&self) -> Option<Arc<StationRecord>> {
        self.inner
            .core
            .lock()
            .session
            .as_ref()
            .map(|s| Arc::clone(&s.station))
    }

    pub fn sink_kind(&self) -> Option<SinkKind> {
        self.inner.core.lock().session.as_ref().map(|s| s.sink.kind())
    }

    pub fn is_downgraded(&self) -> bool {
        self.inner
            .core
            .lock()
            .session
            .as_ref()
            .is_some_and(|s| s.downgraded)
    }

    /// Target output volume.
    pub fn volume(&self) -> f32 {
        self.inner.core.lock().volume
    }

    /// Open `url` for `station`, replacing the current session.
    ///
    /// With `fade_in` the element starts muted and ramps to the target
    /// volume once ready. A host failure while opening is returned and also
    /// reported as [`EngineSignal::Failed`].
    pub fn load(&self, station: Arc<StationRecord>, url: &str, fade_in: bool) -> Result<SessionId> {
        let inner = &self.inner;
        let mut guard = inner.core.lock();
        let core = &mut *guard;

        if let Some(previous) = core.session.take() {
            previous.release();
        }

        let session = SessionId::new();
        core.current = Some(session);
        core.buffering = false;
        let station_id = station.id.clone();
        info!(%session, %station_id, url = %redact_url(url), "Loading station");

        let (tx, rx) = media_event_channel();
        let opened = inner
            .backend
            .create_element(ElementRole::Playback, tx.clone())
            .map_err(PlaybackError::from)
            .and_then(|element| {
                element.set_volume(if fade_in { 0.0 } else { core.volume });
                let kind = SinkKind::for_url(url, inner.backend.capabilities());
                match StreamSink::open(
                    kind,
                    inner.backend.as_ref(),
                    ElementRole::Playback,
                    &element,
                    url,
                    tx.clone(),
                ) {
                    Ok(sink) => Ok((element, sink)),
                    Err(e) => {
                        element.clear_source();
                        Err(e)
                    }
                }
            });

        let (element, sink) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                inner.enter(core, session, &station_id, EngineState::Loading);
                inner.fail(core, session, &station_id, &e);
                return Err(e);
            }
        };

        let kind = sink.kind();
        debug!(%session, ?kind, "Stream sink selected");
        let driver = SessionDriver {
            engine: Arc::downgrade(inner),
            session,
            element: Arc::clone(&element),
            play_requested: false,
        };

        core.session = Some(PlaybackSession {
            id: session,
            station,
            url: url.to_string(),
            element,
            events: tx,
            sink,
            downgraded: false,
            fade_in,
            fading: false,
            driver: Some(tokio::spawn(driver.run(kind, rx))),
            fade: None,
        });
        // Every new session announces `Loading`, even over a loading one.
        core.state = EngineState::Idle;
        inner.enter(core, session, &station_id, EngineState::Loading);
        Ok(session)
    }

    /// Pause the current session. Returns the resulting state.
    pub fn pause(&self) -> EngineState {
        let mut guard = self.inner.core.lock();
        let core = &mut *guard;
        let Some(current) = core.session.as_ref() else {
            return core.state;
        };
        if let Transition::To(state) = transition(core.state, EngineInput::Pause) {
            current.element.pause();
            let (session, station_id) = (current.id, current.station.id.clone());
            self.inner.enter(core, session, &station_id, state);
        }
        core.state
    }

    /// Set the target volume; a running fade-in picks it up on its next step.
    pub fn set_volume(&self, volume: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(PlaybackError::InvalidVolume(volume));
        }
        let mut core = self.inner.core.lock();
        core.volume = volume;
        if let Some(current) = core.session.as_ref().filter(|s| !s.fading) {
            current.element.set_volume(volume);
        }
        Ok(())
    }

    /// Release the session and return to `Idle`.
    pub fn teardown(&self) {
        let mut guard = self.inner.core.lock();
        let core = &mut *guard;
        let Some(previous) = core.session.take() else {
            core.state = EngineState::Idle;
            core.current = None;
            return;
        };
        let (session, station_id) = (previous.id, previous.station.id.clone());
        previous.release();
        core.current = None;
        core.buffering = false;
        self.inner.enter(core, session, &station_id, EngineState::Idle);
    }
}

impl fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.inner.core.lock();
        f.debug_struct("PlaybackEngine")
            .field("backend", &"MediaBackend { ... }")
            .field("state", &core.state)
            .field("session", &core.current)
            .field("volume", &core.volume)
            .finish()
    }
}
