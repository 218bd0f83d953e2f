//! Radio player orchestration.
//!
//! The navigation cursor, the current candidate set and the user-facing error
//! live here; everything else is delegated. Engine signals are consumed by a
//! pump task holding only a weak reference, so dropping the player stops it.
//!
//! Guards, one per concern:
//! - navigation in flight (`next`/`previous`/`select_station`), here
//! - search in flight, in [`FailoverController`]
//! - probe in flight, in [`StreamValidator`]
//! - auto-skip pending, in [`AutoSkipWatchdog`]

use crate::error::{Result, ServiceError};
use crate::status::PlayerStatus;
use core_playback::{
    AutoSkipWatchdog, EngineSignal, EngineState, Epoch, FailoverController, PlaybackConfig,
    PlaybackEngine, PlaybackError, SearchOutcome, SessionId, StationId, StationRecord, StationSet,
    StreamValidator, WatchdogDecision,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{
    EventBus, NavigationEvent, RadioEvent, Receiver, RecvError, WatchdogEvent,
};
use core_tuning::{StartOptions, TuningConfig, TuningSynthesizer};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NavTarget {
    Next,
    Previous,
    Index(usize),
}

#[derive(Debug, Default)]
struct Navigation {
    stations: StationSet,
    cursor: usize,
    last_error: Option<String>,
    /// Between the start of a navigation and the engine taking over.
    searching: bool,
}

struct NavigationGuard<'a>(&'a AtomicBool);

impl<'a> NavigationGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| NavigationGuard(flag))
    }
}

impl Drop for NavigationGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct PlayerInner {
    config: CoreConfig,
    playback: PlaybackConfig,
    events: EventBus,
    validator: Arc<StreamValidator>,
    failover: FailoverController,
    engine: PlaybackEngine,
    watchdog: AutoSkipWatchdog,
    tuning: Option<TuningSynthesizer>,
    nav: Mutex<Navigation>,
    navigating: AtomicBool,
    /// Bumped whenever a scheduled auto-skip must not fire.
    skip_generation: AtomicU64,
}

/// The radio core as seen by a UI.
///
/// Must be created inside a tokio runtime.
pub struct RadioPlayer {
    inner: Arc<PlayerInner>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl RadioPlayer {
    pub fn new(config: CoreConfig, playback: PlaybackConfig, tuning: TuningConfig) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            ServiceError::InitializationFailed(
                "RadioPlayer must be created inside a tokio runtime".to_string(),
            )
        })?;

        config.validate()?;
        playback.validate()?;

        let events = EventBus::new(config.event_buffer_size);
        let backend = Arc::clone(&config.media_backend);
        let validator = Arc::new(StreamValidator::new(
            Arc::clone(&backend),
            playback.probe_timeout,
        ));
        let engine = PlaybackEngine::new(backend, playback.clone(), events.clone())?;

        let tuning = if config.features.tuning_effect {
            let output = config.audio_output.clone().ok_or_else(|| {
                ServiceError::CapabilityMissing {
                    capability: "AudioOutput".to_string(),
                    message: "The tuning effect needs an audio output".to_string(),
                }
            })?;
            Some(TuningSynthesizer::new(output, tuning)?.with_event_bus(events.clone()))
        } else {
            None
        };

        let signals = engine.subscribe();
        let inner = Arc::new(PlayerInner {
            failover: FailoverController::new(Arc::clone(&validator)),
            watchdog: AutoSkipWatchdog::new(
                playback.max_auto_skip_attempts,
                playback.auto_skip_delay,
            ),
            validator,
            engine,
            tuning,
            events,
            playback,
            config,
            nav: Mutex::new(Navigation::default()),
            navigating: AtomicBool::new(false),
            skip_generation: AtomicU64::new(0),
        });

        let pump = runtime.spawn(pump_signals(Arc::downgrade(&inner), signals));
        info!(
            tuning_effect = inner.tuning.is_some(),
            "Radio player initialized"
        );

        Ok(Self {
            inner,
            pump: Mutex::new(Some(pump)),
        })
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn subscribe(&self) -> Receiver<RadioEvent> {
        self.inner.events.subscribe()
    }

    /// Replace the candidate set and pick its first playable station.
    ///
    /// An identical id list is a no-op. Returns the selected index, or `None`
    /// when the set is empty or nothing validated (the latter also sets
    /// `last_error`). With autoplay enabled the winner starts after
    /// `initial_selection_delay`.
    #[instrument(skip(self, stations), fields(count = stations.len()))]
    pub async fn replace_stations(&self, stations: Vec<StationRecord>) -> Result<Option<usize>> {
        self.inner.replace_stations(stations).await
    }

    #[instrument(skip(self))]
    pub async fn next(&self) -> Result<Option<usize>> {
        self.inner.navigate(NavTarget::Next).await
    }

    #[instrument(skip(self))]
    pub async fn previous(&self) -> Result<Option<usize>> {
        self.inner.navigate(NavTarget::Previous).await
    }

    /// Search for a playable station starting at `id`.
    #[instrument(skip(self), fields(station_id = %id))]
    pub async fn select_station(&self, id: &StationId) -> Result<Option<usize>> {
        let index = self
            .inner
            .nav
            .lock()
            .stations
            .index_of(id)
            .ok_or_else(|| PlaybackError::StationNotFound(id.to_string()))?;
        self.inner.navigate(NavTarget::Index(index)).await
    }

    /// Load the station under the cursor. Also the way out of `Blocked`.
    pub async fn play(&self) -> Result<()> {
        self.inner.play().await
    }

    pub fn pause(&self) {
        self.inner.engine.pause();
        self.inner.fade_out_tuning();
    }

    pub async fn toggle_play_pause(&self) -> Result<()> {
        match self.inner.engine.state() {
            EngineState::Playing | EngineState::Loading => {
                self.pause();
                Ok(())
            }
            _ => self.play().await,
        }
    }

    pub fn set_volume(&self, volume: f32) -> Result<()> {
        self.inner.engine.set_volume(volume)?;
        Ok(())
    }

    pub fn status(&self) -> PlayerStatus {
        let inner = &self.inner;
        let nav = inner.nav.lock();
        let station = nav.stations.get(nav.cursor);
        let state = inner.engine.state();

        PlayerStatus {
            current_index: nav.cursor,
            station_id: station.map(|s| s.id.clone()),
            station_name: station.map(|s| s.name.clone()),
            state,
            is_playing: state == EngineState::Playing,
            is_loading: nav.searching
                || state == EngineState::Loading
                || inner.engine.is_buffering(),
            is_validating: inner.failover.is_searching(),
            last_error: nav.last_error.clone(),
            auto_skip_attempts: inner.watchdog.attempts(),
            auto_skip_halted: inner.watchdog.is_halted(),
            candidate_count: nav.stations.len(),
            epoch: nav.stations.epoch(),
        }
    }

    /// Tear everything down: signal pump, playback session, tuning graph.
    pub fn shutdown(&self) {
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
            self.inner.engine.teardown();
            if let Some(tuning) = &self.inner.tuning {
                tuning.shutdown();
            }
            info!("Radio player shut down");
        }
    }
}

impl Drop for RadioPlayer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for RadioPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RadioPlayer")
            .field("config", &self.inner.config)
            .field("engine", &self.inner.engine)
            .field("navigation", &*self.inner.nav.lock())
            .finish()
    }
}

// ============================================================================
// Orchestration
// ============================================================================

impl PlayerInner {
    fn emit(&self, event: RadioEvent) {
        let _ = self.events.emit(event);
    }

    /// Point the cursor at `index` unless the set moved on.
    fn select_index(&self, epoch: Epoch, index: usize) -> bool {
        let mut nav = self.nav.lock();
        if nav.stations.epoch() != epoch {
            return false;
        }
        nav.cursor = index;
        let station_id = nav
            .stations
            .get(index)
            .map(|s| s.id.to_string())
            .unwrap_or_default();
        drop(nav);

        self.emit(RadioEvent::Navigation(NavigationEvent::StationSelected {
            index,
            station_id,
        }));
        true
    }

    fn surface_error(&self, epoch: Epoch, error: &PlaybackError) {
        let mut nav = self.nav.lock();
        if nav.stations.epoch() == epoch {
            nav.last_error = Some(error.to_string());
            nav.searching = false;
        }
    }

    async fn replace_stations(self: &Arc<Self>, stations: Vec<StationRecord>) -> Result<Option<usize>> {
        let set = {
            let mut nav = self.nav.lock();
            if nav.stations.same_ids(&stations) {
                debug!("Candidate set unchanged");
                return Ok((!nav.stations.is_empty()).then_some(nav.cursor));
            }
            let set = StationSet::new(nav.stations.epoch().next(), stations);
            *nav = Navigation {
                stations: set.clone(),
                ..Navigation::default()
            };
            self.validator.begin_epoch(set.epoch());
            set
        };
        let epoch = set.epoch();
        self.skip_generation.fetch_add(1, Ordering::AcqRel);
        self.watchdog.reset();
        info!(%epoch, count = set.len(), "Candidate set replaced");
        self.emit(RadioEvent::Navigation(NavigationEvent::CandidatesReplaced {
            epoch: epoch.value(),
            count: set.len(),
        }));
        self.emit(RadioEvent::Watchdog(WatchdogEvent::Reset));

        if set.is_empty() {
            return Ok(None);
        }

        self.emit(RadioEvent::Navigation(NavigationEvent::SearchStarted {
            start_index: 0,
        }));
        match self.failover.find_valid_station_queued(&set, 0).await {
            SearchOutcome::Found(index) => {
                if !self.select_index(epoch, index) {
                    return Ok(None);
                }
                if self.config.features.autoplay_on_new_stations {
                    let inner = Arc::clone(self);
                    tokio::spawn(async move { inner.autoplay(epoch, index).await });
                }
                Ok(Some(index))
            }
            SearchOutcome::Exhausted => {
                let error = PlaybackError::exhausted_in_region();
                self.surface_error(epoch, &error);
                self.emit(RadioEvent::Navigation(NavigationEvent::Exhausted {
                    message: error.to_string(),
                }));
                Ok(None)
            }
            SearchOutcome::Busy | SearchOutcome::Superseded => Ok(None),
        }
    }

    async fn autoplay(self: Arc<Self>, epoch: Epoch, index: usize) {
        tokio::time::sleep(self.playback.initial_selection_delay).await;
        {
            let nav = self.nav.lock();
            if nav.stations.epoch() != epoch || nav.cursor != index {
                return;
            }
        }
        if let Err(e) = self.start_playback(index).await {
            debug!(error = %e, "Autoplay did not start");
        }
    }

    async fn navigate(self: &Arc<Self>, target: NavTarget) -> Result<Option<usize>> {
        let Some(_guard) = NavigationGuard::acquire(&self.navigating) else {
            debug!(?target, "Navigation already in progress");
            return Ok(None);
        };
        self.cancel_pending_skip();

        let (set, start) = {
            let mut nav = self.nav.lock();
            if nav.stations.is_empty() {
                return Ok(None);
            }
            let start = match target {
                NavTarget::Next => nav.stations.wrap_next(nav.cursor),
                NavTarget::Previous => nav.stations.wrap_prev(nav.cursor),
                NavTarget::Index(index) => index,
            };
            nav.last_error = None;
            nav.searching = true;
            (nav.stations.clone(), start)
        };

        self.engine.pause();
        self.restart_tuning();
        self.emit(RadioEvent::Navigation(NavigationEvent::SearchStarted {
            start_index: start,
        }));

        match self.failover.find_valid_station(&set, start).await {
            SearchOutcome::Found(index) => {
                if !self.select_index(set.epoch(), index) {
                    return Ok(None);
                }
                self.start_playback(index).await?;
                Ok(Some(index))
            }
            SearchOutcome::Exhausted => {
                let error = PlaybackError::exhausted();
                self.surface_error(set.epoch(), &error);
                self.emit(RadioEvent::Navigation(NavigationEvent::Exhausted {
                    message: error.to_string(),
                }));
                self.fade_out_tuning();
                Err(error.into())
            }
            SearchOutcome::Busy | SearchOutcome::Superseded => {
                self.nav.lock().searching = false;
                self.fade_out_tuning();
                Ok(None)
            }
        }
    }

    async fn play(self: &Arc<Self>) -> Result<()> {
        let index = {
            let mut nav = self.nav.lock();
            if nav.stations.is_empty() {
                return Ok(());
            }
            nav.last_error = None;
            nav.cursor
        };
        self.cancel_pending_skip();
        self.start_playback(index).await.map(|_| ())
    }

    /// Resolve the URL of the station at `index` and hand it to the engine.
    ///
    /// Returns `None` when the candidate set changed while resolving.
    async fn start_playback(self: &Arc<Self>, index: usize) -> Result<Option<SessionId>> {
        let (station, epoch) = {
            let nav = self.nav.lock();
            let station = nav
                .stations
                .get(index)
                .cloned()
                .ok_or_else(|| PlaybackError::StationNotFound(index.to_string()))?;
            (station, nav.stations.epoch())
        };

        self.ensure_tuning();
        let url = self.resolve_url(&station).await;
        if self.nav.lock().stations.epoch() != epoch {
            debug!(station_id = %station.id, "Candidate set replaced while resolving");
            return Ok(None);
        }

        let Some(url) = url else {
            let error = PlaybackError::NoStreamUrl(station.id.to_string());
            warn!(station_id = %station.id, "Station has no playable URL");
            self.engine.teardown();
            self.nav.lock().searching = false;
            self.on_playback_failure();
            return Err(error.into());
        };

        self.register_click(&station);
        let fade_in = self.tuning.as_ref().is_some_and(|t| t.is_active());
        self.nav.lock().searching = false;
        let session = self.engine.load(station, &url, fade_in)?;
        Ok(Some(session))
    }

    async fn resolve_url(&self, station: &StationRecord) -> Option<String> {
        if let Some(url) = station.stream_url() {
            return Some(url.to_string());
        }
        let directory = self.config.station_directory.as_ref()?;

        match directory.resolve_stream_url(station.id.as_str()).await {
            Ok(Some(url)) if !url.trim().is_empty() => {
                debug!(station_id = %station.id, "Stream URL resolved through directory");
                Some(url.trim().to_string())
            }
            Ok(_) => None,
            Err(e) => {
                warn!(station_id = %station.id, error = %e, "Stream URL lookup failed");
                None
            }
        }
    }

    fn register_click(&self, station: &StationRecord) {
        if !self.config.features.register_clicks {
            return;
        }
        let Some(directory) = self.config.station_directory.clone() else {
            return;
        };
        let station_id = station.id.clone();
        tokio::spawn(async move {
            if let Err(e) = directory.register_click(station_id.as_str()).await {
                warn!(%station_id, error = %e, "Click registration failed");
            }
        });
    }

    // ------------------------------------------------------------------------
    // Tuning effect
    // ------------------------------------------------------------------------

    /// Fresh effect at the start of a navigation or an auto-skip.
    fn restart_tuning(&self) {
        if let Some(tuning) = &self.tuning {
            if let Err(e) = tuning.start(StartOptions::default()) {
                warn!(error = %e, "Tuning effect failed to start");
            }
        }
    }

    fn ensure_tuning(&self) {
        if self.tuning.as_ref().is_some_and(|t| !t.is_active()) {
            self.restart_tuning();
        }
    }

    fn fade_out_tuning(self: &Arc<Self>) {
        if !self.tuning.as_ref().is_some_and(|t| t.is_active()) {
            return;
        }
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            if let Some(tuning) = &inner.tuning {
                tuning.stop_default().await;
            }
        });
    }

    // ------------------------------------------------------------------------
    // Engine signals and auto-skip
    // ------------------------------------------------------------------------

    fn on_signal(self: &Arc<Self>, signal: EngineSignal) {
        match signal {
            EngineSignal::StateChanged {
                state: EngineState::Playing,
                ..
            } => {
                self.watchdog.on_playing();
                self.nav.lock().searching = false;
                self.fade_out_tuning();
            }
            EngineSignal::StateChanged {
                state: EngineState::Blocked,
                ..
            } => {
                self.nav.lock().searching = false;
                self.fade_out_tuning();
            }
            EngineSignal::Failed { station_id, .. } => {
                debug!(%station_id, "Playback failure reported");
                self.nav.lock().searching = false;
                self.on_playback_failure();
            }
            EngineSignal::StateChanged { .. }
            | EngineSignal::Buffering { .. }
            | EngineSignal::Downgraded { .. } => {}
        }
    }

    fn on_playback_failure(self: &Arc<Self>) {
        let (candidates, epoch) = {
            let nav = self.nav.lock();
            (nav.stations.len(), nav.stations.epoch())
        };

        match self.watchdog.on_failure(candidates) {
            WatchdogDecision::Ignore => {}
            WatchdogDecision::Halt { attempts } => {
                let error = PlaybackError::WatchdogLimitExceeded { attempts };
                self.surface_error(epoch, &error);
                self.emit(RadioEvent::Watchdog(WatchdogEvent::Halted {
                    attempts,
                    message: error.to_string(),
                }));
                self.fade_out_tuning();
            }
            WatchdogDecision::Skip { attempt, delay } => {
                info!(attempt, delay_ms = delay.as_millis() as u64, "Auto-skipping failed station");
                self.emit(RadioEvent::Watchdog(WatchdogEvent::SkipScheduled {
                    attempt,
                    delay_ms: delay.as_millis() as u64,
                }));
                self.restart_tuning();
                let token = self.skip_generation.load(Ordering::Acquire);
                let inner = Arc::clone(self);
                tokio::spawn(async move { inner.auto_skip(epoch, token, delay).await });
            }
        }
    }

    /// Invalidate any auto-skip that is still waiting out its delay.
    fn cancel_pending_skip(&self) {
        self.skip_generation.fetch_add(1, Ordering::AcqRel);
        self.watchdog.skip_completed();
    }

    async fn auto_skip(self: Arc<Self>, epoch: Epoch, token: u64, delay: Duration) {
        tokio::time::sleep(delay).await;

        let target = {
            let mut nav = self.nav.lock();
            if nav.stations.epoch() != epoch
                || self.skip_generation.load(Ordering::Acquire) != token
            {
                debug!(%epoch, "Scheduled auto-skip superseded");
                return;
            }
            let cursor = nav.stations.wrap_next(nav.cursor);
            nav.cursor = cursor;
            nav.stations.get(cursor).cloned().map(|s| (cursor, s))
        };
        self.watchdog.skip_completed();
        let Some((index, station)) = target else {
            return;
        };

        self.emit(RadioEvent::Navigation(NavigationEvent::StationSelected {
            index,
            station_id: station.id.to_string(),
        }));
        if self.validator.cached(&station.id) == Some(false) {
            debug!(index, station_id = %station.id, "Skipping station already known to be invalid");
            self.on_playback_failure();
            return;
        }

        if let Err(e) = self.start_playback(index).await {
            debug!(error = %e, "Auto-skip load failed");
        }
    }
}

async fn pump_signals(inner: Weak<PlayerInner>, mut signals: broadcast::Receiver<EngineSignal>) {
    loop {
        let signal = match signals.recv().await {
            Ok(signal) => signal,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Engine signal pump lagged");
                continue;
            }
            Err(RecvError::Closed) => return,
        };
        let Some(player) = inner.upgrade() else {
            return;
        };
        // Signals from a session that has since been replaced are stale.
        if player.engine.session_id() != Some(signal.session()) {
            continue;
        }
        player.on_signal(signal);
    }
}
