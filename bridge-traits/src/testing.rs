//! Scripted host fakes.
//!
//! [`FakeMediaBackend`] plays the part of a browser media stack: every URL is
//! mapped to a [`StreamScript`] describing how its direct load, its manifest,
//! and `play()` behave. Events are delivered from spawned tokio tasks after
//! the scripted delay, so tests running on paused time see them in virtual
//! time order. The backend keeps a ledger of what the core did (probes
//! opened, sources assigned, demuxers alive) for assertions.

use crate::audio::{AudioOutput, RenderSource};
use crate::error::Result;
use crate::media::{
    AdaptiveDemuxer, ElementRole, MediaBackend, MediaCapabilities, MediaElement, MediaError,
    MediaErrorKind, MediaEvent, MediaEventSender, SourceHint,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const QUICK: Duration = Duration::from_millis(50);

/// Outcome of loading a URL directly into an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectBehavior {
    Ready { after: Duration },
    Fail { kind: MediaErrorKind, after: Duration },
    /// Never reports anything.
    Silent,
}

/// Outcome of handing a URL to a demuxer or to native adaptive playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestBehavior {
    Parsed { variants: usize, after: Duration },
    Fatal { kind: MediaErrorKind, after: Duration },
    Silent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayBehavior {
    Allow,
    RejectAutoplay,
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamScript {
    pub direct: DirectBehavior,
    pub manifest: ManifestBehavior,
    pub play: PlayBehavior,
    /// Direct behaviour seen by probe elements, when it differs.
    pub probe: Option<DirectBehavior>,
}

impl StreamScript {
    pub fn healthy() -> Self {
        Self {
            direct: DirectBehavior::Ready { after: QUICK },
            manifest: ManifestBehavior::Parsed {
                variants: 2,
                after: QUICK,
            },
            play: PlayBehavior::Allow,
            probe: None,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            direct: DirectBehavior::Fail {
                kind: MediaErrorKind::Network,
                after: QUICK,
            },
            manifest: ManifestBehavior::Fatal {
                kind: MediaErrorKind::Network,
                after: QUICK,
            },
            play: PlayBehavior::Allow,
            probe: None,
        }
    }

    pub fn silent() -> Self {
        Self {
            direct: DirectBehavior::Silent,
            manifest: ManifestBehavior::Silent,
            play: PlayBehavior::Allow,
            probe: None,
        }
    }

    /// Passes a direct probe, then fails once loaded for playback.
    pub fn fails_after_probe() -> Self {
        Self::unreachable().with_probe(DirectBehavior::Ready { after: QUICK })
    }

    /// Demuxer and native adaptive playback fail, the direct fallback works.
    pub fn broken_manifest() -> Self {
        Self::healthy().with_manifest(ManifestBehavior::Fatal {
            kind: MediaErrorKind::Demuxer,
            after: QUICK,
        })
    }

    pub fn with_direct(mut self, direct: DirectBehavior) -> Self {
        self.direct = direct;
        self
    }

    pub fn with_manifest(mut self, manifest: ManifestBehavior) -> Self {
        self.manifest = manifest;
        self
    }

    pub fn with_play(mut self, play: PlayBehavior) -> Self {
        self.play = play;
        self
    }

    pub fn with_probe(mut self, probe: DirectBehavior) -> Self {
        self.probe = Some(probe);
        self
    }
}

/// A source assignment observed by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceOpen {
    pub role: ElementRole,
    pub url: String,
    pub hint: SourceHint,
}

#[derive(Debug, Default)]
struct Ledger {
    opens: Vec<SourceOpen>,
    elements_created: HashMap<ElementRole, usize>,
    live_playback_sources: usize,
    max_live_playback_sources: usize,
    live_demuxers: usize,
    play_calls: usize,
    playback_volume: Option<f32>,
}

struct Shared {
    capabilities: MediaCapabilities,
    default_script: Mutex<StreamScript>,
    scripts: Mutex<HashMap<String, StreamScript>>,
    ledger: Mutex<Ledger>,
}

impl Shared {
    fn script_for(&self, url: &str) -> StreamScript {
        self.scripts
            .lock()
            .get(url)
            .cloned()
            .unwrap_or_else(|| self.default_script.lock().clone())
    }
}

/// In-memory [`MediaBackend`] driven by per-URL scripts.
#[derive(Clone)]
pub struct FakeMediaBackend {
    shared: Arc<Shared>,
}

impl FakeMediaBackend {
    pub fn new(capabilities: MediaCapabilities) -> Self {
        Self {
            shared: Arc::new(Shared {
                capabilities,
                default_script: Mutex::new(StreamScript::healthy()),
                scripts: Mutex::new(HashMap::new()),
                ledger: Mutex::new(Ledger::default()),
            }),
        }
    }

    /// Script used for URLs without an explicit entry.
    pub fn set_default_script(&self, script: StreamScript) {
        *self.shared.default_script.lock() = script;
    }

    pub fn script(&self, url: impl Into<String>, script: StreamScript) {
        self.shared.scripts.lock().insert(url.into(), script);
    }

    /// Number of probe elements that had `url` assigned.
    pub fn probe_count(&self, url: &str) -> usize {
        self.shared
            .ledger
            .lock()
            .opens
            .iter()
            .filter(|open| open.role == ElementRole::Probe && open.url == url)
            .count()
    }

    pub fn total_probes(&self) -> usize {
        self.elements_created(ElementRole::Probe)
    }

    pub fn elements_created(&self, role: ElementRole) -> usize {
        self.shared
            .ledger
            .lock()
            .elements_created
            .get(&role)
            .copied()
            .unwrap_or(0)
    }

    /// Every source assigned to a playback element, in order.
    pub fn playback_opens(&self) -> Vec<(String, SourceHint)> {
        self.shared
            .ledger
            .lock()
            .opens
            .iter()
            .filter(|open| open.role == ElementRole::Playback)
            .map(|open| (open.url.clone(), open.hint))
            .collect()
    }

    pub fn live_playback_sources(&self) -> usize {
        self.shared.ledger.lock().live_playback_sources
    }

    pub fn max_live_playback_sources(&self) -> usize {
        self.shared.ledger.lock().max_live_playback_sources
    }

    pub fn live_demuxers(&self) -> usize {
        self.shared.ledger.lock().live_demuxers
    }

    pub fn play_calls(&self) -> usize {
        self.shared.ledger.lock().play_calls
    }

    /// Last volume written to a playback element.
    pub fn playback_volume(&self) -> Option<f32> {
        self.shared.ledger.lock().playback_volume
    }
}

impl MediaBackend for FakeMediaBackend {
    fn capabilities(&self) -> MediaCapabilities {
        self.shared.capabilities
    }

    fn create_element(
        &self,
        role: ElementRole,
        events: MediaEventSender,
    ) -> Result<Arc<dyn MediaElement>> {
        *self
            .shared
            .ledger
            .lock()
            .elements_created
            .entry(role)
            .or_default() += 1;

        Ok(Arc::new(FakeElement {
            role,
            events,
            shared: Arc::clone(&self.shared),
            source: Mutex::new(None),
            volume: Mutex::new(1.0),
        }))
    }

    fn create_demuxer(
        &self,
        _role: ElementRole,
        events: MediaEventSender,
    ) -> Result<Box<dyn AdaptiveDemuxer>> {
        self.shared.ledger.lock().live_demuxers += 1;
        Ok(Box::new(FakeDemuxer {
            events,
            shared: Arc::clone(&self.shared),
            url: Mutex::new(None),
            destroyed: Arc::new(AtomicBool::new(false)),
        }))
    }
}

struct FakeElement {
    role: ElementRole,
    events: MediaEventSender,
    shared: Arc<Shared>,
    source: Mutex<Option<(String, SourceHint)>>,
    volume: Mutex<f32>,
}

impl FakeElement {
    fn direct_behavior(&self, script: &StreamScript) -> DirectBehavior {
        match (&script.probe, self.role) {
            (Some(probe), ElementRole::Probe) => probe.clone(),
            _ => script.direct.clone(),
        }
    }

    fn emit_later(&self, event: MediaEvent, after: Duration) {
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = events.send(event);
        });
    }
}

#[async_trait::async_trait]
impl MediaElement for FakeElement {
    fn set_source(&self, url: &str, hint: SourceHint) {
        let mut ledger = self.shared.ledger.lock();
        ledger.opens.push(SourceOpen {
            role: self.role,
            url: url.to_string(),
            hint,
        });

        let mut source = self.source.lock();
        if source.is_none() && self.role == ElementRole::Playback {
            ledger.live_playback_sources += 1;
            ledger.max_live_playback_sources = ledger
                .max_live_playback_sources
                .max(ledger.live_playback_sources);
        }
        *source = Some((url.to_string(), hint));
    }

    fn load(&self) {
        let Some((url, hint)) = self.source.lock().clone() else {
            return;
        };
        let _ = self.events.send(MediaEvent::LoadStart);

        let script = self.shared.script_for(&url);
        match hint {
            SourceHint::Attached => {}
            SourceHint::NativeAdaptive => match script.manifest {
                ManifestBehavior::Parsed { after, .. } => self.emit_later(MediaEvent::CanPlay, after),
                ManifestBehavior::Fatal { kind, after } => self.emit_later(
                    MediaEvent::Error(MediaError::new(kind, "native adaptive playback failed")),
                    after,
                ),
                ManifestBehavior::Silent => {}
            },
            SourceHint::Progressive => match self.direct_behavior(&script) {
                DirectBehavior::Ready { after } => self.emit_later(MediaEvent::CanPlay, after),
                DirectBehavior::Fail { kind, after } => self.emit_later(
                    MediaEvent::Error(MediaError::new(kind, "direct load failed")),
                    after,
                ),
                DirectBehavior::Silent => {}
            },
        }
    }

    async fn play(&self) -> std::result::Result<(), MediaError> {
        self.shared.ledger.lock().play_calls += 1;
        let Some((url, _)) = self.source.lock().clone() else {
            return Err(MediaError::new(
                MediaErrorKind::SourceNotSupported,
                "no source assigned",
            ));
        };

        match self.shared.script_for(&url).play {
            PlayBehavior::Allow => Ok(()),
            PlayBehavior::RejectAutoplay => Err(MediaError::new(
                MediaErrorKind::AutoplayBlocked,
                "play() requires a user gesture",
            )),
            PlayBehavior::Abort => Err(MediaError::new(
                MediaErrorKind::Aborted,
                "play() interrupted by a new load request",
            )),
        }
    }

    fn pause(&self) {
        if self.source.lock().is_some() {
            let _ = self.events.send(MediaEvent::Paused);
        }
    }

    fn set_volume(&self, volume: f32) {
        *self.volume.lock() = volume;
        if self.role == ElementRole::Playback {
            self.shared.ledger.lock().playback_volume = Some(volume);
        }
    }

    fn volume(&self) -> f32 {
        *self.volume.lock()
    }

    fn clear_source(&self) {
        if self.source.lock().take().is_some() && self.role == ElementRole::Playback {
            let mut ledger = self.shared.ledger.lock();
            ledger.live_playback_sources = ledger.live_playback_sources.saturating_sub(1);
        }
    }
}

struct FakeDemuxer {
    events: MediaEventSender,
    shared: Arc<Shared>,
    url: Mutex<Option<String>>,
    destroyed: Arc<AtomicBool>,
}

impl AdaptiveDemuxer for FakeDemuxer {
    fn load_source(&self, url: &str) {
        *self.url.lock() = Some(url.to_string());
    }

    fn attach(&self, element: Arc<dyn MediaElement>) {
        let Some(url) = self.url.lock().clone() else {
            return;
        };
        element.set_source(&url, SourceHint::Attached);

        let events: Vec<MediaEvent>;
        let after;
        match self.shared.script_for(&url).manifest {
            ManifestBehavior::Parsed {
                variants,
                after: delay,
            } => {
                events = vec![MediaEvent::ManifestParsed { variants }, MediaEvent::CanPlay];
                after = delay;
            }
            ManifestBehavior::Fatal { kind, after: delay } => {
                events = vec![MediaEvent::Error(MediaError::new(
                    kind,
                    "manifest load failed",
                ))];
                after = delay;
            }
            ManifestBehavior::Silent => return,
        }

        let sender = self.events.clone();
        let destroyed = Arc::clone(&self.destroyed);
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            for event in events {
                if destroyed.load(Ordering::SeqCst) {
                    return;
                }
                let _ = sender.send(event);
            }
        });
    }

    fn detach(&self) {}

    fn destroy(&self) {
        if !self.destroyed.swap(true, Ordering::SeqCst) {
            let mut ledger = self.shared.ledger.lock();
            ledger.live_demuxers = ledger.live_demuxers.saturating_sub(1);
        }
    }
}

/// Output that accepts a source but only renders when the test asks it to.
#[derive(Default)]
pub struct ManualAudioOutput {
    sample_rate: u32,
    source: Mutex<Option<Arc<dyn RenderSource>>>,
    connects: AtomicUsize,
}

impl ManualAudioOutput {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    /// Pull `frames` frames from the connected source (silence when none).
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames];
        if let Some(source) = self.source.lock().as_ref() {
            source.render(&mut out);
        }
        out
    }

    pub fn is_connected(&self) -> bool {
        self.source.lock().is_some()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl AudioOutput for ManualAudioOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn connect(&self, source: Arc<dyn RenderSource>) -> Result<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        *self.source.lock() = Some(source);
        Ok(())
    }

    fn disconnect(&self) {
        self.source.lock().take();
    }
}

/// Output that accepts a source and never renders it.
#[derive(Debug, Clone, Copy)]
pub struct NullAudioOutput {
    pub sample_rate: u32,
}

impl Default for NullAudioOutput {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
        }
    }
}

impl AudioOutput for NullAudioOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn connect(&self, _source: Arc<dyn RenderSource>) -> Result<()> {
        Ok(())
    }

    fn disconnect(&self) {}
}
