//! Validator and failover behaviour on scripted hosts.

use bridge_traits::testing::{FakeMediaBackend, StreamScript};
use bridge_traits::MediaCapabilities;
use core_playback::{
    Epoch, FailoverController, SearchOutcome, StationRecord, StationSet, StreamValidator,
    Validation,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const TIMEOUT: Duration = Duration::from_millis(5000);

fn station(id: &str) -> StationRecord {
    StationRecord::new(id, id.to_uppercase(), format!("http://streams.test/{id}"))
}

fn url(id: &str) -> String {
    format!("http://streams.test/{id}")
}

fn setup(capabilities: MediaCapabilities) -> (FakeMediaBackend, Arc<StreamValidator>) {
    let backend = FakeMediaBackend::new(capabilities);
    let validator = Arc::new(StreamValidator::new(Arc::new(backend.clone()), TIMEOUT));
    (backend, validator)
}

#[tokio::test(start_paused = true)]
async fn validate_probes_each_station_once_per_epoch() {
    let (backend, validator) = setup(MediaCapabilities::progressive_only());
    backend.script(url("bad"), StreamScript::unreachable());
    let good = station("good");
    let bad = station("bad");

    for _ in 0..3 {
        assert_eq!(validator.validate(Epoch::default(), &good).await, Validation::Valid);
        assert_eq!(validator.validate(Epoch::default(), &bad).await, Validation::Invalid);
    }

    assert_eq!(backend.probe_count(&url("good")), 1);
    assert_eq!(backend.probe_count(&url("bad")), 1);
}

#[tokio::test(start_paused = true)]
async fn new_epoch_probes_again() {
    let (backend, validator) = setup(MediaCapabilities::progressive_only());
    let good = station("good");

    validator.validate(Epoch::default(), &good).await;
    validator.begin_epoch(Epoch::new(1));
    assert_eq!(validator.cached(&good.id), None);

    validator.validate(Epoch::new(1), &good).await;
    assert_eq!(backend.probe_count(&url("good")), 2);
}

#[tokio::test(start_paused = true)]
async fn unresponsive_probe_times_out_as_invalid() {
    let (backend, validator) = setup(MediaCapabilities::progressive_only());
    backend.script(url("mute"), StreamScript::silent());
    let mute = station("mute");

    let started = Instant::now();
    let outcome = validator.validate(Epoch::default(), &mute).await;

    assert_eq!(outcome, Validation::Invalid);
    assert_eq!(started.elapsed(), TIMEOUT);
    assert_eq!(validator.cached(&mute.id), Some(false));
    assert!(!validator.is_probing());

    // Cached: no second probe, no second wait.
    let again = Instant::now();
    assert_eq!(validator.validate(Epoch::default(), &mute).await, Validation::Invalid);
    assert_eq!(again.elapsed(), Duration::ZERO);
    assert_eq!(backend.total_probes(), 1);
}

#[tokio::test(start_paused = true)]
async fn adaptive_probe_uses_demuxer_and_fails_fatally() {
    let (backend, validator) = setup(MediaCapabilities::with_demuxer());
    let hls = StationRecord::new("hls", "HLS", "http://streams.test/live/master.m3u8");
    backend.script(hls.url.clone(), StreamScript::broken_manifest());

    assert_eq!(validator.validate(Epoch::default(), &hls).await, Validation::Invalid);
    assert_eq!(backend.live_demuxers(), 0);
}

#[tokio::test(start_paused = true)]
async fn resolved_url_is_probed_first() {
    let (backend, validator) = setup(MediaCapabilities::progressive_only());
    backend.script(url("primary"), StreamScript::unreachable());
    let record = StationRecord::new("r", "R", url("primary")).with_resolved_url(url("resolved"));

    assert_eq!(validator.validate(Epoch::default(), &record).await, Validation::Valid);
    assert_eq!(backend.probe_count(&url("resolved")), 1);
    assert_eq!(backend.probe_count(&url("primary")), 0);
}

#[tokio::test(start_paused = true)]
async fn search_lands_on_first_valid_candidate() {
    let (backend, validator) = setup(MediaCapabilities::progressive_only());
    backend.script(url("a"), StreamScript::unreachable());
    backend.script(url("c"), StreamScript::unreachable());
    let set = StationSet::new(
        Epoch::default(),
        vec![station("a"), station("b"), station("c")],
    );
    let controller = FailoverController::new(validator);

    assert_eq!(controller.find_valid_station(&set, 0).await, SearchOutcome::Found(1));
    assert_eq!(backend.probe_count(&url("c")), 0);
}

#[tokio::test(start_paused = true)]
async fn search_probes_at_most_n_and_terminates() {
    for n in 1..=6 {
        let (backend, validator) = setup(MediaCapabilities::progressive_only());
        backend.set_default_script(StreamScript::unreachable());
        let stations = (0..n).map(|i| station(&format!("s{i}"))).collect();
        let set = StationSet::new(Epoch::default(), stations);
        let controller = FailoverController::new(validator);

        assert_eq!(
            controller.find_valid_station(&set, n / 2).await,
            SearchOutcome::Exhausted
        );
        assert_eq!(backend.total_probes(), n);
    }
}

#[tokio::test(start_paused = true)]
async fn search_with_silent_candidates_is_bounded_by_timeouts() {
    let (backend, validator) = setup(MediaCapabilities::progressive_only());
    backend.set_default_script(StreamScript::silent());
    let set = StationSet::new(Epoch::default(), vec![station("a"), station("b")]);
    let controller = FailoverController::new(validator);

    let started = Instant::now();
    assert_eq!(controller.find_valid_station(&set, 0).await, SearchOutcome::Exhausted);
    assert_eq!(started.elapsed(), TIMEOUT * 2);
}

#[tokio::test(start_paused = true)]
async fn second_search_during_first_is_a_no_op() {
    let (backend, validator) = setup(MediaCapabilities::progressive_only());
    backend.set_default_script(StreamScript::silent());
    backend.script(url("b"), StreamScript::healthy());
    let set = StationSet::new(Epoch::default(), vec![station("a"), station("b")]);
    let controller = Arc::new(FailoverController::new(validator));

    let first = {
        let controller = Arc::clone(&controller);
        let set = set.clone();
        tokio::spawn(async move { controller.find_valid_station(&set, 0).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(controller.is_searching());

    assert_eq!(controller.find_valid_station(&set, 1).await, SearchOutcome::Busy);
    assert_eq!(first.await.unwrap(), SearchOutcome::Found(1));
    assert_eq!(backend.total_probes(), 2);
}

#[tokio::test(start_paused = true)]
async fn queued_search_waits_for_running_one() {
    let (backend, validator) = setup(MediaCapabilities::progressive_only());
    backend.set_default_script(StreamScript::silent());
    let old = StationSet::new(Epoch::default(), vec![station("a")]);
    let controller = Arc::new(FailoverController::new(Arc::clone(&validator)));

    let stale = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.find_valid_station(&old, 0).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    validator.begin_epoch(Epoch::new(1));
    backend.set_default_script(StreamScript::healthy());
    let fresh = StationSet::new(Epoch::new(1), vec![station("x"), station("y")]);

    assert_eq!(
        controller.find_valid_station_queued(&fresh, 0).await,
        SearchOutcome::Found(0)
    );
    // The stale probe finished but its verdict was not kept for the new epoch.
    assert_eq!(stale.await.unwrap(), SearchOutcome::Exhausted);
    assert_eq!(validator.cached(&"a".into()), None);
}
