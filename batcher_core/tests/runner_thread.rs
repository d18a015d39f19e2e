//! The runner thread end to end, against the offline link and no feed.

use batcher_core::mocks::{NoFeed, OfflineLink};
use batcher_core::{
    BatchConfig, Moisture, PerMaterial, Phase, PlantEvent, PlantRunner, ProductionSnapshot,
    RelayMap, RunnerOptions, SequencerCfg, StabilizerCfg,
};
use batcher_traits::MonotonicClock;
use batcher_traits::clock::test_clock::ManualClock;
use std::time::{Duration, Instant};

fn order(mixing_secs: u64) -> BatchConfig {
    BatchConfig {
        targets: PerMaterial {
            pasir: 600.0,
            batu: 900.0,
            semen: 300.0,
            air: 150.0,
        },
        additive_kg: 0.0,
        silos: vec![1],
        sand_bins: vec![],
        stone_bins: vec![],
        mixing_secs,
        mixings: 1,
        moisture: Moisture::default(),
    }
}

fn wait_for(
    runner: &PlantRunner,
    what: &str,
    pred: impl Fn(&ProductionSnapshot) -> bool,
) -> ProductionSnapshot {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let snap = runner.snapshot();
        if pred(&snap) {
            return snap;
        }
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn accelerated_batch_runs_to_completion() {
    // Every 50 ms tick of the manual clock is one plant second
    let opts = RunnerOptions {
        tick: Duration::from_millis(50),
        time_scale: 20,
    };
    let runner = PlantRunner::spawn(
        SequencerCfg::default(),
        RelayMap::standard(),
        StabilizerCfg::default(),
        OfflineLink,
        NoFeed,
        ManualClock::new(),
        opts,
    );
    runner.start(order(10)).unwrap();

    let mut phases = Vec::new();
    let report = loop {
        match runner.events().recv_timeout(Duration::from_secs(10)) {
            Ok(PlantEvent::Phase { phase, .. }) => phases.push(phase),
            Ok(PlantEvent::Completed(r)) => break r,
            Ok(_) => {}
            Err(e) => panic!("no completion event: {e}"),
        }
    };
    assert_eq!(
        phases,
        vec![
            Phase::Weighing,
            Phase::Discharging,
            Phase::Mixing,
            Phase::DoorCycle,
            Phase::Complete
        ]
    );
    assert_eq!(report.mixings, 1);
    assert!((report.final_weights.semen - 300.0).abs() < 1e-9);
    assert!(report.ended_ms > report.started_ms);

    wait_for(&runner, "idle", |s| s.phase == Phase::Idle);
}

#[test]
fn start_is_rejected_while_busy_and_stop_leaves_plant_dark() {
    let runner = PlantRunner::spawn(
        SequencerCfg::default(),
        RelayMap::standard(),
        StabilizerCfg::default(),
        OfflineLink,
        NoFeed,
        MonotonicClock::new(),
        RunnerOptions::default(),
    );
    runner.start(order(600)).unwrap();
    let snap = wait_for(&runner, "weighing", ProductionSnapshot::is_producing);
    assert_eq!(snap.mixing, 1);
    assert!(!snap.connected);

    let err = runner.start(order(10)).unwrap_err();
    assert!(err.to_string().contains("in progress"), "{err}");

    runner.stop().unwrap();
    let snap = wait_for(&runner, "stop", |s| s.phase == Phase::Idle);
    assert!(!snap.components.any_on());
}

#[test]
fn malformed_order_is_rejected_before_reaching_the_thread() {
    let runner = PlantRunner::spawn(
        SequencerCfg::default(),
        RelayMap::standard(),
        StabilizerCfg::default(),
        OfflineLink,
        NoFeed,
        ManualClock::new(),
        RunnerOptions::default(),
    );
    let mut b = order(10);
    b.mixings = 0;
    assert!(runner.start(b).is_err());
    assert!(runner.events().try_iter().all(|e| !matches!(e, PlantEvent::Phase { .. })));
    assert_eq!(runner.snapshot().phase, Phase::Idle);
}

#[test]
fn dropping_the_runner_joins_its_thread() {
    let runner = PlantRunner::spawn(
        SequencerCfg::default(),
        RelayMap::standard(),
        StabilizerCfg::default(),
        OfflineLink,
        NoFeed,
        MonotonicClock::new(),
        RunnerOptions::default(),
    );
    runner.start(order(600)).unwrap();
    let t0 = Instant::now();
    drop(runner);
    assert!(t0.elapsed() < Duration::from_secs(2));
}

#[test]
fn back_to_back_starts_reject_the_second_synchronously() {
    let runner = PlantRunner::spawn(
        SequencerCfg::default(),
        RelayMap::standard(),
        StabilizerCfg::default(),
        OfflineLink,
        NoFeed,
        MonotonicClock::new(),
        RunnerOptions::default(),
    );
    runner.start(order(600)).unwrap();
    let err = runner.start(order(600)).unwrap_err();
    assert!(err.to_string().contains("in progress"), "{err}");
    assert!(
        runner
            .events()
            .try_iter()
            .all(|e| !matches!(e, PlantEvent::CommandRejected(_)))
    );
    runner.stop().unwrap();
    wait_for(&runner, "stop", |s| s.phase == Phase::Idle);
}

#[test]
fn display_follows_the_weighing_ramp() {
    // 50 ms wall ticks at 20x: each frame is one plant second, well past the quiet window
    let opts = RunnerOptions {
        tick: Duration::from_millis(50),
        time_scale: 20,
    };
    let runner = PlantRunner::spawn(
        SequencerCfg::default(),
        RelayMap::standard(),
        StabilizerCfg::default(),
        OfflineLink,
        NoFeed,
        MonotonicClock::new(),
        opts,
    );
    runner.start(order(10)).unwrap();

    let mut shown_while_weighing = 0.0_f64;
    let deadline = Instant::now() + Duration::from_secs(10);
    let full = loop {
        let snap = runner.snapshot();
        if snap.phase == Phase::Weighing {
            assert!(snap.stable.semen <= snap.current.semen + 1e-9);
            shown_while_weighing = shown_while_weighing.max(snap.stable.semen);
        }
        if (snap.stable.semen - 300.0).abs() < 1e-9 {
            break snap;
        }
        assert!(Instant::now() < deadline, "display never reached the weighed semen");
        std::thread::sleep(Duration::from_millis(5));
    };
    assert!(shown_while_weighing > 0.0, "display stayed at zero during weighing");
    assert!(matches!(full.phase, Phase::Weighing | Phase::Discharging));
}
