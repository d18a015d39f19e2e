//! Display debounce and manual discharge detection.

use batcher_core::{
    Channel, DetectorCfg, DischargeDetector, DisplayGate, ManualSession, Material, StabilizerCfg,
    Update, WeightStabilizer,
};
use batcher_traits::Weights;
use chrono::{DateTime, TimeZone, Utc};
use rstest::rstest;

const OPEN: DisplayGate = DisplayGate {
    frozen: false,
    aggregate_valve_closed: false,
};

fn at(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap()
}

// ── WeightStabilizer ─────────────────────────────────────────────────────────

#[test]
fn two_updates_inside_quiet_window_commit_once_with_latest() {
    let mut s = WeightStabilizer::new(StabilizerCfg::default());
    assert_eq!(
        s.update(Channel::Semen, 100.0, 0, OPEN),
        Update::Scheduled { due_ms: 300 }
    );
    assert_eq!(
        s.update(Channel::Semen, 120.0, 200, OPEN),
        Update::Scheduled { due_ms: 500 }
    );
    // First deadline passed but was superseded
    assert!(s.poll(300, OPEN).is_empty());
    let commits = s.poll(500, OPEN);
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].value, 120.0);
    assert_eq!(s.stable(Channel::Semen), 120.0);
    assert!(s.poll(10_000, OPEN).is_empty());
}

#[rstest]
#[case::material(Channel::Air, 9.9, true)]
#[case::material_over(Channel::Air, 10.1, false)]
#[case::aggregate(Channel::Aggregate, 24.0, true)]
#[case::aggregate_over(Channel::Aggregate, 26.0, false)]
fn thresholds_per_channel(#[case] ch: Channel, #[case] raw: f64, #[case] rejected: bool) {
    let mut s = WeightStabilizer::new(StabilizerCfg::default());
    let u = s.update(ch, raw, 0, OPEN);
    assert_eq!(u == Update::NoiseRejected, rejected);
}

#[test]
fn frozen_display_ignores_everything() {
    let mut s = WeightStabilizer::new(StabilizerCfg::default());
    let frozen = DisplayGate {
        frozen: true,
        aggregate_valve_closed: false,
    };
    assert_eq!(s.update(Channel::Pasir, 500.0, 0, frozen), Update::Frozen);
    assert!(s.poll(1_000, OPEN).is_empty());
    assert_eq!(s.stable(Channel::Pasir), 0.0);
}

#[test]
fn aggregate_drop_is_rejected_while_valve_closed() {
    let mut s = WeightStabilizer::new(StabilizerCfg::default());
    s.update(Channel::Aggregate, 400.0, 0, OPEN);
    s.poll(300, OPEN);
    assert_eq!(s.stable(Channel::Aggregate), 400.0);

    let closed = DisplayGate {
        frozen: false,
        aggregate_valve_closed: true,
    };
    s.update(Channel::Aggregate, 350.0, 1_000, closed);
    assert!(s.poll(1_300, closed).is_empty());
    assert_eq!(s.stable(Channel::Aggregate), 400.0);

    // Rises still go through, and drops once the valve is open again
    s.update(Channel::Aggregate, 450.0, 2_000, closed);
    s.poll(2_300, closed);
    assert_eq!(s.stable(Channel::Aggregate), 450.0);
    s.update(Channel::Aggregate, 300.0, 3_000, OPEN);
    s.poll(3_300, OPEN);
    assert_eq!(s.stable(Channel::Aggregate), 300.0);
}

#[test]
fn returning_near_the_display_cancels_a_pending_commit() {
    let mut s = WeightStabilizer::new(StabilizerCfg::default());
    s.update(Channel::Batu, 50.0, 0, OPEN);
    assert_eq!(s.update(Channel::Batu, 3.0, 100, OPEN), Update::NoiseRejected);
    assert!(s.poll(1_000, OPEN).is_empty());
}

#[test]
fn steady_reading_fed_every_tick_commits_after_one_window() {
    let mut s = WeightStabilizer::new(StabilizerCfg::default());
    let mut committed_at = None;
    for i in 0..20u64 {
        let now = i * 50;
        let u = s.update(Channel::Semen, 300.0, now, OPEN);
        if committed_at.is_none() {
            assert_eq!(u, Update::Scheduled { due_ms: 300 }, "tick {i}");
        }
        if !s.poll(now, OPEN).is_empty() {
            committed_at.get_or_insert(now);
        }
    }
    assert_eq!(committed_at, Some(300));
    assert_eq!(s.stable(Channel::Semen), 300.0);
}

#[test]
fn full_frame_feeds_the_aggregate_sum() {
    let mut s = WeightStabilizer::new(StabilizerCfg::default());
    let frame = Weights {
        pasir: 100.0,
        batu: 200.0,
        semen: 50.0,
        air: 0.0,
    };
    s.observe(&frame, 0, OPEN);
    s.poll(300, OPEN);
    let snap = s.snapshot();
    assert_eq!(snap.aggregate, 300.0);
    assert_eq!(snap.semen, 50.0);
    assert_eq!(snap.air, 0.0);
}

// ── DischargeDetector / ManualSession ────────────────────────────────────────

#[test]
fn one_event_per_discharge_at_its_trough() {
    let mut d = DischargeDetector::new(DetectorCfg::default());
    let series = [0.0, 50.0, 100.0, 150.0, 90.0, 40.0];
    let mut events: Vec<_> = series
        .iter()
        .enumerate()
        .filter_map(|(i, v)| d.observe(Material::Semen, *v, at(i as i64 * 1_000)))
        .collect();
    assert!(events.is_empty());
    events.extend(d.flush());
    assert_eq!(events.len(), 1);
    let ev = events[0];
    assert_eq!(ev.peak, 150.0);
    assert_eq!(ev.remaining, 40.0);
    assert!((ev.discharged - 110.0).abs() < 1e-9);
    assert_eq!(ev.timestamp, at(5_000));
}

#[test]
fn rise_after_trough_closes_the_event_and_rebases_peak() {
    let mut d = DischargeDetector::new(DetectorCfg::default());
    for v in [0.0, 150.0, 90.0, 40.0] {
        assert!(d.observe(Material::Pasir, v, at(0)).is_none());
    }
    let ev = d.observe(Material::Pasir, 45.0, at(1)).unwrap();
    assert!((ev.discharged - 110.0).abs() < 1e-9);
    assert_eq!(d.peak(Material::Pasir), 45.0);
}

#[rstest]
#[case::small_drop(&[0.0, 150.0, 120.0])]
#[case::low_peak(&[0.0, 90.0, 20.0])]
#[case::only_rises(&[0.0, 50.0, 100.0, 200.0, 400.0])]
fn no_event(#[case] series: &[f64]) {
    let mut d = DischargeDetector::new(DetectorCfg::default());
    for v in series {
        assert!(d.observe(Material::Batu, *v, at(0)).is_none());
    }
    assert!(d.flush().is_empty());
}

#[test]
fn materials_are_tracked_independently() {
    let mut d = DischargeDetector::new(DetectorCfg::default());
    d.observe(Material::Air, 200.0, at(0));
    d.observe(Material::Semen, 10.0, at(0));
    d.observe(Material::Air, 100.0, at(1));
    d.observe(Material::Semen, 140.0, at(1));
    let evs = d.flush();
    assert_eq!(evs.len(), 1);
    assert_eq!(evs[0].material, Material::Air);
}

#[test]
fn manual_session_books_ledger_and_totals() {
    let mut s = ManualSession::start(DetectorCfg::default(), at(0));
    let frames = [
        (0.0, 0.0),
        (200.0, 120.0),
        (130.0, 120.0),
        (20.0, 40.0),
        (25.0, 45.0),
        (180.0, 45.0),
        (60.0, 45.0),
    ];
    for (i, (pasir, semen)) in frames.iter().enumerate() {
        let w = Weights {
            pasir: *pasir,
            batu: 0.0,
            semen: *semen,
            air: 0.0,
        };
        s.observe_weights(&w, at(i as i64 * 1_000));
    }
    assert_eq!(s.ledger().len(), 2);
    let rec = s.close(at(10_000));
    // pasir 200→20 and 180→60 (flushed on close); semen 120→40
    assert_eq!(rec.ledger.len(), 3);
    assert!((rec.totals.pasir - 300.0).abs() < 1e-9);
    assert!((rec.totals.semen - 80.0).abs() < 1e-9);
    assert_eq!(rec.started_at, at(0));
    assert_eq!(rec.ended_at, at(10_000));
}
