use batcher_core::mocks::OfflineLink;
use batcher_core::{
    BatchConfig, BatchSequencer, FeedInput, Moisture, PerMaterial, Phase, RelayGateway, RelayMap,
    SequencerCfg,
};
use proptest::prelude::*;

prop_compose! {
    fn arb_order()(
        pasir in 0.0f64..5_000.0,
        batu in 0.0f64..5_000.0,
        semen in 1.0f64..2_000.0,
        air in 0.0f64..1_000.0,
        mixings in 1u32..12,
        mixing_secs in 1u64..120,
        water_pct in -50.0f64..=50.0,
    ) -> BatchConfig {
        BatchConfig {
            targets: PerMaterial { pasir, batu, semen, air },
            additive_kg: 0.0,
            silos: vec![1],
            sand_bins: vec![],
            stone_bins: vec![],
            mixing_secs,
            mixings,
            moisture: Moisture { pasir: 0.0, batu: 0.0, air: water_pct },
        }
    }
}

proptest! {
    #[test]
    fn per_mixing_targets_reconstruct_totals(b in arb_order()) {
        let per = b.per_mixing();
        let totals = b.adjusted_totals();
        let n = f64::from(b.mixings);
        for (m, t) in totals.iter() {
            prop_assert!((per[m] * n - t).abs() <= 1e-9 * t.max(1.0), "{m}: {} vs {t}", per[m] * n);
        }
        prop_assert!(totals.air >= 0.0);
    }

    #[test]
    fn start_then_stop_always_ends_idle_and_dark(b in arb_order(), stop_at in 0u64..200_000) {
        let gw = RelayGateway::new(OfflineLink, RelayMap::standard());
        let mut seq = BatchSequencer::new(SequencerCfg::default(), gw);
        seq.start(b, 0).unwrap();
        seq.advance(stop_at, FeedInput::offline());
        seq.stop(stop_at);
        prop_assert!(!seq.components().any_on());
        prop_assert_eq!(seq.state().phase, Phase::Idle);
        prop_assert_eq!(seq.pending_timers(), 0);
    }

    #[test]
    fn cumulative_never_exceeds_simulated_targets(b in arb_order(), at in 0u64..400_000) {
        let gw = RelayGateway::new(OfflineLink, RelayMap::standard());
        let mut seq = BatchSequencer::new(SequencerCfg::default(), gw);
        let target = b.adjusted_totals();
        seq.start(b, 0).unwrap();
        seq.advance(at, FeedInput::offline());
        let cum = seq.state().cumulative;
        for (m, t) in target.iter() {
            prop_assert!(cum[m] <= t + 1e-6, "{m}: {} > {t}", cum[m]);
        }
    }
}
