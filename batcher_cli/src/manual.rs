//! Manual session replay from a recorded weight series.

use batcher_core::{DetectorCfg, ManualRecord, ManualSession};
use batcher_traits::Weights;
use chrono::{DateTime, TimeDelta, Utc};
use eyre::Result;
use std::path::Path;

pub fn replay(cfg: &batcher_config::Config, series: &Path, json: bool) -> Result<ManualRecord> {
    let samples = batcher_config::load_weight_series(series)?;
    let detector: DetectorCfg = (&cfg.detector).into();
    let origin = Utc::now();
    // Sample offsets become wall-clock stamps relative to the replay start
    let at = |ms: u64| -> DateTime<Utc> {
        i64::try_from(ms)
            .ok()
            .and_then(TimeDelta::try_milliseconds)
            .and_then(|d| origin.checked_add_signed(d))
            .unwrap_or(origin)
    };

    let mut session = ManualSession::start(detector, origin);
    for s in &samples {
        let w = Weights {
            pasir: s.pasir,
            batu: s.batu,
            semen: s.semen,
            air: s.air,
        };
        for ev in session.observe_weights(&w, at(s.timestamp_ms)) {
            tracing::debug!(material = %ev.material, kg = ev.discharged, "discharge");
        }
    }
    let end = samples.last().map_or(origin, |s| at(s.timestamp_ms));
    let record = session.close(end);

    if json {
        println!("{}", serde_json::to_string(&record)?);
    } else {
        println!(
            "Manual session: {} discharge(s) over {} sample(s)",
            record.ledger.len(),
            samples.len()
        );
        for ev in &record.ledger {
            println!(
                "  {} {:>8.2} kg  (peak {:.2}, left {:.2})",
                ev.material, ev.discharged, ev.peak, ev.remaining
            );
        }
        let t = &record.totals;
        println!(
            "Totals: pasir {:.2} kg, batu {:.2} kg, semen {:.2} kg, air {:.2} kg",
            t.pasir, t.batu, t.semen, t.air
        );
    }
    Ok(record)
}
