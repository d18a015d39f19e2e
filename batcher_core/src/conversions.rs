//! `From` implementations bridging `batcher_config` types to `batcher_core` types.

use crate::actuator::RelayMap;
use crate::batch::{BatchConfig, Moisture};
use crate::config::{
    DetectorCfg, DischargeCfg, DumpCycleCfg, JogCfg, PlantVariant, SequencerCfg, StabilizerCfg,
    WeighingCfg,
};
use crate::error::PlantError;
use crate::material::PerMaterial;
use crate::util::MILLIS_PER_SEC;

// ── PlantVariant ─────────────────────────────────────────────────────────────

impl From<batcher_config::PlantVariant> for PlantVariant {
    fn from(v: batcher_config::PlantVariant) -> Self {
        match v {
            batcher_config::PlantVariant::Hoppers => Self::Hoppers,
            batcher_config::PlantVariant::TimerDump => Self::TimerDump,
        }
    }
}

// ── DischargeCfg ─────────────────────────────────────────────────────────────

impl From<&batcher_config::DischargeCfg> for DischargeCfg {
    fn from(c: &batcher_config::DischargeCfg) -> Self {
        Self {
            cement_delay_ms: c.cement_delay_ms,
            water_delay_ms: c.water_delay_ms,
            total_ms: c.total_ms,
        }
    }
}

// ── DumpCycleCfg ─────────────────────────────────────────────────────────────

impl From<&batcher_config::TimerDumpCfg> for DumpCycleCfg {
    fn from(c: &batcher_config::TimerDumpCfg) -> Self {
        Self {
            on_ms: c.on_s.saturating_mul(MILLIS_PER_SEC),
            off_ms: c.off_s.saturating_mul(MILLIS_PER_SEC),
            floor_ms: c.floor_ms,
            ms_per_kg: c.ms_per_kg,
            steps: c.steps,
        }
    }
}

// ── JogCfg ───────────────────────────────────────────────────────────────────

/// Jogging only exists when enabled.
pub fn jog_from(c: &batcher_config::JoggingCfg) -> Option<JogCfg> {
    c.enabled.then(|| JogCfg {
        trigger_pct: c.trigger_pct,
        on_ms: c.on_s.saturating_mul(MILLIS_PER_SEC),
        off_ms: c.off_s.saturating_mul(MILLIS_PER_SEC),
    })
}

// ── SequencerCfg ─────────────────────────────────────────────────────────────

impl From<&batcher_config::Config> for SequencerCfg {
    fn from(c: &batcher_config::Config) -> Self {
        let t = &c.timing;
        Self {
            variant: c.plant.variant.into(),
            silos: c.plant.silos,
            weighing: WeighingCfg {
                settle_ms: t.settle_ms,
                tick_ms: t.weigh_tick_ms,
                sim_steps: t.sim_weigh_steps,
                sim_ms: t.sim_weigh_ms,
                jog: jog_from(&c.jogging),
            },
            discharge: (&c.discharge).into(),
            dump: (&c.timer_dump).into(),
            grace_ms: t.grace_ms,
            horn_ms: t.horn_ms,
            mixer_idle_off_ms: t.mixer_idle_off_ms,
            pipeline: t.pipeline_next_mixing,
        }
    }
}

// ── StabilizerCfg / DetectorCfg ──────────────────────────────────────────────

impl From<&batcher_config::StabilizerCfg> for StabilizerCfg {
    fn from(c: &batcher_config::StabilizerCfg) -> Self {
        Self {
            quiet_ms: c.quiet_ms,
            threshold_kg: c.threshold_kg,
            aggregate_threshold_kg: c.aggregate_threshold_kg,
            crosstalk_drop_kg: c.crosstalk_drop_kg,
        }
    }
}

impl From<&batcher_config::DetectorCfg> for DetectorCfg {
    fn from(c: &batcher_config::DetectorCfg) -> Self {
        Self {
            drop_kg: c.drop_kg,
            min_peak_kg: c.min_peak_kg,
            min_event_kg: c.min_event_kg,
        }
    }
}

// ── RelayMap ─────────────────────────────────────────────────────────────────

impl TryFrom<&[batcher_config::RelayEntry]> for RelayMap {
    type Error = PlantError;

    /// An empty table means the standard board.
    fn try_from(rows: &[batcher_config::RelayEntry]) -> Result<Self, Self::Error> {
        if rows.is_empty() {
            return Ok(Self::standard());
        }
        Self::from_rows(
            rows.iter()
                .map(|r| (r.name.as_str(), r.address, r.timers.as_slice())),
        )
    }
}

// ── BatchConfig ──────────────────────────────────────────────────────────────

impl From<&batcher_config::MoistureCfg> for Moisture {
    fn from(c: &batcher_config::MoistureCfg) -> Self {
        Self {
            pasir: c.pasir,
            batu: c.batu,
            air: c.air,
        }
    }
}

impl BatchConfig {
    /// Build an order from a batch file. The file's own moisture section wins
    /// over the plant default.
    pub fn from_file(f: &batcher_config::BatchFile, plant_moisture: &batcher_config::MoistureCfg) -> Self {
        let moisture = f.moisture.as_ref().unwrap_or(plant_moisture);
        Self {
            targets: PerMaterial {
                pasir: f.targets.pasir,
                batu: f.targets.batu,
                semen: f.targets.semen,
                air: f.targets.air,
            },
            additive_kg: f.targets.additive,
            silos: f.silos.clone(),
            sand_bins: f.bins.pasir.clone(),
            stone_bins: f.bins.batu.clone(),
            mixing_secs: f.mixing_seconds,
            mixings: f.mixings,
            moisture: moisture.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::Actuator;

    #[test]
    fn seconds_become_millis_and_jogging_is_optional() {
        let mut c = batcher_config::Config::default();
        let seq = SequencerCfg::from(&c);
        assert_eq!(seq.dump.on_ms, 3000);
        assert_eq!(seq.dump.off_ms, 2000);
        assert!(seq.weighing.jog.is_none());
        assert_eq!(seq, SequencerCfg::default());

        c.jogging.enabled = true;
        let jog = SequencerCfg::from(&c).weighing.jog.unwrap();
        assert_eq!(jog.on_ms, 1000);
        assert_eq!(jog.off_ms, 2000);
    }

    #[test]
    fn empty_relay_table_is_the_standard_board() {
        let map = RelayMap::try_from(&[][..]).unwrap();
        assert_eq!(map, RelayMap::standard());

        let rows = vec![batcher_config::RelayEntry {
            name: "Pintu Mixer Buka".into(),
            address: 40,
            timers: vec![1500],
        }];
        let map = RelayMap::try_from(rows.as_slice()).unwrap();
        assert_eq!(map.resolve(Actuator::DoorOpen).unwrap().address, 40);
        assert_eq!(map.timers(Actuator::DoorOpen), [1500, 5000, 2000, 5000]);
        assert!(!map.contains(Actuator::Mixer));
    }
}
