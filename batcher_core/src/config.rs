//! Core-side configuration consumed by the sequencer and the signal filters.
//!
//! These mirror the TOML sections in `batcher_config`; see `conversions` for
//! the mapping. Defaults match the standard plant.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlantVariant {
    #[default]
    Hoppers,
    TimerDump,
}

/// Gate pulsing near the end of a live-feed weighing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JogCfg {
    pub trigger_pct: f64,
    pub on_ms: u64,
    pub off_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeighingCfg {
    pub settle_ms: u64,
    /// Step period when mirroring a live feed
    pub tick_ms: u64,
    pub sim_steps: u32,
    pub sim_ms: u64,
    pub jog: Option<JogCfg>,
}

impl Default for WeighingCfg {
    fn default() -> Self {
        Self {
            settle_ms: 1000,
            tick_ms: 200,
            sim_steps: 25,
            sim_ms: 5000,
            jog: None,
        }
    }
}

impl WeighingCfg {
    /// Step period of the simulated ramp.
    pub fn sim_step_ms(&self) -> u64 {
        (self.sim_ms / u64::from(self.sim_steps.max(1))).max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DischargeCfg {
    pub cement_delay_ms: u64,
    pub water_delay_ms: u64,
    pub total_ms: u64,
}

impl Default for DischargeCfg {
    fn default() -> Self {
        Self {
            cement_delay_ms: 3000,
            water_delay_ms: 5000,
            total_ms: 15_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpCycleCfg {
    pub on_ms: u64,
    pub off_ms: u64,
    pub floor_ms: u64,
    pub ms_per_kg: u64,
    pub steps: u32,
}

impl Default for DumpCycleCfg {
    fn default() -> Self {
        Self {
            on_ms: 3000,
            off_ms: 2000,
            floor_ms: 10_000,
            ms_per_kg: 30,
            steps: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequencerCfg {
    pub variant: PlantVariant,
    /// Installed cement silos
    pub silos: u8,
    pub weighing: WeighingCfg,
    pub discharge: DischargeCfg,
    pub dump: DumpCycleCfg,
    pub grace_ms: u64,
    pub horn_ms: u64,
    /// 0 switches the mixer off together with the batch
    pub mixer_idle_off_ms: u64,
    pub pipeline: bool,
}

impl Default for SequencerCfg {
    fn default() -> Self {
        Self {
            variant: PlantVariant::Hoppers,
            silos: 6,
            weighing: WeighingCfg::default(),
            discharge: DischargeCfg::default(),
            dump: DumpCycleCfg::default(),
            grace_ms: 2000,
            horn_ms: 1000,
            mixer_idle_off_ms: 5 * 60 * 1000,
            pipeline: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StabilizerCfg {
    pub quiet_ms: u64,
    pub threshold_kg: f64,
    pub aggregate_threshold_kg: f64,
    pub crosstalk_drop_kg: f64,
}

impl Default for StabilizerCfg {
    fn default() -> Self {
        Self {
            quiet_ms: 300,
            threshold_kg: 10.0,
            aggregate_threshold_kg: 25.0,
            crosstalk_drop_kg: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorCfg {
    pub drop_kg: f64,
    pub min_peak_kg: f64,
    pub min_event_kg: f64,
}

impl Default for DetectorCfg {
    fn default() -> Self {
        Self {
            drop_kg: 50.0,
            min_peak_kg: 100.0,
            min_event_kg: 10.0,
        }
    }
}
