#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas for the batching plant.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - `BatchFile` describes one production order (targets, silos, mixings).
//! - The weight-series CSV loader feeds manual-session replays.
use serde::Deserialize;
use std::path::Path;

/// Routing selector for the plant layout. It decides which gates discharge
/// the aggregates, never how phases are sequenced.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlantVariant {
    /// Separate sand/stone weigh hoppers emptied through their hopper valves.
    #[default]
    Hoppers,
    /// Aggregates pulsed straight from the bins onto the belt.
    TimerDump,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PlantCfg {
    pub variant: PlantVariant,
    /// Number of cement silos installed (1..=6).
    pub silos: u8,
}

impl Default for PlantCfg {
    fn default() -> Self {
        Self {
            variant: PlantVariant::Hoppers,
            silos: 6,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TimingCfg {
    /// Delay between "mixer ON" and belt/gate activation
    pub settle_ms: u64,
    /// Weighing step period
    pub weigh_tick_ms: u64,
    /// Simulated ramp: number of steps to reach a target
    pub sim_weigh_steps: u32,
    /// Simulated ramp: total ramp duration
    pub sim_weigh_ms: u64,
    /// Pause between a completed mixing and the next one
    pub grace_ms: u64,
    /// Horn pulse at batch end
    pub horn_ms: u64,
    /// Mixer keeps turning this long after the batch (0 = off with the batch)
    pub mixer_idle_off_ms: u64,
    /// Weigh the next mixing while the current one is still in the mixer
    pub pipeline_next_mixing: bool,
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self {
            settle_ms: 1000,
            weigh_tick_ms: 200,
            sim_weigh_steps: 25,
            sim_weigh_ms: 5000,
            grace_ms: 2000,
            horn_ms: 1000,
            mixer_idle_off_ms: 5 * 60 * 1000,
            pipeline_next_mixing: false,
        }
    }
}

/// Discharge choreography, all offsets relative to the phase start.
#[derive(Debug, Deserialize)]
#[serde(default)]
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
            total_ms: 15000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TimerDumpCfg {
    pub on_s: u64,
    pub off_s: u64,
    /// Minimum total discharge time regardless of weight
    pub floor_ms: u64,
    /// Discharge time per kilogram of target
    pub ms_per_kg: u64,
    /// Display steps used to animate the deduction inside one ON window
    pub steps: u32,
}

impl Default for TimerDumpCfg {
    fn default() -> Self {
        Self {
            on_s: 3,
            off_s: 2,
            floor_ms: 10_000,
            ms_per_kg: 30,
            steps: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct JoggingCfg {
    pub enabled: bool,
    /// Progress percentage after which the filling gate starts pulsing
    pub trigger_pct: f64,
    pub on_s: u64,
    pub off_s: u64,
}

impl Default for JoggingCfg {
    fn default() -> Self {
        Self {
            enabled: false,
            trigger_pct: 70.0,
            on_s: 1,
            off_s: 2,
        }
    }
}

/// Moisture corrections in percent; each value must lie in [-50, 50].
#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct MoistureCfg {
    pub pasir: f64,
    pub batu: f64,
    pub air: f64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
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

#[derive(Debug, Deserialize)]
#[serde(default)]
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LinkCfg {
    /// Controller address ("host:port"); absent means simulation
    pub addr: Option<String>,
    pub reconnect_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for LinkCfg {
    fn default() -> Self {
        Self {
            addr: None,
            reconnect_ms: 5000,
            connect_timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// One row of the relay map.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RelayEntry {
    pub name: String,
    /// Coil / output number on the controller
    pub address: u16,
    /// Up to four timer slots in milliseconds (meaning depends on the relay)
    #[serde(default)]
    pub timers: Vec<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub plant: PlantCfg,
    pub timing: TimingCfg,
    pub discharge: DischargeCfg,
    pub timer_dump: TimerDumpCfg,
    pub jogging: JoggingCfg,
    pub moisture: MoistureCfg,
    pub stabilizer: StabilizerCfg,
    pub detector: DetectorCfg,
    pub link: LinkCfg,
    pub logging: Logging,
    /// Empty means the standard coil table.
    pub relays: Vec<RelayEntry>,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

pub const MOISTURE_LIMIT_PCT: f64 = 50.0;

fn check_moisture(section: &str, m: &MoistureCfg) -> eyre::Result<()> {
    for (name, v) in [("pasir", m.pasir), ("batu", m.batu), ("air", m.air)] {
        if !v.is_finite() || !(-MOISTURE_LIMIT_PCT..=MOISTURE_LIMIT_PCT).contains(&v) {
            eyre::bail!("{section}.{name} must be in [-50, 50] percent");
        }
    }
    Ok(())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Plant
        if self.plant.silos == 0 || self.plant.silos > 6 {
            eyre::bail!("plant.silos must be in 1..=6");
        }

        // Timing
        if self.timing.weigh_tick_ms == 0 {
            eyre::bail!("timing.weigh_tick_ms must be > 0");
        }
        if self.timing.sim_weigh_steps == 0 {
            eyre::bail!("timing.sim_weigh_steps must be >= 1");
        }
        if self.timing.sim_weigh_ms == 0 {
            eyre::bail!("timing.sim_weigh_ms must be > 0");
        }
        if self.timing.mixer_idle_off_ms > 60 * 60 * 1000 {
            eyre::bail!("timing.mixer_idle_off_ms is unreasonably large (>1h)");
        }

        // Discharge
        if self.discharge.total_ms == 0 {
            eyre::bail!("discharge.total_ms must be > 0");
        }
        if self.discharge.cement_delay_ms > self.discharge.water_delay_ms {
            eyre::bail!("discharge.cement_delay_ms must be <= discharge.water_delay_ms");
        }
        if self.discharge.water_delay_ms >= self.discharge.total_ms {
            eyre::bail!("discharge.water_delay_ms must be < discharge.total_ms");
        }

        // Timer dumping
        if self.timer_dump.on_s == 0 {
            eyre::bail!("timer_dump.on_s must be >= 1");
        }
        if self.timer_dump.steps == 0 {
            eyre::bail!("timer_dump.steps must be >= 1");
        }

        // Jogging
        if !(0.0..=100.0).contains(&self.jogging.trigger_pct) {
            eyre::bail!("jogging.trigger_pct must be in [0, 100]");
        }
        if self.jogging.enabled && self.jogging.on_s == 0 {
            eyre::bail!("jogging.on_s must be >= 1 when jogging is enabled");
        }

        check_moisture("moisture", &self.moisture)?;

        // Stabilizer
        if self.stabilizer.threshold_kg < 0.0 || self.stabilizer.aggregate_threshold_kg < 0.0 {
            eyre::bail!("stabilizer thresholds must be >= 0");
        }
        if self.stabilizer.crosstalk_drop_kg < 0.0 {
            eyre::bail!("stabilizer.crosstalk_drop_kg must be >= 0");
        }
        if self.stabilizer.quiet_ms > 10_000 {
            eyre::bail!("stabilizer.quiet_ms is unreasonably large (>10s)");
        }

        // Detector
        if self.detector.drop_kg <= 0.0 {
            eyre::bail!("detector.drop_kg must be > 0");
        }
        if self.detector.min_peak_kg < 0.0 || self.detector.min_event_kg < 0.0 {
            eyre::bail!("detector.min_peak_kg and detector.min_event_kg must be >= 0");
        }

        // Link
        if self.link.reconnect_ms == 0 {
            eyre::bail!("link.reconnect_ms must be > 0");
        }

        // Relays
        let mut seen = std::collections::HashSet::new();
        for r in &self.relays {
            if r.name.trim().is_empty() {
                eyre::bail!("relays.name must not be empty");
            }
            if r.timers.len() > 4 {
                eyre::bail!("relays.timers for '{}' must have at most 4 slots", r.name);
            }
            if !seen.insert(r.address) {
                eyre::bail!("relays.address {} is assigned twice", r.address);
            }
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref() {
            if !matches!(rot, "never" | "daily" | "hourly") {
                eyre::bail!("logging.rotation must be one of never|daily|hourly");
            }
        }
        Ok(())
    }
}

/// Per-material order totals, in kilograms, for the whole batch.
#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct TargetsToml {
    pub pasir: f64,
    pub batu: f64,
    pub semen: f64,
    pub air: f64,
    pub additive: f64,
}

/// Selected aggregate bins; sand uses bins 1/2, stone bins 1/2 of its own pair.
#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct BinsToml {
    pub pasir: Vec<u8>,
    pub batu: Vec<u8>,
}

/// A production order as stored on disk.
///
/// ```toml
/// silos = [1, 2]
/// mixing_seconds = 60
/// mixings = 3
///
/// [targets]
/// pasir = 1800.0
/// batu = 2400.0
/// semen = 900.0
/// air = 480.0
///
/// [bins]
/// pasir = [1]
/// batu = [1, 2]
/// ```
#[derive(Debug, Deserialize, Clone)]
pub struct BatchFile {
    pub targets: TargetsToml,
    #[serde(default)]
    pub silos: Vec<u8>,
    #[serde(default)]
    pub bins: BinsToml,
    pub mixing_seconds: u64,
    #[serde(default = "one")]
    pub mixings: u32,
    /// Overrides the plant-wide `[moisture]` section for this order.
    #[serde(default)]
    pub moisture: Option<MoistureCfg>,
}

fn one() -> u32 {
    1
}

pub fn load_batch_toml(s: &str) -> eyre::Result<BatchFile> {
    let batch: BatchFile = toml::from_str(s).map_err(|e| eyre::eyre!("parse batch: {e}"))?;
    if let Some(m) = &batch.moisture {
        check_moisture("batch.moisture", m)?;
    }
    Ok(batch)
}

/// One row of a recorded weight series.
///
/// Expected headers:
/// timestamp_ms,pasir,batu,semen,air
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct WeightSample {
    pub timestamp_ms: u64,
    pub pasir: f64,
    pub batu: f64,
    pub semen: f64,
    pub air: f64,
}

pub fn load_weight_series(path: &Path) -> eyre::Result<Vec<WeightSample>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open weight series {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["timestamp_ms", "pasir", "batu", "semen", "air"];
    let actual: Vec<String> = headers.iter().map(ToString::to_string).collect();
    if actual != expected {
        eyre::bail!(
            "weight series CSV must have headers 'timestamp_ms,pasir,batu,semen,air', got: {}",
            actual.join(",")
        );
    }

    let mut rows: Vec<WeightSample> = Vec::new();
    for (idx, rec) in rdr.deserialize::<WeightSample>().enumerate() {
        let row = rec.map_err(|e| eyre::eyre!("invalid CSV row {}: {}", idx + 2, e))?;
        if let Some(prev) = rows.last() {
            if row.timestamp_ms < prev.timestamp_ms {
                eyre::bail!("weight series timestamps must not go backwards (row {})", idx + 2);
            }
        }
        rows.push(row);
    }
    Ok(rows)
}
