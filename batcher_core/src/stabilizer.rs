//! Display-side debounce for weight readings.
//!
//! A raw reading only replaces the displayed value after it has differed from
//! it by more than the channel threshold and then stayed quiet for
//! `quiet_ms`; every further qualifying change restarts that wait. Control
//! decisions never read these values.
use crate::config::StabilizerCfg;
use crate::material::Material;
use batcher_traits::Weights;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Pasir,
    Batu,
    Semen,
    Air,
    /// Combined sand + stone display
    Aggregate,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::Pasir,
        Channel::Batu,
        Channel::Semen,
        Channel::Air,
        Channel::Aggregate,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn of(m: Material) -> Self {
        match m {
            Material::Pasir => Channel::Pasir,
            Material::Batu => Channel::Batu,
            Material::Semen => Channel::Semen,
            Material::Air => Channel::Air,
        }
    }

    fn read(self, w: &Weights) -> f64 {
        match self {
            Channel::Pasir => w.pasir,
            Channel::Batu => w.batu,
            Channel::Semen => w.semen,
            Channel::Air => w.air,
            Channel::Aggregate => w.aggregate(),
        }
    }
}

/// Sequencer sub-state the stabilizer must respect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayGate {
    /// Waiting for the mixer, or next mixing already weighed
    pub frozen: bool,
    /// Weighing an aggregate with its valve currently closed
    pub aggregate_valve_closed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Update {
    /// Display frozen; input ignored
    Frozen,
    /// Within threshold of the displayed value
    NoiseRejected,
    /// Commit armed (or re-armed) for `due_ms`
    Scheduled { due_ms: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Commit {
    pub channel: Channel,
    pub value: f64,
}

const SAME_READING_KG: f64 = 1e-6;

#[derive(Debug, Clone, Copy)]
struct Pending {
    value: f64,
    due_ms: u64,
}

#[derive(Debug, Clone)]
pub struct WeightStabilizer {
    cfg: StabilizerCfg,
    stable: [f64; 5],
    pending: [Option<Pending>; 5],
}

impl WeightStabilizer {
    pub fn new(cfg: StabilizerCfg) -> Self {
        Self {
            cfg,
            stable: [0.0; 5],
            pending: [None; 5],
        }
    }

    pub fn stable(&self, ch: Channel) -> f64 {
        self.stable[ch.index()]
    }

    pub fn reset(&mut self) {
        self.stable = [0.0; 5];
        self.pending = [None; 5];
    }

    fn threshold(&self, ch: Channel) -> f64 {
        match ch {
            Channel::Aggregate => self.cfg.aggregate_threshold_kg,
            _ => self.cfg.threshold_kg,
        }
    }

    pub fn update(&mut self, ch: Channel, raw: f64, now_ms: u64, gate: DisplayGate) -> Update {
        if gate.frozen {
            return Update::Frozen;
        }
        let i = ch.index();
        if (raw - self.stable[i]).abs() <= self.threshold(ch) {
            // Signal settled back near the display: drop any armed commit
            self.pending[i] = None;
            return Update::NoiseRejected;
        }
        // A repeated frame is not a change; only a new value restarts the window
        if let Some(p) = self.pending[i] {
            if (p.value - raw).abs() <= SAME_READING_KG {
                return Update::Scheduled { due_ms: p.due_ms };
            }
        }
        let due_ms = now_ms.saturating_add(self.cfg.quiet_ms);
        self.pending[i] = Some(Pending { value: raw, due_ms });
        Update::Scheduled { due_ms }
    }

    /// Feed a full frame (all four weighers plus the aggregate sum).
    pub fn observe(&mut self, w: &Weights, now_ms: u64, gate: DisplayGate) {
        for ch in Channel::ALL {
            self.update(ch, ch.read(w), now_ms, gate);
        }
    }

    /// Commit every pending value whose quiet window has elapsed.
    pub fn poll(&mut self, now_ms: u64, gate: DisplayGate) -> Vec<Commit> {
        let mut out = Vec::new();
        if gate.frozen {
            return out;
        }
        for ch in Channel::ALL {
            let i = ch.index();
            let Some(p) = self.pending[i] else { continue };
            if p.due_ms > now_ms {
                continue;
            }
            self.pending[i] = None;
            if ch == Channel::Aggregate
                && gate.aggregate_valve_closed
                && self.stable[i] - p.value > self.cfg.crosstalk_drop_kg
            {
                tracing::trace!(
                    from = self.stable[i],
                    to = p.value,
                    "aggregate drop rejected while valve closed"
                );
                continue;
            }
            self.stable[i] = p.value;
            out.push(Commit {
                channel: ch,
                value: p.value,
            });
        }
        out
    }

    pub fn snapshot(&self) -> StableWeights {
        StableWeights {
            pasir: self.stable(Channel::Pasir),
            batu: self.stable(Channel::Batu),
            semen: self.stable(Channel::Semen),
            air: self.stable(Channel::Air),
            aggregate: self.stable(Channel::Aggregate),
        }
    }
}

/// Last debounced value per channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StableWeights {
    pub pasir: f64,
    pub batu: f64,
    pub semen: f64,
    pub air: f64,
    pub aggregate: f64,
}
