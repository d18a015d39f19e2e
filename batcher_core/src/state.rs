//! Production state, snapshots and the completion report.
use crate::actuator::ComponentState;
use crate::material::PerMaterial;
use crate::stabilizer::{DisplayGate, StableWeights};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Weighing,
    Discharging,
    Mixing,
    DoorCycle,
    Complete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Weighing => "weighing",
            Phase::Discharging => "discharging",
            Phase::Mixing => "mixing",
            Phase::DoorCycle => "door_cycle",
            Phase::Complete => "complete",
        };
        f.write_str(s)
    }
}

/// Mutable state of one batch. Written only by the sequencer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductionState {
    pub phase: Phase,
    pub paused: bool,
    /// 1-based index of the mixing in progress (0 when idle)
    pub mixing: u32,
    pub total_mixings: u32,
    pub per_mixing_target: PerMaterial<f64>,
    pub cumulative_target: PerMaterial<f64>,
    /// Weight of the current mixing
    pub current: PerMaterial<f64>,
    /// Weighed so far across all mixings
    pub cumulative: PerMaterial<f64>,
    pub weighing_done: PerMaterial<bool>,
    pub mixing_remaining_s: u64,
    /// Materials whose timed discharge has finished this mixing
    pub discharged_materials: u32,
}

/// Weighing source latched when a weighing starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedMode {
    Live,
    Simulated,
}

/// What the weight feed looked like on this tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FeedInput {
    pub live: bool,
    pub weights: Option<batcher_traits::Weights>,
}

impl FeedInput {
    pub fn offline() -> Self {
        Self::default()
    }

    pub fn live(w: batcher_traits::Weights) -> Self {
        Self {
            live: true,
            weights: Some(w),
        }
    }
}

/// Read-only copy of everything a display needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductionSnapshot {
    pub phase: Phase,
    pub paused: bool,
    pub mixing: u32,
    pub total_mixings: u32,
    pub per_mixing_target: PerMaterial<f64>,
    pub cumulative_target: PerMaterial<f64>,
    /// Weights shown to operators (frozen while the next mixing is
    /// pre-weighed behind a busy mixer)
    pub current: PerMaterial<f64>,
    pub cumulative: PerMaterial<f64>,
    pub weighing_done: PerMaterial<bool>,
    pub mixing_remaining_s: u64,
    pub door_remaining_ms: u64,
    pub discharged_materials: u32,
    pub components: ComponentState,
    pub connected: bool,
    pub feed_mode: Option<FeedMode>,
    pub waiting_for_mixer: bool,
    pub next_mixing_ready: bool,
    pub aggregate_valve_closed: bool,
    pub stable: StableWeights,
}

impl ProductionSnapshot {
    pub fn display_gate(&self) -> DisplayGate {
        DisplayGate {
            frozen: self.waiting_for_mixer || self.next_mixing_ready,
            aggregate_valve_closed: self.aggregate_valve_closed,
        }
    }

    pub fn is_producing(&self) -> bool {
        self.phase != Phase::Idle
    }
}

/// Handed to the ticketing side when a batch finishes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub final_weights: PerMaterial<f64>,
    pub additive_kg: f64,
    pub mixings: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub started_ms: u64,
    pub ended_ms: u64,
}

impl BatchReport {
    /// Weights rounded for printing; internal totals stay exact.
    pub fn rounded(&self, decimals: u32) -> PerMaterial<f64> {
        self.final_weights
            .map(|_, v| crate::util::round_kg(v, decimals))
    }
}
