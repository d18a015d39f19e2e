//! Timer dumping: discharge an aggregate by pulsing its bin gates.
//!
//! The discharge time is `max(floor, target × ms_per_kg)`, split into
//! `ceil(time / (on + off))` cycles. Each ON window is cut into `steps`
//! display steps that each deduct an equal share of the target; the final
//! step takes whatever is left, so the deductions always add up to the target
//! exactly. The owner arms one timer per returned delay and calls
//! [`TimerDumpCycle::tick`] when it fires.
use crate::actuator::Actuator;
use crate::config::DumpCycleCfg;
use crate::gateway::RelayGateway;
use crate::material::Material;
use crate::util::{ceil_div, share};
use batcher_traits::RelayLink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DumpState {
    Ready,
    On,
    Off,
    Done,
}

/// Outcome of one timer firing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DumpStep {
    /// Weight removed in this step, for the whole material
    pub deducted: f64,
    /// `None` once the cycle has finished and closed its gates
    pub next_in_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct TimerDumpCycle {
    material: Material,
    gates: Vec<Actuator>,
    target: f64,
    on_ms: u64,
    off_ms: u64,
    steps: u32,
    total_cycles: u32,
    per_step: f64,
    cycle: u32,
    step: u32,
    deducted: f64,
    state: DumpState,
}

/// Number of ON/OFF cycles needed to dump `target_kg`.
pub fn total_cycles(target_kg: f64, cfg: &DumpCycleCfg) -> u32 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let by_weight = (target_kg.max(0.0) * cfg.ms_per_kg as f64).ceil() as u64;
    let duration = cfg.floor_ms.max(by_weight);
    let cycles = ceil_div(duration, cfg.on_ms + cfg.off_ms).max(1);
    u32::try_from(cycles).unwrap_or(u32::MAX)
}

impl TimerDumpCycle {
    pub fn plan(material: Material, gates: Vec<Actuator>, target_kg: f64, cfg: &DumpCycleCfg) -> Self {
        let total_cycles = total_cycles(target_kg, cfg);
        let steps = cfg.steps.max(1);
        let per_step = target_kg / f64::from(total_cycles) / f64::from(steps);
        Self {
            material,
            gates,
            target: target_kg,
            on_ms: cfg.on_ms,
            off_ms: cfg.off_ms,
            steps,
            total_cycles,
            per_step,
            cycle: 0,
            step: 0,
            deducted: 0.0,
            state: DumpState::Ready,
        }
    }

    pub fn material(&self) -> Material {
        self.material
    }

    pub fn gates(&self) -> &[Actuator] {
        &self.gates
    }

    pub fn total_cycles(&self) -> u32 {
        self.total_cycles
    }

    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    pub fn deducted(&self) -> f64 {
        self.deducted
    }

    pub fn remaining(&self) -> f64 {
        (self.target - self.deducted).max(0.0)
    }

    pub fn is_done(&self) -> bool {
        self.state == DumpState::Done
    }

    /// Per-bin share of a deduction (two active sub-bins split evenly).
    pub fn per_gate(&self, kg: f64) -> f64 {
        share(kg, self.gates.len())
    }

    fn step_ms(&self) -> u64 {
        (self.on_ms / u64::from(self.steps)).max(1)
    }

    fn gates_to<L: RelayLink>(&self, gw: &mut RelayGateway<L>, on: bool) {
        for g in &self.gates {
            if let Err(e) = gw.set(*g, on) {
                tracing::error!(relay = g.name(), error = %e, "dump gate not switched");
            }
        }
    }

    fn finish<L: RelayLink>(&mut self, gw: &mut RelayGateway<L>) {
        self.gates_to(gw, false);
        self.state = DumpState::Done;
        tracing::info!(
            material = %self.material,
            cycles = self.cycle + 1,
            kg = self.deducted,
            "timer dump finished"
        );
    }

    /// Open the gates for the first ON window. Returns the first step delay,
    /// or `None` when there is nothing to dump.
    pub fn begin<L: RelayLink>(&mut self, gw: &mut RelayGateway<L>) -> Option<u64> {
        if self.state != DumpState::Ready {
            return None;
        }
        if self.target <= 0.0 || self.gates.is_empty() {
            self.state = DumpState::Done;
            return None;
        }
        tracing::debug!(
            material = %self.material,
            cycles = self.total_cycles,
            "timer dump start"
        );
        self.gates_to(gw, true);
        self.state = DumpState::On;
        Some(self.step_ms())
    }

    /// Advance by one timer firing.
    pub fn tick<L: RelayLink>(&mut self, gw: &mut RelayGateway<L>) -> DumpStep {
        match self.state {
            DumpState::Ready | DumpState::Done => DumpStep {
                deducted: 0.0,
                next_in_ms: None,
            },
            DumpState::On => {
                self.step += 1;
                let last = self.cycle + 1 >= self.total_cycles && self.step >= self.steps;
                let mut d = if last {
                    self.target - self.deducted
                } else {
                    self.per_step
                };
                if self.deducted + d >= self.target {
                    d = self.target - self.deducted;
                }
                self.deducted += d;
                if last || self.deducted >= self.target {
                    self.deducted = self.target;
                    self.finish(gw);
                    return DumpStep {
                        deducted: d,
                        next_in_ms: None,
                    };
                }
                if self.step >= self.steps {
                    self.gates_to(gw, false);
                    self.state = DumpState::Off;
                    return DumpStep {
                        deducted: d,
                        next_in_ms: Some(self.off_ms.max(1)),
                    };
                }
                DumpStep {
                    deducted: d,
                    next_in_ms: Some(self.step_ms()),
                }
            }
            DumpState::Off => {
                self.cycle += 1;
                self.step = 0;
                if self.cycle >= self.total_cycles {
                    self.finish(gw);
                    return DumpStep {
                        deducted: 0.0,
                        next_in_ms: None,
                    };
                }
                self.gates_to(gw, true);
                self.state = DumpState::On;
                DumpStep {
                    deducted: 0.0,
                    next_in_ms: Some(self.step_ms()),
                }
            }
        }
    }
}
