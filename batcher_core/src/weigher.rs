//! One mixing's weighing, as a self-contained sub-machine.
//!
//! The sequencer owns at most two of these: the one feeding the current
//! mixing and, when pipelining is on, one pre-weighing the next mixing while
//! the mixer runs. Each weigher only touches its own gates and the upper
//! belt, and never reads the other's fields.
use crate::actuator::Actuator;
use crate::batch::BatchConfig;
use crate::config::{JogCfg, PlantVariant, WeighingCfg};
use crate::gateway::RelayGateway;
use crate::material::{Material, PerMaterial};
use crate::state::{FeedInput, FeedMode};
use batcher_traits::{RelayLink, Weights};

#[derive(Debug, Clone)]
pub(crate) struct Weigher {
    mode: FeedMode,
    target: PerMaterial<f64>,
    gates: PerMaterial<Vec<Actuator>>,
    /// Index of the sub-bin gate currently feeding
    active: PerMaterial<usize>,
    current: PerMaterial<f64>,
    done: PerMaterial<bool>,
    sim_steps: u32,
    step: u32,
    jog: Option<JogCfg>,
    jog_from: PerMaterial<Option<u64>>,
    held: Option<Weights>,
    hold_warned: bool,
}

impl Weigher {
    /// Latch the feed mode and open the first gate of every material that
    /// still needs weight.
    pub(crate) fn begin<L: RelayLink>(
        gw: &mut RelayGateway<L>,
        batch: &BatchConfig,
        variant: PlantVariant,
        target: PerMaterial<f64>,
        cfg: &WeighingCfg,
        feed: &FeedInput,
    ) -> Self {
        let mode = if feed.live {
            FeedMode::Live
        } else {
            FeedMode::Simulated
        };
        let mut w = Self {
            mode,
            target,
            gates: PerMaterial {
                pasir: batch.gates(Material::Pasir),
                batu: batch.gates(Material::Batu),
                semen: batch.gates(Material::Semen),
                air: batch.gates(Material::Air),
            },
            active: PerMaterial::default(),
            current: PerMaterial::default(),
            done: PerMaterial::default(),
            sim_steps: cfg.sim_steps.max(1),
            step: 0,
            // Jogging needs a real signal to react to
            jog: if mode == FeedMode::Live { cfg.jog } else { None },
            jog_from: PerMaterial::splat(None),
            held: feed.weights,
            hold_warned: false,
        };
        tracing::info!(mode = ?mode, "weighing started");
        if let Err(e) = gw.set(Actuator::UpperBelt, true) {
            tracing::error!(error = %e, "upper belt not started");
        }
        for m in Material::ALL {
            if target[m] <= 0.0 {
                w.done[m] = true;
                continue;
            }
            if variant == PlantVariant::TimerDump && m.is_aggregate() {
                // Dumped straight from the bins later; nothing to weigh
                w.current[m] = target[m];
                w.done[m] = true;
                continue;
            }
            w.switch(gw, m, 0, true);
        }
        w
    }

    pub(crate) fn mode(&self) -> FeedMode {
        self.mode
    }

    pub(crate) fn current(&self) -> PerMaterial<f64> {
        self.current
    }

    pub(crate) fn done(&self) -> PerMaterial<bool> {
        self.done
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done.all()
    }

    /// Period of the next weighing step.
    pub(crate) fn period(&self, cfg: &WeighingCfg) -> u64 {
        match self.mode {
            FeedMode::Live => cfg.tick_ms.max(1),
            FeedMode::Simulated => cfg.sim_step_ms(),
        }
    }

    fn gate(&self, m: Material) -> Option<Actuator> {
        self.gates[m].get(self.active[m]).copied()
    }

    fn switch<L: RelayLink>(&self, gw: &mut RelayGateway<L>, m: Material, idx: usize, on: bool) {
        if let Some(g) = self.gates[m].get(idx) {
            if let Err(e) = gw.set(*g, on) {
                tracing::error!(relay = g.name(), error = %e, "weighing gate not switched");
            }
        }
    }

    /// An aggregate is still weighing but its gate is shut (jog OFF window).
    pub(crate) fn aggregate_valve_closed<L: RelayLink>(&self, gw: &RelayGateway<L>) -> bool {
        [Material::Pasir, Material::Batu].into_iter().any(|m| {
            !self.done[m] && self.gate(m).is_some_and(|g| !gw.state().get(g))
        })
    }

    /// Move jog windows along after a pause so they resume where they left off.
    pub(crate) fn shift(&mut self, by_ms: u64) {
        for m in Material::ALL {
            if let Some(t) = self.jog_from[m].as_mut() {
                *t = t.saturating_add(by_ms);
            }
        }
    }

    fn reading(&mut self, feed: &FeedInput) -> Option<Weights> {
        match (feed.live, feed.weights) {
            (true, Some(w)) => {
                if self.hold_warned {
                    tracing::info!("weight feed back, weighing continues");
                }
                self.held = Some(w);
                self.hold_warned = false;
            }
            _ => {
                if !self.hold_warned {
                    tracing::warn!("weight feed lost during weighing, holding last value");
                    self.hold_warned = true;
                }
            }
        }
        self.held
    }

    /// One weighing step at `now`. Returns true once every material is done.
    pub(crate) fn step<L: RelayLink>(&mut self, gw: &mut RelayGateway<L>, feed: &FeedInput, now: u64) -> bool {
        match self.mode {
            FeedMode::Simulated => {
                self.step = (self.step + 1).min(self.sim_steps);
                let k = f64::from(self.step) / f64::from(self.sim_steps);
                for m in Material::ALL {
                    if self.done[m] {
                        continue;
                    }
                    self.current[m] = if self.step >= self.sim_steps {
                        self.target[m]
                    } else {
                        self.target[m] * k
                    };
                }
            }
            FeedMode::Live => {
                let Some(w) = self.reading(feed) else {
                    return self.is_done();
                };
                let w = PerMaterial::from(w);
                for m in Material::ALL {
                    if !self.done[m] {
                        self.current[m] = w[m];
                    }
                }
            }
        }
        for m in Material::ALL {
            if !self.done[m] {
                self.drive(gw, m, now);
            }
        }
        tracing::trace!(current = ?self.current, "weighing step");
        self.is_done()
    }

    fn drive<L: RelayLink>(&mut self, gw: &mut RelayGateway<L>, m: Material, now: u64) {
        let target = self.target[m];
        let cur = self.current[m];
        if cur >= target {
            self.done[m] = true;
            for i in 0..self.gates[m].len() {
                self.switch(gw, m, i, false);
            }
            tracing::debug!(material = %m, kg = cur, target, "material weighed");
            return;
        }
        // Two sub-bins: the second takes over at half the target
        if self.gates[m].len() == 2 && self.active[m] == 0 && cur >= target / 2.0 {
            self.switch(gw, m, 0, false);
            self.active[m] = 1;
            self.switch(gw, m, 1, true);
        }
        if !m.is_aggregate() {
            return;
        }
        let Some(jog) = self.jog else { return };
        if cur / target * 100.0 < jog.trigger_pct {
            return;
        }
        let from = *self.jog_from[m].get_or_insert(now);
        let period = (jog.on_ms + jog.off_ms).max(1);
        let open = now.saturating_sub(from) % period < jog.on_ms;
        let idx = self.active[m];
        self.switch(gw, m, idx, open);
    }

    /// Close everything this weigher opened.
    pub(crate) fn finish<L: RelayLink>(&self, gw: &mut RelayGateway<L>) {
        for m in Material::ALL {
            for i in 0..self.gates[m].len() {
                self.switch(gw, m, i, false);
            }
        }
        if let Err(e) = gw.set(Actuator::UpperBelt, false) {
            tracing::error!(error = %e, "upper belt not stopped");
        }
    }
}
