//! Batch sequencer: `Idle → Weighing → Discharging → Mixing → DoorCycle →
//! Complete → (Weighing | Idle)`, with `Paused` as an orthogonal flag.
//!
//! The sequencer never reads a clock. Every command and every call to
//! [`BatchSequencer::advance`] carries `now_ms`, and all delayed work is a
//! [`Tick`] in one [`TimerRegistry`]. A due tick runs against its own
//! deadline, so follow-ups are laid out on the exact timeline regardless of
//! how coarsely the owner polls.
//!
//! Pausing freezes the registry (remaining times, not elapsed) and drops all
//! outputs; resuming restores the outputs with the minimum set of edges and
//! re-arms the frozen timers. `stop` is the emergency path: it always
//! succeeds, cancels every pending tick and switches everything off.
use crate::actuator::{Actuator, ComponentState, RelayMap};
use crate::batch::BatchConfig;
use crate::config::{PlantVariant, SequencerCfg};
use crate::dump_cycle::TimerDumpCycle;
use crate::error::{PlantError, Result};
use crate::gateway::RelayGateway;
use crate::material::{Material, PerMaterial};
use crate::stabilizer::StableWeights;
use crate::state::{BatchReport, FeedInput, Phase, ProductionSnapshot, ProductionState};
use crate::timers::TimerRegistry;
use crate::util::{MILLIS_PER_SEC, share};
use crate::weigher::Weigher;
use batcher_traits::RelayLink;
use chrono::{DateTime, Utc};

/// Exit calls towards ticketing and inventory.
pub trait BatchObserver {
    fn on_phase(&mut self, _phase: Phase, _mixing: u32) {}
    /// Fired once per batch, after the final mixing's door cycle.
    fn on_complete(&mut self, _report: &BatchReport) {}
    fn on_cement_deduction(&mut self, _silo: u8, _kg: f64) {}
    fn on_aggregate_deduction(&mut self, _material: Material, _bin: u8, _kg: f64) {}
    fn on_water_deduction(&mut self, _kg: f64) {}
}

pub struct NoopObserver;

impl BatchObserver for NoopObserver {}

/// Which weigher a weighing tick belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Current,
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DoorStep {
    OpenDone,
    WaitDone,
    ReopenDone,
    RewaitDone,
    CloseDone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tick {
    Settle(Slot),
    WeighStep(Slot),
    DischargeCement,
    DischargeWater,
    DischargeEnd,
    Dump(Material),
    MixSecond,
    Door(DoorStep),
    CompleteGrace,
    HornOff,
    MixerIdleOff,
}

/// Door pulse plan, read from the relay timer slots when the cycle starts.
#[derive(Debug, Clone, Copy)]
struct DoorPlan {
    open_ms: u64,
    wait_ms: u64,
    reopen_ms: u64,
    rewait_ms: u64,
    close_ms: u64,
}

impl DoorPlan {
    fn from_relays(relays: &RelayMap) -> Self {
        let [open_ms, wait_ms, reopen_ms, rewait_ms] = relays.timers(Actuator::DoorOpen);
        Self {
            open_ms,
            wait_ms,
            reopen_ms,
            rewait_ms,
            close_ms: relays.timers(Actuator::DoorClose)[0],
        }
    }

    fn twice(&self) -> bool {
        self.reopen_ms > 0
    }

    /// Time still to run after `step` fires.
    fn after(&self, step: DoorStep) -> u64 {
        let second = if self.twice() {
            self.reopen_ms + self.rewait_ms
        } else {
            0
        };
        match step {
            DoorStep::OpenDone => self.wait_ms + second + self.close_ms,
            DoorStep::WaitDone => {
                if self.twice() {
                    self.rewait_ms + self.close_ms
                } else {
                    0
                }
            }
            DoorStep::ReopenDone => self.close_ms,
            DoorStep::RewaitDone | DoorStep::CloseDone => 0,
        }
    }
}

/// Pre-weighing of the next mixing while the mixer is busy.
#[derive(Debug)]
struct Pipeline {
    weigher: Option<Weigher>,
    done: bool,
}

/// Per-batch context that only exists while producing.
#[derive(Debug)]
struct Run {
    batch: BatchConfig,
    started_ms: u64,
    started_at: DateTime<Utc>,
    weigher: Option<Weigher>,
    next: Option<Pipeline>,
    dumps: Vec<TimerDumpCycle>,
    discharge_timer_done: bool,
    door: Option<DoorPlan>,
    saved: Option<(ComponentState, u64)>,
}

pub struct BatchSequencer<L: RelayLink> {
    cfg: SequencerCfg,
    gateway: RelayGateway<L>,
    timers: TimerRegistry<Tick>,
    observer: Box<dyn BatchObserver + Send>,
    state: ProductionState,
    run: Option<Run>,
    feed: FeedInput,
}

impl<L: RelayLink> BatchSequencer<L> {
    pub fn new(cfg: SequencerCfg, gateway: RelayGateway<L>) -> Self {
        Self::with_observer(cfg, gateway, Box::new(NoopObserver))
    }

    pub fn with_observer(
        cfg: SequencerCfg,
        gateway: RelayGateway<L>,
        observer: Box<dyn BatchObserver + Send>,
    ) -> Self {
        Self {
            cfg,
            gateway,
            timers: TimerRegistry::new(),
            observer,
            state: ProductionState::default(),
            run: None,
            feed: FeedInput::offline(),
        }
    }

    pub fn config(&self) -> &SequencerCfg {
        &self.cfg
    }

    pub fn state(&self) -> &ProductionState {
        &self.state
    }

    pub fn components(&self) -> &ComponentState {
        self.gateway.state()
    }

    pub fn gateway(&self) -> &RelayGateway<L> {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut RelayGateway<L> {
        &mut self.gateway
    }

    pub fn is_producing(&self) -> bool {
        self.state.phase != Phase::Idle
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_deadline()
    }

    /// Begin a batch. Rejected without any side effect when a batch is
    /// already running or the order does not fit the plant.
    pub fn start(&mut self, batch: BatchConfig, now: u64) -> Result<()> {
        if self.is_producing() {
            return Err(PlantError::invalid("batch already in progress").into());
        }
        batch.check(&self.cfg, self.gateway.map())?;

        // Leftovers of the previous batch: horn pulse, mixer idle timer
        self.timers.cancel_all();
        let leftovers: Vec<Actuator> = self
            .gateway
            .state()
            .active()
            .filter(|a| *a != Actuator::Mixer)
            .collect();
        for a in leftovers {
            self.switch(a, false);
        }

        let per_mixing = batch.per_mixing();
        self.state = ProductionState {
            phase: Phase::Weighing,
            mixing: 1,
            total_mixings: batch.mixings,
            per_mixing_target: per_mixing,
            cumulative_target: batch.adjusted_totals(),
            ..ProductionState::default()
        };
        tracing::info!(
            mixings = batch.mixings,
            pasir = per_mixing.pasir,
            batu = per_mixing.batu,
            semen = per_mixing.semen,
            air = per_mixing.air,
            "batch started"
        );
        self.run = Some(Run {
            batch,
            started_ms: now,
            started_at: Utc::now(),
            weigher: None,
            next: None,
            dumps: Vec::new(),
            discharge_timer_done: false,
            door: None,
            saved: None,
        });
        self.switch(Actuator::Mixer, true);
        self.observer.on_phase(Phase::Weighing, 1);
        self.timers
            .schedule(now, self.cfg.weighing.settle_ms, Tick::Settle(Slot::Current));
        Ok(())
    }

    /// Freeze the active phase: remaining times are kept, outputs dropped.
    pub fn pause(&mut self, now: u64) -> Result<()> {
        if !self.is_producing() {
            return Err(PlantError::State("nothing to pause".into()).into());
        }
        if self.state.paused {
            return Err(PlantError::State("already paused".into()).into());
        }
        let saved = *self.gateway.state();
        if let Some(run) = self.run.as_mut() {
            run.saved = Some((saved, now));
        }
        self.timers.pause(now);
        self.gateway.all_off();
        self.state.paused = true;
        tracing::info!(phase = %self.state.phase, "batch paused");
        Ok(())
    }

    pub fn resume(&mut self, now: u64) -> Result<()> {
        if !self.state.paused {
            return Err(PlantError::State("not paused".into()).into());
        }
        let saved = self.run.as_mut().and_then(|r| r.saved.take());
        if let Some((outputs, since)) = saved {
            self.gateway.restore(&outputs);
            let idle = now.saturating_sub(since);
            if let Some(run) = self.run.as_mut() {
                for w in [run.weigher.as_mut(), run.next.as_mut().and_then(|p| p.weigher.as_mut())]
                    .into_iter()
                    .flatten()
                {
                    w.shift(idle);
                }
            }
        }
        self.timers.resume(now);
        self.state.paused = false;
        tracing::info!(phase = %self.state.phase, "batch resumed");
        Ok(())
    }

    /// Emergency stop. Always succeeds, from any state, any number of times.
    pub fn stop(&mut self, now: u64) {
        let was = self.state.phase;
        self.timers.cancel_all();
        self.gateway.emergency_off();
        self.run = None;
        self.state = ProductionState::default();
        if was != Phase::Idle {
            tracing::warn!(phase = %was, at = now, "batch stopped");
            self.observer.on_phase(Phase::Idle, 0);
        }
    }

    /// Run every tick due at `now`, in deadline order.
    pub fn advance(&mut self, now: u64, feed: FeedInput) {
        self.feed = feed;
        while let Some((at, tick)) = self.timers.pop_due(now) {
            tracing::trace!(at, ?tick, "tick");
            self.fire(at, tick);
        }
    }

    fn switch(&mut self, a: Actuator, on: bool) {
        if let Err(e) = self.gateway.set(a, on) {
            tracing::error!(relay = a.name(), on, error = %e, "relay not switched");
        }
    }

    fn enter(&mut self, phase: Phase) {
        self.state.phase = phase;
        tracing::debug!(%phase, mixing = self.state.mixing, "phase");
        self.observer.on_phase(phase, self.state.mixing);
    }

    fn fire(&mut self, at: u64, tick: Tick) {
        match tick {
            Tick::Settle(slot) => self.on_settle(at, slot),
            Tick::WeighStep(slot) => self.on_weigh_step(at, slot),
            Tick::DischargeCement => self.on_discharge_cement(),
            Tick::DischargeWater => self.on_discharge_water(),
            Tick::DischargeEnd => self.on_discharge_end(at),
            Tick::Dump(m) => self.on_dump(at, m),
            Tick::MixSecond => self.on_mix_second(at),
            Tick::Door(step) => self.on_door(at, step),
            Tick::CompleteGrace => self.on_complete_grace(at),
            Tick::HornOff => self.switch(Actuator::Horn, false),
            Tick::MixerIdleOff => {
                tracing::info!("mixer idle, switching off");
                self.switch(Actuator::Mixer, false);
            }
        }
    }

    // ---- weighing -------------------------------------------------------

    fn on_settle(&mut self, at: u64, slot: Slot) {
        let Some(run) = self.run.as_mut() else { return };
        let w = Weigher::begin(
            &mut self.gateway,
            &run.batch,
            self.cfg.variant,
            self.state.per_mixing_target,
            &self.cfg.weighing,
            &self.feed,
        );
        let period = w.period(&self.cfg.weighing);
        match slot {
            Slot::Current => run.weigher = Some(w),
            Slot::Next => {
                if let Some(p) = run.next.as_mut() {
                    p.weigher = Some(w);
                }
            }
        }
        // Aggregates of a timer-dump plant may already be complete
        self.timers.schedule(at, period, Tick::WeighStep(slot));
    }

    fn on_weigh_step(&mut self, at: u64, slot: Slot) {
        let Some(run) = self.run.as_mut() else { return };
        let feed = self.feed;
        let w = match slot {
            Slot::Current => run.weigher.as_mut(),
            Slot::Next => run.next.as_mut().and_then(|p| p.weigher.as_mut()),
        };
        let Some(w) = w else { return };
        let done = w.step(&mut self.gateway, &feed, at);
        let period = w.period(&self.cfg.weighing);
        if slot == Slot::Current {
            self.state.current = w.current();
            self.state.weighing_done = w.done();
        }
        if !done {
            self.timers.schedule(at, period, Tick::WeighStep(slot));
            return;
        }
        match slot {
            Slot::Current => self.finish_weighing(at),
            Slot::Next => self.finish_pipeline(),
        }
    }

    /// Book what a finished weigher consumed from silos and bins.
    fn book_consumption(&mut self, weighed: PerMaterial<f64>) {
        let Some(run) = self.run.as_ref() else { return };
        for (silo, kg) in run.batch.cement_per_silo(weighed.semen) {
            if kg > 0.0 {
                self.observer.on_cement_deduction(silo, kg);
            }
        }
        if self.cfg.variant == PlantVariant::Hoppers {
            for m in [Material::Pasir, Material::Batu] {
                let bins = run.batch.bins(m);
                let each = share(weighed[m], bins.len());
                if each <= 0.0 {
                    continue;
                }
                for bin in bins {
                    self.observer.on_aggregate_deduction(m, bin, each);
                }
            }
        }
    }

    fn finish_weighing(&mut self, at: u64) {
        let Some(w) = self.run.as_mut().and_then(|r| r.weigher.take()) else {
            return;
        };
        w.finish(&mut self.gateway);
        let weighed = w.current();
        for m in Material::ALL {
            self.state.cumulative[m] += weighed[m];
        }
        tracing::info!(
            mixing = self.state.mixing,
            pasir = weighed.pasir,
            batu = weighed.batu,
            semen = weighed.semen,
            air = weighed.air,
            "weighing complete"
        );
        self.book_consumption(weighed);
        self.start_discharge(at);
    }

    fn finish_pipeline(&mut self) {
        let Some(p) = self.run.as_mut().and_then(|r| r.next.as_mut()) else {
            return;
        };
        let Some(w) = p.weigher.as_ref() else { return };
        w.finish(&mut self.gateway);
        let weighed = w.current();
        p.done = true;
        tracing::info!(mixing = self.state.mixing + 1, "next mixing weighed ahead");
        self.book_consumption(weighed);
    }

    // ---- discharging ----------------------------------------------------

    fn start_discharge(&mut self, at: u64) {
        self.enter(Phase::Discharging);
        self.state.discharged_materials = 0;
        let current = self.state.current;
        self.switch(Actuator::LowerBelt, true);
        self.switch(Actuator::Vibrator, true);
        if self.cfg.variant == PlantVariant::Hoppers {
            if current.pasir > 0.0 {
                self.switch(Actuator::SandHopperValve, true);
            }
            if current.batu > 0.0 {
                self.switch(Actuator::StoneHopperValve, true);
            }
        }

        let Some(run) = self.run.as_mut() else { return };
        run.discharge_timer_done = false;
        run.dumps.clear();
        if self.cfg.variant == PlantVariant::TimerDump {
            for m in [Material::Pasir, Material::Batu] {
                let mut dump = TimerDumpCycle::plan(m, run.batch.gates(m), current[m], &self.cfg.dump);
                if let Some(delay) = dump.begin(&mut self.gateway) {
                    self.timers.schedule(at, delay, Tick::Dump(m));
                }
                run.dumps.push(dump);
            }
        }
        let d = self.cfg.discharge;
        self.timers.schedule(at, d.cement_delay_ms, Tick::DischargeCement);
        self.timers.schedule(at, d.water_delay_ms, Tick::DischargeWater);
        self.timers.schedule(at, d.total_ms, Tick::DischargeEnd);
    }

    fn on_discharge_cement(&mut self) {
        if self.cfg.variant == PlantVariant::Hoppers {
            self.switch(Actuator::SandHopperValve, false);
            self.state.current.pasir = 0.0;
        }
        if self.state.current.semen > 0.0 {
            self.switch(Actuator::CementValve, true);
        }
    }

    fn on_discharge_water(&mut self) {
        let additive = self
            .run
            .as_ref()
            .map_or(0.0, |r| r.batch.additive_per_mixing());
        if self.state.current.air > 0.0 {
            self.switch(Actuator::WaterDischargeValve, true);
        }
        if additive > 0.0 {
            self.switch(Actuator::AdditiveValve, true);
        }
    }

    fn on_discharge_end(&mut self, at: u64) {
        for a in [
            Actuator::SandHopperValve,
            Actuator::StoneHopperValve,
            Actuator::CementValve,
            Actuator::WaterDischargeValve,
            Actuator::AdditiveValve,
        ] {
            self.switch(a, false);
        }
        let water = self.state.current.air;
        if water > 0.0 {
            self.observer.on_water_deduction(water);
        }
        self.state.current.semen = 0.0;
        self.state.current.air = 0.0;
        if self.cfg.variant == PlantVariant::Hoppers {
            self.state.current.pasir = 0.0;
            self.state.current.batu = 0.0;
        }
        let Some(run) = self.run.as_mut() else { return };
        run.discharge_timer_done = true;
        self.try_finish_discharge(at);
    }

    fn on_dump(&mut self, at: u64, m: Material) {
        let Some(run) = self.run.as_mut() else { return };
        let Some(dump) = run.dumps.iter_mut().find(|d| d.material() == m) else {
            return;
        };
        let step = dump.tick(&mut self.gateway);
        self.state.current[m] = (self.state.current[m] - step.deducted).max(0.0);
        if let Some(delay) = step.next_in_ms {
            self.timers.schedule(at, delay, Tick::Dump(m));
            return;
        }
        let total = dump.deducted();
        let each = dump.per_gate(total);
        let bins = run.batch.bins(m);
        self.state.current[m] = 0.0;
        self.state.discharged_materials += 1;
        for bin in bins {
            self.observer.on_aggregate_deduction(m, bin, each);
        }
        self.try_finish_discharge(at);
    }

    fn try_finish_discharge(&mut self, at: u64) {
        let Some(run) = self.run.as_ref() else { return };
        if !run.discharge_timer_done || !run.dumps.iter().all(TimerDumpCycle::is_done) {
            return;
        }
        self.switch(Actuator::Vibrator, false);
        self.switch(Actuator::LowerBelt, false);
        self.start_mixing(at);
    }

    // ---- mixing and door ------------------------------------------------

    fn start_mixing(&mut self, at: u64) {
        self.enter(Phase::Mixing);
        let Some(run) = self.run.as_mut() else { return };
        self.state.mixing_remaining_s = run.batch.mixing_secs;
        tracing::info!(
            mixing = self.state.mixing,
            seconds = run.batch.mixing_secs,
            "mixing started"
        );
        self.timers.schedule(at, MILLIS_PER_SEC, Tick::MixSecond);
        if self.cfg.pipeline && self.state.mixing < self.state.total_mixings {
            run.next = Some(Pipeline {
                weigher: None,
                done: false,
            });
            self.timers
                .schedule(at, self.cfg.weighing.settle_ms, Tick::Settle(Slot::Next));
        }
    }

    fn on_mix_second(&mut self, at: u64) {
        self.state.mixing_remaining_s = self.state.mixing_remaining_s.saturating_sub(1);
        if self.state.mixing_remaining_s > 0 {
            self.timers.schedule(at, MILLIS_PER_SEC, Tick::MixSecond);
            return;
        }
        self.start_door(at);
    }

    fn start_door(&mut self, at: u64) {
        self.enter(Phase::DoorCycle);
        let plan = DoorPlan::from_relays(self.gateway.map());
        if let Some(run) = self.run.as_mut() {
            run.door = Some(plan);
        }
        self.switch(Actuator::DoorOpen, true);
        self.timers
            .schedule(at, plan.open_ms, Tick::Door(DoorStep::OpenDone));
    }

    fn on_door(&mut self, at: u64, step: DoorStep) {
        let Some(plan) = self.run.as_ref().and_then(|r| r.door) else {
            return;
        };
        match step {
            DoorStep::OpenDone => {
                self.switch(Actuator::DoorOpen, false);
                self.timers
                    .schedule(at, plan.wait_ms, Tick::Door(DoorStep::WaitDone));
            }
            DoorStep::WaitDone if plan.twice() => {
                self.switch(Actuator::DoorOpen, true);
                self.timers
                    .schedule(at, plan.reopen_ms, Tick::Door(DoorStep::ReopenDone));
            }
            DoorStep::ReopenDone => {
                self.switch(Actuator::DoorOpen, false);
                self.timers
                    .schedule(at, plan.rewait_ms, Tick::Door(DoorStep::RewaitDone));
            }
            DoorStep::WaitDone | DoorStep::RewaitDone => {
                self.switch(Actuator::DoorClose, true);
                self.timers
                    .schedule(at, plan.close_ms, Tick::Door(DoorStep::CloseDone));
            }
            DoorStep::CloseDone => {
                self.switch(Actuator::DoorClose, false);
                self.complete_mixing(at);
            }
        }
    }

    // ---- completion -----------------------------------------------------

    fn complete_mixing(&mut self, at: u64) {
        self.enter(Phase::Complete);
        tracing::info!(
            mixing = self.state.mixing,
            total = self.state.total_mixings,
            "mixing complete"
        );
        if self.state.mixing >= self.state.total_mixings {
            self.switch(Actuator::Horn, true);
            self.timers.schedule(at, self.cfg.horn_ms, Tick::HornOff);
            if let Some(run) = self.run.as_ref() {
                let report = BatchReport {
                    final_weights: self.state.cumulative,
                    additive_kg: run.batch.additive_kg,
                    mixings: self.state.total_mixings,
                    started_at: run.started_at,
                    ended_at: Utc::now(),
                    started_ms: run.started_ms,
                    ended_ms: at,
                };
                tracing::info!(
                    mixings = report.mixings,
                    elapsed_ms = at.saturating_sub(report.started_ms),
                    "batch complete"
                );
                self.observer.on_complete(&report);
            }
        }
        self.timers.schedule(at, self.cfg.grace_ms, Tick::CompleteGrace);
    }

    fn on_complete_grace(&mut self, at: u64) {
        if self.state.mixing >= self.state.total_mixings {
            self.finish_batch(at);
            return;
        }
        self.state.mixing += 1;
        self.state.current = PerMaterial::default();
        self.state.weighing_done = PerMaterial::default();
        self.state.discharged_materials = 0;
        let Some(run) = self.run.as_mut() else { return };
        run.door = None;
        match run.next.take() {
            Some(Pipeline {
                weigher: Some(w),
                done: true,
            }) => {
                let weighed = w.current();
                self.state.current = weighed;
                self.state.weighing_done = w.done();
                for m in Material::ALL {
                    self.state.cumulative[m] += weighed[m];
                }
                self.observer.on_phase(Phase::Weighing, self.state.mixing);
                self.start_discharge(at);
            }
            Some(p) => {
                // Mixer was faster than the pre-weighing: it becomes the
                // current weighing and keeps its timeline
                let remaining = self
                    .timers
                    .remaining_for(at, |t| matches!(t, Tick::Settle(Slot::Next) | Tick::WeighStep(Slot::Next)));
                let settling = p.weigher.is_none();
                self.timers
                    .cancel_where(|t| matches!(t, Tick::Settle(Slot::Next) | Tick::WeighStep(Slot::Next)));
                run.weigher = p.weigher;
                if let Some(w) = run.weigher.as_ref() {
                    self.state.current = w.current();
                    self.state.weighing_done = w.done();
                }
                self.enter(Phase::Weighing);
                let tick = if settling {
                    Tick::Settle(Slot::Current)
                } else {
                    Tick::WeighStep(Slot::Current)
                };
                self.timers.schedule(at, remaining.unwrap_or(0), tick);
            }
            None => {
                self.enter(Phase::Weighing);
                self.timers
                    .schedule(at, self.cfg.weighing.settle_ms, Tick::Settle(Slot::Current));
            }
        }
    }

    fn finish_batch(&mut self, at: u64) {
        self.run = None;
        self.state = ProductionState::default();
        self.observer.on_phase(Phase::Idle, 0);
        if self.cfg.mixer_idle_off_ms == 0 {
            self.switch(Actuator::Mixer, false);
        } else {
            self.timers
                .schedule(at, self.cfg.mixer_idle_off_ms, Tick::MixerIdleOff);
        }
    }

    // ---- snapshots ------------------------------------------------------

    fn door_remaining(&self, now: u64) -> u64 {
        let Some(plan) = self.run.as_ref().and_then(|r| r.door) else {
            return 0;
        };
        let mut pending = None;
        let left = self.timers.remaining_for(now, |t| match t {
            Tick::Door(s) => {
                pending = Some(*s);
                true
            }
            _ => false,
        });
        match (left, pending) {
            (Some(left), Some(step)) => left + plan.after(step),
            _ => 0,
        }
    }

    /// Everything a display needs, as of `now`.
    pub fn snapshot(&self, now: u64) -> ProductionSnapshot {
        let s = &self.state;
        let pipe = self.run.as_ref().and_then(|r| r.next.as_ref());
        let pipe_done = pipe.is_some_and(|p| p.done);
        let waiting_for_mixer = pipe_done && s.phase == Phase::Mixing;
        let next_mixing_ready = pipe_done && matches!(s.phase, Phase::DoorCycle | Phase::Complete);
        // Next-mixing weights stay hidden until the door opens
        let current = match pipe.and_then(|p| p.weigher.as_ref()) {
            Some(w) if matches!(s.phase, Phase::DoorCycle | Phase::Complete) => w.current(),
            _ => s.current,
        };
        let weighers = self
            .run
            .as_ref()
            .map(|r| {
                [r.weigher.as_ref(), pipe.and_then(|p| p.weigher.as_ref())]
            })
            .unwrap_or_default();
        let aggregate_valve_closed = weighers
            .into_iter()
            .flatten()
            .any(|w| !s.paused && w.aggregate_valve_closed(&self.gateway));
        let feed_mode = self
            .run
            .as_ref()
            .and_then(|r| r.weigher.as_ref())
            .map(Weigher::mode);
        ProductionSnapshot {
            phase: s.phase,
            paused: s.paused,
            mixing: s.mixing,
            total_mixings: s.total_mixings,
            per_mixing_target: s.per_mixing_target,
            cumulative_target: s.cumulative_target,
            current,
            cumulative: s.cumulative,
            weighing_done: s.weighing_done,
            mixing_remaining_s: s.mixing_remaining_s,
            door_remaining_ms: self.door_remaining(now),
            discharged_materials: s.discharged_materials,
            components: *self.gateway.state(),
            connected: self.gateway.is_connected(),
            feed_mode,
            waiting_for_mixer,
            next_mixing_ready,
            aggregate_valve_closed,
            stable: StableWeights::default(),
        }
    }
}
