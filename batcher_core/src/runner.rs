//! Plant runner: one thread that owns the sequencer, the relay gateway, the
//! weight feed and the display stabilizer.
//!
//! Callers talk to it through a command channel and read back a published
//! [`ProductionSnapshot`] plus a stream of [`PlantEvent`]s. The thread is shut
//! down and joined when the runner is dropped, and it always leaves the plant
//! with every output off.
use crate::actuator::RelayMap;
use crate::batch::BatchConfig;
use crate::config::{SequencerCfg, StabilizerCfg};
use crate::error::{PlantError, Result};
use crate::gateway::RelayGateway;
use crate::material::Material;
use crate::sequencer::{BatchObserver, BatchSequencer};
use crate::stabilizer::WeightStabilizer;
use crate::state::{BatchReport, FeedInput, Phase, ProductionSnapshot};
use batcher_traits::clock::Clock;
use batcher_traits::{RelayLink, WeightFeed, Weights};
use crossbeam_channel as xch;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy)]
pub struct RunnerOptions {
    /// Poll period of the runner thread
    pub tick: Duration,
    /// Plant milliseconds per wall-clock millisecond (1 = real time)
    pub time_scale: u32,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(50),
            time_scale: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlantEvent {
    Phase { phase: Phase, mixing: u32 },
    Completed(BatchReport),
    CementDeducted { silo: u8, kg: f64 },
    AggregateDeducted { material: Material, bin: u8, kg: f64 },
    WaterDeducted { kg: f64 },
    Connectivity(bool),
    CommandRejected(String),
}

#[derive(Debug)]
enum Command {
    Start(Box<BatchConfig>),
    Pause,
    Resume,
    Stop,
}

struct ChannelObserver {
    tx: xch::Sender<PlantEvent>,
}

impl ChannelObserver {
    fn emit(&self, ev: PlantEvent) {
        if let Err(xch::TrySendError::Full(ev)) = self.tx.try_send(ev) {
            tracing::warn!(?ev, "event queue full, event dropped");
        }
    }
}

impl BatchObserver for ChannelObserver {
    fn on_phase(&mut self, phase: Phase, mixing: u32) {
        self.emit(PlantEvent::Phase { phase, mixing });
    }
    fn on_complete(&mut self, report: &BatchReport) {
        self.emit(PlantEvent::Completed(report.clone()));
    }
    fn on_cement_deduction(&mut self, silo: u8, kg: f64) {
        self.emit(PlantEvent::CementDeducted { silo, kg });
    }
    fn on_aggregate_deduction(&mut self, material: Material, bin: u8, kg: f64) {
        self.emit(PlantEvent::AggregateDeducted { material, bin, kg });
    }
    fn on_water_deduction(&mut self, kg: f64) {
        self.emit(PlantEvent::WaterDeducted { kg });
    }
}

pub struct PlantRunner {
    tx: xch::Sender<Command>,
    events: xch::Receiver<PlantEvent>,
    snapshot: Arc<Mutex<ProductionSnapshot>>,
    /// Set from `start()` until the thread has published the started batch
    start_pending: Arc<AtomicBool>,
    cfg: SequencerCfg,
    relays: RelayMap,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl PlantRunner {
    pub fn spawn<L, F, C>(
        cfg: SequencerCfg,
        relays: RelayMap,
        stabilizer: StabilizerCfg,
        link: L,
        mut feed: F,
        clock: C,
        opts: RunnerOptions,
    ) -> Self
    where
        L: RelayLink + Send + 'static,
        F: WeightFeed + Send + 'static,
        C: Clock + Send + 'static,
    {
        let (tx, rx) = xch::unbounded::<Command>();
        let (ev_tx, events) = xch::bounded(EVENT_CAPACITY);
        let snapshot = Arc::new(Mutex::new(ProductionSnapshot::default()));
        let shutdown = Arc::new(AtomicBool::new(false));
        let start_pending = Arc::new(AtomicBool::new(false));

        let pending_clone = start_pending.clone();
        let snapshot_clone = snapshot.clone();
        let shutdown_clone = shutdown.clone();
        let seq_cfg = cfg.clone();
        let seq_relays = relays.clone();
        let scale = u64::from(opts.time_scale.max(1));

        let join_handle = std::thread::spawn(move || {
            let observer = ChannelObserver { tx: ev_tx.clone() };
            let events = ChannelObserver { tx: ev_tx };
            let gateway = RelayGateway::new(link, seq_relays);
            let mut seq = BatchSequencer::with_observer(seq_cfg, gateway, Box::new(observer));
            let mut stab = WeightStabilizer::new(stabilizer);
            let mut last: Option<Weights> = None;
            let epoch = clock.now();
            let now_ms = |c: &C| c.ms_since(epoch).saturating_mul(scale);

            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("runner thread received shutdown signal");
                    break;
                }
                let now = now_ms(&clock);
                let mut start_seen = false;
                for cmd in rx.try_iter() {
                    let outcome = match cmd {
                        Command::Start(b) => {
                            start_seen = true;
                            seq.start(*b, now)
                        }
                        Command::Pause => seq.pause(now),
                        Command::Resume => seq.resume(now),
                        Command::Stop => {
                            seq.stop(now);
                            Ok(())
                        }
                    };
                    if let Err(e) = outcome {
                        tracing::warn!(error = %e, "command rejected");
                        events.emit(PlantEvent::CommandRejected(e.to_string()));
                    }
                }

                if let Some(up) = seq.gateway_mut().sync() {
                    events.emit(PlantEvent::Connectivity(up));
                }
                let mut live = feed.is_live();
                match feed.latest() {
                    Ok(Some(w)) => last = Some(w),
                    Ok(None) => {}
                    Err(e) => {
                        tracing::trace!(error = %e, "weight feed unavailable");
                        live = false;
                    }
                }
                let input = if live {
                    FeedInput {
                        live,
                        weights: last,
                    }
                } else {
                    FeedInput::offline()
                };

                seq.advance(now, input);
                let mut snap = seq.snapshot(now);
                let gate = snap.display_gate();
                let raw = match input.weights {
                    Some(w) if input.live => w,
                    _ => Weights {
                        pasir: snap.current.pasir,
                        batu: snap.current.batu,
                        semen: snap.current.semen,
                        air: snap.current.air,
                    },
                };
                // Commit what stayed quiet since the last frame before this one lands
                stab.poll(now, gate);
                stab.observe(&raw, now, gate);
                stab.poll(now, gate);
                snap.stable = stab.snapshot();
                match snapshot_clone.lock() {
                    Ok(mut g) => *g = snap,
                    Err(e) => *e.into_inner() = snap,
                }
                if start_seen {
                    pending_clone.store(false, Ordering::Release);
                }

                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                clock.sleep(opts.tick);
            }
            seq.stop(now_ms(&clock));
            tracing::trace!("runner thread exiting cleanly");
        });

        Self {
            tx,
            events,
            snapshot,
            start_pending,
            cfg,
            relays,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    fn send(&self, cmd: Command) -> Result<()> {
        self.tx
            .send(cmd)
            .map_err(|_| PlantError::State("runner has stopped".into()).into())
    }

    /// Validate `batch` now and queue it. Busy plants and malformed orders
    /// are rejected here without touching the plant. A second call made
    /// before the thread has picked up the first is rejected as busy too.
    pub fn start(&self, batch: BatchConfig) -> Result<()> {
        batch.check(&self.cfg, &self.relays)?;
        let busy = || -> eyre::Report { PlantError::invalid("batch already in progress").into() };
        if self
            .start_pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(busy());
        }
        // The flag is cleared only after the thread publishes, so this read is fresh
        if self.snapshot().is_producing() {
            self.start_pending.store(false, Ordering::Release);
            return Err(busy());
        }
        self.send(Command::Start(Box::new(batch))).inspect_err(|_| {
            self.start_pending.store(false, Ordering::Release);
        })
    }

    pub fn pause(&self) -> Result<()> {
        self.send(Command::Pause)
    }

    pub fn resume(&self) -> Result<()> {
        self.send(Command::Resume)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(Command::Stop)
    }

    pub fn snapshot(&self) -> ProductionSnapshot {
        match self.snapshot.lock() {
            Ok(g) => g.clone(),
            Err(e) => e.into_inner().clone(),
        }
    }

    pub fn events(&self) -> &xch::Receiver<PlantEvent> {
        &self.events
    }
}

impl Drop for PlantRunner {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("runner thread joined"),
                Err(e) => tracing::error!("runner thread panicked: {:?}", e),
            }
        }
    }
}
