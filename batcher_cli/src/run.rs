//! Automatic production: config mapping, link assembly and the event loop.

use batcher_core::mocks::{NoFeed, OfflineLink};
use batcher_core::{
    BatchConfig, BatchReport, PlantEvent, PlantRunner, RelayMap, RunnerOptions, SequencerCfg,
    StabilizerCfg,
};
use batcher_hardware::{ControllerLink, LinkOptions};
use batcher_traits::{MonotonicClock, RelayLink, WeightFeed};
use eyre::{Result, WrapErr};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const EVENT_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum RunAbort {
    #[error("batch interrupted by operator")]
    Interrupted,
    #[error("runner stopped before the batch completed")]
    RunnerGone,
}

pub struct RunArgs<'a> {
    pub batch: &'a Path,
    pub time_scale: u32,
    pub tick_ms: u64,
    pub pipeline: bool,
    pub json: bool,
}

type BoxedLink = Box<dyn RelayLink + Send>;
type BoxedFeed = Box<dyn WeightFeed + Send>;

/// Controller link when `link.addr` is set, otherwise the offline stand-ins.
/// The returned `ControllerLink` must outlive the handles.
pub fn open_link(cfg: &batcher_config::Config) -> (Option<ControllerLink>, BoxedLink, BoxedFeed) {
    match cfg.link.addr.as_deref() {
        Some(addr) => {
            let mut opts = LinkOptions::new(addr);
            opts.reconnect = Duration::from_millis(cfg.link.reconnect_ms);
            opts.connect_timeout = Duration::from_millis(cfg.link.connect_timeout_ms);
            let link = ControllerLink::spawn(opts, MonotonicClock::new());
            let relays: BoxedLink = Box::new(link.relays());
            let feed: BoxedFeed = Box::new(link.feed());
            (Some(link), relays, feed)
        }
        None => {
            tracing::warn!("no link.addr configured; running in simulation");
            (None, Box::new(OfflineLink), Box::new(NoFeed))
        }
    }
}

fn load_batch(path: &Path, cfg: &batcher_config::Config) -> Result<BatchConfig> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read batch file {}", path.display()))?;
    let file = batcher_config::load_batch_toml(&text)?;
    Ok(BatchConfig::from_file(&file, &cfg.moisture))
}

fn print_event(ev: &PlantEvent, json: bool) {
    if json {
        let line = match ev {
            PlantEvent::Phase { phase, mixing } => {
                json!({ "event": "phase", "phase": phase, "mixing": mixing })
            }
            PlantEvent::CementDeducted { silo, kg } => {
                json!({ "event": "cement_deducted", "silo": silo, "kg": kg })
            }
            PlantEvent::AggregateDeducted { material, bin, kg } => {
                json!({ "event": "aggregate_deducted", "material": material, "bin": bin, "kg": kg })
            }
            PlantEvent::WaterDeducted { kg } => json!({ "event": "water_deducted", "kg": kg }),
            PlantEvent::Connectivity(up) => json!({ "event": "connectivity", "connected": up }),
            PlantEvent::CommandRejected(why) => json!({ "event": "rejected", "reason": why }),
            PlantEvent::Completed(_) => return,
        };
        println!("{line}");
        return;
    }
    match ev {
        PlantEvent::Phase { phase, mixing } if *mixing > 0 => println!("mixing {mixing}: {phase}"),
        PlantEvent::Phase { phase, .. } => println!("{phase}"),
        PlantEvent::Connectivity(up) => {
            println!("controller {}", if *up { "connected" } else { "disconnected" });
        }
        PlantEvent::CommandRejected(why) => println!("command rejected: {why}"),
        // Stock bookkeeping is logged, not printed
        _ => tracing::debug!(?ev, "stock"),
    }
}

fn print_report(report: &BatchReport, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            json!({ "event": "complete", "report": serde_json::to_value(report)? })
        );
        return Ok(());
    }
    let w = report.rounded(2);
    println!("Batch complete: {} mixing(s)", report.mixings);
    println!(
        "  pasir {:.2} kg, batu {:.2} kg, semen {:.2} kg, air {:.2} kg, additive {:.2} kg",
        w.pasir, w.batu, w.semen, w.air, report.additive_kg
    );
    let secs = report.ended_ms.saturating_sub(report.started_ms) / 1000;
    println!("  plant time {secs} s");
    Ok(())
}

pub fn run_batch(
    cfg: &batcher_config::Config,
    args: &RunArgs<'_>,
    shutdown: &Arc<AtomicBool>,
) -> Result<BatchReport> {
    let batch = load_batch(args.batch, cfg)?;
    let mut seq: SequencerCfg = cfg.into();
    seq.pipeline |= args.pipeline;
    let relays = RelayMap::try_from(cfg.relays.as_slice())?;
    let stabilizer: StabilizerCfg = (&cfg.stabilizer).into();

    let (_link, relay_link, feed) = open_link(cfg);
    let opts = RunnerOptions {
        tick: Duration::from_millis(args.tick_ms.max(1)),
        time_scale: args.time_scale.max(1),
    };
    let runner = PlantRunner::spawn(
        seq,
        relays,
        stabilizer,
        relay_link,
        feed,
        MonotonicClock::new(),
        opts,
    );

    tracing::info!(
        mixings = batch.mixings,
        mixing_secs = batch.mixing_secs,
        time_scale = opts.time_scale,
        "starting batch"
    );
    runner.start(batch)?;

    loop {
        if shutdown.load(Ordering::Relaxed) {
            tracing::warn!("interrupt received; stopping plant");
            runner.stop()?;
            return Err(RunAbort::Interrupted.into());
        }
        match runner.events().recv_timeout(EVENT_POLL) {
            Ok(PlantEvent::Completed(report)) => {
                print_report(&report, args.json)?;
                return Ok(report);
            }
            Ok(ev) => print_event(&ev, args.json),
            Err(e) if e.is_timeout() => {}
            Err(_) => return Err(RunAbort::RunnerGone.into()),
        }
    }
}
