#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod cli;
mod error_fmt;
mod manual;
mod run;

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use batcher_core::{RelayMap, SequencerCfg};
use clap::Parser;
use eyre::{Result, WrapErr};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = real_main(&cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        tracing::error!(error = %e, "command failed");
        std::process::exit(exit_code_for_error(&e));
    }
}

fn real_main(cli: &Cli) -> Result<()> {
    let cfg = load_config(&cli.config)?;
    init_tracing(cli.json, cli.log_level.as_deref(), &cfg.logging);
    tracing::debug!(config = %cli.config.display(), "config loaded");

    match &cli.cmd {
        Commands::Run {
            batch,
            time_scale,
            tick_ms,
            pipeline,
        } => {
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = shutdown.clone();
            if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
                tracing::warn!(error = %e, "failed to install Ctrl-C handler");
            }
            let args = run::RunArgs {
                batch,
                time_scale: *time_scale,
                tick_ms: *tick_ms,
                pipeline: *pipeline,
                json: cli.json,
            };
            run::run_batch(&cfg, &args, &shutdown)?;
        }
        Commands::Manual { series } => {
            manual::replay(&cfg, series, cli.json)?;
        }
        Commands::SelfCheck => self_check(&cfg, cli.json)?,
    }
    Ok(())
}

fn load_config(path: &Path) -> Result<batcher_config::Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg: batcher_config::Config =
        toml::from_str(&text).wrap_err_with(|| format!("parse config {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

fn console_layer<S>(json: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    if json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    }
}

fn file_layer<S>(log: &batcher_config::Logging) -> Option<Box<dyn Layer<S> + Send + Sync>>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let path = Path::new(log.file.as_deref()?);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = path.file_name()?;
    let appender = match log.rotation.as_deref() {
        Some("daily") => tracing_appender::rolling::daily(dir, name),
        Some("hourly") => tracing_appender::rolling::hourly(dir, name),
        _ => tracing_appender::rolling::never(dir, name),
    };
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = FILE_GUARD.set(guard);
    Some(
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(writer)
            .boxed(),
    )
}

/// Console + optional JSON file logging. `RUST_LOG` wins over the CLI level,
/// which wins over `logging.level`.
fn init_tracing(json: bool, cli_level: Option<&str>, log: &batcher_config::Logging) {
    let level = cli_level.or(log.level.as_deref()).unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer(json))
        .with(file_layer(log))
        .try_init();
}

fn self_check(cfg: &batcher_config::Config, json: bool) -> Result<()> {
    let seq: SequencerCfg = cfg.into();
    let relays = RelayMap::try_from(cfg.relays.as_slice())?;

    let connected = match &cfg.link.addr {
        Some(addr) => {
            let (link, _, _) = run::open_link(cfg);
            let deadline = Instant::now() + Duration::from_millis(cfg.link.connect_timeout_ms);
            let up = link.as_ref().is_some_and(|l| {
                while !l.is_connected() && Instant::now() < deadline {
                    std::thread::sleep(Duration::from_millis(20));
                }
                l.is_connected()
            });
            if !up {
                tracing::error!(%addr, "controller did not answer");
                return Err(batcher_core::PlantError::HardwareDisconnected.into());
            }
            Some(true)
        }
        None => None,
    };

    if json {
        let line = serde_json::json!({
            "status": "ok",
            "variant": format!("{:?}", seq.variant),
            "silos": seq.silos,
            "relays": relays.len(),
            "pipeline": seq.pipeline,
            "connected": connected,
        });
        println!("{line}");
    } else {
        println!(
            "OK: {:?} plant, {} silo(s), {} relay(s) mapped, {}",
            seq.variant,
            seq.silos,
            relays.len(),
            match connected {
                Some(_) => "controller connected",
                None => "simulation (no link.addr)",
            }
        );
    }
    Ok(())
}
