//! Human-readable error descriptions and structured JSON error formatting.

use crate::run::RunAbort;
use batcher_core::PlantError;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(abort) = err.downcast_ref::<RunAbort>() {
        return match abort {
            RunAbort::Interrupted => {
                "What happened: The batch was stopped by the operator (Ctrl-C).\nLikely causes: Manual interrupt.\nHow to fix: All outputs were switched off; start a new batch when the plant is ready.".to_string()
            }
            RunAbort::RunnerGone => {
                "What happened: The plant runner stopped before the batch completed.\nLikely causes: Internal failure in the runner thread.\nHow to fix: Re-run with --log-level=debug and check the log for the first error.".to_string()
            }
        };
    }

    if let Some(pe) = err.downcast_ref::<PlantError>() {
        return match pe {
            PlantError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range targets, unknown silo or bin, or a relay missing from the map.\nHow to fix: Edit the batch or plant config, then rerun."
            ),
            PlantError::UnknownActuator(name) => format!(
                "What happened: Relay '{name}' is not a known plant output.\nLikely causes: Typo in the [[relays]] table.\nHow to fix: Use one of the standard names (e.g. mixer, silo_1, door_open) and rerun."
            ),
            PlantError::HardwareDisconnected => {
                "What happened: The controller is not connected.\nLikely causes: Wrong link.addr, controller powered off, or network down.\nHow to fix: Check link.addr and the controller, or remove link.addr to run in simulation.".to_string()
            }
            PlantError::Hardware(msg) => format!(
                "What happened: Controller error ({msg}).\nLikely causes: Unexpected reply from the controller.\nHow to fix: Re-run with --log-level=debug and check the controller firmware."
            ),
            PlantError::State(msg) => format!(
                "What happened: {msg}.\nLikely causes: Command issued in the wrong plant state.\nHow to fix: Wait for the current batch to finish or stop it first."
            ),
        };
    }

    // String-based heuristics for errors coming from config and file loading
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("weight series csv must have headers") {
        return "Invalid headers in weight series CSV. Expected 'timestamp_ms,pasir,batu,semen,air'."
            .to_string();
    }

    if lower.contains("parse batch") {
        return format!(
            "What happened: The batch file could not be parsed.\nLikely causes: Missing [targets] or mixing_seconds, or a typo in a key.\nHow to fix: Compare with etc/batch_example.toml. Original: {msg}"
        );
    }

    if lower.contains("read config") || lower.contains("parse config") || lower.contains("must be")
    {
        return format!(
            "What happened: Plant configuration is invalid or unreadable.\nLikely causes: Missing file or out-of-range values.\nHow to fix: Edit the TOML config and try again. Original: {msg}"
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes for scripted use; anything unclassified returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(abort) = err.downcast_ref::<RunAbort>() {
        return match abort {
            RunAbort::Interrupted => 2,
            RunAbort::RunnerGone => 6,
        };
    }
    match err.downcast_ref::<PlantError>() {
        Some(PlantError::InvalidConfig(_) | PlantError::UnknownActuator(_)) => 3,
        Some(PlantError::HardwareDisconnected) => 4,
        Some(PlantError::Hardware(_)) => 5,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(abort) = err.downcast_ref::<RunAbort>() {
        return match abort {
            RunAbort::Interrupted => "Interrupted",
            RunAbort::RunnerGone => "RunnerGone",
        };
    }
    match err.downcast_ref::<PlantError>() {
        Some(PlantError::InvalidConfig(_)) => "InvalidConfig",
        Some(PlantError::UnknownActuator(_)) => "UnknownActuator",
        Some(PlantError::HardwareDisconnected) => "HardwareDisconnected",
        Some(PlantError::Hardware(_)) => "Hardware",
        Some(PlantError::State(_)) => "State",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let detail = match err.downcast_ref::<PlantError>() {
        Some(PlantError::InvalidConfig(d) | PlantError::Hardware(d) | PlantError::State(d)) => {
            Some(json!({ "detail": d }))
        }
        Some(PlantError::UnknownActuator(name)) => Some(json!({ "relay": name })),
        _ => None,
    };
    let msg = humanize(err);
    let obj = match detail {
        Some(d) => json!({ "reason": reason_name(err), "details": d, "message": msg }),
        None => json!({ "reason": reason_name(err), "message": msg }),
    };
    obj.to_string()
}
