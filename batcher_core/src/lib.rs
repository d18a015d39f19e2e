#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core batching logic (hardware-agnostic).
//!
//! The controller is reached only through `batcher_traits::RelayLink` and
//! `batcher_traits::WeightFeed`.
//!
//! ## Architecture
//!
//! - **Actuators**: typed relay catalogue and the relay map (`actuator`)
//! - **Gateway**: edge-triggered relay output, local latch while offline (`gateway`)
//! - **Sequencer**: the batch state machine on one ordered timer registry
//!   (`sequencer`, `timers`, `weigher`)
//! - **Timer dumping**: pulsed aggregate discharge (`dump_cycle`)
//! - **Display**: weight debounce for operator screens (`stabilizer`)
//! - **Manual production**: peak/drop discharge bookkeeping (`detector`, `manual`)
//! - **Runner**: the threaded owner of all of the above (`runner`)
//!
//! ## Time
//!
//! Nothing in here reads a clock except the runner. The sequencer is driven
//! with explicit millisecond timestamps, which keeps every phase replayable
//! in tests.

pub mod actuator;
pub mod batch;
pub mod config;
pub mod conversions;
pub mod detector;
pub mod dump_cycle;
pub mod error;
pub mod gateway;
pub mod hw_error;
pub mod manual;
pub mod material;
pub mod mocks;
pub mod runner;
pub mod sequencer;
pub mod stabilizer;
pub mod state;
pub mod timers;
pub mod util;
mod weigher;

pub use actuator::{Actuator, ComponentState, RelayMap, RelaySlot};
pub use batch::{BatchConfig, Moisture};
pub use config::{
    DetectorCfg, DischargeCfg, DumpCycleCfg, JogCfg, PlantVariant, SequencerCfg, StabilizerCfg,
    WeighingCfg,
};
pub use detector::{DischargeDetector, DischargeEvent};
pub use dump_cycle::{DumpStep, TimerDumpCycle};
pub use error::{PlantError, Report, Result};
pub use gateway::RelayGateway;
pub use manual::{ManualRecord, ManualSession};
pub use material::{Material, PerMaterial};
pub use runner::{PlantEvent, PlantRunner, RunnerOptions};
pub use sequencer::{BatchObserver, BatchSequencer, NoopObserver};
pub use stabilizer::{Channel, Commit, DisplayGate, StableWeights, Update, WeightStabilizer};
pub use state::{BatchReport, FeedInput, FeedMode, Phase, ProductionSnapshot, ProductionState};
