use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlantError {
    /// Batch or plant configuration rejected before anything was switched.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("unknown actuator: {0}")]
    UnknownActuator(String),
    #[error("controller disconnected")]
    HardwareDisconnected,
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("invalid state: {0}")]
    State(String),
}

impl PlantError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
