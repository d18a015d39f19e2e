use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("controller disconnected")]
    Disconnected,
    #[error("controller reported error: {0}")]
    Controller(String),
    #[error("protocol: {0}")]
    Protocol(#[from] serde_json::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
