use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("scale discovery timed out")]
    Timeout,
    #[error("scale not found: {0}")]
    NotFound(String),
    #[error("scale not connected")]
    NotConnected,
    #[error("scale transport: {0}")]
    Transport(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
