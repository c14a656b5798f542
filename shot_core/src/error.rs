//! Error types for the control core.
//!
//! Faults inside the running loop never surface as errors: they are mapped
//! to `ShotError` for logging and the loop carries on. `BuildError` covers
//! construction, where a bad config should stop startup.
use thiserror::Error;

/// Faults seen while talking to the outside world.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ShotError {
    #[error("scale transport error: {0}")]
    Transport(String),
    #[error("timeout talking to scale")]
    Timeout,
    #[error("scale not connected")]
    NotConnected,
    #[error("relay fault: {0}")]
    Relay(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BuildError {
    #[error("scale link not provided")]
    MissingLink,
    #[error("relay not provided")]
    MissingRelay,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
    #[error("expected {expected} presets, got {got}")]
    PresetCount { expected: usize, got: usize },
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
