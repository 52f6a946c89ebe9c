//! Error types for the acquisition engine.

use std::fmt;
use std::time::Duration;

use sdrscope_messages::ParseCommandError;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceErrorKind {
    /// No device at the given address or path.
    NotFound,
    /// The device rejected a parameter value.
    InvalidParameter,
    /// Transport or streaming failure, including stalled reads.
    IoFailure,
}

impl fmt::Display for DeviceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "device not found",
            Self::InvalidParameter => "invalid parameter",
            Self::IoFailure => "I/O failure",
        };
        f.write_str(name)
    }
}

/// Failure reported by a [`SampleSource`](crate::SampleSource).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct DeviceError {
    pub kind: DeviceErrorKind,
    pub message: String,
}

impl DeviceError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: DeviceErrorKind::NotFound,
            message: message.into(),
        }
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self {
            kind: DeviceErrorKind::InvalidParameter,
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self {
            kind: DeviceErrorKind::IoFailure,
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for DeviceError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(e.to_string()),
            _ => Self::io(e.to_string()),
        }
    }
}

/// Failure of a reconfiguration request. Never stops acquisition.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReconfigError {
    #[error("a configuration change is already pending")]
    Busy,
    #[error("acquisition did not pause within {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    InvalidCommand(#[from] ParseCommandError),
    #[error("acquisition has stopped")]
    Stopped,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroSize(&'static str),
    #[error("excerpt length {excerpt} exceeds batch size {batch}")]
    ExcerptTooLong { excerpt: usize, batch: usize },
    #[error("pause deadline {deadline:?} is shorter than one batch ({batch_period:?})")]
    PauseDeadlineTooShort {
        deadline: Duration,
        batch_period: Duration,
    },
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("device error: {0}")]
    Device(#[from] DeviceError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Advisory only: the pipeline is not keeping up with the device.
    #[error("overrun: utilization {utilization:.2} for {cycles} consecutive batches")]
    Overrun { utilization: f32, cycles: usize },
    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
}

pub type Result<T> = std::result::Result<T, EngineError>;
