// src/error.rs
use std::time::Duration;
use thiserror::Error;

/// Setup and lifecycle errors. These are the only errors that reach callers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MonitorError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("A check unit named '{0}' is already registered")]
    DuplicateName(String),

    #[error("Monitor is not running")]
    NotRunning,

    #[error("Monitor is already running")]
    AlreadyRunning,

    #[error("Internal scheduler error: {0}")]
    Internal(String),
}

impl MonitorError {
    pub fn config(msg: impl Into<String>) -> Self {
        MonitorError::Configuration(msg.into())
    }
}

/// Per-invocation probe errors. Never propagated, only recorded in a
/// `CheckOutcome`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("{0}")]
    Failed(String),

    #[error("probe panicked")]
    Panicked,

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("probe task was cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, MonitorError>;
