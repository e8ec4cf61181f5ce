//! Error taxonomy
//!
//! Every failure is terminal: the binary prints the error to stderr and
//! exits with [`WaitError::exit_code`]. Nothing is retried.

use crate::bus::BusKind;

#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    /// Bad or missing command line input
    #[error("{0}")]
    Usage(String),

    /// The -d descriptor could not be opened for writing
    #[error("fdopen {fd}: {source}")]
    NotifyFd { fd: i32, source: nix::Error },

    /// Writing the readiness byte failed
    #[error("notify: {0}")]
    Notify(#[from] std::io::Error),

    #[error("fork (step {step}): {source}")]
    Fork { step: u8, source: nix::Error },

    #[error("exec {program}: {source}")]
    Exec { program: String, source: nix::Error },

    #[error("failed to start runtime: {0}")]
    Runtime(std::io::Error),

    #[error("Failed to acquire {kind} bus: {source}")]
    Connect { kind: BusKind, source: zbus::Error },

    #[error("Failed to setup filter: {0}")]
    Filter(zbus::Error),

    #[error("Failed to query bus names: {0}")]
    Query(zbus::Error),

    /// Reading from the connection failed
    #[error("bus dispatch failed: {0}")]
    Dispatch(zbus::Error),

    /// The message stream ended; the connection is unusable
    #[error("bus connection closed")]
    BusClosed,

    #[error("Timeout reached")]
    Timeout,
}

impl WaitError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        1
    }
}

pub type Result<T> = std::result::Result<T, WaitError>;
