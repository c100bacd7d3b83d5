//! # DotBot Core Kernel Errors
//!
//! The kernel [`Error`] wraps every subsystem error so the binary can report any failure
//! through a single type. Subsystems keep their own typed errors:
//! [`PluginSystemError`], [`CommandError`] and [`StorageError`].
use std::result::Result as StdResult;

use thiserror::Error as ThisError;

use crate::command::error::CommandError;
use crate::plugin_system::error::PluginSystemError;
use crate::storage::error::StorageError;

/// Top level error type for the DotBot host
#[derive(Debug, ThisError)]
pub enum Error {
    /// Plugin discovery, resolution, loading or lifecycle error
    #[error("Plugin system error: {0}")]
    PluginSystem(#[from] PluginSystemError),

    /// Command registration or dispatch error
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    /// Settings loading or persistence error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Error occurring during a specific kernel lifecycle phase.
    #[error("Kernel lifecycle error during {phase}: {message}")]
    KernelLifecycleError {
        phase: KernelLifecyclePhase,
        message: String,
    },

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Represents a specific phase in the host's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum KernelLifecyclePhase {
    #[error("Resolve")]
    Resolve,
    #[error("Start")]
    Start,
    #[error("Shutdown")]
    Shutdown,
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}
