use std::path::PathBuf;

use thiserror::Error;

use crate::plugin_system::context::PluginState;
use crate::plugin_system::dependency::DependencyError;

/// Errors raised by plugin discovery, loading and lifecycle management.
#[derive(Debug, Error)]
pub enum PluginSystemError {
    #[error("Dependency resolution failed: {0}")]
    DependencyResolution(#[from] DependencyError),

    #[error("Invalid plugin manifest '{path}': {message}")]
    ManifestError { path: PathBuf, message: String },

    #[error("Failed to load plugin '{plugin_id}'{}: {message}", path.as_ref().map(|p| format!(" from {}", p.display())).unwrap_or_default())]
    LoadingError {
        plugin_id: String,
        path: Option<PathBuf>,
        message: String,
    },

    #[error("Plugin '{plugin_id}' failed to start: {message}")]
    StartFailure { plugin_id: String, message: String },

    #[error("Plugin '{plugin_id}' failed to shut down: {message}")]
    ShutdownFailure { plugin_id: String, message: String },

    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    #[error("Cannot {operation} plugin '{plugin_id}' while {state}")]
    InvalidState {
        plugin_id: String,
        state: PluginState,
        operation: String,
    },

    #[error("I/O error while scanning '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
