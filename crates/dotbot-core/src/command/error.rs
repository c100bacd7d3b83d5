use thiserror::Error;

use crate::command::registry::CommandScope;

/// Errors raised while registering or dispatching commands.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommandError {
    /// A node of a command tree breaks a structural rule; `node` is the space separated path.
    #[error("Invalid command tree at '{node}': {reason}")]
    InvalidCommandTree { node: String, reason: String },

    #[error("Command '{name}' is already registered in scope {scope}")]
    CommandNameCollision { scope: CommandScope, name: String },

    #[error("Plugin '{plugin_id}' cannot register commands while {state}")]
    PluginNotRunning { plugin_id: String, state: String },

    #[error("No command found for '{path}' in scope {scope}")]
    CommandNotFound { scope: CommandScope, path: String },

    #[error("Handler for '{path}' failed: {message}")]
    HandlerFailure { path: String, message: String },

    #[error("Invalid value for option '{option}' of '{path}': {reason}")]
    InvalidArgument {
        path: String,
        option: String,
        reason: String,
    },
}

impl CommandError {
    pub fn invalid_tree(node: impl Into<String>, reason: impl Into<String>) -> Self {
        CommandError::InvalidCommandTree {
            node: node.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for outcomes that are expected during normal operation.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            CommandError::CommandNotFound { .. } | CommandError::InvalidArgument { .. }
        )
    }
}
