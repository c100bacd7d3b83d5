//! # Scoped Logging
//!
//! [`PluginLogger`] prefixes every record with the owning module (and an optional
//! category) before handing it to the `log` facade. The binary decides where records end
//! up; the core never writes to stdout for diagnostics.
use std::error::Error as StdError;
use std::fmt;

use log::Level;

/// `log` target used for records emitted through a [`PluginLogger`]
pub const PLUGIN_LOG_TARGET: &str = "dotbot::plugins";

/// Logger scoped to a module (usually a plugin's display name) and optional category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginLogger {
    module: String,
    category: Option<String>,
}

impl PluginLogger {
    /// Create a logger for `module` without a category
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            category: None,
        }
    }

    /// Create a logger for `module` with the given category
    pub fn with_category(module: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            category: Some(category.into()),
        }
    }

    /// Copy this logger, replacing the category.
    pub fn category(&self, category: impl Into<String>) -> Self {
        Self::with_category(self.module.clone(), category)
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn category_name(&self) -> Option<&str> {
        self.category.as_deref()
    }

    /// Render a message the way it is emitted: `[module][category] message`.
    pub fn format(&self, message: impl fmt::Display) -> String {
        match &self.category {
            Some(category) => format!("[{}][{}] {}", self.module, category, message),
            None => format!("[{}] {}", self.module, message),
        }
    }

    /// Emit a record at `level`, appending the cause chain when one is given.
    pub fn log(&self, level: Level, message: impl fmt::Display, cause: Option<&(dyn StdError + 'static)>) {
        if !log::log_enabled!(target: PLUGIN_LOG_TARGET, level) {
            return;
        }
        let mut line = self.format(message);
        let mut next = cause;
        while let Some(err) = next {
            line.push_str(": ");
            line.push_str(&err.to_string());
            next = err.source();
        }
        log::log!(target: PLUGIN_LOG_TARGET, level, "{}", line);
    }

    pub fn debug(&self, message: impl fmt::Display) {
        self.log(Level::Debug, message, None);
    }

    pub fn info(&self, message: impl fmt::Display) {
        self.log(Level::Info, message, None);
    }

    pub fn warn(&self, message: impl fmt::Display) {
        self.log(Level::Warn, message, None);
    }

    pub fn error(&self, message: impl fmt::Display, cause: Option<&(dyn StdError + 'static)>) {
        self.log(Level::Error, message, cause);
    }
}
