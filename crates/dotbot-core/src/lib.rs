//! # DotBot Core
//!
//! Plugin host and command dispatch runtime for a long running chat bot.
//!
//! Plugins are discovered from manifests (or compiled in), ordered by their declared
//! dependencies, started through a `Loaded -> Running -> Stopped` lifecycle, and
//! contribute hierarchical slash-style commands which the [`CommandDispatcher`] routes
//! incoming invocations through.
pub mod command;
pub mod kernel;
pub mod logging;
pub mod plugin_system;
pub mod storage;

pub use command::{
    ArgValue, CommandDispatcher, CommandOption, CommandRegistry, CommandResponse, CommandScope,
    Invocation,
};
pub use kernel::Host;
pub use kernel::error::{Error as KernelError, Result};
pub use logging::PluginLogger;
pub use plugin_system::{Plugin, PluginContext, PluginDescriptor, PluginManager};
pub use storage::{BotSettings, ConfigManager};

#[doc(hidden)]
pub use log;
