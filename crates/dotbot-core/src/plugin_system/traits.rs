use std::fmt;

use async_trait::async_trait;

use crate::command::error::CommandError;
use crate::plugin_system::context::PluginContext;

/// Error type for plugin hooks
#[derive(Debug)]
pub enum PluginError {
    StartError(String),
    ShutdownError(String),
    CommandError(CommandError),
    ExecutionError(String),
}

impl fmt::Display for PluginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginError::StartError(msg) => write!(f, "Plugin start error: {}", msg),
            PluginError::ShutdownError(msg) => write!(f, "Plugin shutdown error: {}", msg),
            PluginError::CommandError(err) => write!(f, "Plugin command error: {}", err),
            PluginError::ExecutionError(msg) => write!(f, "Plugin execution error: {}", msg),
        }
    }
}

impl std::error::Error for PluginError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PluginError::CommandError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CommandError> for PluginError {
    fn from(err: CommandError) -> Self {
        PluginError::CommandError(err)
    }
}

pub type PluginResult = std::result::Result<(), PluginError>;

/// Core trait that all plugins must implement.
///
/// Hooks run in this order: [`start`](Plugin::start), then
/// [`start_async`](Plugin::start_async); on the way down [`shutdown`](Plugin::shutdown),
/// then [`shutdown_async`](Plugin::shutdown_async). Commands may be registered from any
/// hook while the plugin is running.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Display name, also used as the logger module
    fn name(&self) -> &str;

    fn version(&self) -> &str {
        "0.0.0"
    }

    fn author(&self) -> &str {
        ""
    }

    /// Block the startup sequence until [`start_async`](Plugin::start_async) completes.
    fn should_wait(&self) -> bool {
        false
    }

    fn start(&self, _ctx: &PluginContext) -> PluginResult {
        Ok(())
    }

    async fn start_async(&self, _ctx: &PluginContext) -> PluginResult {
        Ok(())
    }

    fn shutdown(&self, _ctx: &PluginContext) -> PluginResult {
        Ok(())
    }

    async fn shutdown_async(&self, _ctx: &PluginContext) -> PluginResult {
        Ok(())
    }
}

/// Export a plugin type from a `cdylib` so the native loader can create it.
///
/// Also exports a hook through which the host hands its logger to the library, so the
/// plugin's `log` records reach the host's output. Host and plugin must be built against
/// the same `log` release.
///
/// ```ignore
/// dotbot_core::declare_plugin!(TestPlugin, TestPlugin::new);
/// ```
#[macro_export]
macro_rules! declare_plugin {
    ($plugin_type:ty, $constructor:path) => {
        #[unsafe(no_mangle)]
        #[allow(improper_ctypes_definitions)]
        pub extern "C-unwind" fn dotbot_plugin_create() -> *mut ::std::boxed::Box<dyn $crate::plugin_system::Plugin> {
            let plugin: $plugin_type = $constructor();
            let boxed: ::std::boxed::Box<dyn $crate::plugin_system::Plugin> = ::std::boxed::Box::new(plugin);
            ::std::boxed::Box::into_raw(::std::boxed::Box::new(boxed))
        }

        #[unsafe(no_mangle)]
        #[allow(improper_ctypes_definitions)]
        pub extern "C-unwind" fn dotbot_plugin_init_logger(
            logger: &'static dyn $crate::log::Log,
            level: $crate::log::LevelFilter,
        ) {
            // Already set when the plugin shares the host's `log` instance
            let _ = $crate::log::set_logger(logger);
            $crate::log::set_max_level(level);
        }
    };
}
