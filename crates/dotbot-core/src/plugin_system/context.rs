use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::command::{CommandError, CommandId, CommandOption, CommandScope};
use crate::kernel::Host;
use crate::logging::PluginLogger;
use crate::plugin_system::manifest::PluginDescriptor;
use crate::plugin_system::traits::Plugin;
use crate::storage::ConfigManager;

/// Lifecycle state of a plugin instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PluginState {
    Loaded = 0,
    Running = 1,
    Stopped = 2,
}

impl PluginState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => PluginState::Running,
            2 => PluginState::Stopped,
            _ => PluginState::Loaded,
        }
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PluginState::Loaded => "loaded",
            PluginState::Running => "running",
            PluginState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

struct PluginInstance {
    descriptor: PluginDescriptor,
    plugin: Arc<dyn Plugin>,
    state: AtomicU8,
    /// Bumped on every start and stop; stale background hooks compare against it
    run: AtomicU64,
    owned: Mutex<Vec<CommandId>>,
}

/// A plugin's handle on the host, passed to every lifecycle hook.
///
/// Clones refer to the same plugin instance.
#[derive(Clone)]
pub struct PluginContext {
    instance: Arc<PluginInstance>,
    host: Host,
    logger: PluginLogger,
}

impl PluginContext {
    pub(crate) fn new(descriptor: PluginDescriptor, plugin: Arc<dyn Plugin>, host: Host) -> Self {
        let logger = PluginLogger::new(plugin.name());
        Self {
            instance: Arc::new(PluginInstance {
                descriptor,
                plugin,
                state: AtomicU8::new(PluginState::Loaded as u8),
                run: AtomicU64::new(0),
                owned: Mutex::new(Vec::new()),
            }),
            host,
            logger,
        }
    }

    pub fn id(&self) -> &str {
        &self.instance.descriptor.id
    }

    /// Logger scoped to this plugin's name
    pub fn log(&self) -> &PluginLogger {
        &self.logger
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Settings loader for the plugin's own documents
    pub fn settings(&self) -> &ConfigManager {
        self.host.config()
    }

    pub fn state(&self) -> PluginState {
        PluginState::from_u8(self.instance.state.load(Ordering::SeqCst))
    }

    pub(crate) fn set_state(&self, state: PluginState) {
        self.instance.state.store(state as u8, Ordering::SeqCst);
    }

    /// Begin a new lifecycle run, invalidating hooks still pending from earlier ones.
    pub(crate) fn advance_run(&self) -> u64 {
        self.instance.run.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn is_current_run(&self, run: u64) -> bool {
        self.instance.run.load(Ordering::SeqCst) == run
    }

    pub fn descriptor(&self) -> &PluginDescriptor {
        &self.instance.descriptor
    }

    pub(crate) fn plugin(&self) -> &Arc<dyn Plugin> {
        &self.instance.plugin
    }

    pub fn register_global_command(&self, command: CommandOption) -> Result<CommandId, CommandError> {
        self.register(CommandScope::Global, command)
    }

    pub fn register_guild_command(&self, guild_id: u64, command: CommandOption) -> Result<CommandId, CommandError> {
        self.register(CommandScope::Guild(guild_id), command)
    }

    fn register(&self, scope: CommandScope, command: CommandOption) -> Result<CommandId, CommandError> {
        let name = command.name().to_string();
        let mut owned = self.instance.owned.lock().unwrap_or_else(PoisonError::into_inner);
        let state = self.state();
        if state != PluginState::Running {
            return Err(CommandError::PluginNotRunning {
                plugin_id: self.id().to_string(),
                state: state.to_string(),
            });
        }
        match self.host.registry().register(scope, command, self.id()) {
            Ok(id) => {
                self.logger.category("Commands").debug(format!("Registered {}", id));
                owned.push(id.clone());
                Ok(id)
            }
            Err(e) => {
                self.logger
                    .category("Commands")
                    .error(format!("Failed to register '{}'", name), Some(&e));
                Err(e)
            }
        }
    }

    /// Commands this plugin registered while running, in registration order.
    pub fn owned_commands(&self) -> Vec<CommandId> {
        self.instance
            .owned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Unregister every command this plugin owns.
    pub(crate) fn release_commands(&self) -> usize {
        let mut owned = self.instance.owned.lock().unwrap_or_else(PoisonError::into_inner);
        let removed = self.host.registry().unregister_owned(self.id());
        owned.clear();
        removed.len()
    }
}

impl fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContext")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("owned_commands", &self.owned_commands())
            .finish()
    }
}
