//! Sample module used to exercise the host: a plain command, a sub-command tree backed by
//! an in-memory entry table, and a nested command group.
//!
//! Built as a `cdylib` it is picked up through `plugin.json`; the binary also links it
//! statically via [`descriptor`].

use async_trait::async_trait;
use dotbot_core::plugin_system::{Plugin, PluginContext, PluginDescriptor, PluginError, PluginResult};
use serde::{Deserialize, Serialize};

mod commands;
mod entries;

pub use entries::EntryStore;

pub const TEST_PLUGIN_ID: &str = "kubc08.dotbotbase.test";

/// Document name of the module's own settings in the config directory
pub const SETTINGS_DOCUMENT: &str = "test-module";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestModuleSettings {
    /// Register the `testentry` command tree
    pub entries_enabled: bool,
    pub table: String,
}

impl Default for TestModuleSettings {
    fn default() -> Self {
        Self {
            entries_enabled: true,
            table: "test_entry".to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct TestPlugin {
    store: EntryStore,
}

impl TestPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> &EntryStore {
        &self.store
    }
}

#[async_trait]
impl Plugin for TestPlugin {
    fn name(&self) -> &str {
        "Test Module"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn author(&self) -> &str {
        "KubC08"
    }

    fn should_wait(&self) -> bool {
        true
    }

    async fn start_async(&self, ctx: &PluginContext) -> PluginResult {
        ctx.register_global_command(commands::test_command())?;

        let settings: TestModuleSettings = ctx
            .settings()
            .load_or_init_document(SETTINGS_DOCUMENT)
            .map_err(|e| PluginError::StartError(format!("cannot load {}: {}", SETTINGS_DOCUMENT, e)))?;
        if settings.entries_enabled {
            ctx.log()
                .category("Database")
                .info(format!("Using table '{}'", settings.table));
            ctx.register_global_command(commands::entry_command(&self.store))?;
        }

        ctx.register_global_command(commands::group_command())?;
        Ok(())
    }

    async fn shutdown_async(&self, ctx: &PluginContext) -> PluginResult {
        ctx.log().debug(format!("Dropping {} test entries", self.store.len()));
        self.store.clear();
        Ok(())
    }
}

fn create() -> Box<dyn Plugin> {
    Box::new(TestPlugin::new())
}

/// Descriptor for linking the module into the host binary.
pub fn descriptor() -> PluginDescriptor {
    let mut descriptor = PluginDescriptor::from_static(TEST_PLUGIN_ID, create).wait(true);
    descriptor.name = Some("Test Module".to_string());
    descriptor.version = Some("1.0.0".to_string());
    descriptor.author = Some("KubC08".to_string());
    descriptor.description = Some("Commands for testing DotBot".to_string());
    descriptor
}

dotbot_core::declare_plugin!(TestPlugin, TestPlugin::new);

#[cfg(test)]
mod tests;
