use std::path::Path;
use std::sync::Arc;

use crate::command::{CommandDispatcher, CommandRegistry};
use crate::kernel::error::Result;
use crate::storage::{BotSettings, ConfigManager};

/// Process-wide services shared with every plugin.
///
/// Cloning is cheap; all clones share the same registry and settings loader.
#[derive(Debug, Clone)]
pub struct Host {
    registry: Arc<CommandRegistry>,
    config: Arc<ConfigManager>,
    dispatcher: CommandDispatcher,
    settings: Arc<BotSettings>,
}

impl Host {
    pub fn new(config: ConfigManager, settings: BotSettings) -> Self {
        let registry = Arc::new(CommandRegistry::new());
        Self {
            dispatcher: CommandDispatcher::new(Arc::clone(&registry)),
            registry,
            config: Arc::new(config),
            settings: Arc::new(settings),
        }
    }

    /// Load (or create) the host settings under `config_dir` and apply environment overrides.
    pub fn bootstrap(config_dir: impl AsRef<Path>) -> Result<Self> {
        let config = ConfigManager::new(config_dir.as_ref());
        let mut settings: BotSettings = config.load_or_init()?;
        settings.apply_env_overrides(|key| std::env::var(key).ok());
        log::debug!(
            "Loaded settings from {} (publish policy {:?})",
            config.config_dir().display(),
            settings.publish_policy()
        );
        Ok(Self::new(config, settings))
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// Settings loader plugins use for their own documents
    pub fn config(&self) -> &ConfigManager {
        &self.config
    }

    pub fn settings(&self) -> &BotSettings {
        &self.settings
    }
}
