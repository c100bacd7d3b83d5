use serde::{Deserialize, Serialize};

use crate::kernel::constants;
use crate::storage::config::Settings;

/// How registered commands are pushed to the chat platform once it is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublishPolicy {
    /// Upsert each command once, leave unknown remote commands alone
    #[default]
    Incremental,
    /// Fetch the remote set first and update matching commands in place
    Modify,
    /// Replace the remote command set with everything registered locally
    Rebuild,
}

/// Host settings, stored as `settings.json` in the config directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotSettings {
    /// Token used by the platform client
    pub token: String,
    pub show_debug_logs: bool,
    pub always_rebuild_commands: bool,
    pub modify_existing_commands: bool,
    /// Directory scanned for plugin manifests, relative to the working directory
    pub modules_dir: String,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            token: String::new(),
            show_debug_logs: false,
            always_rebuild_commands: false,
            modify_existing_commands: false,
            modules_dir: constants::DEFAULT_MODULES_DIR.to_string(),
        }
    }
}

impl Settings for BotSettings {
    const NAME: &'static str = constants::SETTINGS_NAME;
}

fn flag_enabled(value: Option<String>) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}

impl BotSettings {
    /// Apply `ENABLE_DEBUG`, `REBUILD_COMMANDS` and `MODIFY_COMMANDS` from `lookup`.
    ///
    /// Overrides only ever switch a flag on.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if flag_enabled(lookup("ENABLE_DEBUG")) {
            self.show_debug_logs = true;
        }
        if flag_enabled(lookup("REBUILD_COMMANDS")) {
            self.always_rebuild_commands = true;
        }
        if flag_enabled(lookup("MODIFY_COMMANDS")) {
            self.modify_existing_commands = true;
        }
    }

    pub fn publish_policy(&self) -> PublishPolicy {
        if self.always_rebuild_commands {
            PublishPolicy::Rebuild
        } else if self.modify_existing_commands {
            PublishPolicy::Modify
        } else {
            PublishPolicy::Incremental
        }
    }

    /// Whether a non-blank platform token is configured.
    pub fn has_token(&self) -> bool {
        !self.token.trim().is_empty()
    }
}
