/// Application name
pub const APP_NAME: &str = "DotBot";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Plugin API version exposed by this host
pub const API_VERSION: &str = "0.1.0";

/// File name of the declarative manifest shipped beside each plugin library
pub const MANIFEST_FILE_NAME: &str = "plugin.json";

/// Symbol exported by native plugins (see `declare_plugin!`)
pub const PLUGIN_CREATE_SYMBOL: &[u8] = b"dotbot_plugin_create";
pub const PLUGIN_INIT_LOGGER_SYMBOL: &[u8] = b"dotbot_plugin_init_logger";

/// Default configuration directory
pub const DEFAULT_CONFIG_DIR: &str = "config";

/// Default modules directory
pub const DEFAULT_MODULES_DIR: &str = "modules";

/// Name of the host settings document
pub const SETTINGS_NAME: &str = "settings";

/// Maximum length of a command or option name
pub const MAX_NAME_LENGTH: usize = 32;

/// Maximum length of a command or option description
pub const MAX_DESCRIPTION_LENGTH: usize = 100;

/// Maximum number of choices on a single value option
pub const MAX_CHOICES: usize = 25;
