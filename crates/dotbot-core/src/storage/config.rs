use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::storage::error::StorageError;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }

    /// Serialize a value into this format
    pub fn serialize<T: Serialize>(&self, value: &T) -> Result<String, StorageError> {
        let format = self.extension().to_string();
        match self {
            ConfigFormat::Json => serde_json::to_string_pretty(value)
                .map_err(|e| StorageError::SerializationError { format, source: Box::new(e) }),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::to_string(value)
                .map_err(|e| StorageError::SerializationError { format, source: Box::new(e) }),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::to_string_pretty(value)
                .map_err(|e| StorageError::SerializationError { format, source: Box::new(e) }),
        }
    }

    /// Deserialize a value from this format. `path` is only used for error reporting.
    pub fn deserialize<T: DeserializeOwned>(&self, data: &str, path: &Path) -> Result<T, StorageError> {
        let err = |source: Box<dyn std::error::Error + Send + Sync>| StorageError::DeserializationError {
            path: path.to_path_buf(),
            format: self.extension().to_string(),
            source,
        };
        match self {
            ConfigFormat::Json => serde_json::from_str(data).map_err(|e| err(Box::new(e))),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(data).map_err(|e| err(Box::new(e))),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(data).map_err(|e| err(Box::new(e))),
        }
    }
}

/// A settings document that can be loaded, or generated with defaults when missing.
pub trait Settings: Serialize + DeserializeOwned + Default {
    /// Document name, without extension (e.g. `"settings"`)
    const NAME: &'static str;
}

/// Loads and persists settings documents inside a single configuration directory.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: PathBuf,
    default_format: ConfigFormat,
}

impl ConfigManager {
    /// Create a manager rooted at `config_dir` that writes new documents as JSON
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self::with_format(config_dir, ConfigFormat::Json)
    }

    pub fn with_format(config_dir: impl Into<PathBuf>, default_format: ConfigFormat) -> Self {
        Self {
            config_dir: config_dir.into(),
            default_format,
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn default_format(&self) -> ConfigFormat {
        self.default_format
    }

    /// Resolve the file backing document `name`.
    ///
    /// A name that already carries an extension is used as-is. Otherwise the first
    /// existing file in any supported format wins, falling back to the default format.
    pub fn resolve_path(&self, name: &str) -> PathBuf {
        if Path::new(name).extension().is_some() {
            return self.config_dir.join(name);
        }
        let candidates = [
            ConfigFormat::Json,
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml,
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml,
        ];
        candidates
            .iter()
            .map(|format| self.config_dir.join(format!("{}.{}", name, format.extension())))
            .find(|path| path.is_file())
            .unwrap_or_else(|| {
                self.config_dir
                    .join(format!("{}.{}", name, self.default_format.extension()))
            })
    }

    /// Load document `name`, returning `Ok(None)` if it does not exist.
    pub fn load_document<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, StorageError> {
        let path = self.resolve_path(name);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(e, "read_config", path)),
        };
        let format = ConfigFormat::from_path(&path)
            .ok_or_else(|| StorageError::UnsupportedConfigFormat(path.display().to_string()))?;
        log::debug!("Parsing config file {}", path.display());
        format.deserialize(&content, &path).map(Some)
    }

    /// Write document `name`, creating the configuration directory when needed.
    pub fn save_document<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf, StorageError> {
        let path = self.resolve_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StorageError::io(e, "create_config_dir", parent.to_path_buf()))?;
        }
        let format = ConfigFormat::from_path(&path).unwrap_or(self.default_format);
        let content = format.serialize(value)?;
        fs::write(&path, content).map_err(|e| StorageError::io(e, "write_config", path.clone()))?;
        log::debug!("Saved config file {}", path.display());
        Ok(path)
    }

    /// Load document `name`, or write `T::default()` to it and return the defaults.
    pub fn load_or_init_document<T>(&self, name: &str) -> Result<T, StorageError>
    where
        T: Serialize + DeserializeOwned + Default,
    {
        if let Some(existing) = self.load_document(name)? {
            return Ok(existing);
        }
        let defaults = T::default();
        let path = self.save_document(name, &defaults)?;
        log::info!("Created default config {}", path.display());
        Ok(defaults)
    }

    pub fn load<T: Settings>(&self) -> Result<Option<T>, StorageError> {
        self.load_document(T::NAME)
    }

    pub fn save<T: Settings>(&self, settings: &T) -> Result<PathBuf, StorageError> {
        self.save_document(T::NAME, settings)
    }

    pub fn load_or_init<T: Settings>(&self) -> Result<T, StorageError> {
        self.load_or_init_document(T::NAME)
    }
}
