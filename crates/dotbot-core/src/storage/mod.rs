//! # DotBot Core Storage
//!
//! Key/value settings documents persisted beside the host.
//!
//! - [`config`]: [`ConfigManager`] reads and writes settings documents in JSON (always),
//!   YAML or TOML (cargo features), creating defaults when a document is absent.
//! - [`settings`]: the host's own [`BotSettings`] with environment overrides and the
//!   derived [`PublishPolicy`].
//! - [`error`]: [`StorageError`](error::StorageError).
pub mod config;
pub mod error;
pub mod settings;

pub use config::{ConfigFormat, ConfigManager, Settings};
pub use error::StorageError;
pub use settings::{BotSettings, PublishPolicy};
