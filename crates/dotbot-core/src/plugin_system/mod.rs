//! # DotBot Core Plugin System
//!
//! Discovers plugins, orders them by their declared dependencies and manages their
//! `Loaded -> Running -> Stopped` lifecycle.
//!
//! ## Key Components
//!
//! - **[`PluginScanner`](loader::PluginScanner)**: Walks a modules directory for
//!   `plugin.json` manifests and produces [`PluginDescriptor`]s without running plugin
//!   code. Library directories are recorded in a search path registry.
//! - **[`DependencyResolver`](dependency::DependencyResolver)**: Depth-first topological
//!   ordering with missing dependency, cycle and duplicate id detection. Extensions seed
//!   the traversal first.
//! - **[`PluginLoader`](loader::PluginLoader)**: Turns descriptors into instances. The
//!   default loader calls compiled-in factories or opens native libraries through
//!   `libloading`.
//! - **[`PluginManager`]**: Instantiates in resolved order, starts and stops plugins with
//!   per-plugin failure isolation.
//! - **[`Plugin`]** / **[`PluginContext`]**: The hooks a plugin implements and its handle
//!   on the host (logger, settings, command registration).
//! - **[`PluginSystemError`](error::PluginSystemError)**: Errors of this subsystem.
pub mod context;
pub mod dependency;
pub mod error;
pub mod loader;
pub mod manager;
pub mod manifest;
pub mod traits;

pub use context::{PluginContext, PluginState};
pub use dependency::{DependencyError, DependencyResolver, resolve_load_order};
pub use error::PluginSystemError;
pub use loader::{DefaultPluginLoader, PluginLoader, PluginScanner, SearchPaths};
pub use manager::{PluginInfo, PluginManager};
pub use manifest::{LoadHandle, PluginDescriptor, PluginFactory, PluginManifest};
pub use traits::{Plugin, PluginError, PluginResult};

#[cfg(test)]
mod tests;
