use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::plugin_system::traits::Plugin;

/// Factory of a compiled-in plugin
pub type PluginFactory = fn() -> Box<dyn Plugin>;

/// `plugin.json` as shipped beside a plugin library.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginManifest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub is_extension: bool,
    #[serde(default)]
    pub should_wait: bool,
    /// Library file name, relative to the manifest's directory
    pub library: String,
    /// Host API requirement, e.g. `^0.1`
    #[serde(default)]
    pub api_version: Option<String>,
}

/// How a plugin is instantiated once its place in the load order is known.
#[derive(Clone)]
pub enum LoadHandle {
    Native { library: PathBuf, manifest: PathBuf },
    Static(PluginFactory),
}

impl fmt::Debug for LoadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadHandle::Native { library, manifest } => f
                .debug_struct("Native")
                .field("library", library)
                .field("manifest", manifest)
                .finish(),
            LoadHandle::Static(_) => f.write_str("Static"),
        }
    }
}

/// Everything known about a plugin before any of its code runs.
#[derive(Debug, Clone)]
pub struct PluginDescriptor {
    pub id: String,
    pub name: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub dependencies: BTreeSet<String>,
    pub is_extension: bool,
    pub should_wait: bool,
    pub load_handle: LoadHandle,
}

impl PluginDescriptor {
    /// Descriptor of a plugin compiled into the host binary.
    pub fn from_static(id: impl Into<String>, factory: PluginFactory) -> Self {
        Self {
            id: id.into(),
            name: None,
            version: None,
            author: None,
            description: None,
            dependencies: BTreeSet::new(),
            is_extension: false,
            should_wait: false,
            load_handle: LoadHandle::Static(factory),
        }
    }

    pub(crate) fn from_manifest(manifest: PluginManifest, manifest_path: &Path, library: PathBuf) -> Self {
        Self {
            id: manifest.id,
            name: manifest.name,
            version: manifest.version,
            author: manifest.author,
            description: manifest.description,
            dependencies: manifest.dependencies.into_iter().collect(),
            is_extension: manifest.is_extension,
            should_wait: manifest.should_wait,
            load_handle: LoadHandle::Native {
                library,
                manifest: manifest_path.to_path_buf(),
            },
        }
    }

    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.dependencies.insert(id.into());
        self
    }

    pub fn extension(mut self, is_extension: bool) -> Self {
        self.is_extension = is_extension;
        self
    }

    pub fn wait(mut self, should_wait: bool) -> Self {
        self.should_wait = should_wait;
        self
    }

    pub fn library_path(&self) -> Option<&Path> {
        match &self.load_handle {
            LoadHandle::Native { library, .. } => Some(library),
            LoadHandle::Static(_) => None,
        }
    }
}
