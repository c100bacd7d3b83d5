use std::ffi::OsStr;
use std::future::Future;
use std::panic;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use libloading::{Library, Symbol};
use semver::{Version, VersionReq};
use tokio::fs;

use crate::kernel::constants::{API_VERSION, MANIFEST_FILE_NAME, PLUGIN_CREATE_SYMBOL, PLUGIN_INIT_LOGGER_SYMBOL};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::manifest::{LoadHandle, PluginDescriptor, PluginManifest};
use crate::plugin_system::traits::Plugin;

/// Directories holding plugin libraries, recorded during scanning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPaths {
    dirs: Vec<PathBuf>,
}

impl SearchPaths {
    pub fn add(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        if !self.dirs.contains(&dir) {
            self.dirs.push(dir);
        }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    /// Every dynamic library found directly inside a registered directory.
    pub fn libraries(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();
        for dir in &self.dirs {
            let Ok(entries) = std::fs::read_dir(dir) else {
                continue;
            };
            let mut libs: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.is_file() && is_dynamic_library(path))
                .collect();
            libs.sort();
            found.extend(libs);
        }
        found
    }
}

fn is_dynamic_library(path: &Path) -> bool {
    path.extension() == Some(OsStr::new(std::env::consts::DLL_EXTENSION))
}

/// Finds plugin manifests without running any plugin code.
#[derive(Debug)]
pub struct PluginScanner {
    api_version: Version,
    search_paths: SearchPaths,
}

impl Default for PluginScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginScanner {
    pub fn new() -> Self {
        // API_VERSION is a crate constant and always parses
        let api_version = Version::parse(API_VERSION).unwrap_or_else(|_| Version::new(0, 1, 0));
        Self::with_api_version(api_version)
    }

    pub fn with_api_version(api_version: Version) -> Self {
        Self {
            api_version,
            search_paths: SearchPaths::default(),
        }
    }

    pub fn search_paths(&self) -> &SearchPaths {
        &self.search_paths
    }

    /// Recursively scan `dir` for `plugin.json` manifests.
    ///
    /// Broken or unusable manifests are logged and skipped. Duplicate ids are returned
    /// unchanged. A missing directory yields no descriptors.
    pub async fn scan(&mut self, dir: impl AsRef<Path>) -> Result<Vec<PluginDescriptor>, PluginSystemError> {
        let dir = dir.as_ref().to_path_buf();
        let mut descriptors = Vec::new();
        match fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                log::warn!("Plugin path {} is not a directory", dir.display());
                return Ok(descriptors);
            }
            Err(_) => {
                log::debug!("Plugin directory {} does not exist", dir.display());
                return Ok(descriptors);
            }
        }
        self.scan_directory_boxed(dir, &mut descriptors).await?;
        log::info!("Discovered {} plugin(s)", descriptors.len());
        Ok(descriptors)
    }

    fn scan_directory_boxed<'a>(
        &'a mut self,
        dir: PathBuf,
        descriptors: &'a mut Vec<PluginDescriptor>,
    ) -> Pin<Box<dyn Future<Output = Result<(), PluginSystemError>> + Send + 'a>> {
        Box::pin(self.scan_directory_inner(dir, descriptors))
    }

    async fn scan_directory_inner(
        &mut self,
        dir: PathBuf,
        descriptors: &mut Vec<PluginDescriptor>,
    ) -> Result<(), PluginSystemError> {
        let manifest_path = dir.join(MANIFEST_FILE_NAME);
        if fs::metadata(&manifest_path).await.is_ok_and(|m| m.is_file()) {
            if let Some(descriptor) = self.read_descriptor(&manifest_path).await {
                descriptors.push(descriptor);
            }
        }

        let mut entries = fs::read_dir(&dir).await.map_err(|source| PluginSystemError::Io {
            path: dir.clone(),
            source,
        })?;
        let mut subdirs = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| PluginSystemError::Io { path: dir.clone(), source })?
        {
            if entry.file_type().await.is_ok_and(|t| t.is_dir()) {
                subdirs.push(entry.path());
            }
        }
        // Directory iteration order is platform dependent
        subdirs.sort();
        for subdir in subdirs {
            if let Err(e) = self.scan_directory_boxed(subdir.clone(), descriptors).await {
                log::warn!("Error scanning {}: {}", subdir.display(), e);
            }
        }
        Ok(())
    }

    async fn read_descriptor(&mut self, manifest_path: &Path) -> Option<PluginDescriptor> {
        let content = match fs::read_to_string(manifest_path).await {
            Ok(content) => content,
            Err(e) => {
                log::warn!("Cannot read {}: {}", manifest_path.display(), e);
                return None;
            }
        };
        match self.parse_manifest(manifest_path, &content) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                log::warn!("Skipping plugin: {}", e);
                None
            }
        }
    }

    /// Turn manifest text into a descriptor. `Ok(None)` means the unit is silently ignored.
    fn parse_manifest(
        &mut self,
        manifest_path: &Path,
        content: &str,
    ) -> Result<Option<PluginDescriptor>, PluginSystemError> {
        let manifest_error = |message: String| PluginSystemError::ManifestError {
            path: manifest_path.to_path_buf(),
            message,
        };
        let manifest: PluginManifest =
            serde_json::from_str(content).map_err(|e| manifest_error(format!("invalid JSON: {}", e)))?;
        if manifest.id.trim().is_empty() {
            return Err(manifest_error("missing plugin id".to_string()));
        }

        let base = manifest_path.parent().unwrap_or_else(|| Path::new("."));
        let library = base.join(&manifest.library);
        if !is_dynamic_library(&library) {
            log::debug!(
                "Ignoring '{}': {} is not a loadable module on this platform",
                manifest.id,
                library.display()
            );
            return Ok(None);
        }
        if !library.is_file() {
            return Err(manifest_error(format!(
                "plugin '{}' library {} not found",
                manifest.id,
                library.display()
            )));
        }

        if let Some(requirement) = &manifest.api_version {
            let req = VersionReq::parse(requirement)
                .map_err(|e| manifest_error(format!("invalid api_version '{}': {}", requirement, e)))?;
            if !req.matches(&self.api_version) {
                return Err(manifest_error(format!(
                    "plugin '{}' requires API {}, host provides {}",
                    manifest.id, requirement, self.api_version
                )));
            }
        }

        self.search_paths.add(base);
        log::debug!("Found plugin '{}' at {}", manifest.id, library.display());
        Ok(Some(PluginDescriptor::from_manifest(manifest, manifest_path, library)))
    }
}

/// Instantiates plugins from their descriptors.
pub trait PluginLoader: Send + Sync {
    fn load(&self, descriptor: &PluginDescriptor) -> Result<Arc<dyn Plugin>, PluginSystemError>;
}

type PluginCreateFn = unsafe extern "C-unwind" fn() -> *mut Box<dyn Plugin>;
type PluginInitLoggerFn = unsafe extern "C-unwind" fn(&'static dyn log::Log, log::LevelFilter);

/// Loads compiled-in plugins through their factory and native plugins through `libloading`.
///
/// Every opened [`Library`] stays loaded for the lifetime of the loader, so plugin
/// instances must be dropped first.
#[derive(Debug, Default)]
pub struct DefaultPluginLoader {
    search_paths: SearchPaths,
    libraries: Mutex<Vec<Library>>,
}

impl DefaultPluginLoader {
    pub fn new(search_paths: SearchPaths) -> Self {
        Self {
            search_paths,
            libraries: Mutex::new(Vec::new()),
        }
    }

    /// Load every library in the search path registry except the plugins themselves, so
    /// their shared dependencies resolve when the plugins are opened.
    pub fn preload_libraries(&self, plugins: &[PluginDescriptor]) -> usize {
        let plugin_libs: Vec<&Path> = plugins.iter().filter_map(PluginDescriptor::library_path).collect();
        let mut loaded = 0;
        for path in self.search_paths.libraries() {
            if plugin_libs.contains(&path.as_path()) {
                continue;
            }
            // SAFETY: shared dependencies are only mapped, no symbol is called
            match unsafe { Library::new(&path) } {
                Ok(library) => {
                    log::debug!("Preloaded {}", path.display());
                    self.keep(library);
                    loaded += 1;
                }
                Err(e) => log::warn!("Failed to preload {}: {}", path.display(), e),
            }
        }
        loaded
    }

    fn keep(&self, library: Library) {
        self.libraries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(library);
    }

    fn load_native(&self, plugin_id: &str, path: &Path) -> Result<Arc<dyn Plugin>, PluginSystemError> {
        let loading_error = |message: String| PluginSystemError::LoadingError {
            plugin_id: plugin_id.to_string(),
            path: Some(path.to_path_buf()),
            message,
        };

        // SAFETY: the library comes from a manifest the operator placed in the modules directory
        let library = unsafe { Library::new(path) }.map_err(|e| loading_error(format!("libloading error: {}", e)))?;

        let create: PluginCreateFn = {
            // SAFETY: the symbol is emitted by `declare_plugin!` with this exact signature
            let symbol: Symbol<PluginCreateFn> = unsafe { library.get(PLUGIN_CREATE_SYMBOL) }
                .map_err(|e| loading_error(format!("no plugin type found: {}", e)))?;
            *symbol
        };

        // SAFETY: the symbol is emitted by `declare_plugin!` with this exact signature
        match unsafe { library.get::<PluginInitLoggerFn>(PLUGIN_INIT_LOGGER_SYMBOL) } {
            Ok(init_logger) => {
                // SAFETY: the host logger is 'static and outlives the library
                unsafe { init_logger(log::logger(), log::max_level()) };
            }
            Err(_) => log::debug!("Plugin '{}' exports no logger hook; its own log output is dropped", plugin_id),
        }

        // SAFETY: see above; a panic inside the constructor is caught here
        let raw = panic::catch_unwind(|| unsafe { create() }).map_err(|e| {
            let reason = e
                .downcast_ref::<&'static str>()
                .map(|s| s.to_string())
                .or_else(|| e.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            loading_error(format!("plugin constructor panicked: {}", reason))
        })?;
        if raw.is_null() {
            return Err(loading_error("plugin constructor returned null".to_string()));
        }

        // SAFETY: `raw` was produced by `Box::into_raw` in `declare_plugin!`
        let plugin: Box<dyn Plugin> = *unsafe { Box::from_raw(raw) };
        self.keep(library);
        Ok(Arc::from(plugin))
    }
}

impl PluginLoader for DefaultPluginLoader {
    fn load(&self, descriptor: &PluginDescriptor) -> Result<Arc<dyn Plugin>, PluginSystemError> {
        match &descriptor.load_handle {
            LoadHandle::Static(factory) => {
                let factory = *factory;
                let plugin = panic::catch_unwind(factory).map_err(|_| PluginSystemError::LoadingError {
                    plugin_id: descriptor.id.clone(),
                    path: None,
                    message: "plugin factory panicked".to_string(),
                })?;
                Ok(Arc::from(plugin))
            }
            LoadHandle::Native { library, .. } => self.load_native(&descriptor.id, library),
        }
    }
}
