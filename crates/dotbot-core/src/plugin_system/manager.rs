use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::{JoinError, JoinHandle, JoinSet};

use crate::kernel::Host;
use crate::plugin_system::context::{PluginContext, PluginState};
use crate::plugin_system::dependency::DependencyResolver;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::loader::{DefaultPluginLoader, PluginLoader};
use crate::plugin_system::manifest::PluginDescriptor;
use crate::plugin_system::traits::PluginResult;

/// Summary of a loaded plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    pub id: String,
    pub name: String,
    pub version: String,
    pub author: String,
    pub state: PluginState,
    pub is_extension: bool,
}

/// Instantiates plugins in dependency order and drives their lifecycle.
///
/// A failing plugin is logged, marked [`PluginState::Stopped`] and skipped; it never
/// prevents other plugins from starting.
pub struct PluginManager {
    host: Host,
    // Dropped before the loader, which owns any native libraries
    plugins: Vec<PluginContext>,
    /// Hooks of non-waiting plugins still running in the background
    tasks: Mutex<JoinSet<()>>,
    loader: Arc<dyn PluginLoader>,
}

impl PluginManager {
    pub fn new(host: Host) -> Self {
        Self::with_loader(host, Arc::new(DefaultPluginLoader::default()))
    }

    pub fn with_loader(host: Host, loader: Arc<dyn PluginLoader>) -> Self {
        Self {
            host,
            plugins: Vec::new(),
            tasks: Mutex::new(JoinSet::new()),
            loader,
        }
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Resolve `descriptors` together with the plugins already loaded, then instantiate the
    /// new ones in load order. Returns the ids that were instantiated.
    ///
    /// Resolution errors abort before any plugin is created. A plugin that fails to
    /// instantiate is skipped, and so is everything depending on it.
    pub fn load(&mut self, descriptors: Vec<PluginDescriptor>) -> Result<Vec<String>, PluginSystemError> {
        let known: Vec<PluginDescriptor> = self.plugins.iter().map(|c| c.descriptor().clone()).collect();
        let order = DependencyResolver::new(known.iter().chain(descriptors.iter()))?.resolve()?;
        log::info!("Resolved plugin load order: {}", order.join(", "));

        let mut pending: HashMap<String, PluginDescriptor> =
            descriptors.into_iter().map(|d| (d.id.clone(), d)).collect();
        let mut failed = HashSet::new();
        let mut loaded = Vec::new();
        for id in order {
            let Some(descriptor) = pending.remove(&id) else {
                continue;
            };
            if let Some(dep) = descriptor.dependencies.iter().find(|d| failed.contains(*d)) {
                log::warn!("Skipping plugin '{}': dependency '{}' failed to load", id, dep);
                failed.insert(id);
                continue;
            }
            match self.loader.load(&descriptor) {
                Ok(plugin) => {
                    log::info!("Loaded plugin '{}' ({} {})", id, plugin.name(), plugin.version());
                    self.plugins
                        .push(PluginContext::new(descriptor, plugin, self.host.clone()));
                    loaded.push(id);
                }
                Err(e) => {
                    log::error!("{}", e);
                    failed.insert(id);
                }
            }
        }
        Ok(loaded)
    }

    /// Start every plugin that is not running, in load order. Returns the failures.
    pub async fn start_all(&self) -> Vec<PluginSystemError> {
        let mut failures = Vec::new();
        for ctx in &self.plugins {
            if ctx.state() == PluginState::Running {
                continue;
            }
            if let Err(e) = self.start_plugin(ctx).await {
                failures.push(e);
            }
        }
        log::info!(
            "Started {}/{} plugin(s)",
            self.plugins.len() - failures.len(),
            self.plugins.len()
        );
        failures
    }

    /// Stop every running plugin in reverse load order, then wait for background hooks
    /// to finish. Returns the failures.
    pub async fn stop_all(&self) -> Vec<PluginSystemError> {
        let mut failures = Vec::new();
        for ctx in self.plugins.iter().rev() {
            if ctx.state() != PluginState::Running {
                continue;
            }
            if let Err(e) = self.stop_plugin(ctx).await {
                failures.push(e);
            }
        }
        self.join_background().await;
        failures
    }

    pub async fn start(&self, id: &str) -> Result<(), PluginSystemError> {
        self.start_plugin(self.context(id)?).await
    }

    pub async fn stop(&self, id: &str) -> Result<(), PluginSystemError> {
        self.stop_plugin(self.context(id)?).await
    }

    /// Wait for every asynchronous hook that non-waiting plugins left running.
    pub async fn join_background(&self) {
        loop {
            let mut tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
            if tasks.is_empty() {
                return;
            }
            while let Some(outcome) = tasks.join_next().await {
                if let Err(e) = outcome {
                    log::error!("Background plugin task failed: {}", e);
                }
            }
        }
    }

    /// Stop the plugin if it is running, then start it again.
    pub async fn restart(&self, id: &str) -> Result<(), PluginSystemError> {
        let ctx = self.context(id)?;
        if ctx.state() == PluginState::Running {
            if let Err(e) = self.stop_plugin(ctx).await {
                log::warn!("Restarting '{}' after failed shutdown: {}", id, e);
            }
        }
        self.start_plugin(ctx).await
    }

    pub fn plugin_context(&self, id: &str) -> Option<&PluginContext> {
        self.plugins.iter().find(|c| c.id() == id)
    }

    pub fn state(&self, id: &str) -> Option<PluginState> {
        self.plugin_context(id).map(PluginContext::state)
    }

    pub fn load_order(&self) -> Vec<String> {
        self.plugins.iter().map(|c| c.id().to_string()).collect()
    }

    pub fn plugins(&self) -> Vec<PluginInfo> {
        self.plugins
            .iter()
            .map(|ctx| PluginInfo {
                id: ctx.id().to_string(),
                name: ctx.plugin().name().to_string(),
                version: ctx.plugin().version().to_string(),
                author: ctx.plugin().author().to_string(),
                state: ctx.state(),
                is_extension: ctx.descriptor().is_extension,
            })
            .collect()
    }

    fn context(&self, id: &str) -> Result<&PluginContext, PluginSystemError> {
        self.plugin_context(id)
            .ok_or_else(|| PluginSystemError::PluginNotFound(id.to_string()))
    }

    fn should_wait(ctx: &PluginContext) -> bool {
        ctx.descriptor().should_wait || ctx.plugin().should_wait()
    }

    fn spawn_background<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.spawn(task);
    }

    async fn start_plugin(&self, ctx: &PluginContext) -> Result<(), PluginSystemError> {
        let state = ctx.state();
        if state == PluginState::Running {
            return Err(PluginSystemError::InvalidState {
                plugin_id: ctx.id().to_string(),
                state,
                operation: "start".to_string(),
            });
        }

        let run = ctx.advance_run();
        // Running before the hooks so they can register commands
        ctx.set_state(PluginState::Running);
        ctx.log().info("Starting");
        let plugin = Arc::clone(ctx.plugin());
        let sync_outcome = panic::catch_unwind(AssertUnwindSafe(|| plugin.start(ctx)));
        if let Err(message) = hook_outcome(sync_outcome) {
            return Err(Self::fail_start(ctx, message));
        }

        let task_ctx = ctx.clone();
        let async_start: JoinHandle<PluginResult> = tokio::spawn(async move {
            let plugin = Arc::clone(task_ctx.plugin());
            plugin.start_async(&task_ctx).await
        });

        if Self::should_wait(ctx) {
            join_outcome(async_start.await).map_err(|message| Self::fail_start(ctx, message))?;
            ctx.log().info("Started");
        } else {
            let ctx = ctx.clone();
            self.spawn_background(async move {
                let Err(message) = join_outcome(async_start.await) else {
                    return;
                };
                if ctx.is_current_run(run) {
                    Self::fail_start(&ctx, message);
                } else {
                    ctx.log().debug(format!("Ignoring failure of a superseded start: {}", message));
                }
            });
        }
        Ok(())
    }

    fn fail_start(ctx: &PluginContext, message: String) -> PluginSystemError {
        ctx.set_state(PluginState::Stopped);
        let released = ctx.release_commands();
        ctx.log().error(format!("Failed to start: {}", message), None);
        if released > 0 {
            ctx.log().debug(format!("Unregistered {} command(s)", released));
        }
        PluginSystemError::StartFailure {
            plugin_id: ctx.id().to_string(),
            message,
        }
    }

    async fn stop_plugin(&self, ctx: &PluginContext) -> Result<(), PluginSystemError> {
        let state = ctx.state();
        if state != PluginState::Running {
            return Err(PluginSystemError::InvalidState {
                plugin_id: ctx.id().to_string(),
                state,
                operation: "stop".to_string(),
            });
        }

        ctx.advance_run();
        ctx.log().info("Stopping");
        let plugin = Arc::clone(ctx.plugin());
        let mut failure = hook_outcome(panic::catch_unwind(AssertUnwindSafe(|| plugin.shutdown(ctx)))).err();

        let task_ctx = ctx.clone();
        let async_stop: JoinHandle<PluginResult> = tokio::spawn(async move {
            let plugin = Arc::clone(task_ctx.plugin());
            plugin.shutdown_async(&task_ctx).await
        });
        if Self::should_wait(ctx) {
            if let Err(message) = join_outcome(async_stop.await) {
                failure.get_or_insert(message);
            }
        } else {
            let log = ctx.log().clone();
            self.spawn_background(async move {
                if let Err(message) = join_outcome(async_stop.await) {
                    log.error(format!("Asynchronous shutdown failed: {}", message), None);
                }
            });
        }

        ctx.set_state(PluginState::Stopped);
        ctx.release_commands();
        match failure {
            Some(message) => {
                ctx.log().error(format!("Failed to shut down cleanly: {}", message), None);
                Err(PluginSystemError::ShutdownFailure {
                    plugin_id: ctx.id().to_string(),
                    message,
                })
            }
            None => {
                ctx.log().info("Stopped");
                Ok(())
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&'static str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn hook_outcome(outcome: std::thread::Result<PluginResult>) -> Result<(), String> {
    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(format!("panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn join_outcome(outcome: Result<PluginResult, JoinError>) -> Result<(), String> {
    match outcome {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(e) if e.is_panic() => Err(format!("panicked: {}", panic_message(e.into_panic().as_ref()))),
        Err(e) => Err(e.to_string()),
    }
}
