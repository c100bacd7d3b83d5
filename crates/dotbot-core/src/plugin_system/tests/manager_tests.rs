#![cfg(test)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::{TempDir, tempdir};
use tokio::sync::Notify;

use crate::command::{CommandError, CommandOption, CommandResponse, CommandScope, Invocation, handler_fn};
use crate::kernel::Host;
use crate::plugin_system::context::{PluginContext, PluginState};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::loader::PluginLoader;
use crate::plugin_system::manager::PluginManager;
use crate::plugin_system::manifest::PluginDescriptor;
use crate::plugin_system::traits::{Plugin, PluginError, PluginResult};
use crate::storage::{BotSettings, ConfigManager};

type Events = Arc<Mutex<Vec<String>>>;

#[derive(Clone, Copy, PartialEq)]
enum Failure {
    None,
    SyncStart,
    AsyncStart,
    Panic,
    Shutdown,
}

struct TestPlugin {
    id: &'static str,
    command: Option<&'static str>,
    failure: Failure,
    wait: bool,
    events: Events,
}

impl TestPlugin {
    fn new(id: &'static str, events: &Events) -> Self {
        Self {
            id,
            command: None,
            failure: Failure::None,
            wait: true,
            events: events.clone(),
        }
    }

    fn with_command(mut self, name: &'static str) -> Self {
        self.command = Some(name);
        self
    }

    fn failing(mut self, failure: Failure) -> Self {
        self.failure = failure;
        self
    }

    fn no_wait(mut self) -> Self {
        self.wait = false;
        self
    }

    fn record(&self, event: &str) {
        self.events.lock().unwrap().push(format!("{}:{}", event, self.id));
    }
}

#[async_trait]
impl Plugin for TestPlugin {
    fn name(&self) -> &str {
        self.id
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn should_wait(&self) -> bool {
        self.wait
    }

    fn start(&self, ctx: &PluginContext) -> PluginResult {
        self.record("start");
        if let Some(name) = self.command {
            let cmd = CommandOption::command(name, "Test command")
                .handler(handler_fn(|_ctx| async { Ok(CommandResponse::message("ok")) }));
            ctx.register_global_command(cmd)?;
        }
        match self.failure {
            Failure::SyncStart => Err(PluginError::StartError("sync start exploded".to_string())),
            Failure::Panic => panic!("start panicked"),
            _ => Ok(()),
        }
    }

    async fn start_async(&self, _ctx: &PluginContext) -> PluginResult {
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.record("started");
        if self.failure == Failure::AsyncStart {
            return Err(PluginError::StartError("async start exploded".to_string()));
        }
        Ok(())
    }

    fn shutdown(&self, _ctx: &PluginContext) -> PluginResult {
        self.record("stop");
        if self.failure == Failure::Shutdown {
            return Err(PluginError::ShutdownError("shutdown exploded".to_string()));
        }
        Ok(())
    }
}

/// Hands out pre-built plugin instances by id.
#[derive(Default)]
struct MapLoader {
    plugins: Mutex<HashMap<String, Arc<dyn Plugin>>>,
}

impl MapLoader {
    fn with(self, plugin: TestPlugin) -> Self {
        let id = plugin.id;
        self.with_plugin(id, plugin)
    }

    fn with_plugin(self, id: &str, plugin: impl Plugin + 'static) -> Self {
        self.plugins.lock().unwrap().insert(id.to_string(), Arc::new(plugin));
        self
    }
}

impl PluginLoader for MapLoader {
    fn load(&self, descriptor: &PluginDescriptor) -> Result<Arc<dyn Plugin>, PluginSystemError> {
        self.plugins
            .lock()
            .unwrap()
            .get(&descriptor.id)
            .cloned()
            .ok_or_else(|| PluginSystemError::LoadingError {
                plugin_id: descriptor.id.clone(),
                path: None,
                message: "no such test plugin".to_string(),
            })
    }
}

fn unused_factory() -> Box<dyn Plugin> {
    unreachable!("MapLoader never calls factories")
}

fn desc(id: &str, deps: &[&str]) -> PluginDescriptor {
    deps.iter()
        .fold(PluginDescriptor::from_static(id, unused_factory), |d, dep| d.depends_on(*dep))
}

fn manager(loader: MapLoader) -> (PluginManager, TempDir) {
    let dir = tempdir().expect("Failed to create temp directory");
    let host = Host::new(ConfigManager::new(dir.path()), BotSettings::default());
    (PluginManager::with_loader(host, Arc::new(loader)), dir)
}

fn events_of(events: &Events) -> Vec<String> {
    events.lock().unwrap().clone()
}

#[tokio::test]
async fn test_start_in_dependency_order_and_stop_in_reverse() {
    let events: Events = Arc::default();
    let loader = MapLoader::default()
        .with(TestPlugin::new("app", &events))
        .with(TestPlugin::new("core", &events));
    let (mut manager, _dir) = manager(loader);

    let loaded = manager.load(vec![desc("app", &["core"]), desc("core", &[])]).unwrap();
    assert_eq!(loaded, vec!["core", "app"]);
    assert_eq!(manager.state("app"), Some(PluginState::Loaded));

    assert!(manager.start_all().await.is_empty());
    assert_eq!(manager.state("core"), Some(PluginState::Running));
    assert_eq!(manager.state("app"), Some(PluginState::Running));

    assert!(manager.stop_all().await.is_empty());
    assert_eq!(
        events_of(&events),
        vec!["start:core", "started:core", "start:app", "started:app", "stop:app", "stop:core"]
    );
    assert_eq!(manager.state("core"), Some(PluginState::Stopped));
}

#[tokio::test]
async fn test_resolution_errors_abort_before_any_plugin_exists() {
    let events: Events = Arc::default();
    let (mut manager, _dir) = manager(MapLoader::default().with(TestPlugin::new("app", &events)));

    let err = manager.load(vec![desc("app", &["ghost"])]).unwrap_err();
    assert!(matches!(err, PluginSystemError::DependencyResolution(_)));
    assert!(manager.plugins().is_empty());

    let err = manager.load(vec![desc("a", &["b"]), desc("b", &["a"])]).unwrap_err();
    assert!(err.to_string().contains("a -> b -> a"));
    assert!(manager.start_all().await.is_empty());
    assert!(events_of(&events).is_empty());
}

#[tokio::test]
async fn test_start_failures_are_isolated() {
    let events: Events = Arc::default();
    let loader = MapLoader::default()
        .with(TestPlugin::new("a.bad", &events).with_command("badcmd").failing(Failure::SyncStart))
        .with(TestPlugin::new("b.panics", &events).failing(Failure::Panic))
        .with(TestPlugin::new("c.async", &events).failing(Failure::AsyncStart))
        .with(TestPlugin::new("d.good", &events).with_command("good"));
    let (mut manager, _dir) = manager(loader);
    manager
        .load(vec![desc("a.bad", &[]), desc("b.panics", &[]), desc("c.async", &[]), desc("d.good", &[])])
        .unwrap();

    let failures = manager.start_all().await;
    assert_eq!(failures.len(), 3);
    assert!(failures.iter().all(|f| matches!(f, PluginSystemError::StartFailure { .. })));

    assert_eq!(manager.state("a.bad"), Some(PluginState::Stopped));
    assert_eq!(manager.state("b.panics"), Some(PluginState::Stopped));
    assert_eq!(manager.state("c.async"), Some(PluginState::Stopped));
    assert_eq!(manager.state("d.good"), Some(PluginState::Running));

    // The failed plugin's command was rolled back, the good one is dispatchable
    let registry = manager.host().registry();
    assert!(registry.lookup(CommandScope::Global, "badcmd").is_none());
    let response = manager
        .host()
        .dispatcher()
        .dispatch(Invocation::new(CommandScope::Global, "good"))
        .await
        .unwrap();
    assert_eq!(response.content, "ok");
}

#[tokio::test]
async fn test_non_waiting_async_failure_marks_stopped_later() {
    let events: Events = Arc::default();
    let loader = MapLoader::default()
        .with(TestPlugin::new("slow", &events).with_command("slow").failing(Failure::AsyncStart).no_wait());
    let (mut manager, _dir) = manager(loader);
    manager.load(vec![desc("slow", &[])]).unwrap();

    // The sequence does not wait for the async hook
    assert!(manager.start_all().await.is_empty());
    assert_eq!(manager.state("slow"), Some(PluginState::Running));

    for _ in 0..50 {
        if manager.state("slow") == Some(PluginState::Stopped) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(manager.state("slow"), Some(PluginState::Stopped));
    assert!(manager.host().registry().is_empty());
}

#[tokio::test]
async fn test_register_requires_running_state() {
    let events: Events = Arc::default();
    let (mut manager, _dir) = manager(MapLoader::default().with(TestPlugin::new("p", &events)));
    manager.load(vec![desc("p", &[])]).unwrap();

    let ctx = manager.plugin_context("p").unwrap().clone();
    let cmd = || {
        CommandOption::command("late", "Late command")
            .handler(handler_fn(|_ctx| async { Ok(CommandResponse::message("late")) }))
    };

    let err = ctx.register_global_command(cmd()).unwrap_err();
    assert_eq!(
        err,
        CommandError::PluginNotRunning {
            plugin_id: "p".to_string(),
            state: "loaded".to_string()
        }
    );

    manager.start("p").await.unwrap();
    ctx.register_guild_command(77, cmd()).unwrap();
    assert_eq!(ctx.owned_commands().len(), 1);

    manager.stop("p").await.unwrap();
    assert!(ctx.owned_commands().is_empty());
    assert!(manager.host().registry().is_empty());
    assert!(matches!(
        ctx.register_global_command(cmd()),
        Err(CommandError::PluginNotRunning { .. })
    ));
}

#[tokio::test]
async fn test_restart_registers_identical_tree() {
    let events: Events = Arc::default();
    let (mut manager, _dir) = manager(MapLoader::default().with(TestPlugin::new("p", &events).with_command("test")));
    manager.load(vec![desc("p", &[])]).unwrap();
    manager.start_all().await;

    let registry = manager.host().registry().clone();
    let first = registry.lookup(CommandScope::Global, "test").unwrap().root.definition();

    manager.restart("p").await.unwrap();
    let second = registry.lookup(CommandScope::Global, "test").unwrap().root.definition();
    assert_eq!(first, second);
    assert_eq!(manager.state("p"), Some(PluginState::Running));

    assert!(matches!(
        manager.start("p").await,
        Err(PluginSystemError::InvalidState { state: PluginState::Running, .. })
    ));
    assert!(matches!(manager.restart("missing").await, Err(PluginSystemError::PluginNotFound(_))));
}

#[tokio::test]
async fn test_name_collision_between_plugins() {
    let events: Events = Arc::default();
    let loader = MapLoader::default()
        .with(TestPlugin::new("first", &events).with_command("test"))
        .with(TestPlugin::new("second", &events).with_command("test"));
    let (mut manager, _dir) = manager(loader);
    manager.load(vec![desc("first", &[]), desc("second", &[])]).unwrap();

    let failures = manager.start_all().await;
    // The colliding registration surfaces as a start failure of the second plugin only
    assert_eq!(failures.len(), 1);
    assert_eq!(manager.state("first"), Some(PluginState::Running));
    assert_eq!(
        manager.host().registry().lookup(CommandScope::Global, "test").unwrap().owner,
        "first"
    );
}

#[tokio::test]
async fn test_shutdown_failure_still_stops() {
    let events: Events = Arc::default();
    let loader = MapLoader::default()
        .with(TestPlugin::new("flaky", &events).with_command("flaky").failing(Failure::Shutdown))
        .with(TestPlugin::new("fine", &events));
    let (mut manager, _dir) = manager(loader);
    manager.load(vec![desc("fine", &[]), desc("flaky", &[])]).unwrap();
    manager.start_all().await;

    let failures = manager.stop_all().await;
    assert_eq!(failures.len(), 1);
    assert!(matches!(&failures[0], PluginSystemError::ShutdownFailure { plugin_id, .. } if plugin_id == "flaky"));
    assert_eq!(manager.state("flaky"), Some(PluginState::Stopped));
    assert_eq!(manager.state("fine"), Some(PluginState::Stopped));
    assert!(manager.host().registry().is_empty());
}

#[tokio::test]
async fn test_failed_instantiation_skips_dependents() {
    let events: Events = Arc::default();
    let loader = MapLoader::default()
        .with(TestPlugin::new("dependent", &events))
        .with(TestPlugin::new("other", &events));
    let (mut manager, _dir) = manager(loader);

    let loaded = manager
        .load(vec![desc("missing.impl", &[]), desc("dependent", &["missing.impl"]), desc("other", &[])])
        .unwrap();
    assert_eq!(loaded, vec!["other"]);

    let infos = manager.plugins();
    assert_eq!(infos.len(), 1);
    assert_eq!(infos[0].version, "1.0.0");
    assert!(!infos[0].is_extension);
}

#[tokio::test]
async fn test_second_load_resolves_against_loaded_plugins() {
    let events: Events = Arc::default();
    let loader = MapLoader::default()
        .with(TestPlugin::new("base", &events))
        .with(TestPlugin::new("addon", &events));
    let (mut manager, _dir) = manager(loader);

    manager.load(vec![desc("base", &[])]).unwrap();
    assert_eq!(manager.load(vec![desc("addon", &["base"])]).unwrap(), vec!["addon"]);
    assert_eq!(manager.load_order(), vec!["base", "addon"]);

    let err = manager.load(vec![desc("base", &[])]).unwrap_err();
    assert!(matches!(err, PluginSystemError::DependencyResolution(_)));
}

/// Non-waiting plugin whose asynchronous shutdown outlives the stop call.
struct LingeringShutdown {
    finished: Arc<AtomicBool>,
}

#[async_trait]
impl Plugin for LingeringShutdown {
    fn name(&self) -> &str {
        "lingering"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn should_wait(&self) -> bool {
        false
    }

    async fn shutdown_async(&self, _ctx: &PluginContext) -> PluginResult {
        tokio::time::sleep(Duration::from_millis(200)).await;
        self.finished.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_stop_all_waits_for_background_shutdown() {
    let finished = Arc::new(AtomicBool::new(false));
    let loader = MapLoader::default().with_plugin(
        "lingering",
        LingeringShutdown {
            finished: finished.clone(),
        },
    );
    let (mut manager, _dir) = manager(loader);
    manager.load(vec![desc("lingering", &[])]).unwrap();
    assert!(manager.start_all().await.is_empty());

    assert!(manager.stop_all().await.is_empty());
    assert!(finished.load(Ordering::SeqCst));
    assert_eq!(manager.state("lingering"), Some(PluginState::Stopped));
}

/// Non-waiting plugin whose first asynchronous start fails only once released.
struct GatedStart {
    gate: Arc<Notify>,
    runs: AtomicUsize,
}

#[async_trait]
impl Plugin for GatedStart {
    fn name(&self) -> &str {
        "gated"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn should_wait(&self) -> bool {
        false
    }

    fn start(&self, ctx: &PluginContext) -> PluginResult {
        let cmd = CommandOption::command("gen", "Generation command")
            .handler(handler_fn(|_ctx| async { Ok(CommandResponse::message("ok")) }));
        ctx.register_global_command(cmd)?;
        Ok(())
    }

    async fn start_async(&self, _ctx: &PluginContext) -> PluginResult {
        if self.runs.fetch_add(1, Ordering::SeqCst) == 0 {
            self.gate.notified().await;
            return Err(PluginError::StartError("first run failed late".to_string()));
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_late_failure_of_previous_run_leaves_restart_intact() {
    let gate = Arc::new(Notify::new());
    let loader = MapLoader::default().with_plugin(
        "gated",
        GatedStart {
            gate: gate.clone(),
            runs: AtomicUsize::new(0),
        },
    );
    let (mut manager, _dir) = manager(loader);
    manager.load(vec![desc("gated", &[])]).unwrap();

    manager.start("gated").await.unwrap();
    manager.restart("gated").await.unwrap();
    assert_eq!(manager.state("gated"), Some(PluginState::Running));

    gate.notify_one();
    manager.join_background().await;

    assert_eq!(manager.state("gated"), Some(PluginState::Running));
    assert!(manager.host().registry().lookup(CommandScope::Global, "gen").is_some());
    assert_eq!(manager.plugin_context("gated").unwrap().owned_commands().len(), 1);
}
