use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::process::ExitCode;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use dotbot_core::command::{
    ArgValue, CommandDefinition, CommandDispatcher, CommandPublisher, CommandResponse, CommandScope, Invocation,
    InvocationOption, PlatformClient, PublishError,
};
use dotbot_core::kernel::constants;
use dotbot_core::kernel::error::{Error, KernelLifecyclePhase};
use dotbot_core::plugin_system::{DefaultPluginLoader, PluginManager, PluginScanner, PluginSystemError};
use dotbot_core::storage::{BotSettings, ConfigManager};
use dotbot_core::Host;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

/// Platform stand-in that keeps the published command set in memory.
#[derive(Debug, Default)]
pub struct LocalPlatform {
    commands: Mutex<HashMap<CommandScope, Vec<CommandDefinition>>>,
}

impl LocalPlatform {
    fn with_commands<R>(&self, f: impl FnOnce(&mut HashMap<CommandScope, Vec<CommandDefinition>>) -> R) -> R {
        let mut commands = self.commands.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut commands)
    }
}

#[async_trait]
impl PlatformClient for LocalPlatform {
    async fn upsert_command(&self, scope: CommandScope, command: &CommandDefinition) -> Result<(), PublishError> {
        info!("Published /{} ({})", command.name, scope);
        self.with_commands(|all| {
            let list = all.entry(scope).or_default();
            match list.iter_mut().find(|c| c.name == command.name) {
                Some(existing) => *existing = command.clone(),
                None => list.push(command.clone()),
            }
        });
        Ok(())
    }

    async fn bulk_overwrite(&self, scope: CommandScope, commands: &[CommandDefinition]) -> Result<(), PublishError> {
        info!("Replaced all commands in {} with {} command(s)", scope, commands.len());
        self.with_commands(|all| all.insert(scope, commands.to_vec()));
        Ok(())
    }

    async fn fetch_commands(&self, scope: CommandScope) -> Result<Vec<CommandDefinition>, PublishError> {
        Ok(self.with_commands(|all| all.get(&scope).cloned().unwrap_or_default()))
    }
}

/// One line of input: either a flat path with arguments or the platform's nested options.
#[derive(Debug, Deserialize)]
struct Request {
    /// Echoed back on the reply so callers can match answers to requests
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    scope: CommandScope,
    #[serde(alias = "command_name")]
    command: String,
    #[serde(default)]
    path: Vec<String>,
    #[serde(default)]
    args: BTreeMap<String, ArgValue>,
    #[serde(default)]
    options: Vec<InvocationOption>,
}

impl From<Request> for Invocation {
    fn from(request: Request) -> Self {
        if !request.options.is_empty() {
            return Invocation::from_options(request.scope, request.command, request.options);
        }
        let mut invocation = Invocation::new(request.scope, request.command).with_path(request.path);
        invocation.args = request.args;
        invocation
    }
}

#[derive(Debug, Serialize)]
struct Reply {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Value>,
    #[serde(flatten)]
    response: CommandResponse,
}

enum ServeEvent {
    Line(Option<String>),
    Answered(Result<serde_json::Result<String>, JoinError>),
}

/// Answer every JSON request line from `reader` with one JSON line on `writer`.
///
/// Requests are dispatched concurrently, so replies arrive in completion order and carry
/// the request's `id` when one was given. Blank lines are ignored; undecodable ones get an
/// `{"error": ..}` reply. Returns once input is exhausted and every reply is written.
pub async fn serve<R, W>(dispatcher: &CommandDispatcher, reader: R, writer: &mut W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut pending: JoinSet<serde_json::Result<String>> = JoinSet::new();
    let mut open = true;
    loop {
        let event = tokio::select! {
            line = lines.next_line(), if open => ServeEvent::Line(line?),
            Some(done) = pending.join_next(), if !pending.is_empty() => ServeEvent::Answered(done),
            else => break,
        };

        match event {
            ServeEvent::Line(None) => open = false,
            ServeEvent::Line(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<Request>(line) {
                    Ok(request) => {
                        let id = request.id.clone();
                        let invocation = Invocation::from(request);
                        debug!("Dispatching '{}'", invocation.full_path());
                        let dispatcher = dispatcher.clone();
                        pending.spawn(async move {
                            let response = dispatcher.respond(invocation).await;
                            serde_json::to_string(&Reply { id, response })
                        });
                    }
                    Err(e) => {
                        warn!("Rejected request: {}", e);
                        let reply = serde_json::json!({ "error": e.to_string() }).to_string();
                        write_line(writer, &reply).await?;
                    }
                }
            }
            ServeEvent::Answered(Ok(reply)) => {
                let reply = reply.map_err(std::io::Error::other)?;
                write_line(writer, &reply).await?;
            }
            ServeEvent::Answered(Err(e)) => error!("Request task failed: {}", e),
        }
    }
    Ok(())
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

/// Discover modules, add the compiled-in test module unless a native build was found,
/// and instantiate everything in load order.
async fn load_plugins(host: Host, modules_dir: &Path) -> dotbot_core::Result<PluginManager> {
    let mut scanner = PluginScanner::new();
    let mut descriptors = scanner.scan(modules_dir).await?;
    if descriptors.iter().all(|d| d.id != test_plugin::TEST_PLUGIN_ID) {
        descriptors.push(test_plugin::descriptor());
    }

    let loader = DefaultPluginLoader::new(scanner.search_paths().clone());
    let preloaded = loader.preload_libraries(&descriptors);
    if preloaded > 0 {
        debug!("Preloaded {} shared librar(ies)", preloaded);
    }
    let mut manager = PluginManager::with_loader(host, Arc::new(loader));
    manager.load(descriptors).map_err(|e| Error::KernelLifecycleError {
        phase: KernelLifecyclePhase::Resolve,
        message: e.to_string(),
    })?;
    Ok(manager)
}

fn report_failures(phase: KernelLifecyclePhase, failures: Vec<PluginSystemError>) {
    for failure in failures {
        let err = Error::KernelLifecycleError {
            phase: phase.clone(),
            message: failure.to_string(),
        };
        error!("{}", err);
    }
}

pub async fn run(host: Host, modules_dir: &Path) -> ExitCode {
    let manager = match load_plugins(host.clone(), modules_dir).await {
        Ok(manager) => manager,
        Err(e) => {
            error!("Failed to load plugins: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if !host.settings().has_token() {
        warn!("No platform token configured; commands are only published locally");
    }
    let platform: Arc<dyn PlatformClient> = Arc::new(LocalPlatform::default());
    let (publisher, publish_task) =
        CommandPublisher::attach(host.registry(), platform, host.settings().publish_policy());

    report_failures(KernelLifecyclePhase::Start, manager.start_all().await);
    publisher.ready();
    info!(
        "{} {} is running with {} command(s)",
        constants::APP_NAME,
        constants::APP_VERSION,
        host.registry().len()
    );

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    tokio::select! {
        result = serve(host.dispatcher(), stdin, &mut stdout) => {
            if let Err(e) = result {
                error!("Input stream failed: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    info!("Shutting down");
    report_failures(KernelLifecyclePhase::Shutdown, manager.stop_all().await);
    publisher.shutdown();
    if let Err(e) = publish_task.await {
        error!("Command publisher task failed: {}", e);
    }
    ExitCode::SUCCESS
}

pub async fn list_plugins(host: Host, modules_dir: &Path) -> ExitCode {
    let manager = match load_plugins(host, modules_dir).await {
        Ok(manager) => manager,
        Err(e) => {
            error!("Failed to load plugins: {}", e);
            return ExitCode::FAILURE;
        }
    };
    for (index, plugin) in manager.plugins().iter().enumerate() {
        let marker = if plugin.is_extension { " [extension]" } else { "" };
        println!(
            "{}. {} - {} v{}{}",
            index + 1,
            plugin.id,
            plugin.name,
            plugin.version,
            marker
        );
    }
    ExitCode::SUCCESS
}

pub fn init_config(config_dir: &Path) -> ExitCode {
    let config = ConfigManager::new(config_dir);
    match config.load::<BotSettings>() {
        Ok(Some(_)) => {
            println!(
                "Settings already exist at {}",
                config.resolve_path(constants::SETTINGS_NAME).display()
            );
            ExitCode::SUCCESS
        }
        Ok(None) => match config.save(&BotSettings::default()) {
            Ok(path) => {
                println!("Created {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("Failed to write settings: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            error!("Existing settings are invalid: {}", e);
            ExitCode::FAILURE
        }
    }
}
