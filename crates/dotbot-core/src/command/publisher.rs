use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::command::option::CommandDefinition;
use crate::command::registry::{CommandId, CommandListener, CommandRegistry, CommandScope, RegisteredCommand};
use crate::storage::settings::PublishPolicy;

pub type PublishError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The chat platform's command synchronisation endpoints.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Create the command, or update it when one with the same name exists remotely.
    async fn upsert_command(&self, scope: CommandScope, command: &CommandDefinition) -> Result<(), PublishError>;

    /// Replace every remote command in `scope` with `commands`.
    async fn bulk_overwrite(&self, scope: CommandScope, commands: &[CommandDefinition]) -> Result<(), PublishError>;

    /// Commands currently known to the platform in `scope`.
    async fn fetch_commands(&self, scope: CommandScope) -> Result<Vec<CommandDefinition>, PublishError>;
}

enum PublishMessage {
    Registered(CommandId, CommandDefinition),
    Unregistered(CommandId),
    Ready,
    Disconnected,
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// Pushes registered commands to the platform.
///
/// Registrations arrive through [`CommandListener`] and are handed to a background task
/// over a channel. Until [`ready`](Self::ready) is signalled they are buffered; on ready
/// the [`PublishPolicy`] decides how the remote set is brought up to date, and from then
/// on every new root is upserted once.
pub struct CommandPublisher {
    sender: mpsc::UnboundedSender<PublishMessage>,
}

impl CommandPublisher {
    /// Spawn the publishing task and subscribe it to `registry`.
    pub fn attach(
        registry: &Arc<CommandRegistry>,
        client: Arc<dyn PlatformClient>,
        policy: PublishPolicy,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = PublishWorker {
            registry: Arc::clone(registry),
            client,
            policy,
            connected: false,
            pending: Vec::new(),
            published: HashSet::new(),
        };
        let handle = tokio::spawn(worker.run(receiver));
        let publisher = Arc::new(Self { sender });
        registry.add_listener(publisher.clone());
        (publisher, handle)
    }

    /// The platform connection is (re)established.
    pub fn ready(&self) {
        self.send(PublishMessage::Ready);
    }

    pub fn disconnected(&self) {
        self.send(PublishMessage::Disconnected);
    }

    /// Wait until every message sent so far has been processed.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        self.send(PublishMessage::Flush(tx));
        let _ = rx.await;
    }

    /// Stop the publishing task after it drains queued messages.
    pub fn shutdown(&self) {
        self.send(PublishMessage::Shutdown);
    }

    fn send(&self, message: PublishMessage) {
        if self.sender.send(message).is_err() {
            log::debug!("Command publisher task is no longer running");
        }
    }
}

impl CommandListener for CommandPublisher {
    fn command_registered(&self, command: &RegisteredCommand) {
        self.send(PublishMessage::Registered(command.id(), command.root.definition()));
    }

    fn command_unregistered(&self, id: &CommandId) {
        self.send(PublishMessage::Unregistered(id.clone()));
    }
}

struct PublishWorker {
    registry: Arc<CommandRegistry>,
    client: Arc<dyn PlatformClient>,
    policy: PublishPolicy,
    connected: bool,
    pending: Vec<(CommandId, CommandDefinition)>,
    published: HashSet<CommandId>,
}

impl PublishWorker {
    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<PublishMessage>) {
        while let Some(message) = receiver.recv().await {
            match message {
                PublishMessage::Registered(id, definition) => {
                    if self.connected {
                        self.upsert(id, &definition).await;
                    } else {
                        self.pending.push((id, definition));
                    }
                }
                PublishMessage::Unregistered(id) => {
                    // Remote copies are left in place; dispatch reports them as unavailable
                    self.published.remove(&id);
                    self.pending.retain(|(pending, _)| pending != &id);
                }
                PublishMessage::Ready => {
                    self.connected = true;
                    self.sync_on_ready().await;
                }
                PublishMessage::Disconnected => self.connected = false,
                PublishMessage::Flush(done) => {
                    let _ = done.send(());
                }
                PublishMessage::Shutdown => break,
            }
        }
        log::debug!("Command publisher stopped");
    }

    async fn upsert(&mut self, id: CommandId, definition: &CommandDefinition) {
        if self.published.contains(&id) {
            return;
        }
        match self.client.upsert_command(id.scope, definition).await {
            Ok(()) => {
                log::info!("Published command '{}'", id);
                self.published.insert(id);
            }
            Err(e) => log::error!("Failed to publish command '{}': {}", id, e),
        }
    }

    async fn sync_on_ready(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        match self.policy {
            PublishPolicy::Incremental => {
                for (id, definition) in pending {
                    self.upsert(id, &definition).await;
                }
            }
            PublishPolicy::Rebuild => {
                for scope in self.registry.scopes() {
                    let roots = self.registry.all_roots(scope);
                    let definitions: Vec<CommandDefinition> = roots.iter().map(|r| r.root.definition()).collect();
                    match self.client.bulk_overwrite(scope, &definitions).await {
                        Ok(()) => {
                            log::info!("Rebuilt {} command(s) in scope {}", definitions.len(), scope);
                            self.published.extend(roots.iter().map(RegisteredCommand::id));
                        }
                        Err(e) => log::error!("Failed to rebuild commands in scope {}: {}", scope, e),
                    }
                }
            }
            PublishPolicy::Modify => {
                for scope in self.registry.scopes() {
                    let remote = match self.client.fetch_commands(scope).await {
                        Ok(remote) => remote,
                        Err(e) => {
                            log::error!("Failed to fetch remote commands in scope {}: {}", scope, e);
                            continue;
                        }
                    };
                    for registered in self.registry.all_roots(scope) {
                        let id = registered.id();
                        let definition = registered.root.definition();
                        if remote.iter().any(|r| r == &definition) {
                            log::debug!("Remote command '{}' is up to date", id);
                            self.published.insert(id);
                        } else {
                            self.upsert(id, &definition).await;
                        }
                    }
                }
            }
        }
    }
}
