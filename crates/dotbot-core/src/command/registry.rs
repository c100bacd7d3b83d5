use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::command::error::CommandError;
use crate::command::option::CommandOption;

/// Visibility domain of a registered command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandScope {
    #[default]
    Global,
    Guild(u64),
}

impl fmt::Display for CommandScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandScope::Global => f.write_str("global"),
            CommandScope::Guild(id) => write!(f, "guild:{}", id),
        }
    }
}

/// Key of a registered root command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandId {
    pub scope: CommandScope,
    pub name: String,
}

impl CommandId {
    pub fn new(scope: CommandScope, name: impl Into<String>) -> Self {
        Self {
            scope,
            name: name.into(),
        }
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scope, self.name)
    }
}

/// A validated root command together with its scope and owning plugin.
#[derive(Debug, Clone)]
pub struct RegisteredCommand {
    pub scope: CommandScope,
    pub owner: String,
    pub root: Arc<CommandOption>,
}

impl RegisteredCommand {
    pub fn id(&self) -> CommandId {
        CommandId::new(self.scope, self.root.name())
    }
}

/// Observer of registry changes, called synchronously in the order listeners were added.
///
/// Callbacks run outside the registry lock, so listeners may read the registry. Events are
/// delivered in the order the changes were applied, even across threads; a listener must not
/// register or unregister commands from inside a callback.
pub trait CommandListener: Send + Sync {
    fn command_registered(&self, command: &RegisteredCommand);

    fn command_unregistered(&self, _id: &CommandId) {}
}

#[derive(Default)]
struct RegistryState {
    commands: HashMap<CommandId, RegisteredCommand>,
    /// Registration order across all scopes
    order: Vec<CommandId>,
    /// Next notification ticket handed out with a change
    tickets: u64,
}

impl RegistryState {
    fn take_ticket(&mut self) -> u64 {
        let ticket = self.tickets;
        self.tickets += 1;
        ticket
    }
}

/// Serves notification tickets in the order they were issued.
#[derive(Default)]
struct NotifyTurn {
    next: Mutex<u64>,
    advanced: Condvar,
}

struct TurnGuard<'a>(&'a NotifyTurn);

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        *self.0.next.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        self.0.advanced.notify_all();
    }
}

/// Root commands keyed by `(scope, name)`.
#[derive(Default)]
pub struct CommandRegistry {
    state: RwLock<RegistryState>,
    listeners: RwLock<Vec<Arc<dyn CommandListener>>>,
    turn: NotifyTurn,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Arc<dyn CommandListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Validate and store `root` under `scope` for plugin `owner`.
    ///
    /// Nothing is stored when validation fails or the name is already taken in `scope`.
    pub fn register(&self, scope: CommandScope, root: CommandOption, owner: &str) -> Result<CommandId, CommandError> {
        root.validate()?;
        let id = CommandId::new(scope, root.name());
        let registered = RegisteredCommand {
            scope,
            owner: owner.to_string(),
            root: Arc::new(root),
        };

        let ticket = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if state.commands.contains_key(&id) {
                return Err(CommandError::CommandNameCollision {
                    scope,
                    name: id.name.clone(),
                });
            }
            state.commands.insert(id.clone(), registered.clone());
            state.order.push(id.clone());
            state.take_ticket()
        };

        log::debug!("Registered command '{}' for plugin '{}'", id, owner);
        self.notify_in_turn(ticket, |listeners| {
            for listener in listeners {
                listener.command_registered(&registered);
            }
        });
        Ok(id)
    }

    pub fn lookup(&self, scope: CommandScope, name: &str) -> Option<RegisteredCommand> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.commands.get(&CommandId::new(scope, name)).cloned()
    }

    /// Every root registered in `scope`, in registration order.
    pub fn all_roots(&self, scope: CommandScope) -> Vec<RegisteredCommand> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .order
            .iter()
            .filter(|id| id.scope == scope)
            .filter_map(|id| state.commands.get(id).cloned())
            .collect()
    }

    /// Scopes that currently hold at least one command, in order of first registration.
    pub fn scopes(&self) -> Vec<CommandScope> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut scopes = Vec::new();
        for id in &state.order {
            if !scopes.contains(&id.scope) {
                scopes.push(id.scope);
            }
        }
        scopes
    }

    pub fn owned_by(&self, owner: &str) -> Vec<CommandId> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .order
            .iter()
            .filter(|id| state.commands.get(*id).is_some_and(|c| c.owner == owner))
            .cloned()
            .collect()
    }

    pub fn unregister(&self, id: &CommandId) -> Option<RegisteredCommand> {
        let (removed, ticket) = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let removed = state.commands.remove(id);
            if removed.is_none() {
                return None;
            }
            state.order.retain(|existing| existing != id);
            (removed, state.take_ticket())
        };
        self.notify_in_turn(ticket, |listeners| {
            for listener in listeners {
                listener.command_unregistered(id);
            }
        });
        removed
    }

    /// Remove every command registered by `owner`. A plugin with no commands is a no-op.
    pub fn unregister_owned(&self, owner: &str) -> Vec<CommandId> {
        let (removed, ticket) = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let ids: Vec<CommandId> = state
                .order
                .iter()
                .filter(|id| state.commands.get(*id).is_some_and(|c| c.owner == owner))
                .cloned()
                .collect();
            if ids.is_empty() {
                return ids;
            }
            for id in &ids {
                state.commands.remove(id);
            }
            state.order.retain(|id| !ids.contains(id));
            let ticket = state.take_ticket();
            (ids, ticket)
        };
        log::debug!("Unregistered {} command(s) of plugin '{}'", removed.len(), owner);
        self.notify_in_turn(ticket, |listeners| {
            for id in &removed {
                for listener in listeners {
                    listener.command_unregistered(id);
                }
            }
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.state.read().unwrap_or_else(PoisonError::into_inner).commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until every earlier change has been announced, then announce this one.
    fn notify_in_turn(&self, ticket: u64, announce: impl FnOnce(&[Arc<dyn CommandListener>])) {
        let mut next = self.turn.next.lock().unwrap_or_else(PoisonError::into_inner);
        while *next != ticket {
            next = self.turn.advanced.wait(next).unwrap_or_else(PoisonError::into_inner);
        }
        drop(next);

        let _advance = TurnGuard(&self.turn);
        announce(&self.listeners_snapshot());
    }

    fn listeners_snapshot(&self) -> Vec<Arc<dyn CommandListener>> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.len())
            .finish()
    }
}
