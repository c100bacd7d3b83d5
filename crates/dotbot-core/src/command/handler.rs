use std::collections::BTreeMap;
use std::future::Future;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::command::registry::CommandScope;
use crate::command::value::ArgValue;

/// Error type returned by command handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Executes a resolved command.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, ctx: CommandContext) -> Result<CommandResponse, HandlerError>;
}

/// Everything a handler gets to see about the invocation it serves.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub scope: CommandScope,
    /// Full path from the root command name down to the executed node
    pub path: Vec<String>,
    pub args: CommandArgs,
    /// Id of the plugin that registered the root command
    pub owner: String,
}

impl CommandContext {
    pub fn full_path(&self) -> String {
        self.path.join(" ")
    }
}

/// Flattened `name -> value` arguments of the executed command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandArgs(BTreeMap<String, ArgValue>);

impl CommandArgs {
    pub fn new(values: BTreeMap<String, ArgValue>) -> Self {
        Self(values)
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.0.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ArgValue::as_str)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(ArgValue::as_i64)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(ArgValue::as_f64)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(ArgValue::as_bool)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ArgValue)> {
        self.0.iter()
    }

    pub fn into_inner(self) -> BTreeMap<String, ArgValue> {
        self.0
    }
}

/// Reply sent back to the invoking user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub content: String,
    /// Only visible to the invoking user
    #[serde(default)]
    pub ephemeral: bool,
}

impl CommandResponse {
    pub fn message(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: false,
        }
    }

    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: true,
        }
    }
}

/// Adapter turning an async closure into a [`CommandHandler`].
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> CommandHandler for FnHandler<F>
where
    F: Fn(CommandContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<CommandResponse, HandlerError>> + Send + 'static,
{
    async fn handle(&self, ctx: CommandContext) -> Result<CommandResponse, HandlerError> {
        (self.0)(ctx).await
    }
}

/// Wrap an async closure as a command handler.
///
/// ```
/// use dotbot_core::command::{handler_fn, CommandResponse};
///
/// let handler = handler_fn(|ctx| async move {
///     Ok(CommandResponse::message(format!("ran {}", ctx.full_path())))
/// });
/// # let _ = handler;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(CommandContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<CommandResponse, HandlerError>> + Send + 'static,
{
    FnHandler(f)
}
