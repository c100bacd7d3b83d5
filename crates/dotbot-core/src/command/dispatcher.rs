use std::collections::BTreeMap;
use std::sync::Arc;

use crate::command::error::CommandError;
use crate::command::handler::{CommandArgs, CommandContext, CommandResponse};
use crate::command::invocation::Invocation;
use crate::command::option::{CommandOption, OptionKind};
use crate::command::registry::CommandRegistry;
use crate::command::value::{ArgValue, ValueType};

pub const UNAVAILABLE_MESSAGE: &str = "This command is currently unavailable.";
pub const FAILURE_MESSAGE: &str = "Something went wrong while running this command.";

/// Routes invocations through the registry's command trees to exactly one handler.
///
/// The dispatcher holds no mutable state; clones share the registry and each call to
/// [`dispatch`](Self::dispatch) is independent.
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    registry: Arc<CommandRegistry>,
}

impl CommandDispatcher {
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    /// Resolve and run `invocation`.
    pub async fn dispatch(&self, invocation: Invocation) -> Result<CommandResponse, CommandError> {
        let not_found = || CommandError::CommandNotFound {
            scope: invocation.scope,
            path: invocation.full_path(),
        };

        let registered = self
            .registry
            .lookup(invocation.scope, &invocation.command_name)
            .ok_or_else(not_found)?;

        let mut current: &CommandOption = &registered.root;
        let mut path = vec![invocation.command_name.clone()];
        for segment in &invocation.path {
            current = current
                .find_child(segment)
                .filter(|child| child.kind().is_branch())
                .ok_or_else(not_found)?;
            path.push(segment.clone());
        }

        // Path stopped at a group or at a command that still has sub-commands
        if !current.is_executable() {
            return Err(not_found());
        }
        let handler = current.get_handler().cloned().ok_or_else(not_found)?;
        let full_path = path.join(" ");
        let args = collect_args(current, &full_path, invocation.args)?;

        let ctx = CommandContext {
            scope: invocation.scope,
            path,
            args,
            owner: registered.owner.clone(),
        };

        log::debug!("Dispatching '{}' in scope {}", full_path, invocation.scope);
        let outcome = tokio::spawn(async move { handler.handle(ctx).await }).await;
        match outcome {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                log::error!("Handler for '{}' (plugin '{}') failed: {}", full_path, registered.owner, e);
                Err(CommandError::HandlerFailure {
                    path: full_path,
                    message: e.to_string(),
                })
            }
            Err(join_error) => {
                log::error!(
                    "Handler for '{}' (plugin '{}') panicked: {}",
                    full_path,
                    registered.owner,
                    join_error
                );
                Err(CommandError::HandlerFailure {
                    path: full_path,
                    message: "handler panicked".to_string(),
                })
            }
        }
    }

    /// Dispatch and convert the outcome into something safe to show the invoking user.
    pub async fn respond(&self, invocation: Invocation) -> CommandResponse {
        match self.dispatch(invocation).await {
            Ok(response) => response,
            Err(CommandError::CommandNotFound { scope, path }) => {
                log::debug!("No command '{}' in scope {}", path, scope);
                CommandResponse::ephemeral(UNAVAILABLE_MESSAGE)
            }
            Err(CommandError::InvalidArgument { option, reason, .. }) => {
                CommandResponse::ephemeral(format!("Invalid value for '{}': {}", option, reason))
            }
            Err(_) => CommandResponse::ephemeral(FAILURE_MESSAGE),
        }
    }
}

/// Match supplied arguments against the value options declared on `command`.
///
/// Only the command's own value options are considered; unknown names are dropped.
fn collect_args(
    command: &CommandOption,
    path: &str,
    mut supplied: BTreeMap<String, ArgValue>,
) -> Result<CommandArgs, CommandError> {
    let mut args = BTreeMap::new();
    for option in command.value_options() {
        let OptionKind::Value(value_type) = option.kind() else {
            continue;
        };
        let invalid = |reason: String| CommandError::InvalidArgument {
            path: path.to_string(),
            option: option.name().to_string(),
            reason,
        };
        let Some(value) = supplied.remove(option.name()) else {
            if option.is_required() {
                return Err(invalid("a value is required".to_string()));
            }
            continue;
        };
        if !value_type.accepts(&value) {
            return Err(invalid(format!("expected {}, got {}", value_type, value.type_name())));
        }
        let value = match (value_type, value) {
            (ValueType::Number, ArgValue::Integer(i)) => ArgValue::Number(i as f64),
            (_, value) => value,
        };
        check_constraints(option, &value).map_err(invalid)?;
        args.insert(option.name().to_string(), value);
    }

    for name in supplied.keys() {
        log::debug!("Dropping unknown argument '{}' for '{}'", name, path);
    }
    Ok(CommandArgs::new(args))
}

fn check_constraints(option: &CommandOption, value: &ArgValue) -> Result<(), String> {
    if !option.choices().is_empty() {
        let matches_choice = option.choices().iter().any(|choice| match (&choice.value, value) {
            (ArgValue::String(a), ArgValue::String(b)) => a == b,
            (a, b) => a.as_f64().is_some() && a.as_f64() == b.as_f64(),
        });
        if !matches_choice {
            return Err(format!("'{}' is not one of the allowed choices", value));
        }
    }

    if let ArgValue::String(s) = value {
        let len = s.chars().count();
        if let Some(min) = option.min_length_bound() {
            if len < usize::from(min) {
                return Err(format!("must be at least {} characters", min));
            }
        }
        if let Some(max) = option.max_length_bound() {
            if len > usize::from(max) {
                return Err(format!("must be at most {} characters", max));
            }
        }
    }

    if let Some(n) = value.as_f64() {
        if let Some(min) = option.min_value_bound() {
            if n < min {
                return Err(format!("must be at least {}", min));
            }
        }
        if let Some(max) = option.max_value_bound() {
            if n > max {
                return Err(format!("must be at most {}", max));
            }
        }
    }
    Ok(())
}
