//! # DotBot Core Command System
//!
//! Plugins contribute trees of [`CommandOption`]s. The [`CommandRegistry`] validates and
//! stores them by `(scope, name)`, the [`CommandDispatcher`] routes decoded
//! [`Invocation`]s down a tree to one handler, and the [`CommandPublisher`] mirrors
//! registrations to the chat platform through a [`PlatformClient`].
//!
//! A tree has at most this shape:
//!
//! ```text
//! command -> [sub-command group ->]* sub-command -> value options
//! ```
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod invocation;
pub mod option;
pub mod publisher;
pub mod registry;
pub mod value;

pub use dispatcher::CommandDispatcher;
pub use error::CommandError;
pub use handler::{CommandArgs, CommandContext, CommandHandler, CommandResponse, HandlerError, handler_fn};
pub use invocation::{Invocation, InvocationOption};
pub use option::{CommandDefinition, CommandOption, OptionChoice, OptionDefinition, OptionKind};
pub use publisher::{CommandPublisher, PlatformClient, PublishError};
pub use registry::{CommandId, CommandListener, CommandRegistry, CommandScope, RegisteredCommand};
pub use value::{ArgValue, ChannelType, ValueType};

#[cfg(test)]
mod tests;
