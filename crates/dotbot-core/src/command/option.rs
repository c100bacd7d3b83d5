use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::command::error::CommandError;
use crate::command::handler::CommandHandler;
use crate::command::value::{ArgValue, ChannelType, ValueType};
use crate::kernel::constants::{MAX_CHOICES, MAX_DESCRIPTION_LENGTH, MAX_NAME_LENGTH};

/// What a node of a command tree represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKind {
    /// Root of a command tree
    Command,
    SubCommand,
    SubCommandGroup,
    /// Leaf carrying a typed argument
    Value(ValueType),
}

impl OptionKind {
    /// Structural class used for the sibling homogeneity rule.
    fn class(&self) -> &'static str {
        match self {
            OptionKind::Command => "command",
            OptionKind::SubCommand => "sub-command",
            OptionKind::SubCommandGroup => "sub-command group",
            OptionKind::Value(_) => "value option",
        }
    }

    pub fn is_branch(&self) -> bool {
        matches!(self, OptionKind::SubCommand | OptionKind::SubCommandGroup)
    }
}

/// A fixed value a string, integer or number option may take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionChoice {
    pub name: String,
    pub value: ArgValue,
}

/// A node in a command tree.
///
/// Trees are built with the chained constructors:
///
/// ```
/// use dotbot_core::command::{handler_fn, CommandOption, CommandResponse, ValueType};
///
/// let cmd = CommandOption::command("testentry", "Manage test entries").option(
///     CommandOption::sub_command("add", "Add an entry")
///         .option(CommandOption::value("key", "Entry key", ValueType::String).required(true))
///         .handler(handler_fn(|_ctx| async { Ok(CommandResponse::message("added")) })),
/// );
/// assert!(cmd.validate().is_ok());
/// ```
#[derive(Clone)]
pub struct CommandOption {
    name: String,
    description: String,
    kind: OptionKind,
    required: bool,
    autocomplete: bool,
    min_length: Option<u16>,
    max_length: Option<u16>,
    min_value: Option<f64>,
    max_value: Option<f64>,
    choices: Vec<OptionChoice>,
    channel_types: Vec<ChannelType>,
    nsfw: bool,
    children: Vec<CommandOption>,
    handler: Option<Arc<dyn CommandHandler>>,
}

impl CommandOption {
    fn new(name: impl Into<String>, description: impl Into<String>, kind: OptionKind) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            required: false,
            autocomplete: false,
            min_length: None,
            max_length: None,
            min_value: None,
            max_value: None,
            choices: Vec::new(),
            channel_types: Vec::new(),
            nsfw: false,
            children: Vec::new(),
            handler: None,
        }
    }

    /// Root node of a command tree
    pub fn command(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, OptionKind::Command)
    }

    pub fn sub_command(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, OptionKind::SubCommand)
    }

    pub fn group(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, OptionKind::SubCommandGroup)
    }

    pub fn value(name: impl Into<String>, description: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name, description, OptionKind::Value(value_type))
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn autocomplete(mut self, autocomplete: bool) -> Self {
        self.autocomplete = autocomplete;
        self
    }

    pub fn min_length(mut self, min: u16) -> Self {
        self.min_length = Some(min);
        self
    }

    pub fn max_length(mut self, max: u16) -> Self {
        self.max_length = Some(max);
        self
    }

    pub fn min_value(mut self, min: f64) -> Self {
        self.min_value = Some(min);
        self
    }

    pub fn max_value(mut self, max: f64) -> Self {
        self.max_value = Some(max);
        self
    }

    pub fn choice(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.choices.push(OptionChoice {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn channel_types(mut self, types: impl IntoIterator<Item = ChannelType>) -> Self {
        self.channel_types.extend(types);
        self
    }

    pub fn nsfw(mut self, nsfw: bool) -> Self {
        self.nsfw = nsfw;
        self
    }

    /// Append a child node
    pub fn option(mut self, child: CommandOption) -> Self {
        self.children.push(child);
        self
    }

    pub fn handler(mut self, handler: impl CommandHandler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn shared_handler(mut self, handler: Arc<dyn CommandHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> OptionKind {
        self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn choices(&self) -> &[OptionChoice] {
        &self.choices
    }

    pub fn children(&self) -> &[CommandOption] {
        &self.children
    }

    pub fn min_length_bound(&self) -> Option<u16> {
        self.min_length
    }

    pub fn max_length_bound(&self) -> Option<u16> {
        self.max_length
    }

    pub fn min_value_bound(&self) -> Option<f64> {
        self.min_value
    }

    pub fn max_value_bound(&self) -> Option<f64> {
        self.max_value
    }

    pub fn get_handler(&self) -> Option<&Arc<dyn CommandHandler>> {
        self.handler.as_ref()
    }

    pub fn find_child(&self, name: &str) -> Option<&CommandOption> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Children that are sub-commands or sub-command groups
    pub fn has_branches(&self) -> bool {
        self.children.iter().any(|child| child.kind.is_branch())
    }

    /// Value options declared directly on this node
    pub fn value_options(&self) -> impl Iterator<Item = &CommandOption> {
        self.children
            .iter()
            .filter(|child| matches!(child.kind, OptionKind::Value(_)))
    }

    /// A root command or sub-command without nested sub-commands runs a handler.
    pub fn is_executable(&self) -> bool {
        matches!(self.kind, OptionKind::Command | OptionKind::SubCommand) && !self.has_branches()
    }

    /// Check the whole tree, reporting the first node that breaks a rule.
    pub fn validate(&self) -> Result<(), CommandError> {
        if self.kind != OptionKind::Command {
            return Err(CommandError::invalid_tree(
                &self.name,
                format!("root must be a command, found {}", self.kind.class()),
            ));
        }
        self.validate_node(&self.name)
    }

    fn validate_node(&self, path: &str) -> Result<(), CommandError> {
        let name_len = self.name.chars().count();
        if name_len == 0 || name_len > MAX_NAME_LENGTH {
            return Err(CommandError::invalid_tree(
                path,
                format!("name must be 1-{} characters", MAX_NAME_LENGTH),
            ));
        }
        if self.name.chars().any(char::is_whitespace) {
            return Err(CommandError::invalid_tree(path, "name must not contain whitespace"));
        }
        let description_len = self.description.chars().count();
        if description_len == 0 || description_len > MAX_DESCRIPTION_LENGTH {
            return Err(CommandError::invalid_tree(
                path,
                format!("description must be 1-{} characters", MAX_DESCRIPTION_LENGTH),
            ));
        }

        match self.kind {
            OptionKind::Value(value_type) => self.validate_value(path, value_type)?,
            _ => self.validate_branch(path)?,
        }

        let mut seen = HashSet::new();
        for child in &self.children {
            if !seen.insert(child.name.as_str()) {
                return Err(CommandError::invalid_tree(
                    format!("{} {}", path, child.name),
                    "duplicate sibling name",
                ));
            }
        }

        for child in &self.children {
            child.validate_node(&format!("{} {}", path, child.name))?;
        }
        Ok(())
    }

    fn validate_branch(&self, path: &str) -> Result<(), CommandError> {
        let constrained = self.required
            || self.autocomplete
            || !self.choices.is_empty()
            || !self.channel_types.is_empty()
            || self.min_length.is_some()
            || self.max_length.is_some()
            || self.min_value.is_some()
            || self.max_value.is_some();
        if constrained {
            return Err(CommandError::invalid_tree(
                path,
                format!("a {} cannot carry value constraints", self.kind.class()),
            ));
        }
        if self.nsfw && self.kind != OptionKind::Command {
            return Err(CommandError::invalid_tree(path, "only root commands can be marked nsfw"));
        }

        if self.kind == OptionKind::SubCommandGroup && self.children.is_empty() {
            return Err(CommandError::invalid_tree(path, "a sub-command group needs at least one sub-command"));
        }

        if let Some(first) = self.children.first() {
            let class = first.kind.class();
            if let Some(other) = self.children.iter().find(|c| c.kind.class() != class) {
                return Err(CommandError::invalid_tree(
                    path,
                    format!("cannot mix {} '{}' with {} '{}'", class, first.name, other.kind.class(), other.name),
                ));
            }
        }

        for child in &self.children {
            let allowed = match (self.kind, child.kind) {
                (_, OptionKind::Command) => false,
                (OptionKind::SubCommand, kind) => matches!(kind, OptionKind::Value(_)),
                (OptionKind::SubCommandGroup, kind) => kind.is_branch(),
                _ => true,
            };
            if !allowed {
                return Err(CommandError::invalid_tree(
                    format!("{} {}", path, child.name),
                    format!("a {} cannot contain a {}", self.kind.class(), child.kind.class()),
                ));
            }
        }

        let mut optional_seen = false;
        for value in self.value_options() {
            if value.required && optional_seen {
                return Err(CommandError::invalid_tree(
                    format!("{} {}", path, value.name),
                    "required options must come before optional ones",
                ));
            }
            optional_seen |= !value.required;
        }

        if self.is_executable() && self.handler.is_none() {
            return Err(CommandError::invalid_tree(path, "executable command has no handler"));
        }
        Ok(())
    }

    fn validate_value(&self, path: &str, value_type: ValueType) -> Result<(), CommandError> {
        if !self.children.is_empty() {
            return Err(CommandError::invalid_tree(path, "value options cannot have children"));
        }
        if self.handler.is_some() {
            return Err(CommandError::invalid_tree(path, "value options cannot have handlers"));
        }
        if !self.choices.is_empty() {
            if !value_type.supports_choices() {
                return Err(CommandError::invalid_tree(
                    path,
                    format!("{} options cannot have choices", value_type),
                ));
            }
            if self.choices.len() > MAX_CHOICES {
                return Err(CommandError::invalid_tree(
                    path,
                    format!("at most {} choices are allowed", MAX_CHOICES),
                ));
            }
            if self.autocomplete {
                return Err(CommandError::invalid_tree(path, "autocomplete cannot be combined with choices"));
            }
            for choice in &self.choices {
                let name_len = choice.name.chars().count();
                if name_len == 0 || name_len > MAX_DESCRIPTION_LENGTH {
                    return Err(CommandError::invalid_tree(
                        path,
                        format!("choice name must be 1-{} characters", MAX_DESCRIPTION_LENGTH),
                    ));
                }
                if !value_type.accepts(&choice.value) {
                    return Err(CommandError::invalid_tree(
                        path,
                        format!("choice '{}' is a {}, expected {}", choice.name, choice.value.type_name(), value_type),
                    ));
                }
            }
        }
        if (self.min_length.is_some() || self.max_length.is_some()) && value_type != ValueType::String {
            return Err(CommandError::invalid_tree(path, "length bounds only apply to string options"));
        }
        if let (Some(min), Some(max)) = (self.min_length, self.max_length) {
            if min > max {
                return Err(CommandError::invalid_tree(path, "min_length exceeds max_length"));
            }
        }
        if (self.min_value.is_some() || self.max_value.is_some()) && !value_type.is_numeric() {
            return Err(CommandError::invalid_tree(
                path,
                "value bounds only apply to integer and number options",
            ));
        }
        if let (Some(min), Some(max)) = (self.min_value, self.max_value) {
            if min > max {
                return Err(CommandError::invalid_tree(path, "min_value exceeds max_value"));
            }
        }
        if !self.channel_types.is_empty() && value_type != ValueType::Channel {
            return Err(CommandError::invalid_tree(path, "channel types only apply to channel options"));
        }
        if self.nsfw {
            return Err(CommandError::invalid_tree(path, "only root commands can be marked nsfw"));
        }
        Ok(())
    }

    /// Platform representation of this tree, without handlers.
    pub fn definition(&self) -> CommandDefinition {
        CommandDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            options: self.children.iter().map(CommandOption::option_definition).collect(),
            nsfw: self.nsfw,
        }
    }

    fn option_definition(&self) -> OptionDefinition {
        let kind = match self.kind {
            OptionKind::Command | OptionKind::SubCommand => 1,
            OptionKind::SubCommandGroup => 2,
            OptionKind::Value(value_type) => value_type.code(),
        };
        OptionDefinition {
            kind,
            name: self.name.clone(),
            description: self.description.clone(),
            required: self.required,
            autocomplete: self.autocomplete,
            min_length: self.min_length,
            max_length: self.max_length,
            min_value: self.min_value,
            max_value: self.max_value,
            choices: self.choices.clone(),
            channel_types: self.channel_types.iter().map(ChannelType::code).collect(),
            options: self.children.iter().map(CommandOption::option_definition).collect(),
        }
    }
}

impl fmt::Debug for CommandOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandOption")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("required", &self.required)
            .field("choices", &self.choices)
            .field("children", &self.children)
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

/// Serialisable command tree as published to the chat platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDefinition {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionDefinition>,
    #[serde(default)]
    pub nsfw: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionDefinition {
    #[serde(rename = "type")]
    pub kind: u8,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub autocomplete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<OptionChoice>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channel_types: Vec<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionDefinition>,
}
