use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::command::registry::CommandScope;
use crate::command::value::ArgValue;

/// A decoded request to run one path through a command tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    #[serde(default)]
    pub scope: CommandScope,
    #[serde(alias = "command")]
    pub command_name: String,
    /// Sub-command group and sub-command names below the root, outermost first
    #[serde(default)]
    pub path: Vec<String>,
    #[serde(default)]
    pub args: BTreeMap<String, ArgValue>,
}

/// Nested option as delivered by the platform: either a value or a sub-path node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationOption {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ArgValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<InvocationOption>,
}

impl InvocationOption {
    pub fn value(name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            options: Vec::new(),
        }
    }

    pub fn branch(name: impl Into<String>, options: Vec<InvocationOption>) -> Self {
        Self {
            name: name.into(),
            value: None,
            options,
        }
    }
}

impl Invocation {
    pub fn new(scope: CommandScope, command_name: impl Into<String>) -> Self {
        Self {
            scope,
            command_name: command_name.into(),
            path: Vec::new(),
            args: BTreeMap::new(),
        }
    }

    pub fn with_path<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path = path.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }

    /// Build an invocation from the platform's nested option list.
    ///
    /// Each level contributes at most one sub-path node; the first one wins. Values are
    /// taken from the deepest level reached.
    pub fn from_options(scope: CommandScope, command_name: impl Into<String>, options: Vec<InvocationOption>) -> Self {
        let mut invocation = Self::new(scope, command_name);
        let mut level = options;
        loop {
            let mut next = None;
            let mut args = BTreeMap::new();
            for option in level {
                match option.value {
                    Some(value) => {
                        args.insert(option.name, value);
                    }
                    None if next.is_none() => next = Some(option),
                    None => {}
                }
            }
            match next {
                Some(branch) => {
                    invocation.path.push(branch.name);
                    level = branch.options;
                }
                None => {
                    invocation.args = args;
                    return invocation;
                }
            }
        }
    }

    /// Root name followed by the path, space separated.
    pub fn full_path(&self) -> String {
        std::iter::once(self.command_name.as_str())
            .chain(self.path.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
