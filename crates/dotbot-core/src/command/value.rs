use std::fmt;

use serde::{Deserialize, Serialize};

/// A decoded argument value supplied with an invocation.
///
/// Untagged so invocations can carry plain JSON scalars. Integers are tried before
/// floating point numbers, so `5` decodes as [`ArgValue::Integer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Boolean(bool),
    Integer(i64),
    Number(f64),
    String(String),
}

impl ArgValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ArgValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of the value; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ArgValue::Integer(i) => Some(*i as f64),
            ArgValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ArgValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ArgValue::Boolean(_) => "boolean",
            ArgValue::Integer(_) => "integer",
            ArgValue::Number(_) => "number",
            ArgValue::String(_) => "string",
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Boolean(b) => write!(f, "{}", b),
            ArgValue::Integer(i) => write!(f, "{}", i),
            ArgValue::Number(n) => write!(f, "{}", n),
            ArgValue::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::String(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        ArgValue::String(value)
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        ArgValue::Integer(value)
    }
}

impl From<i32> for ArgValue {
    fn from(value: i32) -> Self {
        ArgValue::Integer(value.into())
    }
}

impl From<f64> for ArgValue {
    fn from(value: f64) -> Self {
        ArgValue::Number(value)
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        ArgValue::Boolean(value)
    }
}

/// Type of a value option. Codes follow the chat platform's application command option types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    String,
    Integer,
    Boolean,
    User,
    Channel,
    Role,
    Mentionable,
    Number,
    Attachment,
}

impl ValueType {
    pub fn code(&self) -> u8 {
        match self {
            ValueType::String => 3,
            ValueType::Integer => 4,
            ValueType::Boolean => 5,
            ValueType::User => 6,
            ValueType::Channel => 7,
            ValueType::Role => 8,
            ValueType::Mentionable => 9,
            ValueType::Number => 10,
            ValueType::Attachment => 11,
        }
    }

    /// Whether `value` is acceptable for an option of this type.
    ///
    /// Platform entities (users, channels, roles, attachments) arrive as snowflake ids,
    /// either as strings or integers.
    pub fn accepts(&self, value: &ArgValue) -> bool {
        match self {
            ValueType::String => matches!(value, ArgValue::String(_)),
            ValueType::Integer => matches!(value, ArgValue::Integer(_)),
            ValueType::Number => matches!(value, ArgValue::Integer(_) | ArgValue::Number(_)),
            ValueType::Boolean => matches!(value, ArgValue::Boolean(_)),
            ValueType::User
            | ValueType::Channel
            | ValueType::Role
            | ValueType::Mentionable
            | ValueType::Attachment => matches!(value, ArgValue::String(_) | ArgValue::Integer(_)),
        }
    }

    pub fn supports_choices(&self) -> bool {
        matches!(self, ValueType::String | ValueType::Integer | ValueType::Number)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Integer | ValueType::Number)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::String => "string",
            ValueType::Integer => "integer",
            ValueType::Boolean => "boolean",
            ValueType::User => "user",
            ValueType::Channel => "channel",
            ValueType::Role => "role",
            ValueType::Mentionable => "mentionable",
            ValueType::Number => "number",
            ValueType::Attachment => "attachment",
        };
        f.write_str(name)
    }
}

/// Channel kinds a channel option may be restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelType {
    Text,
    Voice,
    Category,
    Announcement,
    AnnouncementThread,
    PublicThread,
    PrivateThread,
    Stage,
    Forum,
}

impl ChannelType {
    pub fn code(&self) -> u8 {
        match self {
            ChannelType::Text => 0,
            ChannelType::Voice => 2,
            ChannelType::Category => 4,
            ChannelType::Announcement => 5,
            ChannelType::AnnouncementThread => 10,
            ChannelType::PublicThread => 11,
            ChannelType::PrivateThread => 12,
            ChannelType::Stage => 13,
            ChannelType::Forum => 15,
        }
    }
}
