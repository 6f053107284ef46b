//! Command Batch Model
//!
//! Defines the wire shape of an inbound command batch and the validation that
//! turns a raw request body into a [`CommandBatch`]. Batches only live for the
//! duration of one request (or the background job processing it).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// The closed set of command kinds this gateway knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Speak the joined arguments through the text-to-speech actuator.
    SaySomething,
}

impl CommandKind {
    /// Every known kind, in registration order.
    pub const ALL: [CommandKind; 1] = [CommandKind::SaySomething];

    /// The `type` string used on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            CommandKind::SaySomething => "say_something",
        }
    }

    /// Looks up a kind by its wire name. Matching is exact.
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.wire_name() == name)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// The resolved `type` tag of a command.
///
/// Anything that is not a known wire name, including a missing or non-string
/// tag, is kept as `Unknown` so the dispatcher can log it and move on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandType {
    Known(CommandKind),
    Unknown(Option<String>),
}

impl Default for CommandType {
    fn default() -> Self {
        CommandType::Unknown(None)
    }
}

impl CommandType {
    fn from_value(value: Value) -> Self {
        match value {
            Value::String(name) => match CommandKind::from_wire(&name) {
                Some(kind) => CommandType::Known(kind),
                None => CommandType::Unknown(Some(name)),
            },
            Value::Null => CommandType::Unknown(None),
            other => CommandType::Unknown(Some(other.to_string())),
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandType::Known(kind) => write!(f, "{}", kind),
            CommandType::Unknown(Some(raw)) => write!(f, "{}", raw),
            CommandType::Unknown(None) => f.write_str("<missing>"),
        }
    }
}

impl<'de> Deserialize<'de> for CommandType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(CommandType::from_value)
    }
}

impl Serialize for CommandType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CommandType::Known(kind) => serializer.serialize_str(kind.wire_name()),
            CommandType::Unknown(Some(raw)) => serializer.serialize_str(raw),
            CommandType::Unknown(None) => serializer.serialize_none(),
        }
    }
}

/// One requested action: a type tag plus ordered scalar-or-null arguments.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Command {
    #[serde(rename = "type", default)]
    pub kind: CommandType,
    #[serde(default, deserialize_with = "args_or_empty")]
    pub args: Vec<Value>,
}

impl Command {
    pub fn new(kind: CommandType, args: Vec<Value>) -> Self {
        Self { kind, args }
    }
}

// `"args": null` behaves like a missing field.
fn args_or_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Value>, D::Error> {
    Ok(Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Reasons a request body is refused before any command runs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BatchError {
    #[error("request body is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("request body is not a JSON object")]
    NotAnObject,
    #[error("missing or empty commands: no `commands` field")]
    MissingCommands,
    #[error("missing or empty commands: `commands` is not a list")]
    CommandsNotAList,
    #[error("missing or empty commands: `commands` is empty")]
    EmptyCommands,
    #[error("command #{index} is malformed: {reason}")]
    MalformedCommand { index: usize, reason: String },
}

/// An ordered, non-empty list of commands taken from a single request.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandBatch {
    commands: Vec<Command>,
}

impl CommandBatch {
    /// Builds a batch from already-typed commands. Empty batches are refused.
    pub fn new(commands: Vec<Command>) -> Result<Self, BatchError> {
        if commands.is_empty() {
            return Err(BatchError::EmptyCommands);
        }
        Ok(Self { commands })
    }

    /// Parses and validates a raw request body.
    pub fn from_slice(body: &[u8]) -> Result<Self, BatchError> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| BatchError::InvalidJson(e.to_string()))?;
        Self::from_value(value)
    }

    /// Validates an already-parsed JSON document.
    pub fn from_value(value: Value) -> Result<Self, BatchError> {
        let Value::Object(mut payload) = value else {
            return Err(BatchError::NotAnObject);
        };

        let items = match payload.remove("commands") {
            None | Some(Value::Null) => return Err(BatchError::MissingCommands),
            Some(Value::Array(items)) => items,
            Some(_) => return Err(BatchError::CommandsNotAList),
        };

        let commands = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                if !item.is_object() {
                    return Err(BatchError::MalformedCommand {
                        index,
                        reason: "expected an object".to_string(),
                    });
                }
                serde_json::from_value::<Command>(item).map_err(|e| BatchError::MalformedCommand {
                    index,
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(commands)
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
