//! Conversation model.
//!
//! Messages serialize in the chat-completions wire shape, so the same types
//! are accepted from the exchange boundary and sent to the completion
//! endpoint.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::warn;

/// Role of a message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    /// `None` only when the assistant delegates to tools.
    #[serde(default)]
    pub content: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tool_calls: Vec<ToolCallRequest>,
    /// Correlates a tool message with the call it answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// An assistant turn that delegates to tools.
    pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_calls: calls,
            tool_call_id: None,
        }
    }

    /// A tool-role message answering `tool_call_id`.
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// Check the message invariants.
    pub fn validate(&self) -> Result<(), InvalidMessage> {
        if self.content.is_none() && self.tool_calls.is_empty() {
            return Err(InvalidMessage::MissingContent(self.role));
        }
        if self.role == Role::Tool && self.tool_call_id.is_none() {
            return Err(InvalidMessage::MissingToolCallId);
        }
        Ok(())
    }

    /// Text content, or an empty string.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

/// A message that breaks the conversation invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidMessage {
    #[error("{0:?} message has neither content nor tool calls")]
    MissingContent(Role),
    #[error("tool message has no tool_call_id")]
    MissingToolCallId,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Tool arguments exactly as the model produced them.
#[derive(Debug, Clone, PartialEq)]
pub enum RawArguments {
    /// JSON text, possibly malformed.
    Text(String),
    /// Already-structured arguments (some providers send objects).
    Structured(Value),
}

impl RawArguments {
    /// Arguments as JSON text, the form the completion endpoint expects.
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Structured(value) => value.to_string(),
        }
    }
}

/// Tool arguments that are not valid JSON.
#[derive(Debug, Error)]
#[error("malformed arguments for {tool}: {source}")]
pub struct ParseError {
    pub tool: String,
    #[source]
    pub source: serde_json::Error,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireToolCall", into = "WireToolCall")]
pub struct ToolCallRequest {
    /// Opaque correlation token.
    pub id: String,
    pub tool_name: String,
    pub raw_arguments: RawArguments,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, tool_name: impl Into<String>, raw_arguments: RawArguments) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            raw_arguments,
        }
    }

    /// Parse the arguments strictly.
    ///
    /// Blank text parses to an empty object.
    pub fn try_parse_arguments(&self) -> Result<Value, ParseError> {
        match &self.raw_arguments {
            RawArguments::Structured(value) => Ok(value.clone()),
            RawArguments::Text(text) if text.trim().is_empty() => Ok(Value::Object(Map::new())),
            RawArguments::Text(text) => serde_json::from_str(text).map_err(|source| ParseError {
                tool: self.tool_name.clone(),
                source,
            }),
        }
    }

    /// Parse the arguments, falling back to the raw text as a single
    /// string value.
    pub fn parse_arguments(&self) -> Value {
        self.try_parse_arguments().unwrap_or_else(|err| {
            warn!(call_id = %self.id, error = %err, "passing raw argument text through");
            Value::String(self.raw_arguments.to_text())
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

fn function_kind() -> String {
    "function".to_string()
}

impl From<WireToolCall> for ToolCallRequest {
    fn from(wire: WireToolCall) -> Self {
        let raw_arguments = match wire.function.arguments {
            Value::String(text) => RawArguments::Text(text),
            Value::Null => RawArguments::Text(String::new()),
            other => RawArguments::Structured(other),
        };
        Self {
            id: wire.id,
            tool_name: wire.function.name,
            raw_arguments,
        }
    }
}

impl From<ToolCallRequest> for WireToolCall {
    fn from(call: ToolCallRequest) -> Self {
        Self {
            id: call.id,
            kind: function_kind(),
            function: WireFunction {
                arguments: Value::String(call.raw_arguments.to_text()),
                name: call.tool_name,
            },
        }
    }
}

/// Outcome of one tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Success(Value),
    Failure(String),
}

impl ToolOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failure(_))
    }
}

/// Result of a tool invocation, paired with the call it answers.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub correlation_id: String,
    pub tool_name: String,
    pub outcome: ToolOutcome,
}

impl ToolResult {
    pub fn success(call: &ToolCallRequest, payload: Value) -> Self {
        Self {
            correlation_id: call.id.clone(),
            tool_name: call.tool_name.clone(),
            outcome: ToolOutcome::Success(payload),
        }
    }

    pub fn failure(call: &ToolCallRequest, message: impl Into<String>) -> Self {
        Self {
            correlation_id: call.id.clone(),
            tool_name: call.tool_name.clone(),
            outcome: ToolOutcome::Failure(message.into()),
        }
    }

    /// Render as the tool-role message fed back to the model.
    pub fn to_message(&self) -> Message {
        let content = match &self.outcome {
            ToolOutcome::Success(payload) => payload.to_string(),
            ToolOutcome::Failure(message) => json!({ "error": message }).to_string(),
        };
        Message::tool(&self.correlation_id, content)
    }
}

/// What the model answered in one completion round.
#[derive(Debug, Clone, PartialEq)]
pub enum AssistantTurn {
    /// A direct textual answer.
    Answer(String),
    /// A non-empty batch of tool invocations.
    ToolCalls(Vec<ToolCallRequest>),
    /// Neither content nor tool calls.
    Empty,
}

impl AssistantTurn {
    /// Classify a reply. Non-empty content wins over tool calls.
    pub fn from_parts(content: Option<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        match content {
            Some(text) if !text.is_empty() => Self::Answer(text),
            _ if !tool_calls.is_empty() => Self::ToolCalls(tool_calls),
            _ => Self::Empty,
        }
    }
}
