//! The exchange loop.
//!
//! An exchange takes a conversation to a final answer in at most two
//! completion rounds with one tool batch in between:
//!
//! 1. First completion with the tool catalog. A direct answer ends here.
//! 2. The transport is initialized on demand. If it cannot be, the fixed
//!    degraded reply is returned and no tool runs.
//! 3. Route questions are geocoded ahead of time into a [`LocationCache`].
//! 4. Calls run one after another. Failures are recorded, never raised.
//! 5. A successful distance lookup is rendered locally, otherwise a second
//!    completion without tools produces the answer.

use std::sync::Arc;

use mcp::{ConnectError, Connector, ToolDefinition, ToolError, ToolTransport};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::completion::{Backend, CompletionError, CompletionRequest};
use crate::format::{RouteSummary, render_route_summary};
use crate::locate::{LocationCache, QueryPreprocessor};
use crate::model::{AssistantTurn, Message, Role, ToolCallRequest, ToolOutcome, ToolResult};
use crate::profile::ToolProfile;
use crate::sanitize::ArgumentSanitizer;

/// Reply used when the tool server cannot be reached.
pub const DEGRADED_REPLY: &str = "抱歉，我目前无法连接到高德地图服务。请稍后再试，或者尝试其他问题。";

const FAILURE_PREFIX: &str = "工具调用失败: ";
const DISTANCE_HINT: &str = r#"建议的参数格式: {"origins": "116.481028,39.989643", "destination": "116.434446,39.90816", "type": "1"}"#;
const DRIVING_HINT: &str = r#"建议的参数格式: {"origin": "116.481028,39.989643", "destination": "116.434446,39.90816"}"#;

/// Whether distance results may be answered without a second round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShortCircuit {
    #[default]
    Enabled,
    Disabled,
}

/// Per-deployment knobs of the exchange loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeOptions {
    #[serde(flatten)]
    pub profile: ToolProfile,
    pub short_circuit: ShortCircuit,
    pub degraded_reply: String,
}

impl Default for ExchangeOptions {
    fn default() -> Self {
        Self {
            profile: ToolProfile::default(),
            short_circuit: ShortCircuit::Enabled,
            degraded_reply: DEGRADED_REPLY.to_string(),
        }
    }
}

/// Where an exchange currently is. Logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingFirstCompletion,
    Direct,
    ToolsRequested,
    ToolsExecuting,
    ResultsAggregated,
    ShortCircuitFormatted,
    AwaitingFollowUpCompletion,
    Done,
}

/// Which path produced the final answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerPath {
    /// The first completion answered directly.
    Direct,
    /// The tool server was unreachable.
    Degraded,
    /// A distance result was rendered locally.
    ShortCircuit,
    /// The second completion answered.
    FollowUp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeOutcome {
    pub content: String,
    pub path: AnswerPath,
    /// Tool calls executed during the exchange.
    pub tool_calls: usize,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OrchestrationError {
    #[error(transparent)]
    Completion(#[from] CompletionError),

    /// A completion round produced neither text nor tool calls.
    #[error("no usable answer from the model")]
    NoAnswer,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Runs exchanges against a completion backend and a shared tool transport.
pub struct Orchestrator<B, C: Connector> {
    backend: B,
    transport: Arc<ToolTransport<C>>,
    preprocessor: QueryPreprocessor,
    sanitizer: ArgumentSanitizer,
    options: ExchangeOptions,
}

impl<B: Backend, C: Connector> Orchestrator<B, C> {
    pub fn new(backend: B, transport: Arc<ToolTransport<C>>) -> Self {
        Self::with_options(backend, transport, ExchangeOptions::default())
    }

    pub fn with_options(backend: B, transport: Arc<ToolTransport<C>>, options: ExchangeOptions) -> Self {
        Self {
            backend,
            transport,
            preprocessor: QueryPreprocessor::new(options.profile.geocode_tool.clone()),
            sanitizer: ArgumentSanitizer::new(options.profile.clone()),
            options,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Eagerly initialize the transport, returning the catalog size.
    ///
    /// Failure here is not fatal: exchanges retry on demand.
    pub async fn connect(&self) -> Result<usize, ConnectError> {
        let session = self.transport.initialize().await?;
        Ok(session.catalog().len())
    }

    /// Run one exchange over `messages`.
    pub async fn run(&self, messages: &[Message]) -> Result<ExchangeOutcome, OrchestrationError> {
        let id = Uuid::new_v4();
        self.exchange(messages)
            .instrument(info_span!("exchange", %id))
            .await
    }

    async fn exchange(&self, messages: &[Message]) -> Result<ExchangeOutcome, OrchestrationError> {
        validate(messages)?;
        let mut conversation = messages.to_vec();

        enter(Phase::AwaitingFirstCompletion);
        let catalog = self.first_round_catalog().await;
        let request = CompletionRequest::new(&conversation).with_tools(&catalog);
        let calls = match self.backend.complete(request).await? {
            AssistantTurn::Answer(content) => {
                enter(Phase::Direct);
                return Ok(finish(content, AnswerPath::Direct, 0));
            }
            AssistantTurn::Empty => return Err(OrchestrationError::NoAnswer),
            AssistantTurn::ToolCalls(calls) => calls,
        };

        enter(Phase::ToolsRequested);
        info!(count = calls.len(), "model requested tools");
        if let Err(err) = self.transport.initialize().await {
            warn!(error = %err, "tool transport unavailable, answering degraded");
            return Ok(finish(self.options.degraded_reply.clone(), AnswerPath::Degraded, 0));
        }

        let cache = match latest_user_text(messages) {
            Some(utterance) => self.preprocessor.resolve(&self.transport, utterance).await,
            None => None,
        };

        enter(Phase::ToolsExecuting);
        let results = self.execute(&calls, cache.as_ref()).await;

        enter(Phase::ResultsAggregated);
        let executed = results.len();
        conversation.push(Message::tool_calls(calls));
        conversation.extend(results.iter().map(ToolResult::to_message));

        if self.options.short_circuit == ShortCircuit::Enabled
            && let Some(content) = self.short_circuit(&results, cache.as_ref())
        {
            enter(Phase::ShortCircuitFormatted);
            return Ok(finish(content, AnswerPath::ShortCircuit, executed));
        }

        enter(Phase::AwaitingFollowUpCompletion);
        match self.backend.complete(CompletionRequest::new(&conversation)).await? {
            AssistantTurn::Answer(content) => Ok(finish(content, AnswerPath::FollowUp, executed)),
            other => {
                warn!(reply = ?other, "follow-up completion carried no answer");
                Err(OrchestrationError::NoAnswer)
            }
        }
    }

    /// Catalog for the first round, connecting once if needed.
    ///
    /// A failed connect leaves the catalog empty; tool requests retry later.
    async fn first_round_catalog(&self) -> Vec<ToolDefinition> {
        match self.transport.initialize().await {
            Ok(session) => session.catalog().to_vec(),
            Err(err) => {
                warn!(error = %err, "tool server unavailable, first round without tools");
                Vec::new()
            }
        }
    }

    /// Run every call in order. Each call yields exactly one result.
    async fn execute(&self, calls: &[ToolCallRequest], cache: Option<&LocationCache>) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            let arguments = self
                .sanitizer
                .sanitize(&call.tool_name, call.parse_arguments(), cache);
            debug!(call_id = %call.id, tool = %call.tool_name, %arguments, "calling tool");

            let result = match self.transport.call_tool(&call.tool_name, arguments).await {
                Ok(payload) => ToolResult::success(call, payload),
                Err(err) => {
                    warn!(call_id = %call.id, tool = %call.tool_name, error = %err, "tool call failed");
                    ToolResult::failure(call, self.describe_failure(&call.tool_name, &err))
                }
            };
            results.push(result);
        }
        results
    }

    fn describe_failure(&self, tool_name: &str, err: &ToolError) -> String {
        let mut message = format!("{FAILURE_PREFIX}{err}");
        let detail = err.to_string();
        if detail.contains("HTTP 500") && detail.contains("Internal Server Error") {
            let profile = &self.options.profile;
            let hint = if tool_name == profile.distance_tool {
                Some(DISTANCE_HINT)
            } else if tool_name == profile.driving_tool {
                Some(DRIVING_HINT)
            } else {
                None
            };
            if let Some(hint) = hint {
                message.push('\n');
                message.push_str(hint);
            }
        }
        message
    }

    /// Render the last distance result locally when the whole batch succeeded.
    fn short_circuit(&self, results: &[ToolResult], cache: Option<&LocationCache>) -> Option<String> {
        let cache = cache?;
        if results.iter().any(|r| r.outcome.is_error()) {
            return None;
        }
        let payload = results.iter().rev().find_map(|r| match &r.outcome {
            ToolOutcome::Success(payload) if r.tool_name == self.options.profile.distance_tool => Some(payload),
            _ => None,
        })?;
        let summary = RouteSummary::from_payload(payload)?;
        Some(render_route_summary(&summary, cache))
    }
}

fn validate(messages: &[Message]) -> Result<(), OrchestrationError> {
    if messages.is_empty() {
        return Err(OrchestrationError::InvalidRequest("no messages".into()));
    }
    for message in messages {
        message
            .validate()
            .map_err(|err| OrchestrationError::InvalidRequest(err.to_string()))?;
    }
    Ok(())
}

fn latest_user_text(messages: &[Message]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(Message::text)
}

fn enter(phase: Phase) {
    debug!(?phase, "exchange phase");
}

fn finish(content: String, path: AnswerPath, tool_calls: usize) -> ExchangeOutcome {
    enter(Phase::Done);
    info!(?path, tool_calls, "exchange finished");
    ExchangeOutcome {
        content,
        path,
        tool_calls,
    }
}
