//! Waypoint runtime: tool-augmented chat exchanges.
//!
//! This crate answers map questions by pairing an OpenAI-compatible
//! completion endpoint with the tools of an MCP server (AMap by default).
//!
//! # Overview
//!
//! - **Backend**: a completion round against the model
//!   ([`ChatCompletionsBackend`] for SiliconFlow-style endpoints).
//! - **Orchestrator**: drives one exchange: first completion, tool batch,
//!   local short-circuit or follow-up completion.
//! - **Preprocessor / Sanitizer**: geocode route questions ahead of time and
//!   fill the template placeholders the model leaves in its arguments.
//! - **Session**: an in-memory conversation on top of the orchestrator.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mcp::{Endpoint, McpConnector, ToolTransport};
//! use runtime::{ChatCompletionsBackend, DEFAULT_MODEL, Orchestrator, Session};
//!
//! # async fn example() -> runtime::Result<()> {
//! let backend = ChatCompletionsBackend::builder("sk-...", DEFAULT_MODEL).build();
//! let endpoint = Endpoint::StreamableHttp {
//!     url: "https://mcp.amap.com/mcp?key=...".into(),
//! };
//! let transport = Arc::new(ToolTransport::new(McpConnector::new(endpoint)));
//! let orchestrator = Arc::new(Orchestrator::new(backend, transport));
//!
//! let mut session = Session::new(orchestrator);
//! let answer = session.chat("北京到上海的距离是多少？").await?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```

pub mod completion;
mod error;
mod exchange;
pub mod format;
pub mod locate;
pub mod model;
mod orchestrator;
mod profile;
pub mod providers;
pub mod sanitize;
mod session;

#[cfg(test)]
mod testing;

pub use completion::{Backend, CompletionError, CompletionRequest, SamplingParams};
pub use error::{Error, Result};
pub use exchange::{ExchangeRequest, ExchangeResponse};
pub use locate::{Coordinate, LocationCache, QueryPreprocessor};
pub use model::{AssistantTurn, Message, RawArguments, Role, ToolCallRequest, ToolOutcome, ToolResult};
pub use orchestrator::{
    AnswerPath, DEGRADED_REPLY, ExchangeOptions, ExchangeOutcome, OrchestrationError, Orchestrator, Phase,
    ShortCircuit,
};
pub use profile::ToolProfile;
pub use providers::{ChatCompletionsBackend, ChatCompletionsBackendBuilder, DEFAULT_ENDPOINT, DEFAULT_MODEL};
pub use sanitize::ArgumentSanitizer;
pub use session::Session;
