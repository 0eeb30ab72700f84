//! Completion client: request shape, sampling constants and backend trait.

pub mod errors;

pub use errors::CompletionError;

use std::future::Future;

use mcp::ToolDefinition;
use serde::{Deserialize, Serialize};

use crate::model::{AssistantTurn, Message};

/// Everything needed for one completion round.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    /// Full message history, oldest first.
    pub messages: &'a [Message],
    /// Tools the model may request. `None` or empty sends no tool block.
    pub tools: Option<&'a [ToolDefinition]>,
}

impl<'a> CompletionRequest<'a> {
    pub fn new(messages: &'a [Message]) -> Self {
        Self {
            messages,
            tools: None,
        }
    }

    pub fn with_tools(mut self, tools: &'a [ToolDefinition]) -> Self {
        self.tools = Some(tools);
        self
    }
}

/// Fixed sampling parameters, set once per backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: f64,
    pub top_k: u32,
    pub frequency_penalty: f64,
    pub n: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 512,
            top_p: 0.7,
            top_k: 50,
            frequency_penalty: 0.5,
            n: 1,
        }
    }
}

/// Trait for LLM completion backends.
///
/// One call is one completion round. Failures are surfaced once; retry
/// policy belongs to the caller.
pub trait Backend: Send + Sync {
    fn complete(
        &self,
        request: CompletionRequest<'_>,
    ) -> impl Future<Output = Result<AssistantTurn, CompletionError>> + Send;
}
