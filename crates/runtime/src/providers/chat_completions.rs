//! OpenAI-compatible chat-completions backend (SiliconFlow and friends).

use crate::completion::{Backend, CompletionError, CompletionRequest, SamplingParams};
use crate::model::{AssistantTurn, Message, ToolCallRequest};
use mcp::ToolDefinition;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

pub const DEFAULT_ENDPOINT: &str = "https://api.siliconflow.cn/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "Qwen/QwQ-32B";

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool<'a>>,
    temperature: f64,
    max_tokens: u32,
    top_p: f64,
    top_k: u32,
    frequency_penalty: f64,
    n: u32,
    response_format: ApiResponseFormat,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ApiTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: ApiFunction<'a>,
}

#[derive(Debug, Serialize)]
struct ApiFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Debug, Serialize)]
struct ApiResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallRequest>>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for creating a chat-completions backend.
#[derive(Debug, Clone)]
pub struct ChatCompletionsBackendBuilder {
    api_key: String,
    model: String,
    endpoint: String,
    sampling: SamplingParams,
}

impl ChatCompletionsBackendBuilder {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            sampling: SamplingParams::default(),
        }
    }

    /// Full URL of the chat-completions endpoint.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn build(self) -> ChatCompletionsBackend {
        ChatCompletionsBackend {
            client: reqwest::Client::new(),
            api_key: self.api_key,
            model: self.model,
            endpoint: self.endpoint,
            sampling: self.sampling,
        }
    }
}

/// Chat-completions API backend.
pub struct ChatCompletionsBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
    sampling: SamplingParams,
}

impl ChatCompletionsBackend {
    pub fn builder(api_key: impl Into<String>, model: impl Into<String>) -> ChatCompletionsBackendBuilder {
        ChatCompletionsBackendBuilder::new(api_key, model)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn tool_to_api(tool: &ToolDefinition) -> ApiTool<'_> {
        ApiTool {
            kind: "function",
            function: ApiFunction {
                name: &tool.name,
                description: &tool.description,
                parameters: &tool.input_schema,
            },
        }
    }
}

impl std::fmt::Display for ChatCompletionsBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "chat_completions({})", self.model)
    }
}

impl Backend for ChatCompletionsBackend {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<AssistantTurn, CompletionError> {
        let tools: Vec<ApiTool<'_>> = request
            .tools
            .unwrap_or_default()
            .iter()
            .map(Self::tool_to_api)
            .collect();

        let api_request = ApiRequest {
            model: &self.model,
            messages: request.messages,
            tools,
            temperature: self.sampling.temperature,
            max_tokens: self.sampling.max_tokens,
            top_p: self.sampling.top_p,
            top_k: self.sampling.top_k,
            frequency_penalty: self.sampling.frequency_penalty,
            n: self.sampling.n,
            response_format: ApiResponseFormat { kind: "text" },
            stream: false,
        };

        debug!(
            model = %self.model,
            messages = request.messages.len(),
            tools = api_request.tools.len(),
            "sending completion request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "completion endpoint rejected request");
            return Err(CompletionError::Status { status, body });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::InvalidResponse(e.to_string()))?;

        let message = api_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| CompletionError::InvalidResponse("response has no choices".into()))?;

        Ok(AssistantTurn::from_parts(
            message.content,
            message.tool_calls.unwrap_or_default(),
        ))
    }
}
