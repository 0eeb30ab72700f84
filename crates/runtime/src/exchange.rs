//! Request/response boundary of an exchange.

use mcp::Connector;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::completion::Backend;
use crate::model::Message;
use crate::orchestrator::{OrchestrationError, Orchestrator};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRequest {
    pub messages: Vec<Message>,
}

impl ExchangeRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

/// Final answer or failure, serialized as `{content}` or `{error}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ExchangeResponse {
    Answer {
        content: String,
    },
    Failure {
        #[serde(skip)]
        status: StatusCode,
        error: String,
    },
}

impl ExchangeResponse {
    pub fn answer(content: impl Into<String>) -> Self {
        Self::Answer {
            content: content.into(),
        }
    }

    pub fn failure(status: StatusCode, error: impl Into<String>) -> Self {
        Self::Failure {
            status,
            error: error.into(),
        }
    }

    /// The response to a request that could not be read.
    pub fn invalid_request() -> Self {
        Self::failure(StatusCode::BAD_REQUEST, "无效的请求格式")
    }

    /// A 500 carrying `error` verbatim.
    pub fn server_error(error: impl Into<String>) -> Self {
        Self::failure(StatusCode::INTERNAL_SERVER_ERROR, error)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Answer { .. } => StatusCode::OK,
            Self::Failure { status, .. } => *status,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status().is_success()
    }
}

impl From<OrchestrationError> for ExchangeResponse {
    fn from(err: OrchestrationError) -> Self {
        match err {
            OrchestrationError::InvalidRequest(_) => Self::invalid_request(),
            OrchestrationError::NoAnswer => Self::server_error("无法获取有效响应"),
            OrchestrationError::Completion(err) => {
                Self::server_error(format!("调用硅基流动API失败: {err}"))
            }
        }
    }
}

impl<B: Backend, C: Connector> Orchestrator<B, C> {
    /// Answer one exchange request. Never fails; failures become responses.
    pub async fn handle(&self, request: ExchangeRequest) -> ExchangeResponse {
        match self.run(&request.messages).await {
            Ok(outcome) => ExchangeResponse::answer(outcome.content),
            Err(err) => {
                warn!(error = %err, "exchange failed");
                err.into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionError;
    use crate::testing::{FakeBackend, FakeConnector, amap_handler, answer, connected_transport};
    use serde_json::json;
    use std::sync::Arc;

    async fn orchestrator(backend: FakeBackend) -> Orchestrator<FakeBackend, FakeConnector> {
        let transport = connected_transport(FakeConnector::new(amap_handler)).await;
        Orchestrator::new(backend, Arc::new(transport))
    }

    #[test]
    fn request_parses_wire_messages() {
        let request: ExchangeRequest = serde_json::from_value(json!({
            "messages": [
                {"role": "system", "content": "你是地图助手"},
                {"role": "user", "content": "北京到上海多远"}
            ]
        }))
        .unwrap();
        assert_eq!(request.messages[1], Message::user("北京到上海多远"));
    }

    #[test]
    fn responses_serialize_without_status() {
        assert_eq!(
            serde_json::to_value(ExchangeResponse::answer("好的")).unwrap(),
            json!({"content": "好的"})
        );
        let failure = ExchangeResponse::failure(StatusCode::BAD_REQUEST, "无效的请求格式");
        assert_eq!(failure.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            serde_json::to_value(failure).unwrap(),
            json!({"error": "无效的请求格式"})
        );
    }

    #[tokio::test]
    async fn answers_with_ok() {
        let orchestrator = orchestrator(FakeBackend::new(vec![answer("你好！")])).await;

        let response = orchestrator
            .handle(ExchangeRequest::new(vec![Message::user("你好")]))
            .await;

        assert_eq!(response, ExchangeResponse::answer("你好！"));
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn empty_request_is_bad_request() {
        let backend = FakeBackend::new(vec![answer("unused")]);
        let orchestrator = orchestrator(backend.clone()).await;

        let response = orchestrator.handle(ExchangeRequest::new(Vec::new())).await;

        assert_eq!(
            response,
            ExchangeResponse::failure(StatusCode::BAD_REQUEST, "无效的请求格式")
        );
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn backend_failures_are_server_errors() {
        let orchestrator = orchestrator(FakeBackend::new(vec![Err(CompletionError::Network(
            "connection reset".into(),
        ))]))
        .await;

        let response = orchestrator
            .handle(ExchangeRequest::new(vec![Message::user("hi")]))
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let ExchangeResponse::Failure { error, .. } = response else {
            panic!("expected failure");
        };
        assert!(error.starts_with("调用硅基流动API失败"));
        assert!(error.contains("connection reset"));
    }

    #[tokio::test]
    async fn missing_answer_is_server_error() {
        let orchestrator =
            orchestrator(FakeBackend::new(vec![Ok(crate::model::AssistantTurn::Empty)])).await;

        let response = orchestrator
            .handle(ExchangeRequest::new(vec![Message::user("hi")]))
            .await;

        assert_eq!(
            response,
            ExchangeResponse::failure(StatusCode::INTERNAL_SERVER_ERROR, "无法获取有效响应")
        );
    }
}
