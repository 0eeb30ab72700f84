//! Fakes shared by the runtime tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use mcp::{ConnectError, Connection, Connector, ToolDefinition, ToolError, ToolTransport};
use serde_json::{Value, json};

use crate::completion::{Backend, CompletionError, CompletionRequest};
use crate::model::{AssistantTurn, Message, RawArguments, ToolCallRequest};

type Handler = Arc<dyn Fn(&str, &Value) -> Result<Value, ToolError> + Send + Sync>;

/// Every tool call a fake connection received, in order.
#[derive(Clone, Default)]
pub struct ToolLog(Arc<Mutex<Vec<(String, Value)>>>);

impl ToolLog {
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.0.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.calls().into_iter().map(|(name, _)| name).collect()
    }
}

pub struct FakeConnector {
    tools: Vec<ToolDefinition>,
    handler: Handler,
    log: ToolLog,
    reachable: bool,
    connects: Arc<AtomicUsize>,
}

impl FakeConnector {
    pub fn new(
        handler: impl Fn(&str, &Value) -> Result<Value, ToolError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            tools: vec![
                ToolDefinition::new("maps_geo", "Geocode an address", json!({"type": "object"})),
                ToolDefinition::new("maps_distance", "Measure a route", json!({"type": "object"})),
                ToolDefinition::new("maps_weather", "City weather", json!({"type": "object"})),
            ],
            handler: Arc::new(handler),
            log: ToolLog::default(),
            reachable: true,
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn unreachable() -> Self {
        let mut connector = Self::new(amap_handler);
        connector.reachable = false;
        connector
    }

    pub fn log(&self) -> ToolLog {
        self.log.clone()
    }

    pub fn connects(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.connects)
    }
}

pub struct FakeConnection {
    tools: Vec<ToolDefinition>,
    handler: Handler,
    log: ToolLog,
}

impl Connector for FakeConnector {
    type Connection = FakeConnection;

    async fn connect(&self) -> Result<FakeConnection, ConnectError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if !self.reachable {
            return Err(ConnectError::Unreachable("connection refused".into()));
        }
        Ok(FakeConnection {
            tools: self.tools.clone(),
            handler: Arc::clone(&self.handler),
            log: self.log.clone(),
        })
    }
}

impl Connection for FakeConnection {
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ConnectError> {
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        self.log.0.lock().unwrap().push((name.to_string(), arguments.clone()));
        (self.handler)(name, &arguments)
    }
}

/// Behaves like a small AMap server.
pub fn amap_handler(name: &str, arguments: &Value) -> Result<Value, ToolError> {
    match name {
        "maps_geo" => match arguments["address"].as_str() {
            Some("北京") => Ok(json!({"geocodes": [{"location": "116.407387,39.904179"}]})),
            Some("上海") => Ok(json!({"geocodes": [{"location": "121.473667,31.230525"}]})),
            _ => Err(ToolError::Execution("no geocode result".into())),
        },
        "maps_distance" => Ok(json!({
            "results": [{"origin_id": "1", "distance": "1500", "duration": "600"}]
        })),
        "maps_weather" => Ok(json!({"city": arguments["city"], "forecasts": []})),
        _ => Err(ToolError::Execution("HTTP 500 Internal Server Error".into())),
    }
}

/// A transport that is already initialized.
pub async fn connected_transport(connector: FakeConnector) -> ToolTransport<FakeConnector> {
    let transport = ToolTransport::new(connector);
    transport
        .initialize()
        .await
        .expect("fake connector always connects");
    transport
}

/// What a fake backend was asked.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<String>,
}

/// Backend replaying scripted turns.
#[derive(Clone, Default)]
pub struct FakeBackend {
    replies: Arc<Mutex<VecDeque<Result<AssistantTurn, CompletionError>>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl FakeBackend {
    pub fn new(replies: Vec<Result<AssistantTurn, CompletionError>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            requests: Arc::default(),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Backend for FakeBackend {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<AssistantTurn, CompletionError> {
        let recorded = RecordedRequest {
            messages: request.messages.to_vec(),
            tools: request
                .tools
                .unwrap_or_default()
                .iter()
                .map(|tool| tool.name.clone())
                .collect(),
        };
        self.requests.lock().unwrap().push(recorded);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CompletionError::InvalidResponse("no scripted reply".into())))
    }
}

pub fn answer(text: &str) -> Result<AssistantTurn, CompletionError> {
    Ok(AssistantTurn::Answer(text.to_string()))
}

pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Result<AssistantTurn, CompletionError> {
    Ok(AssistantTurn::ToolCalls(calls))
}

pub fn call(id: &str, tool: &str, arguments: &str) -> ToolCallRequest {
    ToolCallRequest::new(id, tool, RawArguments::Text(arguments.to_string()))
}
