//! Connection seams and the rmcp-backed connector.
//!
//! [`Connector`] opens a connection and [`Connection`] lists and calls
//! tools over it. [`ToolTransport`](crate::ToolTransport) layers the
//! lazy, single-flight lifecycle on top of any connector, which keeps the
//! lifecycle testable without a live tool server.
//!
//! # Example
//!
//! ```ignore
//! use mcp::{Endpoint, McpConnector, ToolTransport};
//!
//! # async fn example() -> Result<(), mcp::ConnectError> {
//! let connector = McpConnector::new(Endpoint::StreamableHttp {
//!     url: "https://mcp.amap.com/mcp?key=...".into(),
//! });
//! let transport = ToolTransport::new(connector);
//! let session = transport.initialize().await?;
//! for tool in session.catalog() {
//!     println!("Tool: {}", tool.name);
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::future::Future;

use rmcp::{
    ServiceError, ServiceExt,
    model::{CallToolRequestParams, CallToolResult},
    service::{RoleClient, RunningService},
    transport::{ConfigureCommandExt, StreamableHttpClientTransport, TokioChildProcess},
};
use serde_json::{Map, Value};
use tokio::process::Command;

use crate::{ConnectError, ToolDefinition, ToolError};

/// An established connection to a tool server.
pub trait Connection: Send + Sync + 'static {
    /// Fetch the tool catalog.
    fn list_tools(&self) -> impl Future<Output = Result<Vec<ToolDefinition>, ConnectError>> + Send;

    /// Invoke a tool and return its decoded payload.
    ///
    /// MCP arguments are a JSON object. [`McpConnection`] rejects any other
    /// value except `null` with [`ToolError::InvalidInput`] without contacting
    /// the server, so raw-text arguments surface as that error.
    fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> impl Future<Output = Result<Value, ToolError>> + Send;
}

/// Opens connections to a tool server.
pub trait Connector: Send + Sync {
    type Connection: Connection;

    /// Open a connection. Resolves once the server is ready for requests.
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, ConnectError>> + Send;
}

/// Where the MCP server lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// A remote server reached over streamable HTTP.
    StreamableHttp { url: String },
    /// A local server spawned as a child process and spoken to over stdio.
    ChildProcess { command: String, args: Vec<String> },
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Query strings usually carry the provider key.
            Self::StreamableHttp { url } => {
                let base = url.split('?').next().unwrap_or(url);
                write!(f, "{base}")
            }
            Self::ChildProcess { command, args } => write!(f, "{command} {}", args.join(" ")),
        }
    }
}

/// Connector speaking MCP through the rmcp SDK.
#[derive(Debug, Clone)]
pub struct McpConnector {
    endpoint: Endpoint,
}

impl McpConnector {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl Connector for McpConnector {
    type Connection = McpConnection;

    async fn connect(&self) -> Result<McpConnection, ConnectError> {
        // `serve` completes the MCP initialize handshake before returning.
        let service = match &self.endpoint {
            Endpoint::StreamableHttp { url } => {
                let transport = StreamableHttpClientTransport::from_uri(url.as_str());
                ().serve(transport)
                    .await
                    .map_err(|e| ConnectError::Unreachable(e.to_string()))?
            }
            Endpoint::ChildProcess { command, args } => {
                let transport = TokioChildProcess::new(Command::new(command).configure(|cmd| {
                    for arg in args {
                        cmd.arg(arg);
                    }
                }))
                .map_err(|e| ConnectError::Unreachable(format!("failed to spawn {command}: {e}")))?;
                ().serve(transport)
                    .await
                    .map_err(|e| ConnectError::Unreachable(e.to_string()))?
            }
        };

        Ok(McpConnection { service })
    }
}

/// A live rmcp client session.
pub struct McpConnection {
    service: RunningService<RoleClient, ()>,
}

impl Connection for McpConnection {
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ConnectError> {
        let response = self
            .service
            .list_tools(Default::default())
            .await
            .map_err(|e| ConnectError::Catalog(e.to_string()))?;
        Ok(response.tools.into_iter().map(ToolDefinition::from).collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        let params = CallToolRequestParams {
            name: name.to_string().into(),
            arguments: object_arguments(arguments)?,
            meta: None,
            task: None,
        };

        let result = self.service.call_tool(params).await.map_err(service_error)?;
        payload_from_result(result)
    }
}

/// MCP carries arguments as an optional JSON object.
fn object_arguments(arguments: Value) -> Result<Option<Map<String, Value>>, ToolError> {
    match arguments {
        Value::Object(map) => Ok(Some(map)),
        Value::Null => Ok(None),
        other => Err(ToolError::InvalidInput(format!(
            "MCP tool arguments must be a JSON object, got {other}"
        ))),
    }
}

fn service_error(err: ServiceError) -> ToolError {
    match err {
        ServiceError::TransportClosed => ToolError::Disconnected("connection closed".into()),
        other => ToolError::Execution(other.to_string()),
    }
}

/// Decode a tool result into a JSON payload.
///
/// Structured content wins. Otherwise the text blocks are joined and parsed
/// as JSON, falling back to a plain string.
pub fn payload_from_result(result: CallToolResult) -> Result<Value, ToolError> {
    let text = result
        .content
        .iter()
        .filter_map(|c| c.as_text())
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    if result.is_error.unwrap_or(false) {
        return Err(ToolError::Execution(text));
    }

    if let Some(structured) = result.structured_content {
        return Ok(structured);
    }

    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}
