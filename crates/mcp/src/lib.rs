//! Tool transport for MCP (Model Context Protocol) servers.
//!
//! This crate connects to a tool server, fetches its tool catalog once per
//! connection, and invokes tools on behalf of the runtime.
//!
//! # Example
//!
//! ```no_run
//! use mcp::{Endpoint, McpConnector, ToolTransport};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = ToolTransport::new(McpConnector::new(Endpoint::StreamableHttp {
//!     url: "https://mcp.amap.com/mcp?key=...".to_string(),
//! }));
//!
//! let session = transport.initialize().await?;
//! for tool in session.catalog() {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! let payload = transport
//!     .call_tool("maps_geo", json!({ "address": "北京", "city": "北京" }))
//!     .await?;
//! println!("{payload}");
//! # Ok(())
//! # }
//! ```

mod catalog;
mod connector;
mod error;
mod transport;

pub use catalog::ToolDefinition;
pub use connector::{Connection, Connector, Endpoint, McpConnection, McpConnector, payload_from_result};
pub use error::{ConnectError, Result, ToolError};
pub use transport::{DEFAULT_CONNECT_TIMEOUT, ToolTransport, TransportSession, TransportStatus};
