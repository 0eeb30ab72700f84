//! Ask one route question against live services.
//!
//! Run with: SILICONFLOW_API_KEY=... AMAP_MCP_URL=... cargo run --example route

use std::sync::Arc;

use mcp::{Endpoint, McpConnector, ToolTransport};
use runtime::{ChatCompletionsBackend, DEFAULT_MODEL, Message, Orchestrator};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let api_key = std::env::var("SILICONFLOW_API_KEY")?;
    let url = std::env::var("AMAP_MCP_URL")?;

    let backend = ChatCompletionsBackend::builder(api_key, DEFAULT_MODEL).build();
    let transport = Arc::new(ToolTransport::new(McpConnector::new(Endpoint::StreamableHttp { url })));
    let orchestrator = Orchestrator::new(backend, transport);

    let tools = orchestrator.connect().await?;
    println!("Connected, {tools} tools available\n");

    let question = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "北京到上海的距离是多少？".to_string());
    let outcome = orchestrator.run(&[Message::user(question)]).await?;

    println!("{}", outcome.content);
    println!("\n({:?}, {} tool calls)", outcome.path, outcome.tool_calls);
    Ok(())
}
