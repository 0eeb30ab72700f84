mod config;
mod error;

use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use mcp::{McpConnector, ToolTransport};
use runtime::{ChatCompletionsBackend, ExchangeRequest, ExchangeResponse, Orchestrator, Session};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use error::{Error, Result};

const SYSTEM_PROMPT: &str = "你是一个出行助手，可以使用高德地图工具回答地点、距离和路线相关的问题。回答要简洁。";

type MapOrchestrator = Orchestrator<ChatCompletionsBackend, McpConnector>;

#[derive(Parser)]
#[command(name = "waypoint")]
#[command(about = "Map-aware chat over a completion API and an MCP tool server", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./waypoint.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat,
    /// Ask a single question and print the answer
    Ask {
        /// The question
        question: String,
    },
    /// Read an exchange request from stdin and write the response to stdout
    Exchange,
    /// Connect to the tool server and list its tools
    Tools,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::discover(cli.config.as_deref())?.with_env(|name| std::env::var(name).ok());

    match cli.command {
        Some(Commands::Chat) | None => cmd_chat(&config).await,
        Some(Commands::Ask { question }) => cmd_ask(&config, &question).await,
        Some(Commands::Exchange) => cmd_exchange(&config).await,
        Some(Commands::Tools) => cmd_tools(&config).await,
    }
}

/// Wire the backend and transport described by `config`.
fn build(config: &Config) -> Result<Arc<MapOrchestrator>> {
    let backend = config.backend()?;
    let transport = transport(config)?;
    info!(model = backend.model(), "configured completion backend");

    Ok(Arc::new(Orchestrator::with_options(
        backend,
        Arc::new(transport),
        config.tools.clone(),
    )))
}

fn transport(config: &Config) -> Result<ToolTransport<McpConnector>> {
    let endpoint = config.endpoint()?;
    info!(%endpoint, "configured tool server");

    Ok(ToolTransport::new(McpConnector::new(endpoint))
        .with_connect_timeout(config.transport.connect_timeout())
        .with_settle_delay(config.transport.settle_delay()))
}

fn system_prompt(config: &Config) -> &str {
    config.completion.system_prompt.as_deref().unwrap_or(SYSTEM_PROMPT)
}

async fn cmd_chat(config: &Config) -> Result<()> {
    let orchestrator = build(config)?;
    println!("waypoint v{}", env!("CARGO_PKG_VERSION"));
    println!("Model: {}", orchestrator.backend().model());

    // A failed boot connect is retried by the first exchange that needs tools.
    match orchestrator.connect().await {
        Ok(tools) => println!("Tools: {tools} available"),
        Err(e) => {
            warn!(error = %e, "tool server unavailable at startup");
            println!("Tools: unavailable ({e})");
        }
    }
    println!("Type 'quit' or Ctrl+D to exit.\n");

    let mut session = Session::new(orchestrator).with_system(system_prompt(config));

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }

        match session.chat(input).await {
            Ok(response) => {
                println!("\n{response}\n");
            }
            Err(e) => {
                eprintln!("Error: {e}\n");
            }
        }
    }

    println!("\nSession ended.");
    Ok(())
}

async fn cmd_ask(config: &Config, question: &str) -> Result<()> {
    let orchestrator = build(config)?;
    let mut session = Session::new(orchestrator).with_system(system_prompt(config));
    let answer = session.chat(question).await?;
    println!("{answer}");
    Ok(())
}

async fn cmd_exchange(config: &Config) -> Result<()> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;

    let response = exchange(config, &input).await;

    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, &response)?;
    writeln!(stdout)?;

    if response.is_success() {
        Ok(())
    } else {
        Err(Error::Exchange {
            status: response.status().as_u16(),
        })
    }
}

/// Answer one raw exchange document. Every failure becomes a response.
async fn exchange(config: &Config, input: &str) -> ExchangeResponse {
    let request = match serde_json::from_str::<ExchangeRequest>(input) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "unreadable exchange request");
            return ExchangeResponse::invalid_request();
        }
    };

    match build(config) {
        Ok(orchestrator) => orchestrator.handle(request).await,
        Err(e) => {
            warn!(error = %e, "exchange not configured");
            ExchangeResponse::server_error(e.to_string())
        }
    }
}

async fn cmd_tools(config: &Config) -> Result<()> {
    let session = transport(config)?.initialize().await?;

    println!("{:<32}  DESCRIPTION", "TOOL");
    println!("{}", "-".repeat(80));
    for tool in session.catalog() {
        let description = tool.description.lines().next().unwrap_or_default();
        println!("{:<32}  {description}", tool.name);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUEST: &str = r#"{"messages": [{"role": "user", "content": "北京到上海的距离"}]}"#;

    #[tokio::test]
    async fn unreadable_request_is_bad_request() {
        let response = exchange(&Config::default(), "{\"messages\": ").await;
        assert_eq!(response, ExchangeResponse::invalid_request());
        assert_eq!(response.status().as_u16(), 400);
    }

    #[tokio::test]
    async fn missing_api_key_is_server_error() {
        let config = Config::parse("[transport]\nurl = \"http://127.0.0.1:9/mcp\"").unwrap();

        let response = exchange(&config, REQUEST).await;

        assert_eq!(response.status().as_u16(), 500);
        let body = serde_json::to_value(&response).unwrap();
        assert!(body["error"].as_str().unwrap().contains("API key not configured"));
    }

    #[tokio::test]
    async fn missing_transport_is_server_error() {
        let config = Config::parse("[completion]\napi_key = \"sk-test\"").unwrap();

        let response = exchange(&config, REQUEST).await;

        assert_eq!(response.status().as_u16(), 500);
        let body = serde_json::to_value(&response).unwrap();
        assert!(body["error"].as_str().unwrap().contains("tool server not configured"));
    }
}
