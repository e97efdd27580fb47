//! Gambiarra CLI - the orchestration server and the workspace client.
//!
//! `gambiarra server` runs the AI side; `gambiarra client` runs the
//! workspace side and the interactive prompt loop. The two talk over a
//! single TCP connection carrying one JSON frame per line.

#![deny(unsafe_code)]
#![deny(clippy::all)]

mod console;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::net::TcpStream;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gambiarra_client::{ClientConfig, WorkspaceClient};
use gambiarra_core::OperatingMode;
use gambiarra_llm::{LlmProvider, OpenAiCompatProvider, ScriptedProvider};
use gambiarra_server::{Server, ServerConfig};

use console::{ConsoleInput, ConsoleUi};

/// Gambiarra - AI coding assistant with client-side tool execution.
#[derive(Parser)]
#[command(name = "gambiarra")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the orchestration server
    Server {
        /// Host to bind to
        #[arg(long, env = "GAMBIARRA_HOST")]
        host: Option<String>,

        /// Port to bind to
        #[arg(long, env = "GAMBIARRA_PORT")]
        port: Option<u16>,

        /// AI provider
        #[arg(long, env = "GAMBIARRA_PROVIDER", value_enum, default_value = "scripted")]
        provider: Provider,

        /// Model name for the OpenAI-compatible provider
        #[arg(long, env = "GAMBIARRA_MODEL", default_value = "gpt-4")]
        model: String,

        /// Base URL for a custom OpenAI-compatible endpoint
        #[arg(long, env = "GAMBIARRA_BASE_URL")]
        base_url: Option<String>,

        /// Path to a TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Run the interactive workspace client
    Client {
        /// Server address (host:port)
        #[arg(short, long, env = "GAMBIARRA_SERVER")]
        server: Option<String>,

        /// Workspace root directory
        #[arg(short, long, env = "GAMBIARRA_WORKSPACE")]
        workspace: Option<PathBuf>,

        /// Operating mode for the session
        #[arg(long, default_value = "code")]
        mode: OperatingMode,

        /// Require manual approval even for read-only tools
        #[arg(long)]
        no_auto_approve_reads: bool,

        /// Path to a TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Provider {
    /// Deterministic canned-response provider (for demos and tests)
    Scripted,
    /// The OpenAI API (requires OPENAI_API_KEY)
    Openai,
    /// Any OpenAI-compatible endpoint (requires --base-url)
    Custom,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Server {
            host,
            port,
            provider,
            model,
            base_url,
            config,
        } => run_server(host, port, provider, &model, base_url, config).await,
        Commands::Client {
            server,
            workspace,
            mode,
            no_auto_approve_reads,
            config,
        } => run_client(server, workspace, mode, no_auto_approve_reads, config).await,
    }
}

async fn run_server(
    host: Option<String>,
    port: Option<u16>,
    provider: Provider,
    model: &str,
    base_url: Option<String>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let mut config: ServerConfig = load_toml(config_path.as_deref())?.unwrap_or_default();
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    let provider = build_provider(provider, model, base_url.as_deref())?;
    info!(
        addr = %config.bind_addr(),
        provider = provider.name(),
        model = provider.model(),
        "starting server"
    );

    let server = Server::new(config, provider);
    server.run().await?;
    Ok(())
}

fn build_provider(
    provider: Provider,
    model: &str,
    base_url: Option<&str>,
) -> Result<Box<dyn LlmProvider>> {
    match provider {
        Provider::Scripted => Ok(Box::new(ScriptedProvider::new([
            "I have no scripted responses left. \
             <attempt_completion><args><result>Nothing to do.</result></args></attempt_completion>",
        ]))),
        Provider::Openai => {
            let api_key = std::env::var("OPENAI_API_KEY")
                .context("OPENAI_API_KEY must be set for the openai provider")?;
            Ok(Box::new(OpenAiCompatProvider::openai(&api_key, model)))
        },
        Provider::Custom => {
            let base_url =
                base_url.context("--base-url is required for the custom provider")?;
            let api_key = std::env::var("OPENAI_API_KEY").ok();
            Ok(Box::new(OpenAiCompatProvider::custom(
                base_url,
                api_key.as_deref(),
                model,
            )))
        },
    }
}

async fn run_client(
    server: Option<String>,
    workspace: Option<PathBuf>,
    mode: OperatingMode,
    no_auto_approve_reads: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let mut config: ClientConfig =
        load_toml(config_path.as_deref())?.unwrap_or_else(|| ClientConfig::new("."));
    if let Some(server) = server {
        config.server_addr = server;
    }
    if let Some(workspace) = workspace {
        config.workspace_root = workspace;
    }
    config.operating_mode = mode;
    if no_auto_approve_reads {
        config.auto_approve_reads = false;
    }

    let stream = TcpStream::connect(&config.server_addr)
        .await
        .with_context(|| format!("failed to connect to {}", config.server_addr))?;
    info!(server = %config.server_addr, workspace = %config.workspace_root.display(), "connected");

    let input = Arc::new(ConsoleInput::new());
    let ui = Arc::new(ConsoleUi);
    let handler = Arc::new(console::ConsoleApprovalHandler::new(Arc::clone(&input)));

    let mut client = WorkspaceClient::new(stream, config, handler, ui)?;
    client.connect_and_create_session().await?;

    println!("Gambiarra interactive client. Type a prompt, or 'quit' to exit.");
    loop {
        let Some(line) = input.prompt("\nYou: ").await else {
            break;
        };
        let line = line.trim().to_string();
        match line.as_str() {
            "" => continue,
            "quit" | "exit" | "q" => break,
            _ => {},
        }

        client.send_user_message(&line).await?;
        if let Err(e) = client.pump_turn().await {
            eprintln!("turn failed: {e}");
            break;
        }
    }

    println!("Goodbye.");
    Ok(())
}

fn load_toml<C: serde::de::DeserializeOwned>(path: Option<&std::path::Path>) -> Result<Option<C>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config = toml::from_str(&text)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(Some(config))
}
