mod config;
mod error;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use runtime::{McpToolServer, OpenAiModel, Session, ToolServerHandle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use error::Result;

#[derive(Parser)]
#[command(name = "mcp-llm")]
#[command(about = "Let a language model use MCP tool servers", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the TOML config (default: ./mcp-llm.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// JSON file in `mcpServers` format; replaces the configured servers
    #[arg(short, long, global = true)]
    servers: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single task and print the outcome as JSON
    Run {
        /// The user message for the turn
        task: String,
    },
    /// Start an interactive chat session
    Chat,
    /// List the tools offered by the configured servers
    Tools,
}

type McpSession = Session<OpenAiModel, McpToolServer>;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::discover(cli.config.as_deref())?;
    if let Some(path) = &cli.servers {
        config = config.with_servers_file(path)?;
    }
    let config = config.with_env();

    let mut session = build_session(&config)?;
    let result = match session.initialize().await {
        Ok(()) => match cli.command {
            Commands::Run { task } => cmd_run(&mut session, &task).await,
            Commands::Chat => cmd_chat(&mut session).await,
            Commands::Tools => cmd_tools(&session),
        },
        Err(e) => Err(e.into()),
    };

    session.cleanup().await;
    result
}

fn build_session(config: &Config) -> Result<McpSession> {
    let model = config.model()?;
    info!(%model, servers = config.servers.len(), "starting session");

    let servers = config
        .servers
        .iter()
        .map(|server| ToolServerHandle::new(server.name.clone(), McpToolServer::new(server.clone())))
        .collect();

    Ok(Session::new(model, servers)
        .with_policy(config.session.init_policy)
        .with_dispatcher(config.dispatcher()))
}

async fn cmd_run(session: &mut McpSession, task: &str) -> Result<()> {
    let outcome = session.run_turn(task).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn cmd_chat(session: &mut McpSession) -> Result<()> {
    println!("mcp-llm v{}", env!("CARGO_PKG_VERSION"));
    println!("Session ID: {}", session.id);
    println!("Type 'quit' or Ctrl+D to exit.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }

        match session.run_turn(input).await {
            Ok(outcome) => println!("\n{}\n", outcome.text()),
            Err(e) => eprintln!("Error: {e}\n"),
        }
    }

    println!("\nSession ended.");
    Ok(())
}

fn cmd_tools(session: &McpSession) -> Result<()> {
    match session.catalog() {
        Some(catalog) if !catalog.is_empty() => print!("{}", catalog.render()),
        _ => println!("No tools available."),
    }
    Ok(())
}
