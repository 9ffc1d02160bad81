//! Colloquy - conversational Q&A with tool calling
//!
//! Serves the agent over HTTP, MCP or an interactive console.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colloquy::cli::console::{self, Console};
use colloquy::{default_registry, Agent, AskRequest, Settings};
use tracing_subscriber::EnvFilter;

/// Colloquy - conversational question answering with tool calling
#[derive(Parser)]
#[command(
    name = "colloquy",
    author,
    version,
    about = "Conversational Q&A over a chat-completion model, with tools",
    long_about = r#"
Colloquy answers questions with an OpenAI-compatible model, remembering
recent turns per session and letting the model call built-in tools
(transaction status, weather, calculator).

Examples:
  colloquy server                     Start the HTTP API on API_HOST:API_PORT
  colloquy server --port 9000         Start on a custom port
  colloquy chat                       Interactive console
  colloquy ask "What is 125 * 48?"    Ask one question and exit
  colloquy tools                      List the registered tools
  colloquy mcp                        Serve the tools over MCP (stdio)
"#
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Read settings from this file instead of ./.env
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Model name, overriding OPENAI_MODEL
    #[arg(short, long, global = true)]
    model: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    #[command(alias = "serve")]
    Server(ServerArgs),

    /// Start the interactive console (default)
    #[command(alias = "console", alias = "repl")]
    Chat(ChatArgs),

    /// Ask a single question and print the answer
    Ask(AskArgs),

    /// List the registered tools
    Tools,

    /// Start MCP server for AI assistant integration
    Mcp,

    /// Display version and configuration
    Info,
}

#[derive(Args)]
struct ServerArgs {
    /// Port to listen on, overriding API_PORT
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to, overriding API_HOST
    #[arg(short = 'H', long)]
    host: Option<String>,
}

#[derive(Args, Default)]
struct ToolArgs {
    /// Do not offer any tools to the model
    #[arg(long)]
    no_tools: bool,

    /// Only offer these tools (repeatable)
    #[arg(long = "tool")]
    tools: Vec<String>,
}

impl ToolArgs {
    fn names(&self) -> Option<Vec<String>> {
        (!self.tools.is_empty()).then(|| self.tools.clone())
    }
}

#[derive(Args, Default)]
struct ChatArgs {
    /// Continue an existing session id
    #[arg(short, long)]
    session: Option<String>,

    #[command(flatten)]
    tools: ToolArgs,
}

#[derive(Args)]
struct AskArgs {
    /// The question to ask
    question: String,

    /// Session id to continue
    #[arg(short, long)]
    session: Option<String>,

    /// System prompt for a new session
    #[arg(long)]
    system_prompt: Option<String>,

    #[arg(short, long)]
    temperature: Option<f32>,

    #[arg(long)]
    max_tokens: Option<u32>,

    /// Print the full outcome as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    tools: ToolArgs,
}

fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = match &cli.env_file {
        Some(path) => Settings::from_env_file(path)?,
        None => Settings::from_env()?,
    };
    if let Some(model) = &cli.model {
        settings.openai_model = model.clone();
    }
    settings.validate()?;
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The server logs request traffic; interactive commands stay quiet.
    let default_directive = match cli.command {
        Some(Commands::Server(_)) => "info",
        _ => "warn",
    };
    init_tracing(default_directive);

    let mut settings = load_settings(&cli)?;

    match cli.command {
        Some(Commands::Info) => {
            println!("Colloquy - conversational Q&A with tool calling");
            println!("Version: {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Features:");
            #[cfg(feature = "server")]
            println!("  - HTTP server (axum)");
            #[cfg(not(feature = "server"))]
            println!("  - HTTP server: disabled");
            #[cfg(feature = "mcp")]
            println!("  - MCP server (stdio)");
            #[cfg(not(feature = "mcp"))]
            println!("  - MCP server: disabled");
            println!();
            println!("Model: {}", settings.openai_model);
            println!("Base URL: {}", settings.openai_base_url);
            println!("API key configured: {}", settings.openai_configured());
            println!("Listen address: {}:{}", settings.api_host, settings.api_port);
            println!("History limit: {} messages", settings.max_conversation_history);
        }

        Some(Commands::Tools) => {
            for tool in default_registry().list() {
                println!("{}", tool.name());
                println!("    {}", tool.description());
            }
        }

        Some(Commands::Mcp) => {
            #[cfg(feature = "mcp")]
            {
                colloquy::mcp::run_mcp_server(Arc::new(default_registry())).await?;
            }
            #[cfg(not(feature = "mcp"))]
            {
                eprintln!("Error: MCP feature not enabled.");
                eprintln!("Rebuild with: cargo build --features mcp");
                std::process::exit(1);
            }
        }

        Some(Commands::Server(args)) => {
            #[cfg(feature = "server")]
            {
                if let Some(host) = args.host {
                    settings.api_host = host;
                }
                if let Some(port) = args.port {
                    settings.api_port = port;
                }
                let agent = Arc::new(Agent::from_settings_lenient(&settings)?);
                println!("Starting Colloquy server on {}:{}", settings.api_host, settings.api_port);
                colloquy::server::run_server(settings, agent).await?;
            }
            #[cfg(not(feature = "server"))]
            {
                let _ = args;
                eprintln!("Error: Server feature not enabled.");
                eprintln!("Rebuild with: cargo build --features server");
                std::process::exit(1);
            }
        }

        Some(Commands::Ask(args)) => {
            let agent = Agent::from_settings(&settings)?;

            let mut request = AskRequest::new(args.question).enable_tools(!args.tools.no_tools);
            if let Some(session) = args.session {
                request = request.session(session);
            }
            if let Some(prompt) = args.system_prompt {
                request = request.system_prompt(prompt);
            }
            if let Some(t) = args.temperature {
                request = request.temperature(t);
            }
            if let Some(n) = args.max_tokens {
                request = request.max_tokens(n);
            }
            if let Some(names) = args.tools.names() {
                request = request.tool_names(names);
            }

            match agent.ask(request).await {
                Ok(outcome) if args.json => println!("{}", serde_json::to_string_pretty(&outcome)?),
                Ok(outcome) => println!("{}", outcome.answer),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Some(Commands::Chat(args)) => run_chat(&settings, args).await?,
        None => run_chat(&settings, ChatArgs::default()).await?,
    }

    Ok(())
}

async fn run_chat(settings: &Settings, args: ChatArgs) -> Result<()> {
    let agent = Arc::new(Agent::from_settings(settings)?);
    let console = Console::new(agent)
        .resume(args.session)
        .tools(!args.tools.no_tools, args.tools.names());
    console::run(console).await
}
