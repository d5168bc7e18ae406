//! Interactive terminal coding agent powered by quill-rs.
//!
//! Reads the API key from the `OPENROUTER_KEY` environment variable and
//! starts a REPL. Model text streams to stdout as it arrives; approval
//! prompts for file overwrites, edits, and dangerous commands appear on
//! stderr.
//!
//! ```sh
//! quill-code --workdir /path/to/project
//! quill-code --model openai/gpt-4o --verbose
//! ```

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use quill_code::{CodeConfig, TerminalPrompter};
use quill_rs::agent::{AgentEvent, EventHandler, Session};
use quill_rs::permission::PermissionGate;
use quill_rs::provider::OpenRouterModel;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Interactive terminal coding agent.
#[derive(Parser)]
#[command(name = "quill-code")]
struct Cli {
    /// Model to use for completions.
    #[arg(long, default_value = "anthropic/claude-sonnet-4")]
    model: String,

    /// Working directory for file and git operations.
    #[arg(long, default_value = ".")]
    workdir: String,

    /// Maximum model calls per user turn.
    #[arg(long, default_value_t = 20)]
    max_steps: u32,

    /// Enable debug logging on stderr.
    #[arg(long, short)]
    verbose: bool,
}

/// Streams session events to the terminal.
struct PrintHandler;

impl EventHandler for PrintHandler {
    fn on_event(&self, event: &AgentEvent<'_>) {
        match event {
            AgentEvent::TextDelta(delta) => {
                print!("{delta}");
                let _ = std::io::stdout().flush();
            }
            AgentEvent::Text(_) => {
                println!();
            }
            AgentEvent::ToolStart { name, arguments } => {
                let preview: String = arguments.chars().take(100).collect();
                eprintln!("  [{name}] {preview}");
            }
            AgentEvent::ToolEnd {
                name,
                output,
                is_error: true,
                ..
            } => {
                let preview: String = output.chars().take(200).collect();
                eprintln!("  [{name}] error: {preview}");
            }
            AgentEvent::ContextWarning { usage_pct } => {
                eprintln!("  [context] usage at {usage_pct}%, older tool output may be pruned");
            }
            AgentEvent::ContextMaintained { action } => {
                eprintln!("  [context] {action:?}");
            }
            _ => {}
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(level),
        )
        .init();

    let api_key = match std::env::var("OPENROUTER_KEY") {
        Ok(key) => key,
        Err(_) => {
            eprintln!("Error: OPENROUTER_KEY environment variable is not set");
            std::process::exit(1);
        }
    };

    // Resolve the working directory to an absolute path.
    let workdir = std::fs::canonicalize(&cli.workdir).unwrap_or_else(|_| PathBuf::from(&cli.workdir));

    let model = match OpenRouterModel::new(api_key, &cli.model) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: failed to create API client: {e}");
            std::process::exit(1);
        }
    };

    let config = CodeConfig {
        model: cli.model.clone(),
        workdir: workdir.clone(),
        max_steps: cli.max_steps,
        git_tools: true,
    };
    let gate = Arc::new(PermissionGate::new(TerminalPrompter));
    let tools = config.build_tool_registry(&gate);

    let mut session = Session::new(config.build_session_config(), Box::new(model), tools)
        .with_handler(PrintHandler);

    println!("quill-code ({}) in {}", cli.model, workdir.display());
    println!("Commands: /clear, /stats, /quit");

    let stdin = std::io::stdin();
    loop {
        print!("\n> ");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        match stdin.read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        }
        let input = line.trim();

        match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear();
                println!("Conversation cleared.");
            }
            "/stats" => {
                let stats = session.stats();
                println!(
                    "{} messages, ~{} tokens ({}% of {} usable), {} pruned output(s)",
                    stats.message_count,
                    stats.estimated_tokens,
                    stats.usage_pct,
                    stats.usable_context,
                    stats.pruned_outputs,
                );
            }
            prompt => {
                if let Err(e) = session.run_turn(prompt).await {
                    tracing::warn!("Turn failed: {e}");
                    eprintln!("\nError: {e}");
                }
            }
        }
    }
}
