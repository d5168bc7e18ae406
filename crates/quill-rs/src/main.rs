//! Send a single completion request to OpenRouter and print the response.
//!
//! Reads the API key from the `OPENROUTER_KEY` environment variable. Text
//! streams to stdout as it arrives.
//!
//! # Examples
//!
//! ```sh
//! # Basic request
//! quill --user "Explain the borrow checker in two sentences"
//!
//! # With system prompt and model selection
//! quill --system "You are a terse code reviewer." \
//!   --user "Review this function." \
//!   --model anthropic/claude-sonnet-4
//!
//! # Pipe content from stdin
//! cat src/lib.rs | quill --system "Summarize this module." --stdin
//! ```

use clap::Parser;
use quill_rs::Message;
use quill_rs::provider::{GenerateRequest, LanguageModel, OpenRouterModel};
use std::io::{self, Read, Write as _};
use std::process;

/// Send a single completion request to OpenRouter and print the response.
///
/// Reads the API key from the OPENROUTER_KEY environment variable.
#[derive(Parser)]
#[command(name = "quill")]
struct Cli {
    /// System prompt to set the assistant's behavior
    #[arg(long, default_value = "You are a helpful assistant.")]
    system: String,

    /// User message to send
    #[arg(long)]
    user: Option<String>,

    /// Read user content from stdin
    #[arg(long)]
    stdin: bool,

    /// Model to use
    #[arg(long, default_value = "anthropic/claude-sonnet-4")]
    model: String,

    /// Maximum tokens in the response
    #[arg(long, default_value_t = 1024)]
    max_tokens: u32,
}

fn read_stdin_content() -> Result<String, String> {
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .map_err(|e| format!("failed to read stdin: {e}"))?;
    Ok(buf)
}

fn build_user_content(cli: &Cli) -> Result<String, String> {
    let stdin_text = if cli.stdin {
        Some(read_stdin_content()?)
    } else {
        None
    };

    match (&cli.user, stdin_text) {
        (Some(msg), Some(piped)) => Ok(format!("{msg}\n\n{piped}")),
        (Some(msg), None) => Ok(msg.clone()),
        (None, Some(piped)) => Ok(piped),
        (None, None) => Err("provide --user, --stdin, or both".to_string()),
    }
}

async fn send_request(cli: &Cli) -> Result<(), String> {
    let api_key = std::env::var("OPENROUTER_KEY")
        .map_err(|_| "OPENROUTER_KEY environment variable is not set".to_string())?;

    let user_content = build_user_content(cli)?;
    let messages = vec![Message::user(&user_content)];

    let model = OpenRouterModel::new(api_key, &cli.model)?;
    let on_text = |delta: &str| {
        print!("{delta}");
        let _ = io::stdout().flush();
    };
    let request = GenerateRequest {
        system: &cli.system,
        messages: &messages,
        tools: Vec::new(),
        max_output_tokens: cli.max_tokens,
    };
    let turn = model.generate(request, &on_text).await?;

    if !turn.text().is_empty() {
        println!();
    }
    for call in turn.parts.iter().filter(|p| {
        matches!(p, quill_rs::ContentPart::ToolCall { .. })
    }) {
        eprintln!("  [unhandled tool call] {call:?}");
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = send_request(&cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
