//! Model provider layer: the [`LanguageModel`] capability and the
//! OpenRouter-backed implementation.
//!
//! The engine only ever talks to a model through [`LanguageModel`], which
//! keeps [`Session`](crate::agent::session::Session) and
//! [`ContextManager`](crate::context::manager::ContextManager) testable with
//! scripted doubles. [`OpenRouterModel`] is the production implementation:
//! it maps the conversation onto the chat completions wire format, streams
//! the response over SSE, and reassembles tool calls from the deltas.

pub mod streaming;

pub use streaming::StreamEvent;

use crate::tools::ToolDef;
use crate::{ContentPart, Message, Role};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use streaming::{assemble_tool_calls, collect_text, extract_usage, parse_sse_data};
use tracing::debug;

/// OpenRouter chat completions endpoint.
pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Request timeout for a single completion call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// ── Capability trait ───────────────────────────────────────────────

/// One full model response: the assistant's parts plus usage if reported.
#[derive(Debug, Clone, Default)]
pub struct ModelTurn {
    /// Text and tool-call parts, in the order the model produced them.
    pub parts: Vec<ContentPart>,
    /// Token usage for the call, when the provider reports it.
    pub usage: Option<Usage>,
}

impl ModelTurn {
    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            if let ContentPart::Text { text } = part {
                out.push_str(text);
            }
        }
        out
    }

    /// Whether this turn contains any tool calls.
    pub fn has_tool_calls(&self) -> bool {
        self.parts
            .iter()
            .any(|p| matches!(p, ContentPart::ToolCall { .. }))
    }
}

/// Token usage reported by the provider.
#[derive(Debug, Clone, Copy)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A single completion request against the conversation so far.
#[derive(Debug)]
pub struct GenerateRequest<'a> {
    /// System prompt for the call.
    pub system: &'a str,
    /// Conversation history, oldest first.
    pub messages: &'a [Message],
    /// Tool definitions the model may call.
    pub tools: Vec<ToolDef>,
    /// Hard cap on output tokens.
    pub max_output_tokens: u32,
}

/// Boxed future returned by [`LanguageModel::generate`].
pub type ModelFuture<'a> = Pin<Box<dyn Future<Output = Result<ModelTurn, String>> + Send + 'a>>;

/// Capability for producing model responses.
///
/// Object-safe so sessions can hold `Box<dyn LanguageModel>`; implementations
/// return boxed futures rather than using `async fn`.
pub trait LanguageModel: Send + Sync {
    /// Run one completion over the conversation. `on_text` is invoked with
    /// each text fragment as it streams off the wire.
    fn generate<'a>(
        &'a self,
        request: GenerateRequest<'a>,
        on_text: &'a (dyn Fn(&str) + Send + Sync),
    ) -> ModelFuture<'a>;

    /// One-shot text completion with no tools and no history. Used for
    /// auxiliary calls such as conversation summarization.
    fn generate_text<'a>(
        &'a self,
        system: &'a str,
        user: &'a str,
        max_tokens: u32,
    ) -> Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>>;
}

// ── Wire format ────────────────────────────────────────────────────

#[derive(Serialize, Debug)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize, Debug)]
struct WireMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize, Debug)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: &'static str,
    function: WireFunction,
}

#[derive(Serialize, Debug)]
struct WireFunction {
    name: String,
    /// JSON-encoded argument object, per the wire convention.
    arguments: String,
}

#[derive(Serialize, Debug)]
struct WireTool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: WireToolFunction,
}

#[derive(Serialize, Debug)]
struct WireToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

/// Map the conversation onto chat-completions wire messages.
///
/// Assistant messages become one wire message carrying both text and tool
/// calls. Tool results expand into one `role: "tool"` message per part so
/// each result pairs with its `tool_call_id`. Plain user text stays a
/// single `role: "user"` message.
fn wire_messages(system: &str, messages: &[Message]) -> Vec<WireMessage> {
    let mut wire = Vec::with_capacity(messages.len() + 1);
    wire.push(WireMessage {
        role: "system",
        content: Some(system.to_string()),
        tool_calls: None,
        tool_call_id: None,
    });

    for msg in messages {
        match msg.role {
            Role::Assistant => {
                let text = msg.text();
                let calls: Vec<WireToolCall> = msg
                    .parts
                    .iter()
                    .filter_map(|p| match p {
                        ContentPart::ToolCall {
                            id,
                            name,
                            arguments,
                        } => Some(WireToolCall {
                            id: id.clone(),
                            call_type: "function",
                            function: WireFunction {
                                name: name.clone(),
                                arguments: serde_json::to_string(arguments)
                                    .unwrap_or_else(|_| "{}".to_string()),
                            },
                        }),
                        _ => None,
                    })
                    .collect();
                wire.push(WireMessage {
                    role: "assistant",
                    content: if text.is_empty() { None } else { Some(text) },
                    tool_calls: if calls.is_empty() { None } else { Some(calls) },
                    tool_call_id: None,
                });
            }
            Role::User => {
                if msg.has_tool_results() {
                    for part in &msg.parts {
                        if let ContentPart::ToolResult { id, output, .. } = part {
                            wire.push(WireMessage {
                                role: "tool",
                                content: Some(output.clone()),
                                tool_calls: None,
                                tool_call_id: Some(id.clone()),
                            });
                        }
                    }
                } else {
                    wire.push(WireMessage {
                        role: "user",
                        content: Some(msg.text()),
                        tool_calls: None,
                        tool_call_id: None,
                    });
                }
            }
        }
    }
    wire
}

fn wire_tools(tools: &[ToolDef]) -> Option<Vec<WireTool>> {
    if tools.is_empty() {
        return None;
    }
    Some(
        tools
            .iter()
            .map(|t| WireTool {
                tool_type: "function",
                function: WireToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect(),
    )
}

// ── Client ─────────────────────────────────────────────────────────

/// [`LanguageModel`] backed by the OpenRouter chat completions API.
pub struct OpenRouterModel {
    client: reqwest::Client,
    api_key: String,
    referer: String,
    title: String,
    model: String,
}

impl OpenRouterModel {
    /// Create a model handle with the given API key and model id.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, String> {
        Self::with_headers(api_key, model, "https://github.com/quill-rs/quill", "quill")
    }

    /// Create a model handle with custom Referer and X-Title headers.
    pub fn with_headers(
        api_key: impl Into<String>,
        model: impl Into<String>,
        referer: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent("quill/0.1")
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            referer: referer.into(),
            title: title.into(),
            model: model.into(),
        })
    }

    /// The model id this handle targets.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Stream one completion, forwarding text deltas to `on_text` and
    /// collecting the full event list for post-hoc assembly.
    async fn stream_completion(
        &self,
        body: &WireRequest<'_>,
        on_text: &(dyn Fn(&str) + Send + Sync),
    ) -> Result<Vec<StreamEvent>, String> {
        debug!(
            "LLM request: model={}, messages={}, tools={}, max_tokens={}",
            body.model,
            body.messages.len(),
            body.tools.as_ref().map_or(0, |t| t.len()),
            body.max_tokens,
        );
        let start = Instant::now();

        let mut resp = self
            .client
            .post(OPENROUTER_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("streaming request failed: {e}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(format!("OpenRouter API HTTP {status}: {text}"));
        }

        // Read the SSE stream incrementally via chunk() so long responses
        // (e.g. file-write tool calls) don't hit a single-body timeout.
        let mut events = Vec::new();
        let mut buffer = String::new();
        let mut done = false;

        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| format!("failed to read streaming chunk: {e}"))?
        {
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            // Process all complete lines in the buffer.
            while let Some(newline_pos) = buffer.find('\n') {
                let line: String = buffer.drain(..=newline_pos).collect();
                let line = line.trim();
                if line.is_empty() || line.starts_with(':') {
                    continue;
                }
                if line == "data: [DONE]" {
                    events.push(StreamEvent::Done);
                    done = true;
                    break;
                }
                if let Some(data) = line.strip_prefix("data: ") {
                    let before = events.len();
                    parse_sse_data(data, &mut events);
                    for event in &events[before..] {
                        if let StreamEvent::TextDelta(delta) = event {
                            on_text(delta);
                        }
                    }
                }
            }

            if done {
                break;
            }
        }

        // Process any remaining data in the buffer (incomplete final line).
        let remaining = buffer.trim();
        if !remaining.is_empty()
            && remaining != "data: [DONE]"
            && let Some(data) = remaining.strip_prefix("data: ")
        {
            let before = events.len();
            parse_sse_data(data, &mut events);
            for event in &events[before..] {
                if let StreamEvent::TextDelta(delta) = event {
                    on_text(delta);
                }
            }
        }

        debug!(
            "Stream completed with {} events in {:.1}s",
            events.len(),
            start.elapsed().as_secs_f64(),
        );
        Ok(events)
    }
}

impl LanguageModel for OpenRouterModel {
    fn generate<'a>(
        &'a self,
        request: GenerateRequest<'a>,
        on_text: &'a (dyn Fn(&str) + Send + Sync),
    ) -> ModelFuture<'a> {
        Box::pin(async move {
            let messages = wire_messages(request.system, request.messages);
            let body = WireRequest {
                model: &self.model,
                messages,
                tools: wire_tools(&request.tools),
                max_tokens: request.max_output_tokens,
                stream: true,
            };

            let events = self.stream_completion(&body, on_text).await?;

            let mut parts = Vec::new();
            let text = collect_text(&events);
            if !text.is_empty() {
                parts.push(ContentPart::text(text));
            }
            parts.extend(assemble_tool_calls(&events));

            Ok(ModelTurn {
                parts,
                usage: extract_usage(&events),
            })
        })
    }

    fn generate_text<'a>(
        &'a self,
        system: &'a str,
        user: &'a str,
        max_tokens: u32,
    ) -> Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>> {
        Box::pin(async move {
            let history = [Message::user(user)];
            let messages = wire_messages(system, &history);
            let body = WireRequest {
                model: &self.model,
                messages,
                tools: None,
                max_tokens,
                stream: true,
            };

            let events = self.stream_completion(&body, &|_: &str| {}).await?;
            let text = collect_text(&events);
            if text.is_empty() {
                return Err("Empty LLM response".to_string());
            }
            Ok(text)
        })
    }
}
