//! Server-Sent Events parsing for the chat completions stream.
//!
//! The wire sends incremental deltas: text fragments, tool-call argument
//! fragments keyed by index, a usage record, and a `data: [DONE]`
//! terminator. [`parse_sse_data`] turns one `data:` payload into
//! [`StreamEvent`]s; [`assemble_tool_calls`] folds the indexed fragments
//! back into complete [`ContentPart::ToolCall`] parts once the stream ends.

use crate::ContentPart;
use crate::provider::Usage;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{trace, warn};

/// A single event from an SSE stream.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// An incremental text content delta.
    TextDelta(String),
    /// A tool call fragment (accumulated by index until the stream ends).
    ToolCallDelta {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments_delta: String,
    },
    /// Token usage, sent in the final chunk when the provider supplies it.
    Usage(Usage),
    /// The stream is complete.
    Done,
}

/// Raw SSE data chunk.
#[derive(Deserialize, Debug)]
struct StreamChunk {
    choices: Option<Vec<StreamChoice>>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    delta: Option<StreamDelta>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct StreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

#[derive(Deserialize, Debug)]
struct StreamToolCallDelta {
    index: Option<usize>,
    id: Option<String>,
    function: Option<StreamFunctionDelta>,
}

#[derive(Deserialize, Debug)]
struct StreamFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Deserialize, Debug)]
struct WireUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

/// Parse a single SSE `data:` payload into stream events.
pub(crate) fn parse_sse_data(data: &str, events: &mut Vec<StreamEvent>) {
    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => {
            if let Some(usage) = chunk.usage {
                events.push(StreamEvent::Usage(Usage {
                    input_tokens: usage.prompt_tokens.unwrap_or(0),
                    output_tokens: usage.completion_tokens.unwrap_or(0),
                }));
            }

            if let Some(choices) = chunk.choices {
                for choice in choices {
                    if let Some(delta) = choice.delta {
                        if let Some(content) = delta.content
                            && !content.is_empty()
                        {
                            events.push(StreamEvent::TextDelta(content));
                        }
                        if let Some(tool_calls) = delta.tool_calls {
                            for tc in tool_calls {
                                let func = tc.function.unwrap_or(StreamFunctionDelta {
                                    name: None,
                                    arguments: None,
                                });
                                events.push(StreamEvent::ToolCallDelta {
                                    index: tc.index.unwrap_or(0),
                                    id: tc.id,
                                    name: func.name,
                                    arguments_delta: func.arguments.unwrap_or_default(),
                                });
                            }
                        }
                    }
                    if choice.finish_reason.is_some() {
                        trace!("Stream finish_reason: {:?}", choice.finish_reason);
                    }
                }
            }
        }
        Err(e) => {
            warn!("Failed to parse SSE chunk: {e}; data: {data}");
        }
    }
}

/// Concatenate all text deltas into the final text.
pub fn collect_text(events: &[StreamEvent]) -> String {
    let mut text = String::new();
    for event in events {
        if let StreamEvent::TextDelta(delta) = event {
            text.push_str(delta);
        }
    }
    text
}

/// Extract usage info from stream events, if the provider sent any.
pub fn extract_usage(events: &[StreamEvent]) -> Option<Usage> {
    for event in events.iter().rev() {
        if let StreamEvent::Usage(usage) = event {
            return Some(*usage);
        }
    }
    None
}

/// Fold indexed tool-call fragments into complete tool-call parts.
///
/// Fragments arrive interleaved with text; the id and name appear on the
/// first fragment for an index, argument JSON accumulates across the rest.
/// Arguments that fail to parse as JSON are preserved as a raw string so
/// the registry's schema validation reports a useful error downstream.
pub fn assemble_tool_calls(events: &[StreamEvent]) -> Vec<ContentPart> {
    #[derive(Default)]
    struct Partial {
        id: String,
        name: String,
        arguments: String,
    }

    let mut partials: BTreeMap<usize, Partial> = BTreeMap::new();
    for event in events {
        if let StreamEvent::ToolCallDelta {
            index,
            id,
            name,
            arguments_delta,
        } = event
        {
            let partial = partials.entry(*index).or_default();
            if let Some(id) = id {
                partial.id = id.clone();
            }
            if let Some(name) = name {
                partial.name = name.clone();
            }
            partial.arguments.push_str(arguments_delta);
        }
    }

    partials
        .into_values()
        .map(|p| {
            let arguments = serde_json::from_str(&p.arguments)
                .unwrap_or(serde_json::Value::String(p.arguments));
            ContentPart::tool_call(p.id, p.name, arguments)
        })
        .collect()
}
