//! Envelope → [`ClaudeEvent`] translation
//!
//! A pure function of its input. One envelope becomes zero, one, or many
//! events; events from one envelope keep the content-block order.
//!
//! | Envelope kind | Events |
//! |---------------|--------|
//! | `system` | one `System` (session id defaults to `"unknown"`) |
//! | `assistant` | one per displayable block, in order |
//! | `user` | one `UserMessage` with all block text concatenated, if non-empty |
//! | `result` | exactly one `Result`, zero defaults for missing fields |
//! | anything else | none |

use super::envelope::{ContentBlock, Envelope, EnvelopeKind};
use crate::types::{ClaudeEvent, ResultEvent, ToolUseEvent, UNKNOWN_SESSION_ID};

/// Translate one envelope into application events.
pub fn translate(envelope: &Envelope) -> Vec<ClaudeEvent> {
    match envelope.kind() {
        EnvelopeKind::System => vec![ClaudeEvent::System {
            session_id: session_id_or_sentinel(envelope),
        }],
        EnvelopeKind::Assistant => envelope
            .blocks()
            .iter()
            .filter_map(assistant_block_event)
            .collect(),
        EnvelopeKind::User => user_message(envelope).into_iter().collect(),
        EnvelopeKind::Result => vec![ClaudeEvent::Result(result_event(envelope))],
        EnvelopeKind::Other(kind) => {
            tracing::trace!(kind = %kind, "Ignoring envelope of unknown kind");
            Vec::new()
        }
    }
}

fn session_id_or_sentinel(envelope: &Envelope) -> String {
    envelope
        .session_id
        .clone()
        .unwrap_or_else(|| UNKNOWN_SESSION_ID.to_string())
}

fn assistant_block_event(block: &ContentBlock) -> Option<ClaudeEvent> {
    match block.block_type.as_deref() {
        Some("text") => block
            .text
            .as_ref()
            .filter(|text| !text.is_empty())
            .map(|text| ClaudeEvent::AssistantText { text: text.clone() }),
        // A tool use without a name is not actionable
        Some("tool_use") => block.name.as_ref().map(|name| {
            ClaudeEvent::ToolUse(ToolUseEvent {
                id: block.id.clone().unwrap_or_default(),
                name: name.clone(),
                input: block.input.clone().unwrap_or_default(),
            })
        }),
        Some("tool_result") => Some(ClaudeEvent::ToolResult {
            tool_use_id: block.tool_use_id.clone().unwrap_or_default(),
            output: block.content.clone().unwrap_or_default(),
        }),
        _ => None,
    }
}

/// Concatenated text of every block. Blocks without text add nothing, so
/// `tool_result` blocks under a user envelope are dropped here.
fn user_message(envelope: &Envelope) -> Option<ClaudeEvent> {
    let text: String = envelope
        .blocks()
        .iter()
        .filter_map(|block| block.text.as_deref())
        .collect();

    if text.is_empty() {
        None
    } else {
        Some(ClaudeEvent::UserMessage { text })
    }
}

fn result_event(envelope: &Envelope) -> ResultEvent {
    let usage = envelope.usage.clone().unwrap_or_default();

    ResultEvent {
        cost_usd: envelope
            .total_cost_usd
            .filter(|cost| cost.is_finite())
            .unwrap_or(0.0)
            .max(0.0),
        duration_ms: envelope.duration_ms.unwrap_or(0),
        duration_api_ms: envelope.duration_api_ms.unwrap_or(0),
        num_turns: envelope
            .num_turns
            .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
            .unwrap_or(0),
        session_id: envelope.session_id.clone().unwrap_or_default(),
        is_error: envelope.is_error.unwrap_or(false),
        input_tokens: usage.input_tokens.unwrap_or(0),
        output_tokens: usage.output_tokens.unwrap_or(0),
        cache_creation_tokens: usage.cache_creation_input_tokens.unwrap_or(0),
        cache_read_tokens: usage.cache_read_input_tokens.unwrap_or(0),
    }
}
