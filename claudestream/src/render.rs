//! Plain-text rendering of transcript updates and session summaries.

use claudestream_core::format::format_clock;
use claudestream_core::{
    ChatMessage, MessageContent, MessageRole, SessionSummary, TranscriptUpdate,
};

/// Longest tool result preview shown inline.
const RESULT_PREVIEW_CHARS: usize = 80;

/// Role label for transcript rows.
pub fn role_label(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "[user]",
        MessageRole::Assistant => "[assistant]",
        MessageRole::System => "[system]",
        MessageRole::Tool => "[tool]",
    }
}

/// Render one update, or `None` for updates the text view does not show.
pub fn render_update(update: &TranscriptUpdate) -> Option<String> {
    match update {
        TranscriptUpdate::Appended(message) => Some(render_message(message)),
        TranscriptUpdate::Updated(message) => render_change(message),
        // Printed once at the end
        TranscriptUpdate::Summary(_) => None,
    }
}

/// A new transcript row: time, role, then the content.
pub fn render_message(message: &ChatMessage) -> String {
    let prefix = format!(
        "{} {}",
        format_clock(message.timestamp),
        role_label(message.role)
    );

    match &message.content {
        MessageContent::Text { text } => format!("{} {}", prefix, text),
        MessageContent::ToolCall(call) => {
            let mut line = format!("{} {}: {}", prefix, call.name, call.summary);
            if let Some(result) = &call.result {
                line.push_str(&format!("\n    -> {}", preview(result)));
            }
            line
        }
        MessageContent::PermissionRequest(request) => format!(
            "{} permission {} for {}: {}",
            prefix,
            request.status.as_str(),
            request.tool,
            request.description
        ),
        MessageContent::Error { message } => format!("{} error: {}", prefix, message),
        MessageContent::SessionStats(stats) => format!(
            "{} {} · {} · {} turns · {} tokens{}",
            prefix,
            stats.cost,
            stats.duration,
            stats.turns,
            stats.tokens,
            if stats.is_error { " · error" } else { "" }
        ),
    }
}

/// An in-place change to an earlier row.
fn render_change(message: &ChatMessage) -> Option<String> {
    match &message.content {
        MessageContent::ToolCall(call) => call
            .result
            .as_ref()
            .map(|result| format!("    {} -> {}", call.name, preview(result))),
        MessageContent::PermissionRequest(request) => Some(format!(
            "    permission for {}: {}",
            request.tool,
            request.status.as_str()
        )),
        _ => None,
    }
}

fn preview(text: &str) -> String {
    let line = text.lines().next().unwrap_or("");
    let extra_lines = text.lines().count().saturating_sub(1);

    let mut out = if line.chars().count() > RESULT_PREVIEW_CHARS {
        let truncated: String = line.chars().take(RESULT_PREVIEW_CHARS).collect();
        format!("{}...", truncated)
    } else {
        line.to_string()
    };
    if extra_lines > 0 {
        out.push_str(&format!(" (+{} lines)", extra_lines));
    }
    out
}

/// Multi-line session summary block.
pub fn render_summary(summary: &SessionSummary) -> String {
    let status = if !summary.is_complete() {
        "incomplete"
    } else if summary.is_error {
        "error"
    } else {
        "success"
    };

    let mut tools: Vec<_> = summary.tool_counts.iter().collect();
    tools.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    let tools = if tools.is_empty() {
        "none".to_string()
    } else {
        tools
            .iter()
            .map(|(name, count)| format!("{} x{}", name, count))
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        "Session: {} ({})\n\
         Project: {}\n\
         Cost: {}  Duration: {}  Turns: {}  Tokens: {}\n\
         Tools: {}\n\
         Files touched: {}",
        summary.session_id,
        status,
        summary.project_path.display(),
        summary.formatted_cost(),
        summary.formatted_duration(),
        summary.num_turns,
        summary.formatted_tokens(),
        tools,
        summary.files_touched.len()
    )
}
