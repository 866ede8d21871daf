//! Core domain types for claudestream
//!
//! These types are the contract between the stream decoder and everything
//! downstream of it: the transcript assembler, the session aggregator, and
//! the display and persistence collaborators.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Envelope** | One decoded line of the agent's stream-json output |
//! | **Event** | An application-level [`ClaudeEvent`] translated from an envelope |
//! | **Tool use** | An invocation the agent made (Bash, Read, Edit, ...) |
//! | **Tool result** | The output of a tool use, correlated by its id |
//! | **Transcript** | The ordered, mutable list of [`ChatMessage`]s shown to the user |
//! | **Session summary** | Cost, duration, and tool usage for one agent run |

use crate::format::{format_cost, format_duration_ms, format_tokens};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

/// Session id used before the agent has told us the real one.
///
/// Distinct from an empty string: callers use it to tell "not yet known"
/// apart from "known to be empty".
pub const UNKNOWN_SESSION_ID: &str = "unknown";

/// Tool name used for result entries that arrive without a matching invocation.
pub const UNKNOWN_TOOL_NAME: &str = "unknown";

// ============================================
// Tool Input
// ============================================

/// One scalar value from a tool's raw input payload.
///
/// Closed set: anything else (arrays, nested objects) is not representable
/// and is left out of [`ToolInput::raw`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InputValue {
    String(String),
    Int(i64),
    Double(f64),
    Bool(bool),
    Null,
}

impl std::fmt::Display for InputValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputValue::String(s) => write!(f, "{}", s),
            InputValue::Int(i) => write!(f, "{}", i),
            InputValue::Double(d) => write!(f, "{}", d),
            InputValue::Bool(b) => write!(f, "{}", b),
            InputValue::Null => write!(f, "null"),
        }
    }
}

/// Semi-structured tool input.
///
/// The named fields cover the keys the built-in tools use; `raw` keeps every
/// scalar key/value for generic display.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolInput {
    pub command: Option<String>,
    pub file_path: Option<String>,
    pub content: Option<String>,
    pub pattern: Option<String>,
    pub old_string: Option<String>,
    pub new_string: Option<String>,
    /// All scalar keys from the payload, recognized or not
    pub raw: BTreeMap<String, InputValue>,
}

impl ToolInput {
    /// Look up a raw value as a string, if it is one.
    pub fn raw_str(&self, key: &str) -> Option<&str> {
        match self.raw.get(key) {
            Some(InputValue::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Render as `key: value` lines in key order.
    pub fn render(&self) -> String {
        self.raw
            .iter()
            .map(|(key, value)| format!("{}: {}", key, value))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

// ============================================
// Events
// ============================================

/// A tool invocation made by the agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolUseEvent {
    /// Invocation id, used to correlate the result
    pub id: String,
    /// Tool name ("Bash", "Read", ...)
    pub name: String,
    pub input: ToolInput,
}

impl ToolUseEvent {
    /// One-line human-readable summary keyed by tool name.
    pub fn summary(&self) -> String {
        let specific = match self.name.as_str() {
            "Bash" => self.input.command.as_deref(),
            "Read" | "Write" | "Edit" | "MultiEdit" => self.input.file_path.as_deref(),
            "Grep" | "Glob" => self.input.pattern.as_deref(),
            "WebFetch" => self.input.raw_str("url"),
            "WebSearch" => self.input.raw_str("query"),
            "Task" => self.input.raw_str("description"),
            _ => None,
        };

        specific
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.name)
            .to_string()
    }

    /// File path this invocation touches, if its input names one.
    pub fn file_path(&self) -> Option<&str> {
        self.input.file_path.as_deref().filter(|p| !p.is_empty())
    }

    pub fn render_input(&self) -> String {
        self.input.render()
    }
}

/// Terminal metrics for one agent run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultEvent {
    pub cost_usd: f64,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// Time spent waiting on the model API in milliseconds
    pub duration_api_ms: u64,
    pub num_turns: u32,
    pub session_id: String,
    pub is_error: bool,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
}

impl ResultEvent {
    /// Sum of the four token counters.
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens
            .saturating_add(self.output_tokens)
            .saturating_add(self.cache_creation_tokens)
            .saturating_add(self.cache_read_tokens)
    }

    pub fn formatted_cost(&self) -> String {
        format_cost(self.cost_usd)
    }

    pub fn formatted_duration(&self) -> String {
        format_duration_ms(self.duration_ms)
    }

    pub fn formatted_tokens(&self) -> String {
        format_tokens(self.total_tokens())
    }
}

/// Application-level event translated from the stream.
///
/// Deliberately smaller than the wire schema; this is what the rest of the
/// application consumes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaudeEvent {
    System { session_id: String },
    AssistantText { text: String },
    ToolUse(ToolUseEvent),
    ToolResult { tool_use_id: String, output: String },
    UserMessage { text: String },
    Result(ResultEvent),
    Error { message: String },
}

impl ClaudeEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaudeEvent::System { .. } => "system",
            ClaudeEvent::AssistantText { .. } => "assistant_text",
            ClaudeEvent::ToolUse(_) => "tool_use",
            ClaudeEvent::ToolResult { .. } => "tool_result",
            ClaudeEvent::UserMessage { .. } => "user_message",
            ClaudeEvent::Result(_) => "result",
            ClaudeEvent::Error { .. } => "error",
        }
    }
}

// ============================================
// Transcript Messages
// ============================================

/// Stable identity of a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(uuid::Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who a transcript entry is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
            MessageRole::Tool => "tool",
        }
    }
}

impl std::str::FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            "system" => Ok(MessageRole::System),
            "tool" => Ok(MessageRole::Tool),
            _ => Err(format!("unknown message role: {}", s)),
        }
    }
}

/// Lifecycle of a permission prompt.
///
/// `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Pending,
    Allowed,
    Denied,
    AutoApproved,
}

impl PermissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionStatus::Pending => "pending",
            PermissionStatus::Allowed => "allowed",
            PermissionStatus::Denied => "denied",
            PermissionStatus::AutoApproved => "auto_approved",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PermissionStatus::Pending)
    }
}

/// A tool invocation as shown in the transcript.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCall {
    pub tool_use_id: String,
    pub name: String,
    pub summary: String,
    /// Input rendered as `key: value` lines
    pub input: String,
    /// Attached once the matching result arrives
    pub result: Option<String>,
    pub is_expanded: bool,
}

/// A permission prompt raised by the permission collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PermissionRequest {
    pub tool: String,
    pub description: String,
    pub command: Option<String>,
    pub status: PermissionStatus,
}

/// Formatted end-of-run figures for the stats entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    pub cost: String,
    pub duration: String,
    pub turns: u32,
    pub tokens: String,
    pub session_id: String,
    pub is_error: bool,
}

impl From<&ResultEvent> for SessionStats {
    fn from(result: &ResultEvent) -> Self {
        Self {
            cost: result.formatted_cost(),
            duration: result.formatted_duration(),
            turns: result.num_turns,
            tokens: result.formatted_tokens(),
            session_id: result.session_id.clone(),
            is_error: result.is_error,
        }
    }
}

/// Payload of a transcript entry. Mutable in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: String },
    ToolCall(ToolCall),
    PermissionRequest(PermissionRequest),
    Error { message: String },
    SessionStats(SessionStats),
}

/// One transcript entry.
///
/// Equality and hashing use the id only: tool calls and permission requests
/// are mutated in place after they are shown, and must stay "the same
/// message" while they change.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub timestamp: DateTime<Utc>,
    pub role: MessageRole,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: MessageContent) -> Self {
        Self {
            id: MessageId::new(),
            timestamp: Utc::now(),
            role,
            content,
        }
    }

    pub fn text(role: MessageRole, text: impl Into<String>) -> Self {
        Self::new(role, MessageContent::Text { text: text.into() })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(
            MessageRole::System,
            MessageContent::Error {
                message: message.into(),
            },
        )
    }

    pub fn as_tool_call(&self) -> Option<&ToolCall> {
        match &self.content {
            MessageContent::ToolCall(call) => Some(call),
            _ => None,
        }
    }

    pub fn as_permission_request(&self) -> Option<&PermissionRequest> {
        match &self.content {
            MessageContent::PermissionRequest(request) => Some(request),
            _ => None,
        }
    }

    /// Short single-line preview, truncated to `max_chars`.
    pub fn preview(&self, max_chars: usize) -> String {
        let full = match &self.content {
            MessageContent::Text { text } => text.clone(),
            MessageContent::ToolCall(call) => format!("{}: {}", call.name, call.summary),
            MessageContent::PermissionRequest(req) => {
                format!("{} ({})", req.description, req.status.as_str())
            }
            MessageContent::Error { message } => message.clone(),
            MessageContent::SessionStats(stats) => {
                format!("{} · {} · {} turns", stats.cost, stats.duration, stats.turns)
            }
        };

        let line = full.lines().next().unwrap_or("");
        if line.chars().count() <= max_chars {
            line.to_string()
        } else {
            let truncated: String = line.chars().take(max_chars).collect();
            format!("{}...", truncated)
        }
    }
}

impl PartialEq for ChatMessage {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ChatMessage {}

impl Hash for ChatMessage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

// ============================================
// Sessions
// ============================================

/// Lifecycle of a session summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No event seen yet
    Uninitialized,
    /// Collecting; incomplete until finalized
    Active,
    /// End time stamped, ready to persist
    Finalized,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Active => "active",
            SessionState::Finalized => "finalized",
        }
    }
}

/// Why the process supervisor ended a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum TerminationReason {
    /// Stopped on user request
    Cancelled,
    /// Process exited (possibly mid-session)
    Exited { code: Option<i32> },
    /// Process crashed or its output became unreadable
    Crashed { message: String },
    /// Supervisor gave up waiting for output
    TimedOut,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationReason::Cancelled => write!(f, "cancelled"),
            TerminationReason::Exited { code: Some(code) } => {
                write!(f, "exited with code {}", code)
            }
            TerminationReason::Exited { code: None } => write!(f, "exited"),
            TerminationReason::Crashed { message } => write!(f, "crashed: {}", message),
            TerminationReason::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Persisted per-run summary.
///
/// Token counters and cost are never negative. Total tokens are always
/// recomputed from the four counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub project_path: PathBuf,
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    /// Set when finalized; absent means the run is incomplete
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    pub duration_api_ms: u64,
    pub cost_usd: f64,
    pub num_turns: u32,
    pub is_error: bool,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
    /// Invocation count per tool name
    pub tool_counts: HashMap<String, u32>,
    /// Distinct file paths touched by tool invocations
    pub files_touched: BTreeSet<String>,
}

impl SessionSummary {
    pub fn new(project_path: PathBuf, session_id: impl Into<String>) -> Self {
        Self {
            project_path,
            session_id: session_id.into(),
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: 0,
            duration_api_ms: 0,
            cost_usd: 0.0,
            num_turns: 0,
            is_error: false,
            input_tokens: 0,
            output_tokens: 0,
            cache_creation_tokens: 0,
            cache_read_tokens: 0,
            tool_counts: HashMap::new(),
            files_touched: BTreeSet::new(),
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens
            .saturating_add(self.output_tokens)
            .saturating_add(self.cache_creation_tokens)
            .saturating_add(self.cache_read_tokens)
    }

    pub fn total_tool_calls(&self) -> u32 {
        self.tool_counts.values().sum()
    }

    pub fn is_complete(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Finished normally with a non-error result.
    pub fn was_successful(&self) -> bool {
        self.is_complete() && !self.is_error
    }

    pub fn formatted_cost(&self) -> String {
        format_cost(self.cost_usd)
    }

    pub fn formatted_duration(&self) -> String {
        format_duration_ms(self.duration_ms)
    }

    pub fn formatted_tokens(&self) -> String {
        format_tokens(self.total_tokens())
    }
}
