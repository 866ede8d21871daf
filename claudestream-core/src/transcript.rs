//! Transcript assembly and tool correlation
//!
//! The [`TranscriptAssembler`] consumes [`ClaudeEvent`]s in arrival order and
//! maintains an ordered, mutable [`Transcript`]. Tool calls are appended when
//! invoked and completed in place when their result arrives; permission
//! requests are appended pending and resolved in place.
//!
//! ## Storage
//!
//! The transcript is an indexed arena: entries live in a `Vec` in display
//! order and a side table maps each [`MessageId`] to its position. Positions
//! never change (entries are only appended), so lookups and in-place
//! mutation are both O(1).

use crate::error::TranscriptError;
use crate::types::{
    ChatMessage, ClaudeEvent, MessageContent, MessageId, MessageRole, PermissionRequest,
    PermissionStatus, SessionStats, ToolCall, ToolUseEvent, UNKNOWN_TOOL_NAME,
};
use std::collections::HashMap;

/// What happened to the transcript as the result of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptChange {
    /// A new entry was added at the end
    Appended(MessageId),
    /// An existing entry was mutated in place
    Updated(MessageId),
}

impl TranscriptChange {
    pub fn id(&self) -> MessageId {
        match self {
            TranscriptChange::Appended(id) | TranscriptChange::Updated(id) => *id,
        }
    }
}

// ============================================
// Transcript
// ============================================

/// Ordered list of chat messages with O(1) lookup by id.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    index: HashMap<MessageId, usize>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) -> MessageId {
        let id = message.id;
        self.index.insert(id, self.messages.len());
        self.messages.push(message);
        id
    }

    pub fn get(&self, id: MessageId) -> Option<&ChatMessage> {
        self.index.get(&id).map(|&pos| &self.messages[pos])
    }

    pub fn get_mut(&mut self, id: MessageId) -> Option<&mut ChatMessage> {
        match self.index.get(&id) {
            Some(&pos) => self.messages.get_mut(pos),
            None => None,
        }
    }

    /// Display position of an entry.
    pub fn position(&self, id: MessageId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChatMessage> {
        self.messages.iter()
    }
}

// ============================================
// Assembler
// ============================================

/// Builds the transcript for one agent session.
///
/// Owns the tool correlation table: tool-use id → the transcript entry
/// waiting for its result. One assembler per session; nothing is shared.
#[derive(Debug, Default)]
pub struct TranscriptAssembler {
    transcript: Transcript,
    pending_tools: HashMap<String, MessageId>,
}

impl TranscriptAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn into_transcript(self) -> Transcript {
        self.transcript
    }

    /// Apply one event, returning the entries it added or changed.
    pub fn apply(&mut self, event: &ClaudeEvent) -> Vec<TranscriptChange> {
        match event {
            ClaudeEvent::System { .. } => Vec::new(),
            ClaudeEvent::AssistantText { text } => {
                vec![self.append(ChatMessage::text(MessageRole::Assistant, text.clone()))]
            }
            ClaudeEvent::UserMessage { text } => {
                vec![self.append(ChatMessage::text(MessageRole::User, text.clone()))]
            }
            ClaudeEvent::ToolUse(tool) => vec![self.start_tool_call(tool)],
            ClaudeEvent::ToolResult {
                tool_use_id,
                output,
            } => vec![self.complete_tool_call(tool_use_id, output)],
            ClaudeEvent::Result(result) => vec![self.append(ChatMessage::new(
                MessageRole::System,
                MessageContent::SessionStats(SessionStats::from(result)),
            ))],
            ClaudeEvent::Error { message } => vec![self.push_error(message.clone())],
        }
    }

    /// Append a system error entry.
    pub fn push_error(&mut self, message: impl Into<String>) -> TranscriptChange {
        self.append(ChatMessage::error(message))
    }

    fn append(&mut self, message: ChatMessage) -> TranscriptChange {
        TranscriptChange::Appended(self.transcript.push(message))
    }

    fn start_tool_call(&mut self, tool: &ToolUseEvent) -> TranscriptChange {
        let message = ChatMessage::new(
            MessageRole::Tool,
            MessageContent::ToolCall(ToolCall {
                tool_use_id: tool.id.clone(),
                name: tool.name.clone(),
                summary: tool.summary(),
                input: tool.render_input(),
                result: None,
                is_expanded: false,
            }),
        );
        let id = self.transcript.push(message);

        if let Some(previous) = self.pending_tools.insert(tool.id.clone(), id) {
            tracing::warn!(
                tool_use_id = %tool.id,
                previous = %previous,
                "Duplicate tool use id; earlier call will stay unresolved"
            );
        }

        TranscriptChange::Appended(id)
    }

    fn complete_tool_call(&mut self, tool_use_id: &str, output: &str) -> TranscriptChange {
        if let Some(id) = self.pending_tools.remove(tool_use_id) {
            if let Some(MessageContent::ToolCall(call)) =
                self.transcript.get_mut(id).map(|m| &mut m.content)
            {
                call.result = Some(output.to_string());
                return TranscriptChange::Updated(id);
            }
        }

        // Result without a known invocation (truncated history, reordering).
        tracing::debug!(tool_use_id = %tool_use_id, "Tool result without matching tool use");
        self.append(ChatMessage::new(
            MessageRole::Tool,
            MessageContent::ToolCall(ToolCall {
                tool_use_id: tool_use_id.to_string(),
                name: UNKNOWN_TOOL_NAME.to_string(),
                summary: UNKNOWN_TOOL_NAME.to_string(),
                input: String::new(),
                result: Some(output.to_string()),
                is_expanded: false,
            }),
        ))
    }

    /// Tool-use ids still waiting for a result, in transcript order.
    pub fn pending_tool_calls(&self) -> Vec<&str> {
        let mut pending: Vec<(usize, &str)> = self
            .pending_tools
            .iter()
            .filter_map(|(tool_use_id, id)| {
                self.transcript
                    .position(*id)
                    .map(|pos| (pos, tool_use_id.as_str()))
            })
            .collect();
        pending.sort_unstable_by_key(|(pos, _)| *pos);
        pending.into_iter().map(|(_, tool_use_id)| tool_use_id).collect()
    }

    // ============================================
    // Permission requests
    // ============================================

    /// Append a pending permission request raised by the permission prompt.
    pub fn request_permission(
        &mut self,
        tool: impl Into<String>,
        description: impl Into<String>,
        command: Option<String>,
    ) -> MessageId {
        self.transcript.push(ChatMessage::new(
            MessageRole::System,
            MessageContent::PermissionRequest(PermissionRequest {
                tool: tool.into(),
                description: description.into(),
                command,
                status: PermissionStatus::Pending,
            }),
        ))
    }

    /// Move a pending request to a terminal status, in place.
    pub fn resolve_permission(
        &mut self,
        id: MessageId,
        status: PermissionStatus,
    ) -> Result<TranscriptChange, TranscriptError> {
        if !status.is_terminal() {
            return Err(TranscriptError::PendingResolution);
        }

        let message = self
            .transcript
            .get_mut(id)
            .ok_or_else(|| TranscriptError::UnknownMessage(id.to_string()))?;

        match &mut message.content {
            MessageContent::PermissionRequest(request) if request.status.is_terminal() => {
                Err(TranscriptError::AlreadyResolved(id.to_string()))
            }
            MessageContent::PermissionRequest(request) => {
                request.status = status;
                Ok(TranscriptChange::Updated(id))
            }
            _ => Err(TranscriptError::WrongKind {
                id: id.to_string(),
                expected: "permission request",
            }),
        }
    }

    /// Expand or collapse a tool call entry.
    pub fn set_expanded(
        &mut self,
        id: MessageId,
        expanded: bool,
    ) -> Result<TranscriptChange, TranscriptError> {
        let message = self
            .transcript
            .get_mut(id)
            .ok_or_else(|| TranscriptError::UnknownMessage(id.to_string()))?;

        match &mut message.content {
            MessageContent::ToolCall(call) => {
                call.is_expanded = expanded;
                Ok(TranscriptChange::Updated(id))
            }
            _ => Err(TranscriptError::WrongKind {
                id: id.to_string(),
                expected: "tool call",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ResultEvent, ToolInput};

    fn tool_use(id: &str, name: &str, command: &str) -> ClaudeEvent {
        ClaudeEvent::ToolUse(ToolUseEvent {
            id: id.to_string(),
            name: name.to_string(),
            input: ToolInput {
                command: Some(command.to_string()),
                raw: [(
                    "command".to_string(),
                    crate::types::InputValue::String(command.to_string()),
                )]
                .into_iter()
                .collect(),
                ..Default::default()
            },
        })
    }

    fn tool_result(id: &str, output: &str) -> ClaudeEvent {
        ClaudeEvent::ToolResult {
            tool_use_id: id.to_string(),
            output: output.to_string(),
        }
    }

    #[test]
    fn test_transcript_arena_lookup() {
        let mut transcript = Transcript::new();
        let a = transcript.push(ChatMessage::text(MessageRole::User, "a"));
        let b = transcript.push(ChatMessage::text(MessageRole::Assistant, "b"));

        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.position(a), Some(0));
        assert_eq!(transcript.position(b), Some(1));
        assert_eq!(transcript.get(b).unwrap().role, MessageRole::Assistant);
        assert!(transcript.get(MessageId::new()).is_none());
    }

    #[test]
    fn test_text_events_append_in_role() {
        let mut assembler = TranscriptAssembler::new();
        assembler.apply(&ClaudeEvent::UserMessage {
            text: "hi".to_string(),
        });
        assembler.apply(&ClaudeEvent::AssistantText {
            text: "hello".to_string(),
        });

        let roles: Vec<_> = assembler.transcript().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![MessageRole::User, MessageRole::Assistant]);
    }

    #[test]
    fn test_system_event_changes_nothing() {
        let mut assembler = TranscriptAssembler::new();
        let changes = assembler.apply(&ClaudeEvent::System {
            session_id: "s1".to_string(),
        });
        assert!(changes.is_empty());
        assert!(assembler.transcript().is_empty());
    }

    #[test]
    fn test_tool_result_completes_call_in_place() {
        let mut assembler = TranscriptAssembler::new();
        let started = assembler.apply(&tool_use("t1", "Bash", "ls"));
        let TranscriptChange::Appended(id) = started[0] else {
            panic!("expected append");
        };

        let call = assembler.transcript().get(id).unwrap().as_tool_call().unwrap();
        assert_eq!(call.summary, "ls");
        assert_eq!(call.input, "command: ls");
        assert!(call.result.is_none());
        assert!(!call.is_expanded);
        assert_eq!(assembler.pending_tool_calls(), vec!["t1"]);

        let finished = assembler.apply(&tool_result("t1", "file.txt"));
        assert_eq!(finished, vec![TranscriptChange::Updated(id)]);
        assert_eq!(assembler.transcript().len(), 1);
        assert_eq!(assembler.transcript().position(id), Some(0));

        let call = assembler.transcript().get(id).unwrap().as_tool_call().unwrap();
        assert_eq!(call.result.as_deref(), Some("file.txt"));
        assert!(assembler.pending_tool_calls().is_empty());
    }

    #[test]
    fn test_interleaved_tool_calls_resolve_by_id() {
        let mut assembler = TranscriptAssembler::new();
        assembler.apply(&tool_use("t1", "Bash", "ls"));
        assembler.apply(&tool_use("t2", "Bash", "pwd"));
        assert_eq!(assembler.pending_tool_calls(), vec!["t1", "t2"]);

        assembler.apply(&tool_result("t2", "/work"));
        assembler.apply(&tool_result("t1", "a.txt"));

        let results: Vec<_> = assembler
            .transcript()
            .iter()
            .map(|m| m.as_tool_call().unwrap().result.clone().unwrap())
            .collect();
        assert_eq!(results, vec!["a.txt", "/work"]);
    }

    #[test]
    fn test_unmatched_result_appends_standalone_entry() {
        let mut assembler = TranscriptAssembler::new();
        let changes = assembler.apply(&tool_result("missing", "orphan output"));

        assert!(matches!(changes[0], TranscriptChange::Appended(_)));
        let entry = &assembler.transcript().messages()[0];
        assert_eq!(entry.role, MessageRole::Tool);
        let call = entry.as_tool_call().unwrap();
        assert_eq!(call.name, UNKNOWN_TOOL_NAME);
        assert_eq!(call.tool_use_id, "missing");
        assert_eq!(call.result.as_deref(), Some("orphan output"));
    }

    #[test]
    fn test_result_before_use_is_visible() {
        let mut assembler = TranscriptAssembler::new();
        assembler.apply(&tool_result("t1", "early"));
        assembler.apply(&tool_use("t1", "Bash", "ls"));

        assert_eq!(assembler.transcript().len(), 2);
        assert_eq!(
            assembler.transcript().messages()[0]
                .as_tool_call()
                .unwrap()
                .result
                .as_deref(),
            Some("early")
        );
        // The late invocation waits for a result that already came
        assert_eq!(assembler.pending_tool_calls(), vec!["t1"]);
    }

    #[test]
    fn test_second_result_for_same_id_is_standalone() {
        let mut assembler = TranscriptAssembler::new();
        assembler.apply(&tool_use("t1", "Bash", "ls"));
        assembler.apply(&tool_result("t1", "first"));
        let changes = assembler.apply(&tool_result("t1", "second"));

        assert!(matches!(changes[0], TranscriptChange::Appended(_)));
        assert_eq!(assembler.transcript().len(), 2);
    }

    #[test]
    fn test_result_event_appends_stats() {
        let mut assembler = TranscriptAssembler::new();
        assembler.apply(&ClaudeEvent::Result(ResultEvent {
            cost_usd: 0.0123,
            duration_ms: 5_000,
            num_turns: 3,
            session_id: "s1".to_string(),
            ..Default::default()
        }));

        let entry = &assembler.transcript().messages()[0];
        assert_eq!(entry.role, MessageRole::System);
        let MessageContent::SessionStats(stats) = &entry.content else {
            panic!("expected stats entry");
        };
        assert_eq!(stats.cost, "$0.0123");
        assert_eq!(stats.duration, "5s");
        assert_eq!(stats.turns, 3);
        assert_eq!(stats.session_id, "s1");
    }

    #[test]
    fn test_error_event_appends_system_error() {
        let mut assembler = TranscriptAssembler::new();
        assembler.apply(&ClaudeEvent::Error {
            message: "boom".to_string(),
        });
        let entry = &assembler.transcript().messages()[0];
        assert_eq!(entry.role, MessageRole::System);
        assert_eq!(
            entry.content,
            MessageContent::Error {
                message: "boom".to_string()
            }
        );
    }

    #[test]
    fn test_permission_lifecycle() {
        let mut assembler = TranscriptAssembler::new();
        let id = assembler.request_permission("Bash", "Run rm -rf build", Some("rm -rf build".to_string()));

        let request = assembler.transcript().get(id).unwrap().as_permission_request().unwrap();
        assert_eq!(request.status, PermissionStatus::Pending);

        assert_eq!(
            assembler.resolve_permission(id, PermissionStatus::Pending),
            Err(TranscriptError::PendingResolution)
        );
        assert_eq!(
            assembler.resolve_permission(id, PermissionStatus::Allowed),
            Ok(TranscriptChange::Updated(id))
        );
        assert_eq!(
            assembler.resolve_permission(id, PermissionStatus::Denied),
            Err(TranscriptError::AlreadyResolved(id.to_string()))
        );

        let request = assembler.transcript().get(id).unwrap().as_permission_request().unwrap();
        assert_eq!(request.status, PermissionStatus::Allowed);
        assert_eq!(assembler.transcript().position(id), Some(0));
    }

    #[test]
    fn test_resolve_permission_rejects_other_entries() {
        let mut assembler = TranscriptAssembler::new();
        let changes = assembler.apply(&ClaudeEvent::AssistantText {
            text: "hi".to_string(),
        });
        let id = changes[0].id();

        assert!(matches!(
            assembler.resolve_permission(id, PermissionStatus::Denied),
            Err(TranscriptError::WrongKind { .. })
        ));
        assert!(matches!(
            assembler.resolve_permission(MessageId::new(), PermissionStatus::Denied),
            Err(TranscriptError::UnknownMessage(_))
        ));
    }

    #[test]
    fn test_set_expanded() {
        let mut assembler = TranscriptAssembler::new();
        let id = assembler.apply(&tool_use("t1", "Bash", "ls"))[0].id();

        assert_eq!(assembler.set_expanded(id, true), Ok(TranscriptChange::Updated(id)));
        assert!(assembler.transcript().get(id).unwrap().as_tool_call().unwrap().is_expanded);

        let text = assembler.push_error("oops").id();
        assert!(matches!(
            assembler.set_expanded(text, true),
            Err(TranscriptError::WrongKind { .. })
        ));
    }
}
