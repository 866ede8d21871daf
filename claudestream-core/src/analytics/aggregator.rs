//! Per-session usage aggregation
//!
//! Folds the event stream of one agent run into a [`SessionSummary`]:
//! tool counts and touched files while the run is active, then cost,
//! duration, turns and tokens from the terminal result.
//!
//! ```text
//! Uninitialized ──System──► Active ──Result──► Finalized
//!                             │                    ▲
//!                             └────terminate()─────┘
//! ```
//!
//! A run that never reaches `Finalized` is reported as incomplete; closing
//! the stream alone does not finalize it.

use crate::types::{
    ClaudeEvent, ResultEvent, SessionState, SessionSummary, TerminationReason, ToolUseEvent,
    UNKNOWN_SESSION_ID,
};
use chrono::Utc;
use std::path::PathBuf;

/// Session aggregator for one agent run.
#[derive(Debug)]
pub struct SessionAggregator {
    project_path: PathBuf,
    state: SessionState,
    summary: Option<SessionSummary>,
}

impl SessionAggregator {
    pub fn new(project_path: impl Into<PathBuf>) -> Self {
        Self {
            project_path: project_path.into(),
            state: SessionState::Uninitialized,
            summary: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Summary so far; `None` until the first event that starts a session.
    pub fn summary(&self) -> Option<&SessionSummary> {
        self.summary.as_ref()
    }

    pub fn into_summary(self) -> Option<SessionSummary> {
        self.summary
    }

    /// Fold one event into the summary. Returns true if the summary changed.
    pub fn observe(&mut self, event: &ClaudeEvent) -> bool {
        if self.state == SessionState::Finalized {
            tracing::debug!(event = event.as_str(), "Ignoring event after session finalized");
            return false;
        }

        match event {
            ClaudeEvent::System { session_id } => match self.state {
                SessionState::Uninitialized => {
                    self.activate(session_id);
                    true
                }
                _ => self.adopt_session_id(session_id),
            },
            ClaudeEvent::ToolUse(tool) => {
                self.ensure_active();
                self.record_tool_use(tool);
                true
            }
            ClaudeEvent::AssistantText { .. } | ClaudeEvent::ToolResult { .. } => {
                if self.state == SessionState::Uninitialized {
                    self.ensure_active();
                    true
                } else {
                    false
                }
            }
            ClaudeEvent::Result(result) => {
                self.ensure_active();
                self.adopt_session_id(&result.session_id);
                self.finalize(result);
                true
            }
            ClaudeEvent::UserMessage { .. } | ClaudeEvent::Error { .. } => false,
        }
    }

    /// Finalize an active session on an external termination signal.
    ///
    /// The run is marked as an error and its duration is measured from the
    /// start time. Has no effect unless the session is active.
    pub fn terminate(&mut self, reason: &TerminationReason) -> bool {
        if self.state != SessionState::Active {
            return false;
        }
        let Some(summary) = self.summary.as_mut() else {
            return false;
        };

        let now = Utc::now();
        summary.is_error = true;
        summary.ended_at = Some(now);
        let elapsed = (now - summary.started_at).num_milliseconds();
        summary.duration_ms = u64::try_from(elapsed).unwrap_or(0);
        self.state = SessionState::Finalized;

        tracing::info!(
            session_id = %summary.session_id,
            reason = %reason,
            "Session terminated before completion"
        );
        true
    }

    fn activate(&mut self, session_id: &str) {
        let summary = SessionSummary::new(self.project_path.clone(), session_id);
        tracing::debug!(session_id = %summary.session_id, "Session started");
        self.summary = Some(summary);
        self.state = SessionState::Active;
    }

    fn ensure_active(&mut self) {
        if self.state == SessionState::Uninitialized {
            self.activate(UNKNOWN_SESSION_ID);
        }
    }

    /// Replace the placeholder id with a real one.
    fn adopt_session_id(&mut self, session_id: &str) -> bool {
        if session_id.is_empty() || session_id == UNKNOWN_SESSION_ID {
            return false;
        }
        match self.summary.as_mut() {
            Some(summary) if summary.session_id == UNKNOWN_SESSION_ID => {
                summary.session_id = session_id.to_string();
                true
            }
            Some(summary) if summary.session_id != session_id => {
                tracing::debug!(
                    current = %summary.session_id,
                    received = %session_id,
                    "Ignoring session id change mid-session"
                );
                false
            }
            _ => false,
        }
    }

    fn record_tool_use(&mut self, tool: &ToolUseEvent) {
        let Some(summary) = self.summary.as_mut() else {
            return;
        };
        *summary.tool_counts.entry(tool.name.clone()).or_insert(0) += 1;
        if let Some(path) = tool.file_path() {
            summary.files_touched.insert(path.to_string());
        }
    }

    fn finalize(&mut self, result: &ResultEvent) {
        let Some(summary) = self.summary.as_mut() else {
            return;
        };

        summary.cost_usd = result.cost_usd.max(0.0);
        summary.duration_ms = result.duration_ms;
        summary.duration_api_ms = result.duration_api_ms;
        summary.num_turns = result.num_turns;
        summary.is_error = result.is_error;
        summary.input_tokens = result.input_tokens;
        summary.output_tokens = result.output_tokens;
        summary.cache_creation_tokens = result.cache_creation_tokens;
        summary.cache_read_tokens = result.cache_read_tokens;
        summary.ended_at = Some(Utc::now());
        self.state = SessionState::Finalized;

        tracing::info!(
            session_id = %summary.session_id,
            cost = %summary.formatted_cost(),
            turns = summary.num_turns,
            tokens = summary.total_tokens(),
            is_error = summary.is_error,
            "Session finalized"
        );
    }
}
