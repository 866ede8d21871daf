//! Integration tests for the claudestream ingestion pipeline
//!
//! These tests replay fixture files in `tests/fixtures/stream-json/` through a
//! `StreamSession` and check the resulting transcript and session summary.

use claudestream_core::config::StreamConfig;
use claudestream_core::ingest::sink::read_summary;
use claudestream_core::ingest::{forward_lines, JsonSummaryWriter, SummarySink};
use claudestream_core::types::{
    MessageContent, MessageRole, SessionState, TerminationReason, UNKNOWN_TOOL_NAME,
};
use claudestream_core::{StreamInput, StreamSession, TranscriptUpdate};
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Get the path to a fixture file
fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/stream-json")
        .join(name)
}

/// Feed every line of a fixture through a fresh session
fn replay(name: &str) -> (StreamSession, Vec<TranscriptUpdate>) {
    let content = std::fs::read_to_string(fixture_path(name)).expect("fixture should exist");
    let mut session = StreamSession::new("/home/user/project", StreamConfig::default());
    let mut updates = Vec::new();
    for line in content.lines() {
        updates.extend(session.handle_line(line));
    }
    (session, updates)
}

fn error_messages(session: &StreamSession) -> Vec<String> {
    session
        .transcript()
        .iter()
        .filter_map(|m| match &m.content {
            MessageContent::Error { message } => Some(message.clone()),
            _ => None,
        })
        .collect()
}

// ============================================
// Fixture Replay Tests
// ============================================

#[test]
fn test_minimal_session() {
    let (session, _) = replay("minimal-session.jsonl");

    let roles: Vec<_> = session.transcript().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![MessageRole::User, MessageRole::Assistant, MessageRole::System]
    );
    assert_eq!(
        session.transcript().messages()[0].content,
        MessageContent::Text {
            text: "What files are here?".to_string()
        }
    );

    let summary = session.summary().expect("session should have started");
    assert_eq!(summary.session_id, "test-session-001");
    assert_eq!(summary.formatted_cost(), "$0.0042");
    assert_eq!(summary.formatted_duration(), "3s");
    assert_eq!(summary.total_tokens(), 1_000);
    assert_eq!(summary.formatted_tokens(), "1.0K");
    assert!(summary.was_successful());
}

#[test]
fn test_tool_calls_are_completed_in_place() {
    let (session, updates) = replay("with-tool-calls.jsonl");
    let transcript = session.transcript();

    // user, text, Read, Edit, Bash, text, stats
    assert_eq!(transcript.len(), 7);

    let read = transcript.messages()[2].as_tool_call().unwrap();
    assert_eq!(read.name, "Read");
    assert_eq!(read.summary, "/home/user/project/src/main.rs");
    assert_eq!(read.input, "file_path: /home/user/project/src/main.rs\nlimit: 200");
    assert_eq!(
        read.result.as_deref(),
        Some("fn main() {\n    println!(\"helo\");\n}")
    );

    let edit = transcript.messages()[3].as_tool_call().unwrap();
    assert_eq!(edit.result.as_deref(), Some("Edit applied"));
    assert_eq!(
        edit.input,
        "file_path: /home/user/project/src/main.rs\nnew_string: hello\nold_string: helo\nreplace_all: false"
    );

    let bash = transcript.messages()[4].as_tool_call().unwrap();
    assert_eq!(bash.summary, "cargo build");
    assert_eq!(bash.result.as_deref(), Some("Finished dev profile"));

    let updated = updates
        .iter()
        .filter(|u| matches!(u, TranscriptUpdate::Updated(_)))
        .count();
    assert_eq!(updated, 3);

    let summary = session.summary().unwrap();
    assert_eq!(summary.tool_counts["Read"], 1);
    assert_eq!(summary.tool_counts["Edit"], 1);
    assert_eq!(summary.tool_counts["Bash"], 1);
    assert_eq!(summary.files_touched.len(), 1);
    assert_eq!(summary.formatted_cost(), "$1.23");
    assert_eq!(summary.formatted_duration(), "1m 1s");
    assert_eq!(summary.formatted_tokens(), "14.0K");
    assert!(summary.was_successful());
}

#[test]
fn test_empty_file() {
    let (session, updates) = replay("empty.jsonl");
    assert!(updates.is_empty());
    assert!(session.transcript().is_empty());
    assert_eq!(session.state(), SessionState::Uninitialized);
}

#[test]
fn test_malformed_json_recovery() {
    let (session, _) = replay("malformed-lines.jsonl");

    let errors = error_messages(&session);
    assert_eq!(errors.len(), 2);
    assert!(errors[0].starts_with("Failed to decode line 3:"));
    assert_eq!(
        errors[1],
        "Failed to decode line 5: expected a JSON object, found array"
    );

    // Lines after the bad ones are still processed
    let texts: Vec<_> = session
        .transcript()
        .iter()
        .filter_map(|m| match &m.content {
            MessageContent::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(texts, vec!["First", "Second"]);

    // A wrongly typed field defaults instead of failing the line
    let summary = session.summary().unwrap();
    assert!(summary.is_complete());
    assert_eq!(summary.num_turns, 0);
}

#[test]
fn test_truncated_file() {
    let (mut session, _) = replay("truncated.jsonl");

    assert_eq!(session.state(), SessionState::Active);
    assert!(!session.summary().unwrap().is_complete());
    assert_eq!(session.assembler_mut().pending_tool_calls(), vec!["t1"]);
    assert_eq!(error_messages(&session).len(), 1);

    let updates = session.handle_termination(TerminationReason::Exited { code: None });
    assert_eq!(updates.len(), 2);

    let summary = session.summary().unwrap();
    assert!(summary.is_complete());
    assert!(summary.is_error);
    assert!(!summary.was_successful());
    assert_eq!(summary.tool_counts["Bash"], 1);
}

#[test]
fn test_tool_result_under_user_is_ignored() {
    let (mut session, _) = replay("user-tool-result.jsonl");

    // Only the invocation is shown; the user-side result neither completes
    // it nor creates a user entry.
    assert_eq!(session.transcript().len(), 1);
    let call = session.transcript().messages()[0].as_tool_call().unwrap();
    assert!(call.result.is_none());
    assert_eq!(session.assembler_mut().pending_tool_calls(), vec!["t1"]);
}

#[test]
fn test_error_result_with_zero_usage() {
    let (session, _) = replay("error-result.jsonl");

    let summary = session.summary().unwrap();
    assert!(summary.is_complete());
    assert!(!summary.was_successful());
    assert_eq!(summary.total_tokens(), 0);
    assert_eq!(summary.cost_usd, 0.0);
    assert_eq!(summary.duration_ms, 0);
    assert_eq!(summary.num_turns, 0);

    let stats = session.transcript().messages().last().unwrap();
    let MessageContent::SessionStats(stats) = &stats.content else {
        panic!("expected stats entry");
    };
    assert!(stats.is_error);
    assert_eq!(stats.cost, "$0.0000");
}

#[test]
fn test_result_before_tool_use() {
    let (session, _) = replay("out-of-order.jsonl");
    let transcript = session.transcript();

    assert_eq!(transcript.len(), 3);
    let orphan = transcript.messages()[0].as_tool_call().unwrap();
    assert_eq!(orphan.name, UNKNOWN_TOOL_NAME);
    assert_eq!(orphan.result.as_deref(), Some("early output"));

    let grep = transcript.messages()[1].as_tool_call().unwrap();
    assert_eq!(grep.summary, "TODO");
    assert_eq!(grep.input, "path: src\npattern: TODO");
    assert!(grep.result.is_none());

    let summary = session.summary().unwrap();
    assert_eq!(summary.tool_counts["Grep"], 1);
    assert!(summary.files_touched.is_empty());
    assert!(summary.was_successful());
}

// ============================================
// Async Pipeline Tests
// ============================================

#[tokio::test]
async fn test_pipeline_replays_file() {
    let file = tokio::fs::File::open(fixture_path("with-tool-calls.jsonl"))
        .await
        .unwrap();

    let (input_tx, input_rx) = mpsc::channel(4);
    let (update_tx, mut update_rx) = mpsc::channel(2);
    let worker = StreamSession::new("/home/user/project", StreamConfig::default())
        .spawn(input_rx, update_tx);
    let reader = tokio::spawn(forward_lines(file, input_tx));

    let mut appended = 0;
    let mut updated = 0;
    let mut last_summary = None;
    while let Some(update) = update_rx.recv().await {
        match update {
            TranscriptUpdate::Appended(_) => appended += 1,
            TranscriptUpdate::Updated(_) => updated += 1,
            TranscriptUpdate::Summary(summary) => last_summary = Some(summary),
        }
    }

    assert_eq!(reader.await.unwrap().unwrap(), 8);
    let session = worker.await.unwrap().unwrap();

    assert_eq!(appended, 7);
    assert_eq!(updated, 3);
    assert_eq!(session.lines_seen(), 8);
    let summary = last_summary.unwrap();
    assert!(summary.is_complete());
    assert_eq!(Some(&summary), session.summary());
}

#[tokio::test]
async fn test_pipeline_cancellation_finalizes() {
    let (input_tx, input_rx) = mpsc::channel(4);
    let (update_tx, mut update_rx) = mpsc::channel(16);
    let worker = StreamSession::new("/home/user/project", StreamConfig::default())
        .spawn(input_rx, update_tx);

    let content = std::fs::read_to_string(fixture_path("truncated.jsonl")).unwrap();
    for line in content.lines() {
        input_tx.send(StreamInput::Line(line.to_string())).await.unwrap();
    }
    input_tx
        .send(StreamInput::Terminated(TerminationReason::Cancelled))
        .await
        .unwrap();

    let session = worker.await.unwrap().unwrap();
    let summary = session.into_summary().unwrap();
    assert!(summary.is_complete());
    assert!(summary.is_error);

    let mut last = None;
    while let Some(update) = update_rx.recv().await {
        last = Some(update);
    }
    assert!(matches!(last, Some(TranscriptUpdate::Summary(s)) if s.is_error));
}

// ============================================
// Summary Sink Tests
// ============================================

#[test]
fn test_summary_written_to_sessions_dir() {
    let (session, _) = replay("with-tool-calls.jsonl");
    let dir = tempfile::tempdir().unwrap();
    let mut writer = JsonSummaryWriter::in_dir(dir.path());

    let summary = session.into_summary().unwrap();
    let path = writer.write_summary(&summary).unwrap();
    assert_eq!(path, dir.path().join("test-session-002.json"));

    let loaded = read_summary(&path).unwrap();
    assert_eq!(loaded, summary);
    assert!(loaded.was_successful());
}
