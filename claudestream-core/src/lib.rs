//! # claudestream-core
//!
//! Core library for claudestream - turns an AI coding agent's `stream-json`
//! output into a live transcript and a session usage summary.
//!
//! This library provides:
//! - Domain types for events, transcript messages, and session summaries
//! - Envelope decoding and event translation
//! - Transcript assembly with tool-call correlation
//! - Session aggregation (cost, tokens, durations, tool usage)
//! - A per-session async pipeline and a summary sink
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Data flows through three stages, one line at a time:
//! - **Decode:** a raw line becomes an [`ingest::Envelope`] (wire schema, all optional)
//! - **Translate:** an envelope becomes zero or more [`ClaudeEvent`]s
//! - **Apply:** each event updates the [`transcript::TranscriptAssembler`]
//!   and the [`analytics::SessionAggregator`]
//!
//! ## Example
//!
//! ```rust
//! use claudestream_core::config::StreamConfig;
//! use claudestream_core::StreamSession;
//!
//! let mut session = StreamSession::new("/path/to/project", StreamConfig::default());
//! session.handle_line(r#"{"type":"system","session_id":"s1"}"#);
//! session.handle_line(r#"{"type":"result","session_id":"s1","total_cost_usd":0.02}"#);
//!
//! let summary = session.summary().expect("session started");
//! assert!(summary.was_successful());
//! assert_eq!(summary.formatted_cost(), "$0.0200");
//! ```

// Re-export commonly used items at the crate root
pub use analytics::SessionAggregator;
pub use config::Config;
pub use error::{Error, Result};
pub use ingest::{forward_lines, StreamInput, StreamSession, TranscriptUpdate};
pub use transcript::{Transcript, TranscriptAssembler, TranscriptChange};
pub use types::*;

// Public modules
pub mod analytics;
pub mod config;
pub mod error;
pub mod format;
pub mod ingest;
pub mod logging;
pub mod transcript;
pub mod types;
