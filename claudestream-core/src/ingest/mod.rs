//! Ingestion pipeline for an agent's stream-json output
//!
//! One [`StreamSession`] per running agent. It takes raw output lines in
//! arrival order and turns them into transcript updates and a session
//! summary.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐     ┌─────────────────────┐
//! │ Agent stdout    │ ──► │  StreamSession   │ ──► │ Display / Sink      │
//! │ (StreamInput)   │     │  (one tokio task)│     │ (TranscriptUpdate)  │
//! └─────────────────┘     └──────────────────┘     └─────────────────────┘
//!                               │
//!                               ▼
//!                    ┌───────────────────────┐
//!                    │ decode_line           │
//!                    │  └─ translate         │
//!                    │      ├─ Assembler     │
//!                    │      └─ Aggregator    │
//!                    └───────────────────────┘
//! ```
//!
//! Lines are processed strictly one after another: correlation and
//! transcript order both depend on it. Updates go out over a bounded
//! channel; when it is full the worker waits rather than dropping.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use claudestream_core::ingest::{forward_lines, StreamSession};
//! use tokio::sync::mpsc;
//!
//! let (input_tx, input_rx) = mpsc::channel(64);
//! let (update_tx, mut update_rx) = mpsc::channel(config.stream.channel_capacity);
//!
//! let worker = StreamSession::new("/path/to/project", config.stream.clone())
//!     .spawn(input_rx, update_tx);
//! tokio::spawn(forward_lines(child_stdout, input_tx));
//!
//! while let Some(update) = update_rx.recv().await {
//!     println!("{:?}", update);
//! }
//! let session = worker.await??;
//! ```

pub mod envelope;
pub mod sink;
pub mod translate;

pub use envelope::{decode_line, Envelope, EnvelopeKind};
pub use sink::{JsonSummaryWriter, SummarySink};
pub use translate::translate;

use crate::analytics::SessionAggregator;
use crate::config::StreamConfig;
use crate::error::{DecodeError, Error, Result};
use crate::transcript::{Transcript, TranscriptAssembler, TranscriptChange};
use crate::types::{ChatMessage, ClaudeEvent, SessionState, SessionSummary, TerminationReason};
use serde::Serialize;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Input from the process supervisor.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamInput {
    /// One raw output line
    Line(String),
    /// The agent process is gone; no more lines will follow
    Terminated(TerminationReason),
}

/// Output towards the display side, in processing order.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "update", rename_all = "snake_case")]
pub enum TranscriptUpdate {
    /// A new entry at the end of the transcript
    Appended(ChatMessage),
    /// An existing entry changed in place (same id, same position)
    Updated(ChatMessage),
    /// The session summary changed
    Summary(SessionSummary),
}

/// Per-session pipeline state: the assembler with its correlation table,
/// the aggregator, and the line counter used in diagnostics.
#[derive(Debug)]
pub struct StreamSession {
    assembler: TranscriptAssembler,
    aggregator: SessionAggregator,
    line_number: usize,
    config: StreamConfig,
}

impl StreamSession {
    pub fn new(project_path: impl Into<PathBuf>, config: StreamConfig) -> Self {
        Self {
            assembler: TranscriptAssembler::new(),
            aggregator: SessionAggregator::new(project_path),
            line_number: 0,
            config,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        self.assembler.transcript()
    }

    /// Assembler access for the permission prompt and display hooks.
    pub fn assembler_mut(&mut self) -> &mut TranscriptAssembler {
        &mut self.assembler
    }

    pub fn summary(&self) -> Option<&SessionSummary> {
        self.aggregator.summary()
    }

    pub fn state(&self) -> SessionState {
        self.aggregator.state()
    }

    /// Number of lines seen so far, blank ones included.
    pub fn lines_seen(&self) -> usize {
        self.line_number
    }

    pub fn into_summary(self) -> Option<SessionSummary> {
        self.aggregator.into_summary()
    }

    /// Decode, translate, and apply one line.
    pub fn handle_line(&mut self, line: &str) -> Vec<TranscriptUpdate> {
        self.line_number += 1;

        let envelope = match decode_line(line) {
            Ok(envelope) => envelope,
            Err(DecodeError::Empty) => return Vec::new(),
            Err(e) => {
                tracing::warn!(line = self.line_number, error = %e, "Failed to decode stream line");
                if !self.config.report_decode_errors {
                    return Vec::new();
                }
                let event = ClaudeEvent::Error {
                    message: format!("Failed to decode line {}: {}", self.line_number, e),
                };
                return self.apply_event(&event);
            }
        };

        translate(&envelope)
            .iter()
            .flat_map(|event| self.apply_event(event))
            .collect()
    }

    /// Transcript updates first, then the summary if the event changed it.
    fn apply_event(&mut self, event: &ClaudeEvent) -> Vec<TranscriptUpdate> {
        tracing::trace!(line = self.line_number, event = event.as_str(), "Applying event");

        let mut updates = Vec::new();
        for change in self.assembler.apply(event) {
            updates.extend(self.update_for(change));
        }
        if self.aggregator.observe(event) {
            updates.extend(self.summary_update());
        }
        updates
    }

    /// Handle the end of the agent process.
    ///
    /// An unfinished session is finalized as an error and a visible entry
    /// records why it ended. After a result this changes nothing.
    pub fn handle_termination(&mut self, reason: TerminationReason) -> Vec<TranscriptUpdate> {
        if self.aggregator.state() == SessionState::Finalized {
            tracing::debug!(reason = %reason, "Termination after session finalized");
            return Vec::new();
        }

        let mut updates = Vec::new();
        let change = self
            .assembler
            .push_error(format!("Session ended before completion: {}", reason));
        updates.extend(self.update_for(change));

        if self.aggregator.terminate(&reason) {
            updates.extend(self.summary_update());
        }
        updates
    }

    /// Process inputs until the supervisor closes the channel or reports
    /// termination.
    ///
    /// Fails with [`Error::ChannelClosed`] if the display side stops
    /// receiving.
    pub async fn run(
        mut self,
        mut inputs: mpsc::Receiver<StreamInput>,
        updates: mpsc::Sender<TranscriptUpdate>,
    ) -> Result<Self> {
        while let Some(input) = inputs.recv().await {
            let (batch, terminated) = match input {
                StreamInput::Line(line) => (self.handle_line(&line), false),
                StreamInput::Terminated(reason) => (self.handle_termination(reason), true),
            };

            for update in batch {
                updates.send(update).await.map_err(|_| Error::ChannelClosed)?;
            }

            if terminated {
                break;
            }
        }

        tracing::debug!(
            lines = self.line_number,
            state = self.aggregator.state().as_str(),
            "Stream session worker finished"
        );
        Ok(self)
    }

    /// Run the worker on its own tokio task.
    pub fn spawn(
        self,
        inputs: mpsc::Receiver<StreamInput>,
        updates: mpsc::Sender<TranscriptUpdate>,
    ) -> JoinHandle<Result<Self>> {
        tokio::spawn(self.run(inputs, updates))
    }

    fn update_for(&self, change: TranscriptChange) -> Option<TranscriptUpdate> {
        let message = self.assembler.transcript().get(change.id())?.clone();
        Some(match change {
            TranscriptChange::Appended(_) => TranscriptUpdate::Appended(message),
            TranscriptChange::Updated(_) => TranscriptUpdate::Updated(message),
        })
    }

    fn summary_update(&self) -> Option<TranscriptUpdate> {
        self.aggregator
            .summary()
            .cloned()
            .map(TranscriptUpdate::Summary)
    }
}

/// Forward every line of `reader` to the session as [`StreamInput::Line`].
///
/// End of input sends nothing: a closed stream is not a result. Bytes that
/// are not UTF-8 are replaced so the line still reaches the decoder, which
/// reports it like any other bad line. A read error is reported to the
/// session as a crash and returned. Returns the number of lines forwarded.
pub async fn forward_lines<R>(reader: R, inputs: mpsc::Sender<StreamInput>) -> Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut forwarded = 0;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                tracing::error!(error = %err, lines = forwarded, "Failed to read agent output");
                let reason = TerminationReason::Crashed {
                    message: err.to_string(),
                };
                // The worker may already be gone; the read error is what matters.
                let _ = inputs.send(StreamInput::Terminated(reason)).await;
                return Err(err.into());
            }
        }

        let line = String::from_utf8_lossy(strip_line_ending(&buf)).into_owned();
        if inputs.send(StreamInput::Line(line)).await.is_err() {
            return Err(Error::ChannelClosed);
        }
        forwarded += 1;
    }

    Ok(forwarded)
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
