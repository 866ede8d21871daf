//! Session summary persistence boundary

use crate::config::Config;
use crate::error::Result;
use crate::types::SessionSummary;
use std::path::{Path, PathBuf};

/// Receives finished (or abandoned) session summaries.
pub trait SummarySink {
    /// Persist one summary, returning where it went.
    fn write_summary(&mut self, summary: &SessionSummary) -> Result<PathBuf>;
}

/// Writes summaries as pretty-printed JSON files.
#[derive(Debug, Clone)]
pub struct JsonSummaryWriter {
    target: Target,
}

#[derive(Debug, Clone)]
enum Target {
    /// One `<session_id>.json` per session in this directory
    Directory(PathBuf),
    /// Always this file
    File(PathBuf),
}

impl JsonSummaryWriter {
    /// Write into `dir`, one file per session id.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            target: Target::Directory(dir.into()),
        }
    }

    /// Write every summary to exactly `path`.
    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            target: Target::File(path.into()),
        }
    }

    /// `$XDG_DATA_HOME/claudestream/sessions/`
    pub fn default_location() -> Self {
        Self::in_dir(Config::sessions_dir())
    }

    /// Where `summary` would be written.
    pub fn path_for(&self, summary: &SessionSummary) -> PathBuf {
        match &self.target {
            Target::Directory(dir) => dir.join(format!("{}.json", file_stem(&summary.session_id))),
            Target::File(path) => path.clone(),
        }
    }
}

impl SummarySink for JsonSummaryWriter {
    fn write_summary(&mut self, summary: &SessionSummary) -> Result<PathBuf> {
        let path = self.path_for(summary);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(summary)?;
        std::fs::write(&path, json)?;

        tracing::info!(
            session_id = %summary.session_id,
            path = %path.display(),
            complete = summary.is_complete(),
            "Wrote session summary"
        );
        Ok(path)
    }
}

/// Session ids come from the agent; keep them to one safe path component.
fn file_stem(session_id: &str) -> String {
    let stem: String = session_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if stem.is_empty() {
        "session".to_string()
    } else {
        stem
    }
}

/// Read a summary written by [`JsonSummaryWriter`].
pub fn read_summary(path: &Path) -> Result<SessionSummary> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_one_file_per_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = JsonSummaryWriter::in_dir(dir.path().join("sessions"));

        let mut summary = SessionSummary::new(PathBuf::from("/work"), "abc-123");
        summary.tool_counts.insert("Bash".to_string(), 2);
        let path = writer.write_summary(&summary).unwrap();

        assert_eq!(path, dir.path().join("sessions").join("abc-123.json"));
        let loaded = read_summary(&path).unwrap();
        assert_eq!(loaded.session_id, "abc-123");
        assert_eq!(loaded.tool_counts["Bash"], 2);
        assert!(!loaded.is_complete());
    }

    #[test]
    fn test_explicit_file_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.json");
        let mut writer = JsonSummaryWriter::to_file(&target);

        let summary = SessionSummary::new(PathBuf::from("/work"), "s1");
        assert_eq!(writer.write_summary(&summary).unwrap(), target);
        assert!(target.exists());
    }

    #[test]
    fn test_file_stem_sanitizes() {
        assert_eq!(file_stem("../../etc/passwd"), "______etc_passwd");
        assert_eq!(file_stem(""), "session");
        assert_eq!(file_stem("unknown"), "unknown");
    }
}
