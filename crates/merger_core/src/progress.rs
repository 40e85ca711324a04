use std::path::{Path, PathBuf};

use serde::Serialize;

/// Severity / kind of a progress report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ReportLevel {
    Information,
    Warning,
    Error,
    Success,
    /// Per-file completion marker; `tag` names the file.
    Detail,
    StatusUpdate,
    ProcessStart,
    ProcessEnd,
    ProcessCancelled,
}

/// One unit of reportable progress.
///
/// Every optional field is independent. `None` means "unchanged since the
/// previous event", not "cleared"; consumers resolve that with
/// [`carry_forward`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub content: Option<String>,
    pub progress_text: Option<String>,
    pub progress_value: Option<u8>,
    pub level: ReportLevel,
    pub tag: Option<PathBuf>,
}

impl ProgressEvent {
    pub fn new(level: ReportLevel) -> Self {
        Self {
            content: None,
            progress_text: None,
            progress_value: None,
            level,
            tag: None,
        }
    }

    /// Event with just a log line.
    pub fn message(level: ReportLevel, content: impl Into<String>) -> Self {
        Self::new(level).with_content(content)
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_progress_text(mut self, text: impl Into<String>) -> Self {
        self.progress_text = Some(text.into());
        self
    }

    /// Percent is clamped to 100.
    pub fn with_progress_value(mut self, percent: u8) -> Self {
        self.progress_value = Some(percent.min(100));
        self
    }

    pub fn with_tag(mut self, tag: impl AsRef<Path>) -> Self {
        self.tag = Some(tag.as_ref().to_path_buf());
        self
    }
}

/// Resolve `incoming` against the last effective event.
///
/// `content`, `progress_text` and `progress_value` fall back to `last` when
/// absent; `level` and `tag` always describe the incoming event.
pub fn carry_forward(last: Option<&ProgressEvent>, incoming: &ProgressEvent) -> ProgressEvent {
    let Some(last) = last else {
        return incoming.clone();
    };
    ProgressEvent {
        content: incoming.content.clone().or_else(|| last.content.clone()),
        progress_text: incoming
            .progress_text
            .clone()
            .or_else(|| last.progress_text.clone()),
        progress_value: incoming.progress_value.or(last.progress_value),
        level: incoming.level,
        tag: incoming.tag.clone(),
    }
}
