//! Turns session messages into terminal output.
//!
//! Text mode prints the effective (carried-forward) report after each
//! progress message; JSON mode prints every raw controller event as one line.

use merger_core::{
    FileStatus, MergeSession, Msg, ProgressEvent, ReportLevel, SessionView, StateChange,
};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum JsonLine<'a> {
    Progress {
        at: &'a str,
        #[serde(flatten)]
        event: &'a ProgressEvent,
    },
    State {
        at: &'a str,
        #[serde(flatten)]
        change: &'a StateChange,
    },
    Busy {
        at: &'a str,
        busy: bool,
    },
}

/// Output for `msg` once it has been applied to `session`, if any.
pub fn line(mode: OutputMode, msg: &Msg, session: &MergeSession, at: &str) -> Option<String> {
    match mode {
        OutputMode::Text => text_line(msg, session, at),
        OutputMode::Json => json_line(msg, at),
    }
}

fn text_line(msg: &Msg, session: &MergeSession, at: &str) -> Option<String> {
    match msg {
        Msg::Progress(_) => {
            let report = session.last_report()?;
            let content = report.content.as_deref().unwrap_or_default();
            let percent = report
                .progress_value
                .map(|v| format!("{v}%"))
                .unwrap_or_default();
            Some(format!(
                "{at} {:>8} {percent:>4} {:<11} {content}",
                report.progress_text.as_deref().unwrap_or_default(),
                level_label(report.level),
            ))
        }
        Msg::StateChanged(change) if change.current.is_terminal() => session
            .log()
            .first()
            .map(|entry| format!("{at} {entry}")),
        _ => None,
    }
}

fn json_line(msg: &Msg, at: &str) -> Option<String> {
    let line = match msg {
        Msg::Progress(event) => JsonLine::Progress { at, event },
        Msg::StateChanged(change) => JsonLine::State { at, change },
        Msg::BusyChanged(busy) => JsonLine::Busy { at, busy: *busy },
        _ => return None,
    };
    serde_json::to_string(&line).ok()
}

fn level_label(level: ReportLevel) -> &'static str {
    match level {
        ReportLevel::Information => "info",
        ReportLevel::Warning => "warning",
        ReportLevel::Error => "error",
        ReportLevel::Success => "success",
        ReportLevel::Detail => "detail",
        ReportLevel::StatusUpdate => "status",
        ReportLevel::ProcessStart => "start",
        ReportLevel::ProcessEnd => "end",
        ReportLevel::ProcessCancelled => "cancelled",
    }
}

/// Closing table: one row per file plus the destination.
pub fn summary(view: &SessionView) -> Vec<String> {
    let mut lines: Vec<String> = view
        .files
        .iter()
        .map(|row| format!("  {:<10} {}", row.status.label(), row.path.display()))
        .collect();
    if let Some(destination) = &view.destination {
        let verb = if view.files.iter().all(|row| row.status == FileStatus::Done) {
            "written to"
        } else {
            "not written:"
        };
        lines.push(format!("  output {verb} {}", destination.display()));
    }
    lines
}
