use std::path::{Path, PathBuf};

use crate::file_item::{has_accepted_extension, same_path_ignore_case};
use crate::progress::carry_forward;
use crate::view_model::{FileRowView, SessionView};
use crate::{FileItem, FileStatus, ProgressEvent, ReportLevel, TaskState};

pub const DEFAULT_OUTPUT_FILENAME: &str = "MergedFile.xlsx";
pub const DEFAULT_CHUNK_SIZE: usize = 2000;

/// Orchestration state for one merge window / shell session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSession {
    files: Vec<FileItem>,
    output_folder: Option<PathBuf>,
    output_filename: String,
    key_column_index: usize,
    chunk_size: usize,
    busy: bool,
    task_state: TaskState,
    last_report: Option<ProgressEvent>,
    /// Newest first.
    log: Vec<String>,
    dirty: bool,
}

impl Default for MergeSession {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            output_folder: None,
            output_filename: DEFAULT_OUTPUT_FILENAME.to_string(),
            key_column_index: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            busy: false,
            task_state: TaskState::Idle,
            last_report: None,
            log: Vec::new(),
            dirty: false,
        }
    }
}

impl MergeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> &[FileItem] {
        &self.files
    }

    pub fn output_folder(&self) -> Option<&Path> {
        self.output_folder.as_deref()
    }

    pub fn output_filename(&self) -> &str {
        &self.output_filename
    }

    pub fn key_column_index(&self) -> usize {
        self.key_column_index
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn task_state(&self) -> TaskState {
        self.task_state
    }

    pub fn last_report(&self) -> Option<&ProgressEvent> {
        self.last_report.as_ref()
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    pub fn destination(&self) -> Option<PathBuf> {
        let folder = self.output_folder.as_ref()?;
        if self.output_filename.trim().is_empty() {
            return None;
        }
        Some(folder.join(self.output_filename.trim()))
    }

    pub fn can_start(&self) -> bool {
        !self.busy && !self.files.is_empty() && self.destination().is_some()
    }

    pub fn can_cancel(&self) -> bool {
        self.busy
    }

    pub fn can_clear(&self) -> bool {
        !self.busy && !self.files.is_empty()
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            files: self
                .files
                .iter()
                .map(|item| FileRowView {
                    path: item.path().to_path_buf(),
                    name: item.display_name(),
                    status: item.status,
                })
                .collect(),
            destination: self.destination(),
            task_state: self.task_state,
            busy: self.busy,
            can_start: self.can_start(),
            can_cancel: self.can_cancel(),
            can_clear: self.can_clear(),
            progress_text: self
                .last_report
                .as_ref()
                .and_then(|r| r.progress_text.clone()),
            progress_value: self.last_report.as_ref().and_then(|r| r.progress_value),
            dirty: self.dirty,
        }
    }

    /// Returns whether anything changed since the last call, and resets the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Adds accepted, not-yet-listed files. Returns how many were added.
    pub(crate) fn add_files(&mut self, paths: &[PathBuf]) -> usize {
        if self.files.is_empty() {
            if let Some(parent) = paths.first().and_then(|p| p.parent()) {
                if !parent.as_os_str().is_empty() {
                    self.output_folder = Some(parent.to_path_buf());
                }
            }
        }
        let mut added = 0;
        for path in paths {
            if !has_accepted_extension(path) || self.files.iter().any(|f| f.matches(path)) {
                continue;
            }
            self.files.push(FileItem::new(path.clone()));
            added += 1;
        }
        self.dirty = true;
        added
    }

    pub(crate) fn clear_files(&mut self) {
        self.files.clear();
        self.dirty = true;
    }

    pub(crate) fn set_output_folder(&mut self, folder: PathBuf) {
        self.output_folder = Some(folder);
        self.dirty = true;
    }

    pub(crate) fn set_output_filename(&mut self, filename: String) {
        self.output_filename = filename;
        self.dirty = true;
    }

    pub(crate) fn set_key_column_index(&mut self, index: usize) {
        self.key_column_index = index;
        self.dirty = true;
    }

    pub(crate) fn set_chunk_size(&mut self, chunk_size: usize) {
        self.chunk_size = chunk_size.max(1);
        self.dirty = true;
    }

    pub(crate) fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
        self.dirty = true;
    }

    pub(crate) fn set_task_state(&mut self, state: TaskState) {
        self.task_state = state;
        self.dirty = true;
    }

    /// Clears per-run state before a new merge.
    pub(crate) fn reset_run(&mut self) {
        for item in &mut self.files {
            item.status = FileStatus::Waiting;
        }
        self.log.clear();
        self.last_report = None;
        self.dirty = true;
    }

    pub(crate) fn apply_progress(&mut self, event: &ProgressEvent) {
        self.last_report = Some(carry_forward(self.last_report.as_ref(), event));
        if let Some(content) = &event.content {
            self.push_log(content.clone());
        }
        if let Some(tag) = &event.tag {
            let status = match event.level {
                ReportLevel::Information | ReportLevel::StatusUpdate => {
                    Some(FileStatus::Processing)
                }
                ReportLevel::Detail => Some(FileStatus::Processed),
                ReportLevel::Error => Some(FileStatus::Failed),
                _ => None,
            };
            if let Some(status) = status {
                let item = self
                    .files
                    .iter_mut()
                    .find(|f| same_path_ignore_case(f.path(), tag));
                if let Some(item) = item {
                    item.status = status;
                }
            }
        }
        self.dirty = true;
    }

    /// Replaces the last effective report without touching the log.
    pub(crate) fn set_last_report(&mut self, report: ProgressEvent) {
        self.last_report = Some(report);
        self.dirty = true;
    }

    pub(crate) fn mark_files(&mut self, from: Option<FileStatus>, to: FileStatus) {
        for item in &mut self.files {
            if from.is_none_or(|from| item.status == from) {
                item.status = to;
            }
        }
        self.dirty = true;
    }

    pub(crate) fn push_log(&mut self, line: String) {
        self.log.insert(0, line);
        self.dirty = true;
    }
}
