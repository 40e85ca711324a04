use std::path::PathBuf;

use crate::{FileStatus, TaskState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub files: Vec<FileRowView>,
    pub destination: Option<PathBuf>,
    pub task_state: TaskState,
    pub busy: bool,
    pub can_start: bool,
    pub can_cancel: bool,
    pub can_clear: bool,
    pub progress_text: Option<String>,
    pub progress_value: Option<u8>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRowView {
    pub path: PathBuf,
    pub name: String,
    pub status: FileStatus,
}
