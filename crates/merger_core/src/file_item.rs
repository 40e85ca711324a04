use std::path::{Path, PathBuf};

/// Extensions accepted into the merge list.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["xls", "xlsx"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileStatus {
    #[default]
    Waiting,
    Processing,
    Processed,
    Done,
    Failed,
    Cancelled,
}

impl FileStatus {
    pub fn label(self) -> &'static str {
        match self {
            FileStatus::Waiting => "waiting",
            FileStatus::Processing => "processing...",
            FileStatus::Processed => "processed",
            FileStatus::Done => "done",
            FileStatus::Failed => "failed",
            FileStatus::Cancelled => "cancelled",
        }
    }
}

/// A source file in the merge list. The path is its identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileItem {
    path: PathBuf,
    pub status: FileStatus,
}

impl FileItem {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            status: FileStatus::Waiting,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }

    pub fn matches(&self, other: &Path) -> bool {
        same_path_ignore_case(&self.path, other)
    }
}

pub fn same_path_ignore_case(a: &Path, b: &Path) -> bool {
    a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
}

pub fn has_accepted_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| ACCEPTED_EXTENSIONS.contains(&ext.as_str()))
}
