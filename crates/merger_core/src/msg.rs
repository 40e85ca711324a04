use std::path::PathBuf;

use crate::{ProgressEvent, StateChange};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Files dropped onto (or passed to) the merge list.
    FilesDropped(Vec<PathBuf>),
    /// User cleared the merge list.
    ClearFiles,
    /// User picked the output folder.
    OutputFolderChosen(PathBuf),
    /// User edited the output file name.
    OutputFilenameChanged(String),
    /// User edited the key column index.
    KeyColumnChanged(usize),
    /// User edited the progress chunk size.
    ChunkSizeChanged(usize),
    /// User clicked Start.
    StartClicked,
    /// User clicked Cancel.
    CancelClicked,
    /// Progress report forwarded from the running task.
    Progress(ProgressEvent),
    /// Task controller state transition.
    StateChanged(StateChange),
    /// Task controller busy flag flipped.
    BusyChanged(bool),
}
