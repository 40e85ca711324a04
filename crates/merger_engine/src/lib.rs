//! Merger engine: streaming spreadsheet merge and the task controller that runs it.
mod controller;
mod merge;
mod output;
mod persist;
mod reader;
mod settings;
mod sink;

pub use controller::{
    Subscription, SubscriptionId, TaskController, TaskEvent, TaskHandle, WorkResult,
};
pub use merge::{merge_files, overall_percent, MergeError, MergeJob, MergeSummary};
pub use persist::{commit_staged, ensure_output_dir, stage_beside, write_atomically, PersistError};
pub use reader::{cell_text, read_first_sheet, SourceError};
pub use settings::{MergeSettings, SettingsError, DEFAULT_SHEET_NAME, EXCEL_MAX_ROWS};
pub use sink::{ChannelProgressSink, ProgressSink};

pub use tokio_util::sync::CancellationToken;
