//! Merger core: progress/event model, task states and the pure session state machine.
mod effect;
mod file_item;
mod msg;
mod progress;
mod state;
mod task_state;
mod update;
mod view_model;

pub use effect::Effect;
pub use file_item::{has_accepted_extension, FileItem, FileStatus, ACCEPTED_EXTENSIONS};
pub use msg::Msg;
pub use progress::{carry_forward, ProgressEvent, ReportLevel};
pub use state::{MergeSession, DEFAULT_CHUNK_SIZE, DEFAULT_OUTPUT_FILENAME};
pub use task_state::{StateChange, TaskFault, TaskState};
pub use update::update;
pub use view_model::{FileRowView, SessionView};
