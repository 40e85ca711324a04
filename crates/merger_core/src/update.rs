use crate::{
    Effect, FileStatus, MergeSession, Msg, ProgressEvent, ReportLevel, StateChange, TaskState,
};

/// Pure update function: applies a message to the session and returns any effects.
pub fn update(mut session: MergeSession, msg: Msg) -> (MergeSession, Vec<Effect>) {
    let effects = match msg {
        Msg::FilesDropped(paths) => {
            if !paths.is_empty() {
                session.add_files(&paths);
            }
            Vec::new()
        }
        Msg::ClearFiles => {
            if session.can_clear() {
                session.clear_files();
            }
            Vec::new()
        }
        Msg::OutputFolderChosen(folder) => {
            session.set_output_folder(folder);
            Vec::new()
        }
        Msg::OutputFilenameChanged(name) => {
            session.set_output_filename(name);
            Vec::new()
        }
        Msg::KeyColumnChanged(index) => {
            session.set_key_column_index(index);
            Vec::new()
        }
        Msg::ChunkSizeChanged(size) => {
            session.set_chunk_size(size);
            Vec::new()
        }
        Msg::StartClicked => match session.destination() {
            Some(destination) if session.can_start() => {
                session.reset_run();
                let sources = session
                    .files()
                    .iter()
                    .map(|item| item.path().to_path_buf())
                    .collect();
                vec![Effect::StartMerge {
                    sources,
                    destination,
                    key_column_index: session.key_column_index(),
                    chunk_size: session.chunk_size(),
                }]
            }
            _ => Vec::new(),
        },
        Msg::CancelClicked => {
            if session.can_cancel() {
                vec![Effect::CancelMerge]
            } else {
                Vec::new()
            }
        }
        Msg::Progress(event) => {
            session.apply_progress(&event);
            Vec::new()
        }
        Msg::StateChanged(change) => {
            apply_state_change(&mut session, change);
            Vec::new()
        }
        Msg::BusyChanged(busy) => {
            session.set_busy(busy);
            Vec::new()
        }
    };

    (session, effects)
}

fn apply_state_change(session: &mut MergeSession, change: StateChange) {
    session.set_task_state(change.current);
    let last_percent = session.last_report().and_then(|r| r.progress_value);

    let line = match change.current {
        TaskState::Completed => {
            session.set_last_report(
                ProgressEvent::message(ReportLevel::Success, "merge complete")
                    .with_progress_text("✓")
                    .with_progress_value(100),
            );
            session.mark_files(None, FileStatus::Done);
            "[merge completed] output file saved".to_string()
        }
        TaskState::Faulted => {
            let reason = change
                .fault
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default();
            let mut report = ProgressEvent::message(ReportLevel::Error, format!("error: {reason}"))
                .with_progress_text("Error");
            report.progress_value = last_percent;
            session.set_last_report(report);
            session.mark_files(Some(FileStatus::Processing), FileStatus::Failed);
            format!("[merge failed] {reason}")
        }
        TaskState::Cancelled => {
            let mut report =
                ProgressEvent::message(ReportLevel::ProcessCancelled, "merge cancelled by user")
                    .with_progress_text("Cancelled");
            report.progress_value = last_percent;
            session.set_last_report(report);
            session.mark_files(Some(FileStatus::Processing), FileStatus::Cancelled);
            "[merge cancelled]".to_string()
        }
        other => format!("task state: {other:?}"),
    };
    session.push_log(line);
}
