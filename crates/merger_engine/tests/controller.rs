mod common;

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use common::{init_logging, write_xlsx};
use merger_core::{ProgressEvent, ReportLevel, StateChange, TaskFault, TaskState};
use merger_engine::{MergeError, MergeJob, MergeSettings, TaskController, TaskEvent};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(10);

fn state_changes(events: &[TaskEvent]) -> Vec<(TaskState, TaskState)> {
    events
        .iter()
        .filter_map(|event| match event {
            TaskEvent::StateChanged(StateChange {
                previous, current, ..
            }) => Some((*previous, *current)),
            _ => None,
        })
        .collect()
}

#[test]
fn successful_work_walks_through_states() {
    init_logging();
    let controller = TaskController::new();
    let subscription = controller.subscribe();
    assert_eq!(controller.state(), TaskState::Idle);

    let handle = controller
        .start(|_cancel, sink| {
            sink.emit(ProgressEvent::message(ReportLevel::Information, "working"));
            Ok(())
        })
        .unwrap();
    assert_eq!(handle.join(), TaskState::Completed);
    assert_eq!(controller.state(), TaskState::Completed);
    assert!(!controller.is_busy());

    let events = subscription.drain();
    assert_eq!(
        state_changes(&events),
        vec![
            (TaskState::Idle, TaskState::Starting),
            (TaskState::Starting, TaskState::Running),
            (TaskState::Running, TaskState::Completed),
        ]
    );
    assert_eq!(
        events
            .iter()
            .filter_map(|e| match e {
                TaskEvent::BusyChanged(busy) => Some(*busy),
                _ => None,
            })
            .collect::<Vec<_>>(),
        vec![true, false]
    );
    assert!(events.contains(&TaskEvent::Progress(ProgressEvent::message(
        ReportLevel::Information,
        "working"
    ))));
}

#[test]
fn blank_failure_message_counts_as_success() {
    init_logging();
    let controller = TaskController::new();
    let handle = controller.start(|_, _| Err("   ".to_string())).unwrap();
    assert_eq!(handle.join(), TaskState::Completed);
}

#[test]
fn failure_message_faults_the_task() {
    init_logging();
    let controller = TaskController::new();
    let subscription = controller.subscribe();

    let handle = controller
        .start(|_, _| Err("file 'b.xlsx': header row does not match the first file".into()))
        .unwrap();
    assert_eq!(handle.join(), TaskState::Faulted);

    let fault = subscription
        .drain()
        .into_iter()
        .find_map(|event| match event {
            TaskEvent::StateChanged(change) if change.current == TaskState::Faulted => change.fault,
            _ => None,
        })
        .unwrap();
    assert_eq!(
        fault,
        TaskFault::Failed("file 'b.xlsx': header row does not match the first file".into())
    );
}

#[test]
fn panicking_work_faults_with_its_message() {
    init_logging();
    let controller = TaskController::new();
    let subscription = controller.subscribe();

    let handle = controller.start(|_, _| panic!("boom")).unwrap();
    assert_eq!(handle.join(), TaskState::Faulted);

    let fault = subscription
        .drain()
        .into_iter()
        .find_map(|event| match event {
            TaskEvent::StateChanged(change) => change.fault,
            _ => None,
        })
        .unwrap();
    assert_eq!(fault, TaskFault::Panicked("boom".into()));
}

#[test]
fn start_while_busy_warns_and_does_not_start() {
    init_logging();
    let controller = TaskController::new();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let handle = controller
        .start(move |_, _| {
            let _ = release_rx.recv();
            Ok(())
        })
        .unwrap();
    assert!(controller.is_busy());

    let subscription = controller.subscribe();
    let second = controller.start(|_, _| Err("must not run".into()));
    assert!(second.is_none());
    // The worker's own Running transition may be queued first.
    let warning = std::iter::from_fn(|| subscription.recv_timeout(WAIT))
        .find(|event| matches!(event, TaskEvent::Progress(_)));
    assert_eq!(
        warning,
        Some(TaskEvent::Progress(ProgressEvent::message(
            ReportLevel::Warning,
            "a task is already running"
        )))
    );

    release_tx.send(()).unwrap();
    assert_eq!(handle.join(), TaskState::Completed);

    // Terminal states accept a new start.
    let again = controller.start(|_, _| Ok(())).unwrap();
    assert_eq!(again.join(), TaskState::Completed);
}

#[test]
fn cancel_while_busy_ends_cancelled() {
    init_logging();
    let controller = TaskController::new();
    let (started_tx, started_rx) = mpsc::channel::<()>();

    let handle = controller
        .start(move |cancel, _| {
            let _ = started_tx.send(());
            while !cancel.is_cancelled() {
                thread::sleep(Duration::from_millis(5));
            }
            Err(MergeError::Cancelled.to_string())
        })
        .unwrap();

    started_rx.recv_timeout(WAIT).unwrap();
    assert_eq!(controller.state(), TaskState::Running);
    assert!(controller.request_cancel());
    // Cancellation is out of band; the state only changes once the work notices.
    assert_eq!(handle.join(), TaskState::Cancelled);
    assert!(!controller.request_cancel());
}

#[test]
fn cancel_when_idle_is_a_noop() {
    init_logging();
    let controller = TaskController::new();
    let subscription = controller.subscribe();
    assert!(!controller.request_cancel());
    assert!(subscription.drain().is_empty());
    assert_eq!(controller.state(), TaskState::Idle);
}

#[test]
fn each_start_gets_a_fresh_token() {
    init_logging();
    let controller = TaskController::new();
    let (token_tx, token_rx) = mpsc::channel();

    let first_tx = token_tx.clone();
    controller
        .start(move |cancel, _| {
            first_tx.send(cancel).unwrap();
            Ok(())
        })
        .unwrap()
        .join();
    let first = token_rx.recv().unwrap();

    controller
        .start(move |cancel, _| {
            token_tx.send(cancel).unwrap();
            Ok(())
        })
        .unwrap()
        .join();
    let second = token_rx.recv().unwrap();

    second.cancel();
    assert!(second.is_cancelled());
    assert!(!first.is_cancelled());
}

#[test]
fn unsubscribed_observers_stop_receiving() {
    init_logging();
    let controller = TaskController::new();
    let kept = controller.subscribe();
    let dropped = controller.subscribe();
    assert!(controller.unsubscribe(dropped.id()));
    assert!(!controller.unsubscribe(dropped.id()));

    controller.start(|_, _| Ok(())).unwrap().join();

    assert!(dropped.drain().is_empty());
    assert!(!kept.drain().is_empty());
}

#[tokio::test]
async fn watch_state_reports_terminal_state() {
    init_logging();
    let controller = TaskController::new();
    let mut state = controller.watch_state();

    let _handle = controller.start(|_, _| Ok(())).unwrap();
    let terminal = tokio::time::timeout(WAIT, state.wait_for(|s| s.is_terminal()))
        .await
        .unwrap()
        .map(|s| *s)
        .unwrap();
    assert_eq!(terminal, TaskState::Completed);
}

#[test]
fn merge_job_cancelled_before_first_file_leaves_no_output() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let a = write_xlsx(temp.path(), "a.xlsx", &[&["id"], &["1"]]);
    let destination = temp.path().join("merged.xlsx");
    let job = MergeJob {
        sources: vec![a],
        destination: destination.clone(),
        settings: MergeSettings::default(),
    };

    let controller = TaskController::new();
    let (go_tx, go_rx) = mpsc::channel::<()>();
    let handle = controller
        .start(move |cancel, sink| {
            let _ = go_rx.recv();
            job.run(&cancel, sink)
        })
        .unwrap();

    assert!(controller.request_cancel());
    go_tx.send(()).unwrap();

    assert_eq!(handle.join(), TaskState::Cancelled);
    assert!(!destination.exists());
}

#[test]
fn merge_job_runs_to_completion_through_controller() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let a = write_xlsx(temp.path(), "a.xlsx", &[&["id", "name"], &["1", "x"], &["", "y"]]);
    let b = write_xlsx(temp.path(), "b.xlsx", &[&["id", "name"], &["2", "z"]]);
    let destination = temp.path().join("merged.xlsx");
    let job = MergeJob {
        sources: vec![a.clone(), b],
        destination: destination.clone(),
        settings: MergeSettings::default(),
    };

    let controller = TaskController::new();
    let subscription = controller.subscribe();
    let handle = controller.start(move |cancel, sink| job.run(&cancel, sink)).unwrap();
    assert_eq!(handle.join(), TaskState::Completed);
    assert!(destination.exists());

    let progress: Vec<ProgressEvent> = subscription
        .drain()
        .into_iter()
        .filter_map(|event| match event {
            TaskEvent::Progress(p) => Some(p),
            _ => None,
        })
        .collect();
    assert_eq!(progress.first().unwrap().level, ReportLevel::ProcessStart);
    assert_eq!(progress.last().unwrap().level, ReportLevel::Success);
    assert!(progress
        .iter()
        .any(|p| p.level == ReportLevel::Detail && p.tag.as_deref() == Some(a.as_path())));
}

#[test]
fn merge_job_failure_faults_with_engine_message() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let a = write_xlsx(temp.path(), "a.xlsx", &[&["A", "B"]]);
    let b = write_xlsx(temp.path(), "b.xlsx", &[&["A", "C"]]);
    let job = MergeJob {
        sources: vec![a, b],
        destination: temp.path().join("merged.xlsx"),
        settings: MergeSettings::default(),
    };

    let controller = TaskController::new();
    let subscription = controller.subscribe();
    let handle = controller.start(move |cancel, sink| job.run(&cancel, sink)).unwrap();
    assert_eq!(handle.join(), TaskState::Faulted);

    let fault = subscription
        .drain()
        .into_iter()
        .find_map(|event| match event {
            TaskEvent::StateChanged(change) => change.fault,
            _ => None,
        })
        .unwrap();
    assert!(fault.message().contains("b.xlsx"));
}
