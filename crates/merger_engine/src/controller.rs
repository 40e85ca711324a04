//! Single-task lifecycle controller.
//!
//! A [`TaskController`] runs at most one unit of blocking work at a time on a
//! dedicated worker thread. It owns the cancellation token of the current
//! run and publishes progress reports and state transitions to any number of
//! subscribers without ever blocking the worker on their delivery.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use engine_logging::{engine_debug, engine_info, engine_warn};
use merger_core::{ProgressEvent, ReportLevel, StateChange, TaskFault, TaskState};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::sink::ProgressSink;

/// Outcome of a unit of work. A non-blank `Err` message is a logical failure.
pub type WorkResult = Result<(), String>;

/// Everything a subscriber can observe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    Progress(ProgressEvent),
    StateChanged(StateChange),
    BusyChanged(bool),
}

pub type SubscriptionId = u64;

/// Receiving end of [`TaskController::subscribe`].
pub struct Subscription {
    id: SubscriptionId,
    rx: mpsc::Receiver<TaskEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn try_recv(&self) -> Option<TaskEvent> {
        self.rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<TaskEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Everything queued right now.
    pub fn drain(&self) -> Vec<TaskEvent> {
        self.rx.try_iter().collect()
    }
}

/// Handle to a started task's worker thread.
pub struct TaskHandle {
    join: thread::JoinHandle<TaskState>,
}

impl TaskHandle {
    /// Blocks until the worker ends and returns its terminal state.
    pub fn join(self) -> TaskState {
        self.join.join().unwrap_or(TaskState::Faulted)
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

#[derive(Default)]
struct Observers {
    next_id: AtomicU64,
    senders: Mutex<Vec<(SubscriptionId, mpsc::Sender<TaskEvent>)>>,
}

impl Observers {
    fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel();
        lock(&self.senders).push((id, tx));
        Subscription { id, rx }
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut senders = lock(&self.senders);
        let before = senders.len();
        senders.retain(|(sub, _)| *sub != id);
        senders.len() != before
    }

    /// Sends to every subscriber, pruning the ones that hung up.
    fn broadcast(&self, event: TaskEvent) {
        lock(&self.senders).retain(|(_, tx)| tx.send(event.clone()).is_ok());
    }
}

struct Shared {
    observers: Observers,
    state: watch::Sender<TaskState>,
    /// Token of the current (or last) run.
    cancel: Mutex<Option<CancellationToken>>,
}

impl Shared {
    fn transition(&self, next: TaskState, fault: Option<TaskFault>) {
        let previous = self.state.send_replace(next);
        engine_debug!("Task state {:?} -> {:?}", previous, next);
        self.observers.broadcast(TaskEvent::StateChanged(StateChange {
            previous,
            current: next,
            fault,
        }));
        if previous.is_busy() != next.is_busy() {
            self.observers.broadcast(TaskEvent::BusyChanged(next.is_busy()));
        }
    }
}

/// Forwards the worker's reports to the controller's subscribers.
struct ObserverSink {
    shared: Arc<Shared>,
}

impl ProgressSink for ObserverSink {
    fn emit(&self, event: ProgressEvent) {
        self.shared.observers.broadcast(TaskEvent::Progress(event));
    }
}

#[derive(Clone)]
pub struct TaskController {
    shared: Arc<Shared>,
}

impl Default for TaskController {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskController {
    pub fn new() -> Self {
        let (state, _) = watch::channel(TaskState::Idle);
        Self {
            shared: Arc::new(Shared {
                observers: Observers::default(),
                state,
                cancel: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> TaskState {
        *self.shared.state.borrow()
    }

    pub fn is_busy(&self) -> bool {
        self.state().is_busy()
    }

    /// Latest state for async consumers. Intermediate states may be coalesced;
    /// use [`TaskController::subscribe`] to see every transition.
    pub fn watch_state(&self) -> watch::Receiver<TaskState> {
        self.shared.state.subscribe()
    }

    pub fn subscribe(&self) -> Subscription {
        self.shared.observers.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.observers.unsubscribe(id)
    }

    /// Starts `work` on a worker thread unless a task is already running.
    ///
    /// While busy this only reports a warning and returns `None`; starts are
    /// never queued.
    pub fn start<F>(&self, work: F) -> Option<TaskHandle>
    where
        F: FnOnce(CancellationToken, Arc<dyn ProgressSink>) -> WorkResult + Send + 'static,
    {
        let token = {
            let mut slot = lock(&self.shared.cancel);
            if self.is_busy() {
                drop(slot);
                engine_warn!("Start requested while a task is running; ignored");
                self.shared.observers.broadcast(TaskEvent::Progress(ProgressEvent::message(
                    ReportLevel::Warning,
                    "a task is already running",
                )));
                return None;
            }
            let token = CancellationToken::new();
            *slot = Some(token.clone());
            self.shared.transition(TaskState::Starting, None);
            token
        };

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("merge-task".into())
            .spawn(move || run_task(shared, token, work));
        match spawned {
            Ok(join) => Some(TaskHandle { join }),
            Err(err) => {
                self.shared
                    .transition(TaskState::Faulted, Some(TaskFault::Spawn(err.to_string())));
                None
            }
        }
    }

    /// Signals the running task to stop. Returns whether a signal was sent.
    ///
    /// Does not wait; the task ends as Cancelled once its work notices.
    pub fn request_cancel(&self) -> bool {
        let slot = lock(&self.shared.cancel);
        if !self.is_busy() {
            return false;
        }
        match slot.as_ref() {
            Some(token) => {
                engine_info!("Cancellation requested");
                token.cancel();
                true
            }
            None => false,
        }
    }
}

fn run_task<F>(shared: Arc<Shared>, token: CancellationToken, work: F) -> TaskState
where
    F: FnOnce(CancellationToken, Arc<dyn ProgressSink>) -> WorkResult,
{
    shared.transition(TaskState::Running, None);
    let sink: Arc<dyn ProgressSink> = Arc::new(ObserverSink {
        shared: Arc::clone(&shared),
    });

    let started = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(token.clone(), sink)));
    let (state, fault) = match outcome {
        Ok(Ok(())) => (TaskState::Completed, None),
        Ok(Err(message)) if message.trim().is_empty() => (TaskState::Completed, None),
        Ok(Err(_)) if token.is_cancelled() => (TaskState::Cancelled, None),
        Ok(Err(message)) => (TaskState::Faulted, Some(TaskFault::Failed(message))),
        Err(payload) => (
            TaskState::Faulted,
            Some(TaskFault::Panicked(panic_message(payload.as_ref()))),
        ),
    };

    engine_info!(
        "Task finished as {:?} after {:.2?}{}",
        state,
        started.elapsed(),
        fault
            .as_ref()
            .map(|f| format!(": {f}"))
            .unwrap_or_default()
    );
    shared.transition(state, fault);
    state
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
