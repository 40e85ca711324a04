use std::thread;
use std::time::Duration;

use engine_logging::{engine_info, engine_warn};
use merger_core::{Effect, Msg};
use merger_engine::{MergeJob, MergeSettings, Subscription, TaskController, TaskEvent, TaskHandle};
use tokio::sync::mpsc::UnboundedSender;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Executes session effects against the task controller.
pub struct EffectRunner {
    controller: TaskController,
    settings: MergeSettings,
    handle: Option<TaskHandle>,
}

impl EffectRunner {
    pub fn new(settings: MergeSettings, msg_tx: UnboundedSender<Msg>) -> Self {
        let controller = TaskController::new();
        spawn_event_loop(controller.subscribe(), msg_tx);
        Self {
            controller,
            settings,
            handle: None,
        }
    }

    pub fn run(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::StartMerge {
                    sources,
                    destination,
                    key_column_index,
                    chunk_size,
                } => {
                    engine_info!(
                        "StartMerge files={} destination={:?}",
                        sources.len(),
                        destination
                    );
                    let job = MergeJob {
                        sources,
                        destination,
                        settings: MergeSettings {
                            key_column_index,
                            chunk_size,
                            ..self.settings.clone()
                        },
                    };
                    if let Some(handle) = self
                        .controller
                        .start(move |cancel, sink| job.run(&cancel, sink))
                    {
                        self.handle = Some(handle);
                    }
                }
                Effect::CancelMerge => {
                    if !self.controller.request_cancel() {
                        engine_warn!("CancelMerge with no running merge");
                    }
                }
            }
        }
    }

    /// Worker of the last started merge.
    pub fn take_handle(&mut self) -> Option<TaskHandle> {
        self.handle.take()
    }
}

/// Forwards controller events as session messages until the receiver goes away.
fn spawn_event_loop(subscription: Subscription, msg_tx: UnboundedSender<Msg>) {
    thread::spawn(move || loop {
        match subscription.recv_timeout(POLL_INTERVAL) {
            Some(event) => {
                if msg_tx.send(to_msg(event)).is_err() {
                    break;
                }
            }
            None if msg_tx.is_closed() => break,
            None => {}
        }
    });
}

fn to_msg(event: TaskEvent) -> Msg {
    match event {
        TaskEvent::Progress(progress) => Msg::Progress(progress),
        TaskEvent::StateChanged(change) => Msg::StateChanged(change),
        TaskEvent::BusyChanged(busy) => Msg::BusyChanged(busy),
    }
}
