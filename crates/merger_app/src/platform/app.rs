use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Result};
use chrono::Local;
use engine_logging::{engine_info, engine_warn};
use merger_core::{has_accepted_extension, update, Effect, MergeSession, Msg, TaskState};
use tokio::sync::mpsc;

use super::effects::EffectRunner;
use super::render::{self, OutputMode};
use crate::cli::Cli;

pub async fn run_app(cli: Cli) -> Result<ExitCode> {
    engine_logging::initialize(cli.log_destination(), cli.log_level());
    engine_info!("merger {} starting", env!("CARGO_PKG_VERSION"));

    let settings = cli.settings()?;
    let mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    let mut app = App::new(mode);

    for path in cli.files.iter().filter(|p| !has_accepted_extension(p)) {
        engine_warn!("Skipping {:?}: not an .xls/.xlsx file", path);
        eprintln!("skipping {}: not an .xls/.xlsx file", path.display());
    }
    app.dispatch(Msg::FilesDropped(cli.files.clone()));
    match cli.output_folder() {
        Some(folder) => app.dispatch(Msg::OutputFolderChosen(folder)),
        None if app.session.output_folder().is_none() => {
            app.dispatch(Msg::OutputFolderChosen(PathBuf::from(".")))
        }
        None => Vec::new(),
    };
    app.dispatch(Msg::OutputFilenameChanged(settings.output_filename.clone()));
    app.dispatch(Msg::KeyColumnChanged(settings.key_column_index));
    app.dispatch(Msg::ChunkSizeChanged(settings.chunk_size));
    if !app.session.can_start() {
        bail!("nothing to merge: no .xls/.xlsx files were given");
    }

    let (msg_tx, mut msg_rx) = mpsc::unbounded_channel();
    let mut effects = EffectRunner::new(settings, msg_tx);
    effects.run(app.dispatch(Msg::StartClicked));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;
    let mut cancel_sent = false;

    while !app.is_finished() {
        tokio::select! {
            msg = msg_rx.recv() => match msg {
                Some(msg) => effects.run(app.dispatch(msg)),
                None => break,
            },
            signal = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                match signal {
                    Ok(()) => engine_warn!("Interrupted; cancelling merge"),
                    Err(err) => engine_warn!("Ctrl-C handler failed: {}", err),
                }
            }
        }
        // The busy flag may not have arrived yet when Ctrl-C is pressed.
        if interrupted && !cancel_sent && app.session.can_cancel() {
            let cancel = app.dispatch(Msg::CancelClicked);
            cancel_sent = !cancel.is_empty();
            effects.run(cancel);
        }
    }

    if let Some(handle) = effects.take_handle() {
        let state = tokio::task::spawn_blocking(move || handle.join()).await?;
        engine_info!("Merge worker ended as {:?}", state);
    }

    if mode == OutputMode::Text {
        for line in render::summary(&app.session.view()) {
            println!("{line}");
        }
    }
    Ok(exit_code(app.session.task_state()))
}

/// The session plus how its changes are shown.
struct App {
    session: MergeSession,
    mode: OutputMode,
}

impl App {
    fn new(mode: OutputMode) -> Self {
        Self {
            session: MergeSession::new(),
            mode,
        }
    }

    fn dispatch(&mut self, msg: Msg) -> Vec<Effect> {
        let shown = msg.clone();
        let session = std::mem::take(&mut self.session);
        let (session, effects) = update(session, msg);
        self.session = session;

        if self.session.consume_dirty() {
            let now = Local::now();
            let at = match self.mode {
                OutputMode::Text => now.format("%H:%M:%S").to_string(),
                OutputMode::Json => now.to_rfc3339(),
            };
            if let Some(line) = render::line(self.mode, &shown, &self.session, &at) {
                println!("{line}");
            }
        }
        effects
    }

    /// The run ended and the controller reported itself idle again.
    fn is_finished(&self) -> bool {
        self.session.task_state().is_terminal() && !self.session.is_busy()
    }
}

fn exit_code(state: TaskState) -> ExitCode {
    match state {
        TaskState::Completed => ExitCode::SUCCESS,
        TaskState::Cancelled => ExitCode::from(130),
        _ => ExitCode::FAILURE,
    }
}
