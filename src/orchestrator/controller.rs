//! Task session controller.
//!
//! Owns the single tracked task, drives submission and status polling, and
//! emits events for presentation layers.

use super::lifecycle::{Lifecycle, PollOutcome};
use crate::api::TaskBackend;
use crate::model::{ClientConfig, InfoEvent, SessionEvent, TaskState};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::{Duration, Instant, Interval, MissedTickBehavior};

/// Commands emitted by UI layers to drive the session.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Submit(String),
    Reset,
    Download { dest_dir: PathBuf },
    Quit,
}

/// Poll timer for one task. Dropping it cancels every future tick.
struct PollHandle {
    task_id: String,
    ticker: Interval,
}

impl PollHandle {
    fn start(task_id: &str, period: Duration) -> Self {
        // First tick lands one full period after submission.
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        // A slow fetch delays the next tick instead of bunching catch-up ticks.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            task_id: task_id.to_string(),
            ticker,
        }
    }
}

async fn next_tick(poll: &mut Option<PollHandle>) -> String {
    match poll {
        Some(handle) => {
            handle.ticker.tick().await;
            handle.task_id.clone()
        }
        None => futures::future::pending().await,
    }
}

struct Session<B> {
    backend: Arc<B>,
    lifecycle: Lifecycle,
    poll_interval: Duration,
    poll: Option<PollHandle>,
    event_tx: UnboundedSender<SessionEvent>,
}

impl<B: TaskBackend + 'static> Session<B> {
    fn emit_state(&self) {
        let _ = self.event_tx.send(SessionEvent::StateChanged {
            state: self.lifecycle.state().clone(),
        });
    }

    fn emit_info(&self, info: InfoEvent) {
        let _ = self.event_tx.send(SessionEvent::Info(info));
    }

    async fn submit(&mut self, raw: &str) {
        let previous = self.lifecycle.state().task_id().map(str::to_owned);
        let Some(input) = self.lifecycle.begin_submit(raw) else {
            return;
        };
        if let Some(task_id) = previous {
            self.emit_info(InfoEvent::Abandoned { task_id });
        }
        self.poll = None;
        self.emit_state();

        // Commands queue up while the create request is outstanding; the
        // lifecycle refuses a second submit anyway.
        match self.backend.submit(&input).await {
            Ok(receipt) => {
                self.lifecycle.submit_succeeded(receipt);
                if let Some(task_id) = self.lifecycle.active_task() {
                    self.poll = Some(PollHandle::start(task_id, self.poll_interval));
                    self.emit_info(InfoEvent::Submitted {
                        task_id: task_id.to_string(),
                    });
                }
            }
            Err(e) => self.lifecycle.submit_failed(&e),
        }
        self.emit_state();
    }

    /// One status fetch. Awaited inline, so fetches never overlap.
    async fn poll_once(&mut self, task_id: &str) {
        match self.backend.task_status(task_id).await {
            Ok(snapshot) => {
                let before = self.lifecycle.state().clone();
                match self.lifecycle.apply_snapshot(task_id, snapshot) {
                    PollOutcome::Continue => {}
                    PollOutcome::Finished | PollOutcome::Stale => self.poll = None,
                }
                if self.lifecycle.state() != &before {
                    self.emit_state();
                }
            }
            Err(e) => self.lifecycle.poll_failed(task_id, &e),
        }
    }

    fn reset(&mut self) {
        self.poll = None;
        if let Some(task_id) = self.lifecycle.reset() {
            tracing::debug!(task_id = %task_id, "reset");
        }
        self.emit_state();
    }

    fn download(&self, dest_dir: PathBuf) {
        let Some(filename) = self.lifecycle.state().result_file().map(str::to_owned) else {
            self.emit_info(InfoEvent::Message("No finished package to download".into()));
            return;
        };
        let backend = Arc::clone(&self.backend);
        let event_tx = self.event_tx.clone();
        // Runs beside the loop so Quit and Reset stay responsive during a long transfer.
        tokio::spawn(async move {
            let info = match backend.download(&filename, &dest_dir).await {
                Ok(path) => InfoEvent::Saved { path },
                Err(e) => {
                    tracing::warn!(error = %e, "package download failed");
                    InfoEvent::SaveFailed {
                        reason: e.to_string(),
                    }
                }
            };
            let _ = event_tx.send(SessionEvent::Info(info));
        });
    }
}

/// Run the task session until a `Quit` command or the command channel closes.
/// Returns the state the session ended in.
pub(crate) async fn run_controller<B: TaskBackend + 'static>(
    backend: Arc<B>,
    cfg: &ClientConfig,
    event_tx: UnboundedSender<SessionEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<TaskState> {
    if cfg.poll_interval.is_zero() {
        anyhow::bail!("poll interval must be greater than zero");
    }

    let mut session = Session {
        backend,
        lifecycle: Lifecycle::new(cfg.progress_policy),
        poll_interval: cfg.poll_interval,
        poll: None,
        event_tx,
    };

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Submit(input)) => session.submit(&input).await,
                    Some(UiCommand::Reset) => session.reset(),
                    Some(UiCommand::Download { dest_dir }) => session.download(dest_dir),
                    Some(UiCommand::Quit) | None => break,
                }
            }
            task_id = next_tick(&mut session.poll) => {
                session.poll_once(&task_id).await;
            }
        }
    }

    if let Some(task_id) = session.lifecycle.active_task() {
        tracing::info!(task_id, "session closed while task still running");
    }
    Ok(session.lifecycle.state().clone())
}
