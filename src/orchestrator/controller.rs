//! Run lifecycle controller.
//!
//! Owns start/cancel orchestration and the command loop that drives the
//! runner from presentation layers. One run at a time: a start during an
//! active run is rejected, never queued.

use crate::audit::AuditSink;
use crate::catalog::StepCatalog;
use crate::engine::{lock_state, MaintenanceEngine, RunState};
use crate::exec::CommandRunner;
use crate::model::{RunConfig, RunEvent, RunSummary};
use anyhow::Result;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StartError {
    #[error("a maintenance run is already active")]
    AlreadyRunning,
}

/// Commands emitted by UI layers to control the runner.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Start,
    Cancel,
    Quit,
}

/// One-run-at-a-time orchestrator over the step catalog.
pub struct MaintenanceRunner {
    cfg: RunConfig,
    catalog: StepCatalog,
    runner: Arc<dyn CommandRunner>,
    state: Arc<Mutex<RunState>>,
}

impl MaintenanceRunner {
    pub fn new(cfg: RunConfig, catalog: StepCatalog, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            cfg,
            catalog,
            runner,
            state: Arc::new(Mutex::new(RunState::idle())),
        }
    }

    /// Begin a run on a background task, reporting progress on `event_tx`.
    ///
    /// Non-blocking. While a run is active this is rejected with
    /// `AlreadyRunning`, without touching the in-flight run or emitting any
    /// event on `event_tx`.
    pub fn start(
        &self,
        event_tx: UnboundedSender<RunEvent>,
    ) -> Result<JoinHandle<RunSummary>, StartError> {
        {
            let mut st = lock_state(&self.state);
            if st.running {
                return Err(StartError::AlreadyRunning);
            }
            st.running = true;
            st.cancel_requested = false;
            st.current_step = 0;
        }
        let engine = MaintenanceEngine::new(self.cfg.clone(), self.catalog.clone());
        let runner = self.runner.clone();
        let state = self.state.clone();
        Ok(tokio::spawn(
            async move { engine.run(runner, event_tx, state).await },
        ))
    }

    /// Request cooperative cancellation. No-op when idle, idempotent while
    /// running. Takes effect at the next step boundary, never mid-step.
    pub fn request_cancel(&self) {
        let mut st = lock_state(&self.state);
        if st.running {
            st.cancel_requested = true;
        }
    }

    #[cfg(test)]
    pub(crate) fn state_snapshot(&self) -> RunState {
        lock_state(&self.state).clone()
    }
}

/// Drive the runner from UI commands and observe run completion.
///
/// Quit is serialized behind the active run: it requests cancellation and
/// breaks once the run task finishes, so the audit trail ends cleanly.
pub(crate) async fn run_controller(
    runner: Arc<MaintenanceRunner>,
    event_tx: UnboundedSender<RunEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
    audit: AuditSink,
) -> Result<()> {
    let mut active: Option<JoinHandle<RunSummary>> = None;
    let mut quit_pending = false;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Start) => match runner.start(event_tx.clone()) {
                        Ok(handle) => active = Some(handle),
                        Err(StartError::AlreadyRunning) => {
                            audit.warn("start requested while a run is active; ignored");
                        }
                    },
                    Some(UiCommand::Cancel) => runner.request_cancel(),
                    Some(UiCommand::Quit) | None => {
                        quit_pending = true;
                        if active.is_some() {
                            runner.request_cancel();
                        } else {
                            break;
                        }
                    }
                }
            }
            // Do not take the JoinHandle before this branch wins; otherwise it
            // can be dropped when another branch is chosen and completion is
            // never observed.
            done = async {
                match active.as_mut() {
                    Some(h) => Some(h.await),
                    None => futures::future::pending().await,
                }
            } => {
                active = None;
                if let Some(Err(e)) = done {
                    audit.error(&format!("run task failed: {}", e));
                }
                if quit_pending {
                    break;
                }
            }
        }
    }

    Ok(())
}
