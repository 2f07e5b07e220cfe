//! Maintenance run engine.
//!
//! Owns the sequential step loop: one step at a time in catalog order, a
//! cooperative cancellation check at each step boundary, per-step events, and
//! the restart decision once every step has resolved.

use crate::catalog::StepCatalog;
use crate::exec::CommandRunner;
use crate::model::{
    now_rfc3339, RestartDecision, RunConfig, RunEvent, RunSummary, StepOutcome, StepReport,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;

/// Shared run state, guarded by a single lock taken by both the engine loop
/// and the cancellation entry point. Never held across an await.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    pub running: bool,
    pub cancel_requested: bool,
    pub current_step: usize,
}

impl RunState {
    pub fn idle() -> Self {
        Self {
            running: false,
            cancel_requested: false,
            current_step: 0,
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::idle();
    }
}

/// A poisoned lock only means a panic elsewhere; the state itself stays
/// consistent (every mutation is a plain field assignment), so recover it.
pub(crate) fn lock_state(state: &Mutex<RunState>) -> MutexGuard<'_, RunState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct MaintenanceEngine {
    cfg: RunConfig,
    catalog: StepCatalog,
}

impl MaintenanceEngine {
    pub fn new(cfg: RunConfig, catalog: StepCatalog) -> Self {
        Self { cfg, catalog }
    }

    /// Execute the catalog, emitting events in order on `event_tx`.
    ///
    /// Cancellation is cooperative: the flag is read at step boundaries only,
    /// so an in-flight command always runs to completion. Killing a mid-flight
    /// disk repair could leave the system worse off than letting it finish.
    pub async fn run(
        self,
        runner: Arc<dyn CommandRunner>,
        event_tx: UnboundedSender<RunEvent>,
        state: Arc<Mutex<RunState>>,
    ) -> RunSummary {
        let started = Instant::now();
        let timestamp_utc = now_rfc3339();
        let total = self.catalog.len();
        let _ = event_tx.send(RunEvent::RunStarted { total });

        let mut reports = Vec::with_capacity(total);
        let mut cancelled = false;

        for (index, step) in self.catalog.steps().iter().enumerate() {
            if lock_state(&state).cancel_requested {
                let _ = event_tx.send(RunEvent::RunCancelled {
                    completed: reports.len(),
                });
                lock_state(&state).reset();
                cancelled = true;
                break;
            }

            let _ = event_tx.send(RunEvent::StepStarted {
                index,
                step: step.clone(),
            });
            let outcome = match runner.execute(&step.name, &step.args).await {
                Ok(()) => {
                    let _ = event_tx.send(RunEvent::StepSucceeded {
                        index,
                        step: step.clone(),
                    });
                    StepOutcome::Succeeded
                }
                // A failing step never aborts the run; the next step gets its turn.
                Err(e) => {
                    let error = e.to_string();
                    let _ = event_tx.send(RunEvent::StepFailed {
                        index,
                        step: step.clone(),
                        error: error.clone(),
                    });
                    StepOutcome::Failed { error }
                }
            };
            reports.push(StepReport {
                index,
                step: step.clone(),
                outcome,
            });

            // Breather between privileged operations so they don't contend.
            tokio::time::sleep(self.cfg.step_delay).await;
            lock_state(&state).current_step = index + 1;
        }

        let summary = RunSummary {
            timestamp_utc,
            duration: started.elapsed(),
            steps: reports,
            cancelled,
        };

        if !cancelled {
            lock_state(&state).reset();
            let (decision, answer) = RestartDecision::new();
            let _ = event_tx.send(RunEvent::RunCompleted {
                summary: Box::new(summary.clone()),
                restart: decision,
            });
            // The decision resolves externally (prompt or flag). State is
            // already idle, so a new run may start while it is pending.
            if answer.await.unwrap_or(false) {
                let restart = &self.cfg.restart_command;
                let _ = runner.execute(&restart.name, &restart.args).await;
            }
        }

        summary
    }
}
