use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(with = "humantime_serde")]
    pub step_delay: Duration,
    pub restart_command: MaintenanceStep,
}

/// One external maintenance program invocation with fixed arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceStep {
    pub name: String,
    pub args: Vec<String>,
}

impl MaintenanceStep {
    pub fn new(name: &str, args: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl fmt::Display for MaintenanceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for a in &self.args {
            write!(f, " {}", a)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepOutcome {
    Succeeded,
    Failed { error: String },
}

/// Per-step record aggregated into the run summary. The orchestrator keeps
/// nothing beyond the summary; the audit log is the durable record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub index: usize,
    pub step: MaintenanceStep,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default)]
    pub timestamp_utc: String,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    pub steps: Vec<StepReport>,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.steps
            .iter()
            .filter(|r| r.outcome == StepOutcome::Succeeded)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.steps.len() - self.succeeded()
    }
}

/// Deferred "restart now?" answer, resolved by whoever consumes the
/// `RunCompleted` event. Dropping it unresolved counts as "no".
#[derive(Debug)]
pub struct RestartDecision {
    tx: oneshot::Sender<bool>,
}

impl RestartDecision {
    pub(crate) fn new() -> (Self, oneshot::Receiver<bool>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Answer the prompt. `true` makes the engine issue the restart command.
    pub fn resolve(self, restart: bool) {
        let _ = self.tx.send(restart);
    }
}

/// Events emitted by the run engine during a maintenance run.
///
/// These events are the universal interface between the orchestrator and its
/// consumers (TUI or headless loop). Both modes receive the same stream, in
/// emission order, over a single channel.
#[derive(Debug)]
pub enum RunEvent {
    RunStarted {
        total: usize,
    },
    StepStarted {
        index: usize,
        step: MaintenanceStep,
    },
    StepSucceeded {
        index: usize,
        step: MaintenanceStep,
    },
    StepFailed {
        index: usize,
        step: MaintenanceStep,
        error: String,
    },
    RunCancelled {
        completed: usize,
    },
    RunCompleted {
        // Box to keep RunEvent small; the summary carries every step report.
        summary: Box<RunSummary>,
        restart: RestartDecision,
    },
}

impl RunEvent {
    /// Render a human-readable line for UI and audit-log layers.
    pub fn describe(&self) -> String {
        match self {
            RunEvent::RunStarted { total } => {
                format!("Starting maintenance run ({} steps)", total)
            }
            RunEvent::StepStarted { index, step } => {
                format!("[{}] Running: {}", index + 1, step)
            }
            RunEvent::StepSucceeded { index, step } => {
                format!("[{}] Succeeded: {}", index + 1, step)
            }
            RunEvent::StepFailed { index, step, error } => {
                format!("[{}] Failed: {} ({})", index + 1, step, error)
            }
            RunEvent::RunCancelled { completed } => {
                format!("Run cancelled after {} completed step(s)", completed)
            }
            RunEvent::RunCompleted { summary, .. } => format!(
                "Run completed: {} succeeded, {} failed",
                summary.succeeded(),
                summary.failed()
            ),
        }
    }

    /// Whether the event reports a failure, for log level and styling.
    pub fn is_failure(&self) -> bool {
        matches!(self, RunEvent::StepFailed { .. })
    }
}

/// RFC 3339 wall-clock stamp used on summaries and audit lines.
pub(crate) fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "now".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_displays_as_command_line() {
        let step = MaintenanceStep::new("ipconfig", &["/flushdns"]);
        assert_eq!(step.to_string(), "ipconfig /flushdns");
    }

    #[test]
    fn describe_includes_one_based_index_and_error() {
        let ev = RunEvent::StepFailed {
            index: 0,
            step: MaintenanceStep::new("sfc", &["/scannow"]),
            error: "exited with code 1".into(),
        };
        assert!(ev.is_failure());
        assert_eq!(
            ev.describe(),
            "[1] Failed: sfc /scannow (exited with code 1)"
        );
    }

    #[test]
    fn summary_counts_failures() {
        let summary = RunSummary {
            timestamp_utc: String::new(),
            duration: Duration::from_secs(1),
            steps: vec![
                StepReport {
                    index: 0,
                    step: MaintenanceStep::new("a", &[]),
                    outcome: StepOutcome::Succeeded,
                },
                StepReport {
                    index: 1,
                    step: MaintenanceStep::new("b", &[]),
                    outcome: StepOutcome::Failed {
                        error: "boom".into(),
                    },
                },
            ],
            cancelled: false,
        };
        assert_eq!(summary.succeeded(), 1);
        assert_eq!(summary.failed(), 1);
    }
}
