//! Text summary builder for CLI output.
//!
//! Formats the end-of-run report printed in headless modes.

use crate::model::{RunSummary, StepOutcome};
use std::time::Duration;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Build the end-of-run report from a run summary.
pub(crate) fn build_text_summary(summary: &RunSummary) -> TextSummary {
    let mut lines = Vec::new();

    let status = if summary.cancelled {
        "cancelled"
    } else {
        "completed"
    };
    lines.push(format!(
        "Maintenance run {} in {}: {} succeeded, {} failed",
        status,
        humantime::format_duration(round_to_secs(summary.duration)),
        summary.succeeded(),
        summary.failed(),
    ));

    for report in &summary.steps {
        match &report.outcome {
            StepOutcome::Succeeded => lines.push(format!("  ok   {}", report.step)),
            StepOutcome::Failed { error } => {
                lines.push(format!("  FAIL {} ({})", report.step, error))
            }
        }
    }

    TextSummary { lines }
}

/// Sub-second precision makes the duration line unreadable.
fn round_to_secs(d: Duration) -> Duration {
    Duration::from_secs(d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MaintenanceStep, StepReport};

    #[test]
    fn report_lists_every_step_under_the_header() {
        let summary = RunSummary {
            timestamp_utc: String::new(),
            duration: Duration::from_millis(62_500),
            steps: vec![
                StepReport {
                    index: 0,
                    step: MaintenanceStep::new("sfc", &["/scannow"]),
                    outcome: StepOutcome::Succeeded,
                },
                StepReport {
                    index: 1,
                    step: MaintenanceStep::new("defrag", &["C:", "/O"]),
                    outcome: StepOutcome::Failed {
                        error: "exited with code 2".into(),
                    },
                },
            ],
            cancelled: false,
        };

        let text = build_text_summary(&summary);
        assert_eq!(text.lines.len(), 3);
        assert_eq!(
            text.lines[0],
            "Maintenance run completed in 1m 2s: 1 succeeded, 1 failed"
        );
        assert_eq!(text.lines[1], "  ok   sfc /scannow");
        assert_eq!(text.lines[2], "  FAIL defrag C: /O (exited with code 2)");
    }

    #[test]
    fn cancelled_runs_say_so() {
        let summary = RunSummary {
            timestamp_utc: String::new(),
            duration: Duration::from_secs(5),
            steps: Vec::new(),
            cancelled: true,
        };
        assert!(build_text_summary(&summary).lines[0].starts_with("Maintenance run cancelled"));
    }
}
