use crate::audit::AuditLog;
use crate::catalog::{restart_step, StepCatalog};
use crate::exec::SystemRunner;
use crate::model::{RunConfig, RunEvent, RunSummary};
use crate::orchestrator::MaintenanceRunner;
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for the stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "winfix",
    version,
    about = "Windows system maintenance runner with optional TUI"
)]
pub struct Cli {
    /// Run headless and print progress as plain text (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Run headless and print the final run summary as JSON (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Restart the system after a completed headless run
    #[arg(long)]
    pub restart: bool,

    /// Delay between steps
    #[arg(long, default_value = "1s")]
    pub step_delay: humantime::Duration,

    /// Audit log file (appended)
    #[arg(long, default_value = "winfix.log")]
    pub log_file: PathBuf,

    /// Also write the run summary to a JSON file
    #[arg(long)]
    pub export_json: Option<PathBuf>,

    /// Print the step catalog and exit
    #[arg(long)]
    pub list_steps: bool,
}

pub async fn run(args: Cli) -> Result<()> {
    if args.list_steps {
        for step in StepCatalog::default().steps() {
            println!("{}", step);
        }
        return Ok(());
    }

    // Every catalog command needs elevation; refuse early rather than watch
    // ten steps fail one by one.
    if !crate::privilege::has_elevated_privileges().await {
        anyhow::bail!("winfix needs administrator privileges; run it from an elevated shell");
    }

    if !args.text && !args.json {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
    }

    // Headless modes, and the fallback when built without TUI support.
    run_headless(args).await
}

/// Build the engine configuration from CLI arguments.
pub fn build_config(args: &Cli) -> RunConfig {
    RunConfig {
        step_delay: Duration::from(args.step_delay),
        restart_command: restart_step(),
    }
}

/// Headless run: start immediately, stream progress, answer the restart
/// decision from the `--restart` flag. Ctrl-c requests cooperative
/// cancellation instead of killing the in-flight step.
async fn run_headless(args: Cli) -> Result<()> {
    let audit = AuditLog::open(&args.log_file)?;
    let sink = audit.sink();
    let (out_tx, out_handle) = spawn_output_writer();

    let runner = MaintenanceRunner::new(
        build_config(&args),
        StepCatalog::default(),
        Arc::new(SystemRunner),
    );
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<RunEvent>();
    let handle = runner.start(event_tx)?;

    loop {
        tokio::select! {
            ev = event_rx.recv() => {
                let Some(ev) = ev else { break };
                sink.event(&ev);
                if args.text {
                    let _ = out_tx.send(OutputLine::Stderr(ev.describe()));
                }
                if let RunEvent::RunCompleted { restart, .. } = ev {
                    if args.restart {
                        sink.info("restart confirmed via --restart");
                    }
                    restart.resolve(args.restart);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                sink.warn("ctrl-c received; cancelling at the next step boundary");
                if args.text {
                    let _ = out_tx.send(OutputLine::Stderr(
                        "Cancelling at the next step boundary…".into(),
                    ));
                }
                runner.request_cancel();
            }
        }
    }

    // The channel closes once the engine task is done, so this cannot hang on
    // an unresolved restart decision.
    let summary = handle.await.context("maintenance run task failed")?;

    if let Some(path) = args.export_json.as_deref() {
        export_json(path, &summary)?;
        let _ = out_tx.send(OutputLine::Stderr(format!(
            "Exported JSON: {}",
            path.display()
        )));
    }

    if args.json {
        let out = serde_json::to_string_pretty(&summary)?;
        let _ = out_tx.send(OutputLine::Stdout(out));
    } else {
        for line in crate::summary::build_text_summary(&summary).lines {
            let _ = out_tx.send(OutputLine::Stdout(line));
        }
    }

    drop(out_tx);
    let _ = out_handle.await;
    drop(sink);
    audit.close().await;
    Ok(())
}

/// Write the run summary to a JSON file.
fn export_json(path: &Path, summary: &RunSummary) -> Result<()> {
    let data = serde_json::to_string_pretty(summary).context("serialize run summary")?;
    std::fs::write(path, data).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
