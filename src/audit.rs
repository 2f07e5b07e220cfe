//! Append-only audit log.
//!
//! Every run event becomes a timestamped line appended to the log file by a
//! dedicated blocking writer task, keeping file I/O out of the async loop and
//! the UI thread. Producers hold cheap `AuditSink` clones; dropping them all
//! flushes and ends the writer.

use crate::model::{now_rfc3339, RunEvent};
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tokio::sync::mpsc;

pub struct AuditLog {
    tx: mpsc::UnboundedSender<String>,
    handle: tokio::task::JoinHandle<()>,
}

/// Producer handle, safe to use from the UI thread.
#[derive(Clone)]
pub struct AuditSink {
    tx: mpsc::UnboundedSender<String>,
}

impl AuditSink {
    pub fn info(&self, msg: &str) {
        let _ = self.tx.send(format!("{} [INFO] {}", now_rfc3339(), msg));
    }

    pub fn warn(&self, msg: &str) {
        let _ = self.tx.send(format!("{} [WARN] {}", now_rfc3339(), msg));
    }

    pub fn error(&self, msg: &str) {
        let _ = self.tx.send(format!("{} [ERROR] {}", now_rfc3339(), msg));
    }

    pub fn event(&self, ev: &RunEvent) {
        if ev.is_failure() {
            self.error(&ev.describe());
        } else {
            self.info(&ev.describe());
        }
    }
}

impl AuditLog {
    /// Open (or create) the log file and spawn the blocking writer.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open audit log {}", path.display()))?;
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let handle = tokio::task::spawn_blocking(move || {
            let mut out = std::io::LineWriter::new(file);
            while let Some(line) = rx.blocking_recv() {
                let _ = writeln!(out, "{}", line);
            }
            let _ = out.flush();
        });
        Ok(Self { tx, handle })
    }

    pub fn sink(&self) -> AuditSink {
        AuditSink {
            tx: self.tx.clone(),
        }
    }

    /// Drop the producer side and wait for the writer to flush.
    pub async fn close(self) {
        drop(self.tx);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MaintenanceStep;

    #[tokio::test]
    async fn lines_are_appended_with_level_tags() {
        let path = std::env::temp_dir().join(format!("winfix-audit-{}.log", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let log = AuditLog::open(&path).unwrap();
        let sink = log.sink();
        sink.info("starting");
        sink.event(&RunEvent::StepFailed {
            index: 2,
            step: MaintenanceStep::new("defrag", &["C:", "/O"]),
            error: "exited with code 1".into(),
        });
        drop(sink);
        log.close().await;

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("[INFO] starting"));
        assert!(lines[1].contains("[ERROR] [3] Failed: defrag C: /O"));
        let _ = std::fs::remove_file(&path);
    }
}
