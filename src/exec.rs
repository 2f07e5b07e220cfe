//! Command execution layer.
//!
//! Runs the external programs named by the catalog via `tokio::process`,
//! reporting launch failures and non-zero exits as errors instead of
//! panicking. The trait is the seam the orchestrator is tested through.

use async_trait::async_trait;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to launch {name}: {source}")]
    Launch {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{name} exited with {status}")]
    Exited {
        name: String,
        status: std::process::ExitStatus,
    },
}

/// Executes one named program to completion. Stateless per invocation; safe
/// to call repeatedly without shared state between calls.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn execute(&self, name: &str, args: &[String]) -> Result<(), ExecError>;
}

/// Production runner. Output is discarded (the event stream is the report
/// channel) and no console window is spawned on Windows.
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn execute(&self, name: &str, args: &[String]) -> Result<(), ExecError> {
        let mut cmd = Command::new(name);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        let status = cmd.status().await.map_err(|source| ExecError::Launch {
            name: name.to_string(),
            source,
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(ExecError::Exited {
                name: name.to_string(),
                status,
            })
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_exit_is_ok() {
        assert!(SystemRunner.execute("true", &[]).await.is_ok());
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported_not_thrown() {
        let err = SystemRunner.execute("false", &[]).await.unwrap_err();
        assert!(matches!(err, ExecError::Exited { .. }));
        assert!(err.to_string().starts_with("false exited with"));
    }

    #[tokio::test]
    async fn missing_program_is_a_launch_error() {
        let err = SystemRunner
            .execute("winfix-no-such-program", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Launch { .. }));
    }
}
