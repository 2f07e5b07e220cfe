//! Elevation gate, queried once before any run may start.

use std::process::Stdio;
use tokio::process::Command;

/// Whether the process holds the privileges the catalog commands need.
///
/// On Windows `net session` succeeds only from an elevated shell; elsewhere
/// the effective uid must be root. Probe failures count as "not elevated".
pub async fn has_elevated_privileges() -> bool {
    #[cfg(windows)]
    {
        Command::new("cmd")
            .args(["/C", "net", "session"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
    #[cfg(not(windows))]
    {
        match Command::new("id")
            .arg("-u")
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await
        {
            Ok(out) => out.status.success() && String::from_utf8_lossy(&out.stdout).trim() == "0",
            Err(_) => false,
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn matches_effective_uid() {
        let out = std::process::Command::new("id").arg("-u").output().unwrap();
        let is_root = String::from_utf8_lossy(&out.stdout).trim() == "0";
        assert_eq!(has_elevated_privileges().await, is_root);
    }
}
