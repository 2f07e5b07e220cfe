//! Fixed catalog of maintenance steps.
//!
//! Insertion order is execution order and is load-bearing: the DNS flush must
//! precede the DHCP release, which must precede the renew.

use crate::model::MaintenanceStep;

#[derive(Debug, Clone)]
pub struct StepCatalog {
    steps: Vec<MaintenanceStep>,
}

impl StepCatalog {
    pub fn new(steps: Vec<MaintenanceStep>) -> Self {
        Self { steps }
    }

    /// The fixed step sequence, same on every call.
    pub fn steps(&self) -> &[MaintenanceStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Default for StepCatalog {
    fn default() -> Self {
        Self::new(vec![
            MaintenanceStep::new("sfc", &["/scannow"]),
            MaintenanceStep::new("DISM", &["/Online", "/Cleanup-Image", "/RestoreHealth"]),
            MaintenanceStep::new("winget", &["upgrade", "--all", "--silent"]),
            MaintenanceStep::new("cmd", &["/C", "del", "/q", "/f", "/s", "%TEMP%\\*"]),
            MaintenanceStep::new("ipconfig", &["/flushdns"]),
            MaintenanceStep::new("ipconfig", &["/release"]),
            MaintenanceStep::new("ipconfig", &["/renew"]),
            MaintenanceStep::new("defrag", &["C:", "/O"]),
            MaintenanceStep::new("chkdsk", &["C:", "/scan"]),
            MaintenanceStep::new("wevtutil", &["cl", "Application"]),
        ])
    }
}

/// The single restart command issued after an affirmative restart decision.
pub fn restart_step() -> MaintenanceStep {
    MaintenanceStep::new("shutdown", &["/r", "/t", "0"])
}
