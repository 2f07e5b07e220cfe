//! Run orchestration.
//!
//! This module owns run lifecycle control: one-at-a-time starts, cooperative
//! cancellation, and the command loop presentation layers use to drive the
//! runner. The engine emits the events; this layer decides when it runs.

mod controller;

pub(crate) use controller::{run_controller, UiCommand};
pub use controller::{MaintenanceRunner, StartError};
