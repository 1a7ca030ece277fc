//! Per-tick output of the coil controller.

use crate::fault::{FaultEvent, FaultState};
use crate::warnings::WarningSet;

/// How the duty command of a tick was produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ControlMode {
    /// Fixed calibration drive.
    #[default]
    Calibrating,
    /// Closed-loop current control with supply compensation.
    Compensated,
    /// Duty proportional to force; no calibration available.
    Uncompensated,
    /// Output held off by the fault machine.
    Disabled,
}

impl ControlMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Calibrating => "calibrating",
            Self::Compensated => "compensated",
            Self::Uncompensated => "uncompensated",
            Self::Disabled => "disabled",
        }
    }
}

impl std::fmt::Display for ControlMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// PWM command in `[0, full_scale]`.
    pub duty: u16,
    pub fault_state: FaultState,
    pub event: FaultEvent,
    pub warnings: WarningSet,
    pub mode: ControlMode,
    pub target_current_ma: u16,
    pub target_voltage_mv: u16,
    pub calibration_failed: bool,
}
