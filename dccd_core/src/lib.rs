#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Coil current control core (hardware-agnostic).
//!
//! This crate regulates the current through a differential-lock coil. All
//! hardware interactions go through `dccd_traits::CoilSensor` and
//! `dccd_traits::CoilDriver`.
//!
//! ## Architecture
//!
//! - **Arithmetic**: saturating integer helpers (`fixed_point`)
//! - **Warnings**: per-tick fault flags (`warnings`)
//! - **Protection**: trip / cooldown / retry / lockdown (`fault`)
//! - **Control**: integer PID and supply-compensated PWM (`pid`, `pwm`)
//! - **Calibration**: coil resistance and lock-voltage ceiling (`calibration`)
//! - **Orchestration**: one `tick()` per period (`controller`), wrapped in an
//!   I/O loop with a type-state builder (`runner`, `builder`)
//!
//! ## Units
//!
//! Currents are mA, voltages mV, resistances mΩ, all as `u16`. Time is
//! counted in control ticks; nothing in the control path uses floating point.

pub mod builder;
pub mod calibration;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod error;
pub mod fault;
pub mod fixed_point;
pub mod hw_error;
pub mod persistence;
pub mod pid;
pub mod pwm;
pub mod runner;
pub mod status;
pub mod target;
pub mod util;
pub mod warnings;

pub use builder::ActuatorBuilder;
pub use calibration::{CalibrationSequencer, CalibrationState, CalibrationStep};
pub use config::{CalibrationCfg, CoilConfig, CoilLimits, LoopCfg, PidGains, ProtectionCfg, PwmCfg};
pub use controller::CoilController;
pub use error::{ActuatorError, BuildError, Result};
pub use fault::{FaultEvent, FaultManager, FaultState};
pub use persistence::{CalibrationStore, FileCalibrationStore, MemoryCalibrationStore};
pub use pid::PidController;
pub use runner::{Actuator, ForceFn, ForceSource, RunSummary, StopReason};
pub use status::{ControlMode, TickReport};
pub use warnings::WarningSet;
