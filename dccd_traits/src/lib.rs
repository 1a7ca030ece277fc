//! Hardware seams for the coil controller.
//!
//! The core never touches registers or ADC channels directly; everything it
//! needs from the board goes through these traits. Errors are boxed at the
//! boundary and mapped to typed errors inside `dccd_core`.

pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// One set of coil measurements, already converted to physical units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Measurement {
    /// Battery / supply voltage in mV.
    pub supply_mv: u16,
    /// Coil current in mA.
    pub current_ma: u16,
    /// Coil voltage in mV.
    pub voltage_mv: u16,
}

impl Measurement {
    pub const fn new(supply_mv: u16, current_ma: u16, voltage_mv: u16) -> Self {
        Self {
            supply_mv,
            current_ma,
            voltage_mv,
        }
    }
}

/// Source of per-tick coil measurements.
pub trait CoilSensor {
    fn read(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<Measurement, Box<dyn std::error::Error + Send + Sync>>;
}

/// PWM output stage driving the coil.
pub trait CoilDriver {
    /// Apply a raw duty-cycle command in `[0, full_scale]`.
    fn set_duty(&mut self, duty: u16) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    /// Force the output stage off.
    fn disable(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
