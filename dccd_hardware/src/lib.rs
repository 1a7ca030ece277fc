//! Simulated coil plant for host runs and tests.
//!
//! `SimulatedCoil` is a first-order RL model sampled once per control tick:
//!
//! ```text
//! V = duty * supply / full_scale
//! I += (V / R - I) / tau
//! ```
//!
//! The sensor, the PWM driver and any number of `SimHandle`s share one plant
//! through `Rc<RefCell<_>>`, so a test can inject faults (open load, shorted
//! coil, supply sag, sensor timeouts) while the controller owns the sensor and
//! the driver.

pub mod error;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use dccd_traits::{CoilDriver, CoilSensor, Measurement};

use crate::error::HwError;

/// Electrical parameters of the simulated coil.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoilParams {
    pub resistance_mohm: u16,
    /// L/R time constant in ticks (>= 1)
    pub time_constant_ticks: u16,
    pub supply_mv: u16,
    pub full_scale: u16,
}

impl Default for CoilParams {
    fn default() -> Self {
        Self {
            resistance_mohm: 1500,
            time_constant_ticks: 10,
            supply_mv: 12_000,
            full_scale: u16::MAX,
        }
    }
}

#[derive(Debug)]
struct Plant {
    params: CoilParams,
    current_ma: f64,
    duty: u16,
    enabled: bool,
    open_load: bool,
    short_mohm: Option<u16>,
    pending_timeouts: u32,
    driver_fault: Option<String>,
    ticks: u64,
}

impl Plant {
    fn applied_mv(&self) -> f64 {
        if !self.enabled || self.params.full_scale == 0 {
            return 0.0;
        }
        f64::from(self.duty) * f64::from(self.params.supply_mv) / f64::from(self.params.full_scale)
    }

    fn advance(&mut self) -> Measurement {
        self.ticks += 1;
        let v = self.applied_mv();
        if self.open_load {
            self.current_ma = 0.0;
        } else {
            let r = f64::from(self.short_mohm.unwrap_or(self.params.resistance_mohm).max(1));
            let steady_ma = v * 1000.0 / r;
            let tau = f64::from(self.params.time_constant_ticks.max(1));
            self.current_ma += (steady_ma - self.current_ma) / tau;
            self.current_ma = self.current_ma.clamp(0.0, f64::from(u16::MAX));
        }
        Measurement::new(
            self.params.supply_mv,
            to_u16(self.current_ma),
            to_u16(v),
        )
    }
}

fn to_u16(v: f64) -> u16 {
    v.round().clamp(0.0, f64::from(u16::MAX)) as u16
}

/// Sensor side of the simulated plant.
#[derive(Debug)]
pub struct SimulatedCoil {
    plant: Rc<RefCell<Plant>>,
}

impl SimulatedCoil {
    pub fn new(params: CoilParams) -> Self {
        Self {
            plant: Rc::new(RefCell::new(Plant {
                params,
                current_ma: 0.0,
                duty: 0,
                enabled: false,
                open_load: false,
                short_mohm: None,
                pending_timeouts: 0,
                driver_fault: None,
                ticks: 0,
            })),
        }
    }

    /// PWM driver sharing this plant.
    pub fn driver(&self) -> SimDriver {
        SimDriver {
            plant: Rc::clone(&self.plant),
        }
    }

    /// Fault-injection and inspection handle sharing this plant.
    pub fn handle(&self) -> SimHandle {
        SimHandle {
            plant: Rc::clone(&self.plant),
        }
    }
}

impl Default for SimulatedCoil {
    fn default() -> Self {
        Self::new(CoilParams::default())
    }
}

impl CoilSensor for SimulatedCoil {
    fn read(
        &mut self,
        _timeout: Duration,
    ) -> Result<Measurement, Box<dyn std::error::Error + Send + Sync>> {
        let mut plant = self.plant.borrow_mut();
        if plant.pending_timeouts > 0 {
            plant.pending_timeouts -= 1;
            tracing::debug!(remaining = plant.pending_timeouts, "injected sensor timeout");
            return Err(Box::new(HwError::Timeout));
        }
        let m = plant.advance();
        tracing::trace!(
            current_ma = m.current_ma,
            voltage_mv = m.voltage_mv,
            supply_mv = m.supply_mv,
            "sim sample"
        );
        Ok(m)
    }
}

/// PWM side of the simulated plant.
#[derive(Debug)]
pub struct SimDriver {
    plant: Rc<RefCell<Plant>>,
}

impl CoilDriver for SimDriver {
    fn set_duty(&mut self, duty: u16) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut plant = self.plant.borrow_mut();
        if let Some(msg) = plant.driver_fault.clone() {
            return Err(Box::new(HwError::Driver(msg)));
        }
        let full_scale = plant.params.full_scale;
        if duty > full_scale {
            return Err(Box::new(HwError::DutyOutOfRange { duty, full_scale }));
        }
        plant.duty = duty;
        plant.enabled = true;
        Ok(())
    }

    fn disable(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut plant = self.plant.borrow_mut();
        plant.duty = 0;
        plant.enabled = false;
        tracing::debug!("sim driver disabled");
        Ok(())
    }
}

/// Shared handle to steer and observe the simulated plant.
#[derive(Debug, Clone)]
pub struct SimHandle {
    plant: Rc<RefCell<Plant>>,
}

impl SimHandle {
    pub fn set_supply_mv(&self, supply_mv: u16) {
        self.plant.borrow_mut().params.supply_mv = supply_mv;
    }

    /// Disconnect (or reconnect) the coil.
    pub fn set_open_load(&self, open: bool) {
        self.plant.borrow_mut().open_load = open;
    }

    /// Override the coil resistance, e.g. to model a shorted winding.
    pub fn set_short_mohm(&self, short: Option<u16>) {
        self.plant.borrow_mut().short_mohm = short;
    }

    /// Make the next `n` sensor reads time out.
    pub fn inject_timeouts(&self, n: u32) {
        self.plant.borrow_mut().pending_timeouts = n;
    }

    /// Make every `set_duty` fail with `msg` until cleared with `None`.
    pub fn set_driver_fault(&self, msg: Option<&str>) {
        self.plant.borrow_mut().driver_fault = msg.map(str::to_owned);
    }

    pub fn supply_mv(&self) -> u16 {
        self.plant.borrow().params.supply_mv
    }

    pub fn current_ma(&self) -> u16 {
        to_u16(self.plant.borrow().current_ma)
    }

    pub fn duty(&self) -> u16 {
        self.plant.borrow().duty
    }

    pub fn is_enabled(&self) -> bool {
        self.plant.borrow().enabled
    }

    /// Number of successful sensor samples so far.
    pub fn ticks(&self) -> u64 {
        self.plant.borrow().ticks
    }
}
