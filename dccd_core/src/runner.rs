//! I/O loop around `CoilController`.
//!
//! `Actuator` reads one `Measurement` per tick from the sensor, asks a
//! `ForceSource` for the commanded force, ticks the controller and writes
//! the duty to the driver, pacing ticks with a `Clock`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dccd_traits::clock::Clock;
use dccd_traits::{CoilDriver, CoilSensor, Measurement};

use crate::calibration::CalibrationState;
use crate::controller::CoilController;
use crate::error::{ActuatorError, Result};
use crate::fault::FaultState;
use crate::hw_error::map_boxed;
use crate::persistence::CalibrationStore;
use crate::status::TickReport;

/// Supplies the commanded force (percent) for each tick.
pub trait ForceSource {
    fn force_at(&mut self, tick: u64) -> u8;
}

/// Constant force.
impl ForceSource for u8 {
    fn force_at(&mut self, _tick: u64) -> u8 {
        *self
    }
}

/// Adapter for closures `FnMut(tick) -> force`.
pub struct ForceFn<F>(pub F);

impl<F: FnMut(u64) -> u8> ForceSource for ForceFn<F> {
    fn force_at(&mut self, tick: u64) -> u8 {
        (self.0)(tick)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Requested number of ticks ran.
    Completed,
    /// Shutdown flag was raised.
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub stop: StopReason,
    pub last: Option<TickReport>,
    pub last_measurement: Measurement,
    pub elapsed_ms: u64,
}

pub struct Actuator {
    pub(crate) sensor: Box<dyn CoilSensor>,
    pub(crate) driver: Box<dyn CoilDriver>,
    pub(crate) controller: CoilController,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) store: Option<Box<dyn CalibrationStore>>,
    pub(crate) shutdown: Option<Arc<AtomicBool>>,
    pub(crate) stop_on_lockdown: bool,
    pub(crate) sensor_timeout: Duration,
    pub(crate) period: Duration,
    pub(crate) ticks: u64,
    pub(crate) last: Option<TickReport>,
    pub(crate) last_measurement: Measurement,
}

impl core::fmt::Debug for Actuator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Actuator")
            .field("ticks", &self.ticks)
            .field("fault_state", &self.controller.fault_state())
            .field("calibrated", &self.controller.is_calibrated())
            .field("period", &self.period)
            .finish_non_exhaustive()
    }
}

impl Actuator {
    pub fn controller(&self) -> &CoilController {
        &self.controller
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn last_report(&self) -> Option<&TickReport> {
        self.last.as_ref()
    }

    pub fn last_measurement(&self) -> Measurement {
        self.last_measurement
    }

    /// Clear faults (including lockdown) and re-arm calibration.
    pub fn reinitialize(&mut self) {
        self.controller.reinitialize();
    }

    /// Turn the output stage off (best-effort).
    pub fn disable_output(&mut self) {
        if let Err(e) = self.driver.disable() {
            tracing::warn!(error = %map_boxed(e), "driver disable failed");
        }
    }

    /// One control period: sample, compute, actuate.
    pub fn step(&mut self, force: u8) -> Result<TickReport> {
        let m = match self.sensor.read(self.sensor_timeout) {
            Ok(m) => m,
            Err(e) => {
                let err = map_boxed(e);
                tracing::error!(error = %err, tick = self.ticks, "sensor read failed");
                self.disable_output();
                return Err(eyre::Report::new(err));
            }
        };
        self.last_measurement = m;

        let report = self.controller.tick(force, &m);

        if let Err(e) = self.driver.set_duty(report.duty) {
            let err = map_boxed(e);
            tracing::error!(error = %err, duty = report.duty, "driver write failed");
            self.disable_output();
            return Err(eyre::Report::new(err));
        }

        if let Some(state) = self.controller.take_fresh_calibration() {
            self.persist(&state);
        }

        self.ticks += 1;
        self.last = Some(report);
        Ok(report)
    }

    fn persist(&mut self, state: &CalibrationState) {
        if let Some(store) = self.store.as_mut()
            && let Err(e) = store.store_calibration(state)
        {
            tracing::warn!(error = %e, "could not store calibration");
        }
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Run until `max_ticks` ticks have run (forever when `None`), the shutdown
    /// flag is raised, or an error occurs. `observe` sees every report.
    ///
    /// The output is disabled when the loop ends for any reason.
    pub fn run<F: ForceSource + ?Sized>(
        &mut self,
        source: &mut F,
        max_ticks: Option<u64>,
        mut observe: impl FnMut(u64, &TickReport),
    ) -> Result<RunSummary> {
        let start = self.clock.now();
        let mut deadline = start;
        let mut ran: u64 = 0;
        tracing::info!(
            period_us = self.period.as_micros() as u64,
            max_ticks,
            calibrated = self.controller.is_calibrated(),
            "control loop start"
        );

        let stop = loop {
            if max_ticks.is_some_and(|max| ran >= max) {
                break StopReason::Completed;
            }
            if self.shutdown_requested() {
                tracing::info!(ticks = ran, "shutdown requested");
                break StopReason::Shutdown;
            }

            let tick = self.ticks;
            let force = source.force_at(tick);
            let report = self.step(force)?;
            observe(tick, &report);
            ran += 1;

            if self.stop_on_lockdown && report.fault_state == FaultState::Lockdown {
                self.disable_output();
                tracing::error!(ticks = ran, "stopping: output locked down");
                return Err(eyre::Report::new(ActuatorError::Lockdown));
            }

            deadline += self.period;
            let now = self.clock.now();
            if deadline > now {
                self.clock.sleep(deadline - now);
            } else if now - deadline > self.period {
                // overrun by more than a period; resync instead of bursting
                deadline = now;
            }
        };

        self.disable_output();
        let summary = RunSummary {
            ticks: ran,
            stop,
            last: self.last,
            last_measurement: self.last_measurement,
            elapsed_ms: self.clock.ms_since(start),
        };
        tracing::info!(
            ticks = summary.ticks,
            elapsed_ms = summary.elapsed_ms,
            state = %self.controller.fault_state(),
            "control loop stop"
        );
        Ok(summary)
    }

    /// Run only the calibration sequence (output at zero force) and return
    /// its result. A failed calibration is returned as `Ok` with
    /// `calibration_failed` set.
    pub fn calibrate(&mut self, max_ticks: u64) -> Result<CalibrationState> {
        self.controller.recalibrate();
        let mut ran = 0;
        while self.controller.is_calibrating() {
            if ran >= max_ticks {
                self.disable_output();
                eyre::bail!("calibration did not finish within {max_ticks} ticks");
            }
            let report = self.step(0)?;
            ran += 1;
            if report.fault_state == FaultState::Lockdown {
                self.disable_output();
                return Err(eyre::Report::new(ActuatorError::Lockdown));
            }
            self.clock.sleep(self.period);
        }
        self.disable_output();
        self.controller
            .calibration()
            .copied()
            .ok_or_else(|| eyre::eyre!("calibration finished without a result"))
    }
}
