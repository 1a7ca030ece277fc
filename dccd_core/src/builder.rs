//! Type-state builder for `Actuator`.
//!
//! `build()` is only available once both a sensor and a driver were given;
//! `try_build()` is always available and reports what is missing.

use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use dccd_traits::clock::{Clock, MonotonicClock};
use dccd_traits::{CoilDriver, CoilSensor, Measurement};

use crate::calibration::CalibrationState;
use crate::config::CoilConfig;
use crate::controller::CoilController;
use crate::error::{BuildError, Result};
use crate::persistence::CalibrationStore;
use crate::runner::Actuator;

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

pub struct ActuatorBuilder<S, D> {
    sensor: Option<Box<dyn CoilSensor>>,
    driver: Option<Box<dyn CoilDriver>>,
    config: Option<CoilConfig>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    store: Option<Box<dyn CalibrationStore>>,
    initial_calibration: Option<CalibrationState>,
    shutdown: Option<Arc<AtomicBool>>,
    stop_on_lockdown: bool,
    _s: PhantomData<S>,
    _d: PhantomData<D>,
}

impl Default for ActuatorBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            sensor: None,
            driver: None,
            config: None,
            clock: None,
            store: None,
            initial_calibration: None,
            shutdown: None,
            stop_on_lockdown: true,
            _s: PhantomData,
            _d: PhantomData,
        }
    }
}

impl Actuator {
    /// Start building an Actuator.
    pub fn builder() -> ActuatorBuilder<Missing, Missing> {
        ActuatorBuilder::default()
    }
}

impl<S, D> ActuatorBuilder<S, D> {
    fn retype<S2, D2>(self) -> ActuatorBuilder<S2, D2> {
        ActuatorBuilder {
            sensor: self.sensor,
            driver: self.driver,
            config: self.config,
            clock: self.clock,
            store: self.store,
            initial_calibration: self.initial_calibration,
            shutdown: self.shutdown,
            stop_on_lockdown: self.stop_on_lockdown,
            _s: PhantomData,
            _d: PhantomData,
        }
    }

    pub fn sensor(mut self, sensor: impl CoilSensor + 'static) -> ActuatorBuilder<Set, D> {
        self.sensor = Some(Box::new(sensor));
        self.retype()
    }

    pub fn driver(mut self, driver: impl CoilDriver + 'static) -> ActuatorBuilder<S, Set> {
        self.driver = Some(Box::new(driver));
        self.retype()
    }

    pub fn config(mut self, config: CoilConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Defaults to `MonotonicClock`.
    pub fn clock(mut self, clock: impl Clock + Send + Sync + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// Store consulted once at build time and written after each successful
    /// calibration.
    pub fn store(mut self, store: impl CalibrationStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    /// Calibration to start from when the store has none or holds one that
    /// is not usable.
    pub fn calibration(mut self, state: CalibrationState) -> Self {
        self.initial_calibration = Some(state);
        self
    }

    /// Flag polled between ticks; the run loop stops once it is set.
    pub fn shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    /// When true (default) `run` returns `ActuatorError::Lockdown` once the
    /// output locks down.
    pub fn stop_on_lockdown(mut self, stop: bool) -> Self {
        self.stop_on_lockdown = stop;
        self
    }

    /// Build without compile-time guarantees.
    pub fn try_build(self) -> Result<Actuator> {
        let sensor = self
            .sensor
            .ok_or_else(|| eyre::Report::new(BuildError::MissingSensor))?;
        let driver = self
            .driver
            .ok_or_else(|| eyre::Report::new(BuildError::MissingDriver))?;
        let config = self.config.unwrap_or_default();
        let sensor_timeout = Duration::from_millis(config.control_loop.sensor_timeout_ms);
        let period = crate::util::period(config.control_loop.tick_hz);
        let skip_when_persisted = config.calibration.skip_when_persisted;

        let mut controller = CoilController::new(config)?;
        let mut store = self.store;

        let stored = match store.as_mut().map(|s| s.load_calibration()) {
            Some(Ok(found)) => found,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "could not load stored calibration");
                None
            }
            None => None,
        };
        // store entry first; the initial calibration covers a rejected one
        let mut candidates = stored.into_iter().chain(self.initial_calibration).peekable();
        if candidates.peek().is_none() {
            tracing::debug!("no stored calibration; calibrating at startup");
        } else if !skip_when_persisted {
            tracing::info!("stored calibration ignored; calibrating at startup");
        } else if !candidates.any(|state| controller.apply_calibration(state)) {
            tracing::info!("no usable stored calibration; calibrating at startup");
        }

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(b) => Arc::from(b),
            None => Arc::new(MonotonicClock::new()),
        };

        Ok(Actuator {
            sensor,
            driver,
            controller,
            clock,
            store,
            shutdown: self.shutdown,
            stop_on_lockdown: self.stop_on_lockdown,
            sensor_timeout,
            period,
            ticks: 0,
            last: None,
            last_measurement: Measurement::default(),
        })
    }
}

impl ActuatorBuilder<Set, Set> {
    pub fn build(self) -> Result<Actuator> {
        self.try_build()
    }
}
