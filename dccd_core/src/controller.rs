//! Per-tick orchestration of the coil control core.
//!
//! `CoilController` owns every piece of mutable core state and is driven by a
//! single call per control period:
//!
//! ```text
//! measurement ─► warnings ─► fault machine ─┬─► disabled (duty 0)
//!                                           ├─► calibration drive
//!                                           ├─► PID ─► voltage→PWM
//!                                           └─► force→PWM (uncompensated)
//! ```
//!
//! The numeric path never fails; configuration is validated once in
//! [`CoilController::new`].

use dccd_traits::Measurement;

use crate::calibration::{CalibrationSequencer, CalibrationState, CalibrationStep};
use crate::config::CoilConfig;
use crate::error::{BuildError, Result};
use crate::fault::{FaultEvent, FaultManager, FaultState};
use crate::pid::PidController;
use crate::pwm::{percent_to_duty, voltage_to_duty};
use crate::status::{ControlMode, TickReport};
use crate::target::force_to_current;
use crate::warnings::{WarningSet, detect};

/// Reject configurations the numeric core cannot honour.
pub fn validate(cfg: &CoilConfig) -> std::result::Result<(), BuildError> {
    let g = &cfg.pid;
    if g.kp_div == 0 || g.ki_div == 0 || g.kd_div == 0 {
        return Err(BuildError::InvalidConfig("pid divisors must be > 0"));
    }
    let l = &cfg.limits;
    if l.min_set_current_ma > l.max_set_current_ma {
        return Err(BuildError::InvalidConfig(
            "min_set_current_ma must be <= max_set_current_ma",
        ));
    }
    if l.min_out_voltage_mv >= l.max_out_voltage_mv {
        return Err(BuildError::InvalidConfig(
            "min_out_voltage_mv must be < max_out_voltage_mv",
        ));
    }
    if l.supply_min_mv >= l.supply_max_mv {
        return Err(BuildError::InvalidConfig("supply_min_mv must be < supply_max_mv"));
    }
    if cfg.pwm.full_scale == 0 {
        return Err(BuildError::InvalidConfig("pwm full_scale must be > 0"));
    }
    if cfg.pwm.max_duty > cfg.pwm.full_scale {
        return Err(BuildError::InvalidConfig("pwm max_duty must be <= full_scale"));
    }
    let c = &cfg.calibration;
    if !(1..=100).contains(&c.drive_percent) {
        return Err(BuildError::InvalidConfig(
            "calibration drive_percent must be in 1..=100",
        ));
    }
    if c.nominal_supply_mv == 0 {
        return Err(BuildError::InvalidConfig("nominal_supply_mv must be > 0"));
    }
    if cfg.control_loop.tick_hz == 0 {
        return Err(BuildError::InvalidConfig("tick_hz must be > 0"));
    }
    if cfg.control_loop.sensor_timeout_ms == 0 {
        return Err(BuildError::InvalidConfig("sensor_timeout_ms must be >= 1"));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct CoilController {
    cfg: CoilConfig,
    pid: PidController,
    faults: FaultManager,
    calibration: CalibrationSequencer,
    prev_force: Option<u8>,
    target_current_ma: u16,
    target_voltage_mv: u16,
    load_loss_ticks: u16,
    fresh_calibration: Option<CalibrationState>,
}

impl CoilController {
    pub fn new(cfg: CoilConfig) -> Result<Self> {
        validate(&cfg).map_err(eyre::Report::new)?;
        let pid = PidController::new(cfg.pid, &cfg.limits);
        let faults = FaultManager::new(cfg.protection.clone());
        let calibration = CalibrationSequencer::new(cfg.calibration.clone(), &cfg.limits);
        let mut this = Self {
            cfg,
            pid,
            faults,
            calibration,
            prev_force: None,
            target_current_ma: 0,
            target_voltage_mv: 0,
            load_loss_ticks: 0,
            fresh_calibration: None,
        };
        this.faults.start_deadtime();
        Ok(this)
    }

    pub fn config(&self) -> &CoilConfig {
        &self.cfg
    }

    pub fn fault_state(&self) -> FaultState {
        self.faults.state()
    }

    pub fn faults(&self) -> &FaultManager {
        &self.faults
    }

    pub fn pid(&self) -> &PidController {
        &self.pid
    }

    pub fn calibration(&self) -> Option<&CalibrationState> {
        self.calibration.result()
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_calibrated()
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibration.is_running()
    }

    /// Use a previously stored calibration instead of running the sequence.
    /// Returns `false` when the state is not usable with this configuration.
    pub fn apply_calibration(&mut self, state: CalibrationState) -> bool {
        if !self.calibration.adopt(state) {
            tracing::warn!(
                resistance_mohm = state.coil_resistance_mohm,
                "stored calibration rejected"
            );
            return false;
        }
        self.pid.reset();
        self.pid.set_output_ceiling(state.lock_voltage_ceiling_mv);
        tracing::info!(
            resistance_mohm = state.coil_resistance_mohm,
            ceiling_mv = state.lock_voltage_ceiling_mv,
            "using stored calibration"
        );
        true
    }

    /// Calibration that completed successfully since the last call.
    pub fn take_fresh_calibration(&mut self) -> Option<CalibrationState> {
        self.fresh_calibration.take()
    }

    /// Re-run the calibration sequence, keeping fault state.
    pub fn recalibrate(&mut self) {
        tracing::info!("calibration requested");
        self.begin_calibration();
    }

    /// Power-on state: faults cleared (including lockdown), PID zeroed and
    /// calibration re-armed.
    pub fn reinitialize(&mut self) {
        self.pid.reset();
        self.pid.clear_output_ceiling();
        self.faults.reset();
        self.faults.start_deadtime();
        self.calibration.reset();
        self.prev_force = None;
        self.target_current_ma = 0;
        self.target_voltage_mv = 0;
        self.load_loss_ticks = 0;
        self.fresh_calibration = None;
        tracing::info!("controller reinitialized");
    }

    /// Run one control period.
    pub fn tick(&mut self, force_percent: u8, m: &Measurement) -> TickReport {
        let force = force_percent.min(100);
        if self.prev_force != Some(force) {
            self.prev_force = Some(force);
            self.faults.start_deadtime();
        }

        let warnings = detect(
            self.target_current_ma,
            self.target_voltage_mv,
            m,
            &self.cfg.limits,
        );
        let event = self.faults.update(&warnings);
        self.on_fault_event(event, &warnings);

        let (mode, duty) = if self.faults.output_enabled() {
            self.drive(force, m, &warnings)
        } else {
            self.target_current_ma = 0;
            self.target_voltage_mv = 0;
            (ControlMode::Disabled, 0)
        };

        let report = TickReport {
            duty,
            fault_state: self.faults.state(),
            event,
            warnings,
            mode,
            target_current_ma: self.target_current_ma,
            target_voltage_mv: self.target_voltage_mv,
            calibration_failed: self
                .calibration
                .result()
                .is_some_and(|c| c.calibration_failed),
        };
        tracing::trace!(
            duty,
            mode = %mode,
            state = %report.fault_state,
            current_ma = m.current_ma,
            target_ma = report.target_current_ma,
            "tick"
        );
        report
    }

    fn on_fault_event(&mut self, event: FaultEvent, warnings: &WarningSet) {
        match event {
            FaultEvent::None => {}
            FaultEvent::Tripped => {
                self.pid.reset();
                let active: Vec<_> = warnings.active().collect();
                tracing::warn!(
                    retry = self.faults.retry_counter(),
                    warnings = ?active,
                    "output fused"
                );
                if self.calibration.is_running() {
                    tracing::info!("fault during calibration; restarting sequence");
                    self.begin_calibration();
                }
            }
            FaultEvent::Retrying => tracing::info!("cooldown elapsed; retrying output"),
            FaultEvent::Recovered => tracing::info!("fault cleared"),
            FaultEvent::Lockdown => {
                tracing::error!(
                    retries = self.faults.retry_counter(),
                    "output locked down until reinitialization"
                );
            }
        }
    }

    fn begin_calibration(&mut self) {
        self.calibration.start();
        self.pid.reset();
        self.pid.clear_output_ceiling();
        self.faults.start_deadtime();
        self.load_loss_ticks = 0;
    }

    fn drive(&mut self, force: u8, m: &Measurement, warnings: &WarningSet) -> (ControlMode, u16) {
        if self.calibration.is_calibrated() && self.load_loss_debounced(warnings) {
            tracing::warn!("open load detected; recalibrating");
            self.begin_calibration();
        }

        match self.calibration.step(m, self.faults.state()) {
            CalibrationStep::Drive => {
                self.target_current_ma = 0;
                self.target_voltage_mv = 0;
                let duty = percent_to_duty(self.cfg.calibration.drive_percent, &self.cfg.pwm);
                return (ControlMode::Calibrating, duty);
            }
            CalibrationStep::Passed(state) => {
                tracing::info!(
                    resistance_mohm = state.coil_resistance_mohm,
                    nominal_supply_mv = state.nominal_supply_mv,
                    ceiling_mv = state.lock_voltage_ceiling_mv,
                    "calibration passed"
                );
                self.pid.reset();
                self.pid.set_output_ceiling(state.lock_voltage_ceiling_mv);
                self.faults.start_deadtime();
                self.fresh_calibration = Some(state);
            }
            CalibrationStep::Failed(state) => {
                tracing::warn!(
                    resistance_mohm = state.coil_resistance_mohm,
                    "calibration failed; running uncompensated"
                );
                self.faults.start_deadtime();
            }
            CalibrationStep::Waiting | CalibrationStep::Idle => {}
        }

        if self.calibration.is_calibrated() {
            (ControlMode::Compensated, self.compensated(force, m, warnings))
        } else {
            self.target_current_ma = 0;
            self.target_voltage_mv = 0;
            (ControlMode::Uncompensated, percent_to_duty(force, &self.cfg.pwm))
        }
    }

    fn load_loss_debounced(&mut self, warnings: &WarningSet) -> bool {
        if !warnings.load_loss {
            self.load_loss_ticks = 0;
            return false;
        }
        self.load_loss_ticks = self.load_loss_ticks.saturating_add(1);
        self.load_loss_ticks > self.cfg.calibration.load_loss_debounce_ticks
    }

    fn compensated(&mut self, force: u8, m: &Measurement, warnings: &WarningSet) -> u16 {
        let lock_current = self
            .calibration
            .result()
            .map_or(self.cfg.calibration.lock_current_ma, |c| c.target_lock_current_ma);
        self.target_current_ma = force_to_current(force, &self.cfg.limits, lock_current);

        if self.target_current_ma == 0 {
            self.pid.reset();
            self.target_voltage_mv = 0;
            return 0;
        }

        self.target_voltage_mv = self
            .pid
            .update(self.target_current_ma, m.current_ma, warnings.load_loss);
        voltage_to_duty(self.target_voltage_mv, m.supply_mv, &self.cfg.pwm)
    }
}
