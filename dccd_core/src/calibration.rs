//! Coil resistance self-calibration.
//!
//! The sequencer holds a fixed low drive until the coil current settles and
//! the fault machine is back to `Normal`, then estimates the coil resistance
//! from one voltage/current sample. A plausible resistance yields the voltage
//! ceiling that keeps a locked coil at `lock_current_ma`; an implausible one
//! (open load, shorted coil, or a ceiling below the minimum PID output) marks
//! the calibration failed and re-arms after a delay.

use dccd_traits::Measurement;

use crate::config::{CalibrationCfg, CoilLimits};
use crate::fault::FaultState;
use crate::fixed_point::scale_u16;

/// Result of one calibration run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalibrationState {
    pub coil_resistance_mohm: u16,
    pub nominal_supply_mv: u16,
    pub target_lock_current_ma: u16,
    pub lock_voltage_ceiling_mv: u16,
    pub calibration_failed: bool,
}

impl CalibrationState {
    /// Usable for compensated control under `cfg`.
    pub fn is_usable(&self, cfg: &CalibrationCfg) -> bool {
        !self.calibration_failed
            && self.coil_resistance_mohm != 0
            && self.coil_resistance_mohm <= cfg.max_resistance_mohm
            && self.lock_voltage_ceiling_mv <= self.nominal_supply_mv
            && self.nominal_supply_mv != 0
    }
}

/// Coil resistance in mΩ from a voltage/current sample.
/// Zero current reads as an infinite (saturated) resistance.
pub fn resistance_mohm(voltage_mv: u16, current_ma: u16) -> u16 {
    if current_ma == 0 {
        return u16::MAX;
    }
    scale_u16(voltage_mv, 1000, u32::from(current_ma))
}

/// `min(R * I_lock / 1000, nominal_supply)` in mV.
pub fn lock_voltage_ceiling(resistance_mohm: u16, lock_current_ma: u16, nominal_supply_mv: u16) -> u16 {
    scale_u16(resistance_mohm, u32::from(lock_current_ma), 1000).min(nominal_supply_mv)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Settling { remaining: u16 },
    RetryWait { remaining: u16 },
    Done,
}

/// Outcome of one sequencer step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationStep {
    /// Hold the fixed calibration drive.
    Drive,
    /// A previous run failed; output stays uncompensated until the retry.
    Waiting,
    Passed(CalibrationState),
    Failed(CalibrationState),
    /// Nothing to do; a result is already available.
    Idle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationSequencer {
    cfg: CalibrationCfg,
    supply_min_mv: u16,
    supply_max_mv: u16,
    min_out_voltage_mv: u16,
    phase: Phase,
    result: Option<CalibrationState>,
}

impl CalibrationSequencer {
    /// A new sequencer is armed: the first step starts driving.
    pub fn new(cfg: CalibrationCfg, limits: &CoilLimits) -> Self {
        let settle = cfg.settle_ticks;
        Self {
            cfg,
            supply_min_mv: limits.supply_min_mv,
            supply_max_mv: limits.supply_max_mv,
            min_out_voltage_mv: limits.min_out_voltage_mv,
            phase: Phase::Settling { remaining: settle },
            result: None,
        }
    }

    pub fn config(&self) -> &CalibrationCfg {
        &self.cfg
    }

    /// Restart the sequence from the beginning. The last result is kept
    /// until the new run finishes.
    pub fn start(&mut self) {
        self.phase = Phase::Settling {
            remaining: self.cfg.settle_ticks,
        };
    }

    /// Adopt an externally supplied result and skip the sequence.
    /// Returns `false` (and changes nothing) when the result is unusable or
    /// its ceiling would hold every PID output at zero.
    pub fn adopt(&mut self, state: CalibrationState) -> bool {
        if !state.is_usable(&self.cfg) || state.lock_voltage_ceiling_mv < self.min_out_voltage_mv {
            return false;
        }
        self.result = Some(state);
        self.phase = Phase::Done;
        true
    }

    /// Forget any result and re-arm, as after power-on.
    pub fn reset(&mut self) {
        self.result = None;
        self.start();
    }

    /// Currently holding the calibration drive.
    pub fn is_running(&self) -> bool {
        matches!(self.phase, Phase::Settling { .. })
    }

    pub fn is_waiting_retry(&self) -> bool {
        matches!(self.phase, Phase::RetryWait { .. })
    }

    pub fn result(&self) -> Option<&CalibrationState> {
        self.result.as_ref()
    }

    /// A successful result is in effect and no new run is pending.
    pub fn is_calibrated(&self) -> bool {
        self.phase == Phase::Done && self.result.is_some_and(|r| !r.calibration_failed)
    }

    /// Advance one tick with the measurement taken under the previous drive.
    pub fn step(&mut self, m: &Measurement, fault: FaultState) -> CalibrationStep {
        match self.phase {
            Phase::Done => CalibrationStep::Idle,
            Phase::RetryWait { remaining: 0 } => {
                self.start();
                CalibrationStep::Drive
            }
            Phase::RetryWait { remaining } => {
                self.phase = Phase::RetryWait {
                    remaining: remaining - 1,
                };
                CalibrationStep::Waiting
            }
            Phase::Settling { remaining } if remaining > 0 => {
                self.phase = Phase::Settling {
                    remaining: remaining - 1,
                };
                CalibrationStep::Drive
            }
            Phase::Settling { .. } if fault != FaultState::Normal => CalibrationStep::Drive,
            Phase::Settling { .. } => self.measure(m),
        }
    }

    fn measure(&mut self, m: &Measurement) -> CalibrationStep {
        let resistance = resistance_mohm(m.voltage_mv, m.current_ma);
        let nominal_supply_mv = if (self.supply_min_mv..=self.supply_max_mv).contains(&m.supply_mv) {
            m.supply_mv
        } else {
            self.cfg.nominal_supply_mv
        };
        let lock_current = self.cfg.lock_current_ma;
        let ceiling = lock_voltage_ceiling(resistance, lock_current, nominal_supply_mv);

        // zero reads as a short; a ceiling under the minimum output never drives
        let failed = resistance == 0
            || resistance > self.cfg.max_resistance_mohm
            || ceiling < self.min_out_voltage_mv;
        let state = CalibrationState {
            coil_resistance_mohm: resistance,
            nominal_supply_mv,
            target_lock_current_ma: lock_current,
            lock_voltage_ceiling_mv: if failed { 0 } else { ceiling },
            calibration_failed: failed,
        };
        self.result = Some(state);
        if failed {
            self.phase = Phase::RetryWait {
                remaining: self.cfg.retry_delay_ticks,
            };
            return CalibrationStep::Failed(state);
        }
        self.phase = Phase::Done;
        CalibrationStep::Passed(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_cfg() -> CalibrationCfg {
        CalibrationCfg {
            settle_ticks: 3,
            retry_delay_ticks: 2,
            ..CalibrationCfg::default()
        }
    }

    fn seq() -> CalibrationSequencer {
        CalibrationSequencer::new(quick_cfg(), &CoilLimits::default())
    }

    #[test]
    fn resistance_from_sample() {
        assert_eq!(resistance_mohm(2400, 1600), 1500);
        assert_eq!(resistance_mohm(2400, 0), u16::MAX);
        assert_eq!(resistance_mohm(0, 1000), 0);
    }

    #[test]
    fn ceiling_is_capped_by_supply() {
        assert_eq!(lock_voltage_ceiling(1500, 4400, 12_000), 6600);
        assert_eq!(lock_voltage_ceiling(5000, 4400, 12_000), 12_000);
    }

    #[test]
    fn settles_then_passes() {
        let mut s = seq();
        let m = Measurement::new(12_500, 1600, 2400);
        for _ in 0..3 {
            assert_eq!(s.step(&m, FaultState::Normal), CalibrationStep::Drive);
        }
        let CalibrationStep::Passed(state) = s.step(&m, FaultState::Normal) else {
            panic!("expected pass");
        };
        assert_eq!(state.coil_resistance_mohm, 1500);
        assert_eq!(state.nominal_supply_mv, 12_500);
        assert_eq!(state.target_lock_current_ma, 4400);
        assert_eq!(state.lock_voltage_ceiling_mv, 6600);
        assert!(s.is_calibrated());
        assert_eq!(s.step(&m, FaultState::Normal), CalibrationStep::Idle);
    }

    #[test]
    fn waits_for_normal_fault_state() {
        let mut s = seq();
        let m = Measurement::new(12_000, 1600, 2400);
        for _ in 0..3 {
            s.step(&m, FaultState::Retrying);
        }
        for _ in 0..10 {
            assert_eq!(s.step(&m, FaultState::Retrying), CalibrationStep::Drive);
        }
        assert!(matches!(s.step(&m, FaultState::Normal), CalibrationStep::Passed(_)));
    }

    #[test]
    fn out_of_range_supply_uses_nominal() {
        let mut s = seq();
        let m = Measurement::new(9000, 1600, 2400);
        for _ in 0..3 {
            s.step(&m, FaultState::Normal);
        }
        let CalibrationStep::Passed(state) = s.step(&m, FaultState::Normal) else {
            panic!("expected pass");
        };
        assert_eq!(state.nominal_supply_mv, 12_000);
    }

    #[test]
    fn open_load_fails_and_rearms() {
        let mut s = seq();
        let open = Measurement::new(12_000, 0, 2400);
        for _ in 0..3 {
            s.step(&open, FaultState::Normal);
        }
        let CalibrationStep::Failed(state) = s.step(&open, FaultState::Normal) else {
            panic!("expected failure");
        };
        assert!(state.calibration_failed);
        assert_eq!(state.coil_resistance_mohm, u16::MAX);
        assert!(!s.is_calibrated());
        assert_eq!(s.step(&open, FaultState::Normal), CalibrationStep::Waiting);
        assert_eq!(s.step(&open, FaultState::Normal), CalibrationStep::Waiting);
        assert_eq!(s.step(&open, FaultState::Normal), CalibrationStep::Drive);
        assert!(s.is_running());
    }

    fn run_to_result(s: &mut CalibrationSequencer, m: &Measurement) -> CalibrationStep {
        for _ in 0..3 {
            assert_eq!(s.step(m, FaultState::Normal), CalibrationStep::Drive);
        }
        s.step(m, FaultState::Normal)
    }

    #[test]
    fn zero_voltage_under_current_fails_as_short() {
        let mut s = seq();
        let CalibrationStep::Failed(state) = run_to_result(&mut s, &Measurement::new(12_000, 3000, 0)) else {
            panic!("expected failure");
        };
        assert!(state.calibration_failed);
        assert_eq!(state.coil_resistance_mohm, 0);
        assert_eq!(state.lock_voltage_ceiling_mv, 0);
        assert!(!s.is_calibrated());
        assert!(s.is_waiting_retry());
    }

    #[test]
    fn ceiling_below_minimum_output_fails() {
        let mut s = seq();
        // 20 mOhm * 4400 mA = 88 mV, under the 100 mV minimum output
        let CalibrationStep::Failed(state) = run_to_result(&mut s, &Measurement::new(12_000, 5000, 100)) else {
            panic!("expected failure");
        };
        assert_eq!(state.coil_resistance_mohm, 20);
        assert!(state.calibration_failed);
        assert!(!s.is_calibrated());
    }

    #[test]
    fn adopt_rejects_zero_resistance_and_low_ceiling() {
        let mut s = seq();
        let shorted = CalibrationState {
            coil_resistance_mohm: 0,
            nominal_supply_mv: 12_000,
            target_lock_current_ma: 4400,
            lock_voltage_ceiling_mv: 0,
            calibration_failed: false,
        };
        assert!(!shorted.is_usable(&quick_cfg()));
        assert!(!s.adopt(shorted));

        let low = CalibrationState {
            coil_resistance_mohm: 20,
            lock_voltage_ceiling_mv: 88,
            ..shorted
        };
        assert!(low.is_usable(&quick_cfg()));
        assert!(!s.adopt(low));
        assert!(s.is_running());
    }

    #[test]
    fn adopt_rejects_unusable_results() {
        let mut s = seq();
        let bad = CalibrationState {
            coil_resistance_mohm: 20_000,
            nominal_supply_mv: 12_000,
            target_lock_current_ma: 4400,
            lock_voltage_ceiling_mv: 12_000,
            calibration_failed: false,
        };
        assert!(!s.adopt(bad));
        assert!(s.is_running());

        let good = CalibrationState {
            coil_resistance_mohm: 1500,
            lock_voltage_ceiling_mv: 6600,
            ..bad
        };
        assert!(s.adopt(good));
        assert!(s.is_calibrated());
        s.reset();
        assert!(s.result().is_none());
        assert!(s.is_running());
    }
}
