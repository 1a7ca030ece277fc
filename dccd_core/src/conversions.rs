//! `From` implementations bridging `dccd_config` types to `dccd_core` types.

use crate::calibration::CalibrationState;
use crate::config::{CalibrationCfg, CoilConfig, CoilLimits, LoopCfg, PidGains, ProtectionCfg, PwmCfg};

// ── CoilLimits ───────────────────────────────────────────────────────────────

impl From<&dccd_config::Config> for CoilLimits {
    fn from(c: &dccd_config::Config) -> Self {
        Self {
            max_out_current_ma: c.coil.max_out_current_ma,
            max_set_current_ma: c.coil.max_set_current_ma,
            min_set_current_ma: c.coil.min_set_current_ma,
            max_out_voltage_mv: c.coil.max_out_voltage_mv,
            min_out_voltage_mv: c.coil.min_out_voltage_mv,
            ocp_limit_percent: c.protection.ocp_percent,
            ovp_limit_default_mv: c.protection.ovp_default_mv,
            ovp_limit_percent: c.protection.ovp_percent,
            uvp_limit_percent: c.protection.uvp_percent,
            supply_min_mv: c.coil.supply_min_mv,
            supply_max_mv: c.coil.supply_max_mv,
        }
    }
}

// ── PidGains ─────────────────────────────────────────────────────────────────

impl From<&dccd_config::PidCfg> for PidGains {
    fn from(c: &dccd_config::PidCfg) -> Self {
        Self {
            kp_mul: c.kp.0,
            kp_div: c.kp.1,
            ki_mul: c.ki.0,
            ki_div: c.ki.1,
            kd_mul: c.kd.0,
            kd_div: c.kd.1,
        }
    }
}

// ── ProtectionCfg ────────────────────────────────────────────────────────────

impl From<&dccd_config::ProtectionCfg> for ProtectionCfg {
    fn from(c: &dccd_config::ProtectionCfg) -> Self {
        Self {
            inrush_trip_threshold: c.inrush_trip_threshold,
            cooldown_ticks: c.cooldown_ticks,
            retry_limit: c.retry_limit,
            deadtime_ticks: c.deadtime_ticks,
        }
    }
}

// ── CalibrationCfg ───────────────────────────────────────────────────────────

impl From<&dccd_config::CalibrationCfg> for CalibrationCfg {
    fn from(c: &dccd_config::CalibrationCfg) -> Self {
        Self {
            drive_percent: c.duty_percent,
            settle_ticks: c.settle_ticks,
            max_resistance_mohm: c.max_resistance_mohm,
            nominal_supply_mv: c.nominal_supply_mv,
            lock_current_ma: c.lock_current_ma,
            retry_delay_ticks: c.retry_delay_ticks,
            load_loss_debounce_ticks: c.load_loss_debounce_ticks,
            skip_when_persisted: c.skip_when_persisted,
        }
    }
}

// ── PwmCfg ───────────────────────────────────────────────────────────────────

impl From<&dccd_config::PwmCfg> for PwmCfg {
    fn from(c: &dccd_config::PwmCfg) -> Self {
        Self {
            full_scale: c.full_scale,
            max_duty: c.max_duty.unwrap_or(c.full_scale),
        }
    }
}

// ── LoopCfg ──────────────────────────────────────────────────────────────────

impl From<&dccd_config::LoopCfg> for LoopCfg {
    fn from(c: &dccd_config::LoopCfg) -> Self {
        Self {
            tick_hz: c.tick_hz,
            sensor_timeout_ms: c.sensor_timeout_ms,
        }
    }
}

// ── CoilConfig ───────────────────────────────────────────────────────────────

impl From<&dccd_config::Config> for CoilConfig {
    fn from(c: &dccd_config::Config) -> Self {
        Self {
            limits: CoilLimits::from(c),
            pid: PidGains::from(&c.pid),
            protection: ProtectionCfg::from(&c.protection),
            calibration: CalibrationCfg::from(&c.calibration),
            pwm: PwmCfg::from(&c.pwm),
            control_loop: LoopCfg::from(&c.control_loop),
        }
    }
}

// ── Calibration ──────────────────────────────────────────────────────────────

impl From<&dccd_config::PersistedCalibration> for CalibrationState {
    fn from(p: &dccd_config::PersistedCalibration) -> Self {
        Self {
            coil_resistance_mohm: p.coil_resistance_mohm,
            nominal_supply_mv: p.nominal_supply_mv,
            target_lock_current_ma: p.target_lock_current_ma,
            lock_voltage_ceiling_mv: p.lock_voltage_ceiling_mv,
            calibration_failed: false,
        }
    }
}

impl From<&CalibrationState> for dccd_config::PersistedCalibration {
    fn from(s: &CalibrationState) -> Self {
        Self {
            coil_resistance_mohm: s.coil_resistance_mohm,
            nominal_supply_mv: s.nominal_supply_mv,
            target_lock_current_ma: s.target_lock_current_ma,
            lock_voltage_ceiling_mv: s.lock_voltage_ceiling_mv,
        }
    }
}
