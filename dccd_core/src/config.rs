//! Runtime configuration types for the coil controller.
//!
//! These are the structs consumed by `CoilController`. They are separate from
//! the TOML-deserialized config in `dccd_config`; see `conversions` for the
//! mapping. Defaults reproduce the constants the controller shipped with.

/// Electrical limits of the coil and its driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoilLimits {
    /// Overcurrent ceiling used while no target voltage is set (mA).
    pub max_out_current_ma: u16,
    /// Largest current target a force request may produce (mA).
    pub max_set_current_ma: u16,
    /// Smallest non-zero current target (mA).
    pub min_set_current_ma: u16,
    /// Upper bound of the PID voltage output (mV).
    pub max_out_voltage_mv: u16,
    /// PID outputs below this are forced to exactly 0 (mV).
    pub min_out_voltage_mv: u16,
    /// Overcurrent threshold as a percentage of the target current.
    pub ocp_limit_percent: u8,
    /// Overvoltage ceiling used while no target voltage is set (mV).
    pub ovp_limit_default_mv: u16,
    /// Overvoltage threshold as a percentage of the target voltage.
    pub ovp_limit_percent: u8,
    /// Undervoltage threshold as a percentage of the target voltage.
    pub uvp_limit_percent: u8,
    /// Supply undervoltage lockout (mV).
    pub supply_min_mv: u16,
    /// Supply overvoltage lockout (mV).
    pub supply_max_mv: u16,
}

impl Default for CoilLimits {
    fn default() -> Self {
        Self {
            max_out_current_ma: 6000,
            max_set_current_ma: 4500,
            min_set_current_ma: 100,
            max_out_voltage_mv: 10_000,
            min_out_voltage_mv: 100,
            ocp_limit_percent: 160,
            ovp_limit_default_mv: 6000,
            ovp_limit_percent: 120,
            uvp_limit_percent: 80,
            supply_min_mv: 10_000,
            supply_max_mv: 18_000,
        }
    }
}

/// PID coefficients as unsigned multiplier/divisor pairs.
///
/// Defaults: Kp = 3, Ki = 1, Kd = 0.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PidGains {
    pub kp_mul: u8,
    pub kp_div: u8,
    pub ki_mul: u8,
    pub ki_div: u8,
    pub kd_mul: u8,
    pub kd_div: u8,
}

impl Default for PidGains {
    fn default() -> Self {
        Self {
            kp_mul: 3,
            kp_div: 1,
            ki_mul: 1,
            ki_div: 1,
            kd_mul: 1,
            kd_div: 10,
        }
    }
}

/// Fault state machine timing. All durations are in control ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectionCfg {
    /// Trip when the inrush counter exceeds this value.
    pub inrush_trip_threshold: u8,
    /// Cooldown after a trip and observation window while retrying.
    pub cooldown_ticks: u16,
    /// Lock down once the retry counter exceeds this value.
    /// 0 reduces the machine to the plain trip/cooldown model.
    pub retry_limit: u8,
    /// Blanking window after a force change or calibration step.
    pub deadtime_ticks: u16,
}

impl Default for ProtectionCfg {
    fn default() -> Self {
        Self {
            inrush_trip_threshold: 10,
            cooldown_ticks: 2000,
            retry_limit: 1,
            deadtime_ticks: 30,
        }
    }
}

/// Coil resistance self-calibration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationCfg {
    /// Fixed drive during calibration, percent of PWM full scale.
    pub drive_percent: u8,
    /// Ticks to let the coil current settle before measuring.
    pub settle_ticks: u16,
    /// Measured resistance above this is treated as an open load (mΩ).
    pub max_resistance_mohm: u16,
    /// Supply assumed when the measured one is out of range (mV).
    pub nominal_supply_mv: u16,
    /// Maximum safe locked current into the installed coil (mA).
    pub lock_current_ma: u16,
    /// Delay before a failed calibration is attempted again.
    pub retry_delay_ticks: u16,
    /// Consecutive load-loss ticks in compensated mode before recalibrating.
    pub load_loss_debounce_ticks: u16,
    /// Skip the startup sequence when a persisted calibration is available.
    pub skip_when_persisted: bool,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            drive_percent: 20,
            settle_ticks: 1000,
            max_resistance_mohm: 10_000,
            nominal_supply_mv: 12_000,
            lock_current_ma: 4400,
            retry_delay_ticks: 1000,
            load_loss_debounce_ticks: 20,
            skip_when_persisted: true,
        }
    }
}

/// PWM output scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwmCfg {
    /// Duty value corresponding to 100 % on-time.
    pub full_scale: u16,
    /// Hard cap applied to every duty command (<= full_scale).
    pub max_duty: u16,
}

impl Default for PwmCfg {
    fn default() -> Self {
        Self {
            full_scale: u16::MAX,
            max_duty: u16::MAX,
        }
    }
}

/// Control loop pacing and sensor access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopCfg {
    /// Control ticks per second.
    pub tick_hz: u32,
    /// Max sensor wait per read (ms).
    pub sensor_timeout_ms: u64,
}

impl Default for LoopCfg {
    fn default() -> Self {
        Self {
            tick_hz: 1000,
            sensor_timeout_ms: 5,
        }
    }
}

/// Complete runtime configuration of one coil channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoilConfig {
    pub limits: CoilLimits,
    pub pid: PidGains,
    pub protection: ProtectionCfg,
    pub calibration: CalibrationCfg,
    pub pwm: PwmCfg,
    pub control_loop: LoopCfg,
}
