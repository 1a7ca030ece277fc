#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas for the coil controller.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//!   Every section is optional; omitted fields take the firmware defaults.
//! - `PersistedCalibration` is the on-disk form of a calibration result.
//! - The drive-profile CSV loader enforces headers and row ordering.
use serde::{Deserialize, Serialize};

/// Drive profile CSV schema.
///
/// Expected headers:
/// tick,force_pct,supply_mv
///
/// Each row takes effect at `tick` and holds until the next row.
/// `supply_mv` may be left empty to keep the previous supply.
///
/// Example:
/// tick,force_pct,supply_mv
/// 0,50,12000
/// 3000,50,10500
/// 4000,80,
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ProfileRow {
    pub tick: u64,
    pub force_pct: u8,
    pub supply_mv: Option<u16>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CoilCfg {
    pub max_out_current_ma: u16,
    pub max_set_current_ma: u16,
    pub min_set_current_ma: u16,
    pub max_out_voltage_mv: u16,
    pub min_out_voltage_mv: u16,
    pub supply_min_mv: u16,
    pub supply_max_mv: u16,
}

impl Default for CoilCfg {
    fn default() -> Self {
        Self {
            max_out_current_ma: 6000,
            max_set_current_ma: 4500,
            min_set_current_ma: 100,
            max_out_voltage_mv: 10_000,
            min_out_voltage_mv: 100,
            supply_min_mv: 10_000,
            supply_max_mv: 18_000,
        }
    }
}

/// PID coefficients as `mul/div` pairs. Accepts `kp = [3, 1]` style arrays.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PidCfg {
    pub kp: (u8, u8),
    pub ki: (u8, u8),
    pub kd: (u8, u8),
}

impl Default for PidCfg {
    fn default() -> Self {
        Self {
            kp: (3, 1),
            ki: (1, 1),
            kd: (1, 10),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ProtectionCfg {
    /// Overcurrent threshold, percent of the target current
    pub ocp_percent: u8,
    /// Overvoltage ceiling while no voltage target is set (mV)
    pub ovp_default_mv: u16,
    pub ovp_percent: u8,
    pub uvp_percent: u8,
    pub inrush_trip_threshold: u8,
    pub cooldown_ticks: u16,
    /// Re-trips tolerated while retrying before lockdown
    pub retry_limit: u8,
    pub deadtime_ticks: u16,
}

impl Default for ProtectionCfg {
    fn default() -> Self {
        Self {
            ocp_percent: 160,
            ovp_default_mv: 6000,
            ovp_percent: 120,
            uvp_percent: 80,
            inrush_trip_threshold: 10,
            cooldown_ticks: 2000,
            retry_limit: 1,
            deadtime_ticks: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Fixed drive while calibrating, percent of full scale (1..=100)
    pub duty_percent: u8,
    pub settle_ticks: u16,
    pub max_resistance_mohm: u16,
    pub nominal_supply_mv: u16,
    pub lock_current_ma: u16,
    pub retry_delay_ticks: u16,
    pub load_loss_debounce_ticks: u16,
    /// Skip the startup sequence when a stored calibration is available
    pub skip_when_persisted: bool,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            duty_percent: 20,
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PwmCfg {
    pub full_scale: u16,
    /// Defaults to `full_scale` when absent
    pub max_duty: Option<u16>,
}

impl Default for PwmCfg {
    fn default() -> Self {
        Self {
            full_scale: u16::MAX,
            max_duty: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoopCfg {
    pub tick_hz: u32,
    /// Max wait per sensor read (ms). Also accepts alias "sample_ms".
    #[serde(alias = "sample_ms")]
    pub sensor_timeout_ms: u64,
    /// Return an error from the run loop once the output is locked down
    pub stop_on_lockdown: bool,
}

impl Default for LoopCfg {
    fn default() -> Self {
        Self {
            tick_hz: 1000,
            sensor_timeout_ms: 5,
            stop_on_lockdown: true,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// Parameters of the simulated coil used by the CLI.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimulatorCfg {
    pub resistance_mohm: u16,
    /// L/R time constant expressed in control ticks
    pub time_constant_ticks: u16,
    pub supply_mv: u16,
}

impl Default for SimulatorCfg {
    fn default() -> Self {
        Self {
            resistance_mohm: 1500,
            time_constant_ticks: 10,
            supply_mv: 12_000,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub coil: CoilCfg,
    #[serde(default)]
    pub pid: PidCfg,
    #[serde(default)]
    pub protection: ProtectionCfg,
    #[serde(default)]
    pub calibration: CalibrationCfg,
    #[serde(default)]
    pub pwm: PwmCfg,
    #[serde(default, rename = "loop")]
    pub control_loop: LoopCfg,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub simulator: SimulatorCfg,
    /// Optional stored calibration; used at startup when no store file has one.
    #[serde(default)]
    pub calibration_data: Option<PersistedCalibration>,
}

/// Calibration result as written to disk.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct PersistedCalibration {
    pub coil_resistance_mohm: u16,
    pub nominal_supply_mv: u16,
    pub target_lock_current_ma: u16,
    pub lock_voltage_ceiling_mv: u16,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

pub fn load_persisted_calibration(path: &std::path::Path) -> eyre::Result<PersistedCalibration> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read calibration {:?}: {}", path, e))?;
    let cal: PersistedCalibration =
        toml::from_str(&text).map_err(|e| eyre::eyre!("parse calibration {:?}: {}", path, e))?;
    cal.validate()?;
    Ok(cal)
}

impl PersistedCalibration {
    pub fn validate(&self) -> eyre::Result<()> {
        if self.coil_resistance_mohm == 0 {
            eyre::bail!("calibration.coil_resistance_mohm must be > 0");
        }
        if self.nominal_supply_mv == 0 {
            eyre::bail!("calibration.nominal_supply_mv must be > 0");
        }
        if self.lock_voltage_ceiling_mv > self.nominal_supply_mv {
            eyre::bail!("calibration.lock_voltage_ceiling_mv must be <= nominal_supply_mv");
        }
        Ok(())
    }
}

pub fn load_drive_profile_csv(path: &std::path::Path) -> eyre::Result<Vec<ProfileRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open profile CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["tick", "force_pct", "supply_mv"];
    let actual: Vec<String> = headers.iter().map(ToString::to_string).collect();
    if actual != expected {
        eyre::bail!(
            "profile CSV must have headers 'tick,force_pct,supply_mv', got: {}",
            actual.join(",")
        );
    }

    let mut rows: Vec<ProfileRow> = Vec::new();
    for (idx, rec) in rdr.deserialize::<ProfileRow>().enumerate() {
        let line = idx + 2;
        let row = match rec {
            Ok(row) => row,
            Err(e) => eyre::bail!("invalid CSV row {}: {}", line, e),
        };
        if row.force_pct > 100 {
            eyre::bail!("profile row {}: force_pct must be <= 100", line);
        }
        if let Some(prev) = rows.last()
            && row.tick <= prev.tick
        {
            eyre::bail!("profile row {}: ticks must be strictly increasing", line);
        }
        rows.push(row);
    }
    if rows.is_empty() {
        eyre::bail!("profile CSV {:?} has no rows", path);
    }
    Ok(rows)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Coil
        let c = &self.coil;
        if c.min_set_current_ma > c.max_set_current_ma {
            eyre::bail!("coil.min_set_current_ma must be <= coil.max_set_current_ma");
        }
        if c.min_out_voltage_mv >= c.max_out_voltage_mv {
            eyre::bail!("coil.min_out_voltage_mv must be < coil.max_out_voltage_mv");
        }
        if c.supply_min_mv >= c.supply_max_mv {
            eyre::bail!("coil.supply_min_mv must be < coil.supply_max_mv");
        }

        // PID
        if self.pid.kp.1 == 0 {
            eyre::bail!("pid.kp divisor must be > 0");
        }
        if self.pid.ki.1 == 0 {
            eyre::bail!("pid.ki divisor must be > 0");
        }
        if self.pid.kd.1 == 0 {
            eyre::bail!("pid.kd divisor must be > 0");
        }

        // Protection
        let p = &self.protection;
        if p.ocp_percent < 100 {
            eyre::bail!("protection.ocp_percent must be >= 100");
        }
        if p.ovp_percent < 100 {
            eyre::bail!("protection.ovp_percent must be >= 100");
        }
        if p.uvp_percent == 0 || p.uvp_percent > 100 {
            eyre::bail!("protection.uvp_percent must be in 1..=100");
        }
        if p.inrush_trip_threshold == u8::MAX {
            eyre::bail!("protection.inrush_trip_threshold must be < 255");
        }
        if p.cooldown_ticks == 0 {
            eyre::bail!("protection.cooldown_ticks must be >= 1");
        }

        // Calibration
        let cal = &self.calibration;
        if cal.duty_percent == 0 || cal.duty_percent > 100 {
            eyre::bail!("calibration.duty_percent must be in 1..=100");
        }
        if cal.max_resistance_mohm == 0 {
            eyre::bail!("calibration.max_resistance_mohm must be > 0");
        }
        if cal.nominal_supply_mv == 0 {
            eyre::bail!("calibration.nominal_supply_mv must be > 0");
        }
        if cal.lock_current_ma == 0 {
            eyre::bail!("calibration.lock_current_ma must be > 0");
        }

        // PWM
        if self.pwm.full_scale == 0 {
            eyre::bail!("pwm.full_scale must be > 0");
        }
        if let Some(max) = self.pwm.max_duty
            && max > self.pwm.full_scale
        {
            eyre::bail!("pwm.max_duty must be <= pwm.full_scale");
        }

        // Loop
        if self.control_loop.tick_hz == 0 {
            eyre::bail!("loop.tick_hz must be > 0");
        }
        if self.control_loop.tick_hz > 100_000 {
            eyre::bail!("loop.tick_hz is unreasonably large (>100kHz)");
        }
        if self.control_loop.sensor_timeout_ms == 0 {
            eyre::bail!("loop.sensor_timeout_ms must be >= 1");
        }

        // Logging
        if let Some(rotation) = self.logging.rotation.as_deref()
            && !matches!(rotation, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        // Simulator
        if self.simulator.time_constant_ticks == 0 {
            eyre::bail!("simulator.time_constant_ticks must be >= 1");
        }

        if let Some(cal) = &self.calibration_data {
            cal.validate()?;
        }

        Ok(())
    }
}
