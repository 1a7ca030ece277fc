//! Human-readable error descriptions and structured JSON error formatting.

use dccd_core::error::{ActuatorError, BuildError};

/// Exit code for a lockdown stop.
pub const EXIT_LOCKDOWN: i32 = 3;
/// Exit code for invalid configuration or input files.
pub const EXIT_CONFIG: i32 = 2;
/// Exit code for everything else.
pub const EXIT_OTHER: i32 = 1;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingSensor => {
                "What happened: No coil sensor was provided to the controller.\nLikely causes: The sensor failed to initialize or was not wired into the builder.\nHow to fix: Pass a sensor via sensor(...) before building.".to_string()
            }
            BuildError::MissingDriver => {
                "What happened: No PWM driver was provided to the controller.\nLikely causes: The driver failed to initialize or was not wired into the builder.\nHow to fix: Pass a driver via driver(...) before building.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun `udccd self-check`."
            ),
        };
    }

    if let Some(ae) = err.downcast_ref::<ActuatorError>() {
        return match ae {
            ActuatorError::Lockdown => "What happened: Output locked down after repeated faults.\nLikely causes: Shorted coil, wiring fault, or a supply outside its limits during every retry.\nHow to fix: Inspect the coil and harness, then restart the controller to clear the lockdown.".to_string(),
            ActuatorError::Timeout => "What happened: Coil sensor read timed out.\nLikely causes: ADC not responding or loop.sensor_timeout_ms too low.\nHow to fix: Check the sensor and consider increasing loop.sensor_timeout_ms in the config.".to_string(),
            ActuatorError::HardwareFault(msg) | ActuatorError::Hardware(msg) => format!(
                "What happened: Output stage error ({msg}).\nLikely causes: Driver fault or duty outside the PWM range.\nHow to fix: Check the driver and [pwm] settings; re-run with --log-level=debug for detail."
            ),
            ActuatorError::Config(msg) => format!(
                "What happened: Configuration is invalid ({msg}).\nLikely causes: Out-of-range or mistyped values in the TOML.\nHow to fix: Edit the config file, then rerun `udccd self-check`."
            ),
            ActuatorError::Persistence(msg) => format!(
                "What happened: Calibration store error ({msg}).\nLikely causes: Unwritable path or a corrupt calibration file.\nHow to fix: Check the --store path, or delete the file to force a fresh calibration."
            ),
        };
    }

    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("profile csv must have headers") {
        return "Invalid headers in drive profile CSV. Expected 'tick,force_pct,supply_mv'.".to_string();
    }

    if lower.contains("calibration failed") {
        return format!(
            "What happened: {msg}.\nLikely causes: Coil disconnected, coil shorted, or resistance above calibration.max_resistance_mohm.\nHow to fix: Check the coil connector and rerun `udccd calibrate`."
        );
    }

    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable process exit codes per error class.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(ae) = err.downcast_ref::<ActuatorError>() {
        return match ae {
            ActuatorError::Lockdown => EXIT_LOCKDOWN,
            ActuatorError::Config(_) => EXIT_CONFIG,
            _ => EXIT_OTHER,
        };
    }
    if matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ) {
        return EXIT_CONFIG;
    }
    EXIT_OTHER
}

/// Stable reason name for JSON output.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(ae) = err.downcast_ref::<ActuatorError>() {
        return match ae {
            ActuatorError::Lockdown => "Lockdown",
            ActuatorError::Timeout => "Timeout",
            ActuatorError::HardwareFault(_) | ActuatorError::Hardware(_) => "Hardware",
            ActuatorError::Config(_) => "Config",
            ActuatorError::Persistence(_) => "Persistence",
        };
    }
    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    "Error"
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}
