//! Simulator-backed commands: control loop, calibration, self-check.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use dccd_config::{Config, ProfileRow};
use dccd_core::{
    Actuator, CalibrationState, CoilConfig, CoilController, FileCalibrationStore, ForceSource,
    RunSummary, TickReport,
};
use dccd_hardware::{CoilParams, SimHandle, SimulatedCoil};
use dccd_traits::clock::{MonotonicClock, TestClock};
use eyre::WrapErr;
use serde_json::json;

use crate::cli::SimFaults;

/// Options for `udccd run`.
#[derive(Debug)]
pub struct RunOpts<'a> {
    pub force: Option<u8>,
    pub ticks: u64,
    pub profile: Option<&'a Path>,
    pub store: Option<&'a Path>,
    pub report_every: Option<u64>,
    pub realtime: bool,
    pub faults: SimFaults,
    pub json: bool,
}

enum DrivePlan {
    Constant(u8),
    Profile {
        rows: Vec<ProfileRow>,
        next: usize,
        force: u8,
    },
}

/// Force source that also steers the simulated plant: profile supply steps
/// and the delayed fault injection.
struct SimDrive {
    plan: DrivePlan,
    faults: SimFaults,
    faults_applied: bool,
    sim: SimHandle,
}

impl ForceSource for SimDrive {
    fn force_at(&mut self, tick: u64) -> u8 {
        if !self.faults_applied && tick >= self.faults.fault_at {
            apply_faults(&self.sim, &self.faults);
            self.faults_applied = true;
        }
        match &mut self.plan {
            DrivePlan::Constant(force) => *force,
            DrivePlan::Profile { rows, next, force } => {
                while let Some(row) = rows.get(*next).copied()
                    && row.tick <= tick
                {
                    *force = row.force_pct;
                    if let Some(mv) = row.supply_mv {
                        self.sim.set_supply_mv(mv);
                    }
                    tracing::debug!(tick, force = row.force_pct, supply_mv = row.supply_mv, "profile step");
                    *next += 1;
                }
                *force
            }
        }
    }
}

fn apply_faults(sim: &SimHandle, faults: &SimFaults) {
    if faults.open_load {
        tracing::info!("injecting open load");
        sim.set_open_load(true);
    }
    if let Some(r) = faults.short_mohm {
        tracing::info!(short_mohm = r, "injecting shorted coil");
        sim.set_short_mohm(Some(r));
    }
}

fn sim_params(cfg: &Config, faults: &SimFaults) -> CoilParams {
    CoilParams {
        resistance_mohm: cfg.simulator.resistance_mohm,
        time_constant_ticks: cfg.simulator.time_constant_ticks,
        supply_mv: faults.supply_mv.unwrap_or(cfg.simulator.supply_mv),
        full_scale: cfg.pwm.full_scale,
    }
}

fn build_actuator(
    cfg: &Config,
    coil: SimulatedCoil,
    store: Option<&Path>,
    realtime: bool,
    shutdown: Option<Arc<AtomicBool>>,
) -> eyre::Result<Actuator> {
    let driver = coil.driver();
    let mut builder = Actuator::builder()
        .sensor(coil)
        .driver(driver)
        .config(CoilConfig::from(cfg))
        .stop_on_lockdown(cfg.control_loop.stop_on_lockdown);
    builder = if realtime {
        builder.clock(MonotonicClock::new())
    } else {
        builder.clock(TestClock::new())
    };
    if let Some(path) = store {
        builder = builder.store(FileCalibrationStore::new(path));
    }
    if let Some(persisted) = &cfg.calibration_data {
        builder = builder.calibration(CalibrationState::from(persisted));
    }
    if let Some(flag) = shutdown {
        builder = builder.shutdown_flag(flag);
    }
    builder.build()
}

fn calibration_json(state: Option<&CalibrationState>) -> serde_json::Value {
    state.map_or(serde_json::Value::Null, |c| {
        json!({
            "resistance_mohm": c.coil_resistance_mohm,
            "nominal_supply_mv": c.nominal_supply_mv,
            "lock_current_ma": c.target_lock_current_ma,
            "ceiling_mv": c.lock_voltage_ceiling_mv,
            "failed": c.calibration_failed,
        })
    })
}

fn print_status(json: bool, tick: u64, r: &TickReport, current_ma: u16) {
    if json {
        let warnings: Vec<_> = r.warnings.active().collect();
        println!(
            "{}",
            json!({
                "tick": tick,
                "state": r.fault_state.as_str(),
                "mode": r.mode.as_str(),
                "duty": r.duty,
                "current_ma": current_ma,
                "target_ma": r.target_current_ma,
                "target_mv": r.target_voltage_mv,
                "warnings": warnings,
            })
        );
    } else {
        println!(
            "tick {tick:>6}  {:<9} {:<14} duty {:>5}  I {:>5} mA  target {:>5} mA",
            r.fault_state.as_str(),
            r.mode.as_str(),
            r.duty,
            current_ma,
            r.target_current_ma
        );
    }
}

fn print_summary(json: bool, summary: &RunSummary, act: &Actuator) {
    let m = summary.last_measurement;
    let last = summary.last.unwrap_or_default();
    let cal = act.controller().calibration();
    if json {
        println!(
            "{}",
            json!({
                "ticks": summary.ticks,
                "stop": match summary.stop {
                    dccd_core::StopReason::Completed => "completed",
                    dccd_core::StopReason::Shutdown => "shutdown",
                },
                "elapsed_ms": summary.elapsed_ms,
                "fault_state": last.fault_state.as_str(),
                "mode": last.mode.as_str(),
                "duty": last.duty,
                "current_ma": m.current_ma,
                "supply_mv": m.supply_mv,
                "target_current_ma": last.target_current_ma,
                "calibration": calibration_json(cal),
            })
        );
        return;
    }
    println!(
        "run complete: {} ticks, state {}, mode {}",
        summary.ticks, last.fault_state, last.mode
    );
    println!(
        "  duty {}  current {} mA (target {} mA)  supply {} mV",
        last.duty, m.current_ma, last.target_current_ma, m.supply_mv
    );
    match cal {
        Some(c) if !c.calibration_failed => println!(
            "  calibration: {} mOhm, lock ceiling {} mV",
            c.coil_resistance_mohm, c.lock_voltage_ceiling_mv
        ),
        Some(_) => println!("  calibration: failed (uncompensated)"),
        None => println!("  calibration: pending"),
    }
}

pub fn run_sim(cfg: &Config, opts: RunOpts<'_>, shutdown: Arc<AtomicBool>) -> eyre::Result<()> {
    let plan = match (opts.profile, opts.force) {
        (Some(path), _) => {
            let rows = dccd_config::load_drive_profile_csv(path)
                .wrap_err_with(|| format!("loading drive profile {}", path.display()))?;
            DrivePlan::Profile {
                rows,
                next: 0,
                force: 0,
            }
        }
        (None, Some(force)) => DrivePlan::Constant(force),
        (None, None) => eyre::bail!("either --force or --profile is required"),
    };

    let coil = SimulatedCoil::new(sim_params(cfg, &opts.faults));
    let sim = coil.handle();
    let mut act = build_actuator(cfg, coil, opts.store, opts.realtime, Some(shutdown))?;
    let mut drive = SimDrive {
        plan,
        faults: opts.faults,
        faults_applied: false,
        sim: sim.clone(),
    };

    let json = opts.json;
    let every = opts.report_every.filter(|n| *n > 0);
    let summary = act.run(&mut drive, Some(opts.ticks), |tick, r| {
        if let Some(n) = every
            && tick % n == 0
        {
            print_status(json, tick, r, sim.current_ma());
        }
    })?;
    print_summary(json, &summary, &act);
    Ok(())
}

pub fn run_calibrate(
    cfg: &Config,
    store: Option<&Path>,
    max_ticks: u64,
    faults: &SimFaults,
    json: bool,
) -> eyre::Result<()> {
    let coil = SimulatedCoil::new(sim_params(cfg, faults));
    apply_faults(&coil.handle(), faults);
    let mut act = build_actuator(cfg, coil, store, false, None)?;

    let state = act.calibrate(max_ticks)?;
    if state.calibration_failed {
        eyre::bail!(
            "calibration failed: measured {} mOhm is not usable (limit {} mOhm)",
            state.coil_resistance_mohm,
            cfg.calibration.max_resistance_mohm
        );
    }
    if json {
        println!(
            "{}",
            json!({
                "calibration": calibration_json(Some(&state)),
                "stored": store.map(|p| p.display().to_string()),
            })
        );
    } else {
        println!(
            "calibration passed: {} mOhm, supply {} mV, lock ceiling {} mV",
            state.coil_resistance_mohm, state.nominal_supply_mv, state.lock_voltage_ceiling_mv
        );
        if let Some(path) = store {
            println!("stored in {}", path.display());
        }
    }
    Ok(())
}

pub fn self_check(cfg: &Config, json: bool) -> eyre::Result<()> {
    let coil_cfg = CoilConfig::from(cfg);
    let controller = CoilController::new(coil_cfg.clone())?;
    let period_us = dccd_core::util::period_us(coil_cfg.control_loop.tick_hz);
    let l = &coil_cfg.limits;
    let p = &coil_cfg.protection;
    let stored = cfg.calibration_data.is_some();
    tracing::debug!(state = %controller.fault_state(), "controller constructed");

    if json {
        println!(
            "{}",
            json!({
                "status": "ok",
                "tick_hz": coil_cfg.control_loop.tick_hz,
                "period_us": period_us,
                "max_set_current_ma": l.max_set_current_ma,
                "max_out_voltage_mv": l.max_out_voltage_mv,
                "supply_window_mv": [l.supply_min_mv, l.supply_max_mv],
                "inrush_trip_threshold": p.inrush_trip_threshold,
                "cooldown_ticks": p.cooldown_ticks,
                "retry_limit": p.retry_limit,
                "stored_calibration": stored,
            })
        );
        return Ok(());
    }
    println!("self-check ok");
    println!("  loop: {} Hz ({} us/tick)", coil_cfg.control_loop.tick_hz, period_us);
    println!(
        "  limits: set {}..{} mA, out <= {} mV, supply {}..{} mV",
        l.min_set_current_ma, l.max_set_current_ma, l.max_out_voltage_mv, l.supply_min_mv, l.supply_max_mv
    );
    println!(
        "  protection: trip > {} ticks, cooldown {} ticks, {} retries",
        p.inrush_trip_threshold, p.cooldown_ticks, p.retry_limit
    );
    println!(
        "  calibration: {}",
        if stored { "stored values present" } else { "runs at startup" }
    );
    Ok(())
}
