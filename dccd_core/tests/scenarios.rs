//! End-to-end runs of the actuator against the simulated coil.

use dccd_core::{
    Actuator, ActuatorError, CoilConfig, ControlMode, FaultEvent, FaultState, ForceFn,
    StopReason, TickReport,
};
use dccd_hardware::{CoilParams, SimHandle, SimulatedCoil};
use dccd_traits::clock::TestClock;

fn rig(cfg: CoilConfig, stop_on_lockdown: bool) -> (Actuator, SimHandle, TestClock) {
    let coil = SimulatedCoil::new(CoilParams::default());
    let driver = coil.driver();
    let handle = coil.handle();
    let clock = TestClock::new();
    let actuator = Actuator::builder()
        .sensor(coil)
        .driver(driver)
        .config(cfg)
        .clock(clock.clone())
        .stop_on_lockdown(stop_on_lockdown)
        .build()
        .expect("build actuator");
    (actuator, handle, clock)
}

fn run_for(act: &mut Actuator, force: u8, ticks: u64) -> Vec<TickReport> {
    let mut reports = Vec::new();
    let mut source = force;
    act.run(&mut source, Some(ticks), |_, r| reports.push(*r))
        .expect("run");
    reports
}

#[test]
fn calibrates_at_startup_then_tracks_half_force() {
    let (mut act, sim, _clock) = rig(CoilConfig::default(), true);

    let reports = run_for(&mut act, 50, 1100);
    assert_eq!(reports[0].mode, ControlMode::Calibrating);
    let cal = *act.controller().calibration().expect("calibrated");
    assert!(!cal.calibration_failed);
    assert!(cal.coil_resistance_mohm.abs_diff(1500) <= 5, "{cal:?}");
    assert_eq!(cal.nominal_supply_mv, 12_000);
    assert!(cal.lock_voltage_ceiling_mv.abs_diff(6600) <= 25);

    let reports = run_for(&mut act, 50, 2000);
    let last = reports.last().expect("reports");
    assert_eq!(last.mode, ControlMode::Compensated);
    assert_eq!(last.fault_state, FaultState::Normal);
    assert_eq!(last.target_current_ma, 2250);
    assert!(sim.current_ma().abs_diff(2250) <= 5, "current {}", sim.current_ma());
    assert!(reports.iter().all(|r| r.event == FaultEvent::None));
}

#[test]
fn duty_compensates_for_supply_changes() {
    let (mut act, sim, _clock) = rig(CoilConfig::default(), true);
    run_for(&mut act, 50, 3000);

    let mut duties = Vec::new();
    for supply in [10_000u16, 12_000, 14_000] {
        sim.set_supply_mv(supply);
        let reports = run_for(&mut act, 50, 500);
        let last = reports.last().expect("reports");
        assert_eq!(last.fault_state, FaultState::Normal);
        assert!(
            sim.current_ma().abs_diff(2250) <= 5,
            "supply {supply}: current {}",
            sim.current_ma()
        );
        duties.push(last.duty);
    }
    assert!(duties[0] > duties[1] && duties[1] > duties[2], "{duties:?}");
}

#[test]
fn open_load_freezes_integral_and_falls_back_to_uncompensated() {
    let (mut act, sim, _clock) = rig(CoilConfig::default(), true);
    run_for(&mut act, 40, 2000);
    assert!(act.controller().is_calibrated());

    sim.set_open_load(true);
    let reports = run_for(&mut act, 40, 3);
    assert!(reports[1].warnings.load_loss);
    assert_eq!(act.controller().pid().integral(), 0);
    // proportional term alone, capped by the lock ceiling
    assert!(reports[2].target_voltage_mv > 0);

    let reports = run_for(&mut act, 40, 1100);
    assert!(reports.iter().any(|r| r.mode == ControlMode::Calibrating));
    let last = reports.last().expect("reports");
    assert_eq!(last.mode, ControlMode::Uncompensated);
    assert!(last.calibration_failed);
    assert_eq!(last.fault_state, FaultState::Normal);

    // reconnect: the failed calibration retries after its delay and passes
    sim.set_open_load(false);
    let reports = run_for(&mut act, 40, 2500);
    let last = reports.last().expect("reports");
    assert_eq!(last.mode, ControlMode::Compensated);
    assert!(!last.calibration_failed);
}

#[test]
fn repeated_short_circuit_trips_lock_the_output_down() {
    let (mut act, sim, _clock) = rig(CoilConfig::default(), true);
    run_for(&mut act, 50, 1500);
    assert!(act.controller().is_calibrated());

    sim.set_short_mohm(Some(10));
    let mut trips = 0;
    let mut source = 50u8;
    let err = act
        .run(&mut source, Some(20_000), |_, r| {
            if r.event == FaultEvent::Tripped {
                trips += 1;
            }
        })
        .expect_err("lockdown should stop the run");
    assert!(matches!(
        err.downcast_ref::<ActuatorError>(),
        Some(ActuatorError::Lockdown)
    ));
    assert_eq!(trips, 3);
    assert_eq!(act.controller().fault_state(), FaultState::Lockdown);
    assert!(!sim.is_enabled());
}

#[test]
fn lockdown_holds_duty_at_zero_for_any_force() {
    let (mut act, sim, _clock) = rig(CoilConfig::default(), false);
    run_for(&mut act, 50, 1500);
    sim.set_short_mohm(Some(10));
    run_for(&mut act, 50, 10_000);
    assert_eq!(act.controller().fault_state(), FaultState::Lockdown);

    sim.set_short_mohm(None);
    let mut source = ForceFn(|tick: u64| (tick % 101) as u8);
    let summary = act
        .run(&mut source, Some(5000), |_, r| {
            assert_eq!(r.duty, 0);
            assert_eq!(r.mode, ControlMode::Disabled);
        })
        .expect("run");
    assert_eq!(summary.stop, StopReason::Completed);
    assert_eq!(summary.last.map(|r| r.fault_state), Some(FaultState::Lockdown));

    act.reinitialize();
    let reports = run_for(&mut act, 50, 1200);
    assert_eq!(reports[0].mode, ControlMode::Calibrating);
    assert_eq!(reports.last().map(|r| r.mode), Some(ControlMode::Compensated));
}
