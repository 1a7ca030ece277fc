use std::time::Duration;

use dccd_hardware::error::HwError;
use dccd_hardware::{CoilParams, SimulatedCoil};
use dccd_traits::{CoilDriver, CoilSensor};
use rstest::rstest;

const T: Duration = Duration::from_millis(5);

fn settle(coil: &mut SimulatedCoil, ticks: usize) -> dccd_traits::Measurement {
    let mut last = dccd_traits::Measurement::default();
    for _ in 0..ticks {
        last = coil.read(T).unwrap();
    }
    last
}

#[test]
fn open_load_drops_current_but_keeps_voltage() {
    let mut coil = SimulatedCoil::default();
    let h = coil.handle();
    coil.driver().set_duty(13_107).unwrap();
    assert!(settle(&mut coil, 100).current_ma > 0);
    h.set_open_load(true);
    let m = coil.read(T).unwrap();
    assert_eq!(m.current_ma, 0);
    assert_eq!(m.voltage_mv, 2400);
}

#[test]
fn short_raises_current() {
    let mut coil = SimulatedCoil::default();
    let h = coil.handle();
    coil.driver().set_duty(13_107).unwrap();
    settle(&mut coil, 100);
    h.set_short_mohm(Some(100));
    let m = settle(&mut coil, 200);
    assert_eq!(m.current_ma, 24_000);
}

#[rstest]
#[case(10_000, 2000)]
#[case(14_000, 2800)]
fn supply_changes_scale_applied_voltage(#[case] supply: u16, #[case] volts: u16) {
    let mut coil = SimulatedCoil::default();
    let h = coil.handle();
    h.set_supply_mv(supply);
    coil.driver().set_duty(13_107).unwrap();
    let m = coil.read(T).unwrap();
    assert_eq!(m.supply_mv, supply);
    assert_eq!(m.voltage_mv, volts);
}

#[test]
fn injected_timeouts_are_typed_and_do_not_advance() {
    let mut coil = SimulatedCoil::default();
    let h = coil.handle();
    h.inject_timeouts(2);
    for _ in 0..2 {
        let err = coil.read(T).unwrap_err();
        assert_eq!(err.downcast_ref::<HwError>(), Some(&HwError::Timeout));
    }
    assert_eq!(h.ticks(), 0);
    coil.read(T).unwrap();
    assert_eq!(h.ticks(), 1);
}

#[test]
fn driver_rejects_out_of_range_duty_and_injected_faults() {
    let coil = SimulatedCoil::new(CoilParams {
        full_scale: 1000,
        ..CoilParams::default()
    });
    let mut drv = coil.driver();
    let err = drv.set_duty(1001).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<HwError>(),
        Some(HwError::DutyOutOfRange { duty: 1001, .. })
    ));

    let h = coil.handle();
    h.set_driver_fault(Some("gate driver fault"));
    let err = drv.set_duty(10).unwrap_err();
    assert!(err.to_string().contains("gate driver fault"));
    h.set_driver_fault(None);
    drv.set_duty(10).unwrap();
    assert_eq!(h.duty(), 10);
}
