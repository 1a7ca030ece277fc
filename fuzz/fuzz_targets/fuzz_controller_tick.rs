#![no_main]
use libfuzzer_sys::arbitrary::{self, Arbitrary};
use libfuzzer_sys::fuzz_target;

use dccd_core::{CoilConfig, CoilController, FaultState};
use dccd_traits::Measurement;

#[derive(Debug, Arbitrary)]
struct Tick {
    force: u8,
    supply_mv: u16,
    current_ma: u16,
    voltage_mv: u16,
}

fuzz_target!(|ticks: Vec<Tick>| {
    let Ok(mut ctl) = CoilController::new(CoilConfig::default()) else {
        return;
    };
    let full_scale = ctl.config().pwm.full_scale;
    let mut locked = false;
    for t in &ticks {
        let m = Measurement::new(t.supply_mv, t.current_ma, t.voltage_mv);
        let r = ctl.tick(t.force, &m);
        assert!(r.duty <= full_scale);
        if locked {
            assert_eq!(r.fault_state, FaultState::Lockdown);
            assert_eq!(r.duty, 0);
        }
        locked = r.fault_state == FaultState::Lockdown;
    }
});
