#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not. A config that
    // validates must also be accepted by the controller.
    let Ok(cfg) = dccd_config::load_toml(data) else {
        return;
    };
    if cfg.validate().is_ok() {
        let coil = dccd_core::CoilConfig::from(&cfg);
        assert!(dccd_core::CoilController::new(coil).is_ok());
    }
});
