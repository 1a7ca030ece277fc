//! Target coil voltage to PWM duty mapping.

use crate::config::PwmCfg;
use crate::fixed_point::scale_u16;

/// `duty = target * full_scale / supply`, clamped to `max_duty`.
///
/// Compensates for supply sag: the same target voltage needs a longer on-time
/// when the battery is low. Zero supply or zero target gives 0.
pub fn voltage_to_duty(target_voltage_mv: u16, supply_mv: u16, pwm: &PwmCfg) -> u16 {
    if supply_mv == 0 || target_voltage_mv == 0 {
        return 0;
    }
    let cap = pwm.max_duty.min(pwm.full_scale);
    scale_u16(target_voltage_mv, u32::from(pwm.full_scale), u32::from(supply_mv)).min(cap)
}

/// Fixed duty for a percentage of full scale, without supply compensation.
/// Percentages above 100 are treated as 100.
pub fn percent_to_duty(percent: u8, pwm: &PwmCfg) -> u16 {
    let cap = pwm.max_duty.min(pwm.full_scale);
    scale_u16(pwm.full_scale, u32::from(percent.min(100)), 100).min(cap)
}
