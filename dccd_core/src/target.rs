//! Force percentage to coil current target.

use crate::config::CoilLimits;
use crate::fixed_point::scale_u16;

/// Map a force request (0..=100 %) to a coil current target in mA.
///
/// 0 % releases the coil. Non-zero requests are clamped to
/// `[min_set_current, min(max_set_current, lock_current)]`.
pub fn force_to_current(force_percent: u8, limits: &CoilLimits, lock_current_ma: u16) -> u16 {
    if force_percent == 0 {
        return 0;
    }
    let raw = if force_percent >= 100 {
        limits.max_set_current_ma
    } else {
        scale_u16(limits.max_set_current_ma, u32::from(force_percent), 100)
    };
    let upper = limits.max_set_current_ma.min(lock_current_ma);
    let lower = limits.min_set_current_ma.min(upper);
    raw.clamp(lower, upper)
}
