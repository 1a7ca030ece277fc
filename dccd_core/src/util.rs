//! Common time/period helpers for dccd_core.

use std::time::Duration;

/// Number of microseconds in one second.
pub const MICROS_PER_SEC: u64 = 1_000_000;

/// Compute the control period in microseconds for a tick rate in Hz.
/// - Clamps `hz` to at least 1 to avoid division by zero.
/// - Ensures result is at least 1 microsecond.
#[inline]
pub fn period_us(hz: u32) -> u64 {
    (MICROS_PER_SEC / u64::from(hz.max(1))).max(1)
}

#[inline]
pub fn period(hz: u32) -> Duration {
    Duration::from_micros(period_us(hz))
}

/// Milliseconds covered by `ticks` control periods, saturating.
#[inline]
pub fn ticks_to_ms(ticks: u64, hz: u32) -> u64 {
    ticks.saturating_mul(period_us(hz)) / 1000
}
