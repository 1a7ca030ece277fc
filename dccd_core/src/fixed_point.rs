//! Saturating integer arithmetic shared by every stage of the controller.
//!
//! Nothing in the control path may wrap: every helper here is total and
//! clamps to the representable extreme of its result type instead.

/// 32-bit signed add that clamps instead of wrapping.
///
/// The overflow direction depends only on the sign of `b`: a positive `b`
/// can only overflow towards `i32::MAX`, a negative one towards `i32::MIN`.
#[inline]
pub fn saturating_add(a: i32, b: i32) -> i32 {
    match a.checked_add(b) {
        Some(sum) => sum,
        None if b < 0 => i32::MIN,
        None => i32::MAX,
    }
}

/// 32-bit signed subtract that clamps instead of wrapping.
#[inline]
pub fn saturating_sub(a: i32, b: i32) -> i32 {
    match a.checked_sub(b) {
        Some(diff) => diff,
        None if b < 0 => i32::MAX,
        None => i32::MIN,
    }
}

/// `value * percent / 100` computed in a wider intermediate, clamped to `u16`.
#[inline]
pub fn percent_of(value: u16, percent: u8) -> u16 {
    let scaled = u32::from(value) * u32::from(percent) / 100;
    clamp_u16(u64::from(scaled))
}

/// `value * num / den` with a 64-bit intermediate, clamped to `u16`.
/// A zero denominator yields 0.
#[inline]
pub fn scale_u16(value: u16, num: u32, den: u32) -> u16 {
    if den == 0 {
        return 0;
    }
    clamp_u16(u64::from(value) * u64::from(num) / u64::from(den))
}

/// Apply an unsigned `mul/div` coefficient to a signed value.
///
/// Computed in `i64` so the multiply cannot overflow, then clamped back to
/// `i32`. A zero divisor is treated as 1.
#[inline]
pub fn mul_div_i32(value: i32, mul: u8, div: u8) -> i32 {
    let div = i64::from(div.max(1));
    let scaled = i64::from(value) * i64::from(mul) / div;
    scaled.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

#[inline]
fn clamp_u16(v: u64) -> u16 {
    if v > u64::from(u16::MAX) {
        u16::MAX
    } else {
        v as u16
    }
}
