//! Integer PID current controller.
//!
//! Produces a target coil voltage (mV) from target vs. measured current (mA).
//! Coefficients are `mul/div` pairs so the loop stays in integer arithmetic.

use crate::config::{CoilLimits, PidGains};
use crate::fixed_point::{mul_div_i32, saturating_add, saturating_sub};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidController {
    gains: PidGains,
    prev_error: i32,
    integral: i32,
    integral_min: i32,
    integral_max: i32,
    min_output_mv: u16,
    max_output_mv: u16,
    ceiling_mv: u16,
}

impl PidController {
    /// Integral range defaults to `[0, max_out_voltage]`.
    pub fn new(gains: PidGains, limits: &CoilLimits) -> Self {
        Self {
            gains,
            prev_error: 0,
            integral: 0,
            integral_min: 0,
            integral_max: i32::from(limits.max_out_voltage_mv),
            min_output_mv: limits.min_out_voltage_mv,
            max_output_mv: limits.max_out_voltage_mv,
            ceiling_mv: limits.max_out_voltage_mv,
        }
    }

    /// Override the integral clamp. `min > max` is normalised by swapping.
    pub fn with_integral_range(mut self, min: i32, max: i32) -> Self {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        self.integral_min = lo;
        self.integral_max = hi;
        self.integral = self.integral.clamp(lo, hi);
        self
    }

    /// Lower the output upper bound below `max_out_voltage`, e.g. to the
    /// calibrated lock-voltage ceiling. Never raises it above the limit.
    pub fn set_output_ceiling(&mut self, ceiling_mv: u16) {
        self.ceiling_mv = ceiling_mv.min(self.max_output_mv);
    }

    /// Restore the output upper bound to `max_out_voltage`.
    pub fn clear_output_ceiling(&mut self) {
        self.ceiling_mv = self.max_output_mv;
    }

    pub fn output_ceiling(&self) -> u16 {
        self.ceiling_mv
    }

    /// Zero the integral and the remembered error.
    pub fn reset(&mut self) {
        self.integral = 0;
        self.prev_error = 0;
    }

    pub fn integral(&self) -> i32 {
        self.integral
    }

    pub fn prev_error(&self) -> i32 {
        self.prev_error
    }

    /// One control step. `anti_windup` forces the integral to 0 for this tick.
    pub fn update(&mut self, target_ma: u16, measured_ma: u16, anti_windup: bool) -> u16 {
        let error = i32::from(target_ma) - i32::from(measured_ma);

        let derivative = saturating_sub(error, self.prev_error);
        self.prev_error = error;

        self.integral = if anti_windup {
            0
        } else {
            saturating_add(self.integral, error).clamp(self.integral_min, self.integral_max)
        };

        let g = &self.gains;
        let p = mul_div_i32(error, g.kp_mul, g.kp_div);
        let i = mul_div_i32(self.integral, g.ki_mul, g.ki_div);
        let d = mul_div_i32(derivative, g.kd_mul, g.kd_div);
        let raw = saturating_add(saturating_add(p, i), d);

        self.clamp_output(raw)
    }

    /// Ceiling first, then the minimum: a result under `min_output_mv` is 0
    /// even when the ceiling itself is below the minimum.
    fn clamp_output(&self, raw: i32) -> u16 {
        let capped = raw.min(i32::from(self.ceiling_mv));
        if capped < i32::from(self.min_output_mv) {
            return 0;
        }
        // capped lies in [min_output_mv, ceiling_mv] so the cast is lossless
        capped as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid() -> PidController {
        PidController::new(PidGains::default(), &CoilLimits::default())
    }

    #[test]
    fn first_step_combines_all_terms() {
        let mut c = pid();
        // error 1000: p=3000, i=1000, d=100
        assert_eq!(c.update(1000, 0, false), 4100);
        assert_eq!(c.integral(), 1000);
        assert_eq!(c.prev_error(), 1000);
    }

    #[test]
    fn small_outputs_snap_to_zero() {
        let mut c = pid();
        // error 10: p=30, i=10, d=1 -> 41 < 100
        assert_eq!(c.update(110, 100, false), 0);
    }

    #[test]
    fn ceiling_below_minimum_output_yields_zero() {
        let mut c = pid();
        c.set_output_ceiling(88);
        assert_eq!(c.update(2250, 0, false), 0);
        assert_eq!(c.update(2250, 0, false), 0);
    }

    #[test]
    fn output_saturates_at_max_voltage() {
        let mut c = pid();
        assert_eq!(c.update(u16::MAX, 0, false), 10_000);
    }

    #[test]
    fn anti_windup_zeroes_integral_and_leaves_proportional() {
        let mut c = pid();
        c.update(2000, 1000, false);
        assert!(c.integral() > 0);
        // error 2250, derivative 2250-1000=1250 -> d=125
        let out = c.update(2250, 0, true);
        assert_eq!(c.integral(), 0);
        assert_eq!(out, 6750 + 125);
    }

    #[test]
    fn negative_error_cannot_push_integral_below_zero() {
        let mut c = pid();
        c.update(0, 3000, false);
        assert_eq!(c.integral(), 0);
    }

    #[test]
    fn ceiling_limits_output_and_never_exceeds_max() {
        let mut c = pid();
        c.set_output_ceiling(6600);
        assert_eq!(c.update(4000, 0, false), 6600);
        c.set_output_ceiling(20_000);
        assert_eq!(c.output_ceiling(), 10_000);
        c.clear_output_ceiling();
        assert_eq!(c.output_ceiling(), 10_000);
    }

    #[test]
    fn reset_clears_state() {
        let mut c = pid();
        c.update(3000, 100, false);
        c.reset();
        assert_eq!(c.integral(), 0);
        assert_eq!(c.prev_error(), 0);
    }

    #[test]
    fn custom_integral_range_is_normalised() {
        let mut c = pid().with_integral_range(500, -500);
        for _ in 0..10 {
            c.update(1000, 0, false);
        }
        assert_eq!(c.integral(), 500);
        for _ in 0..10 {
            c.update(0, 1000, false);
        }
        assert_eq!(c.integral(), -500);
    }
}
