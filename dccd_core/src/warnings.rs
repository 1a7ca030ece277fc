//! Per-tick fault flag detection.
//!
//! Stateless: every flag is recomputed from the present measurement and
//! setpoints. A target voltage of 0 means "no target set", in which case the
//! fixed default ceilings apply.

use dccd_traits::Measurement;

use crate::config::CoilLimits;
use crate::fixed_point::percent_of;

/// Boolean fault flags for one tick. Flags are independent and may co-occur.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarningSet {
    pub load_loss: bool,
    pub overcurrent: bool,
    pub voltage_high: bool,
    pub voltage_low: bool,
    pub supply_high: bool,
    pub supply_low: bool,
}

impl WarningSet {
    /// Flags that feed the inrush counter.
    ///
    /// `supply_high` and `load_loss` are reported but never trip the output.
    pub const fn any_hard(&self) -> bool {
        self.overcurrent || self.voltage_high || self.voltage_low || self.supply_low
    }

    pub const fn is_clear(&self) -> bool {
        !(self.load_loss
            || self.overcurrent
            || self.voltage_high
            || self.voltage_low
            || self.supply_high
            || self.supply_low)
    }

    /// Names of the active flags in a stable order.
    pub fn active(&self) -> impl Iterator<Item = &'static str> {
        [
            (self.load_loss, "load_loss"),
            (self.overcurrent, "overcurrent"),
            (self.voltage_high, "voltage_high"),
            (self.voltage_low, "voltage_low"),
            (self.supply_high, "supply_high"),
            (self.supply_low, "supply_low"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
    }
}

/// Evaluate all warning rules for one tick.
pub fn detect(
    target_current_ma: u16,
    target_voltage_mv: u16,
    m: &Measurement,
    limits: &CoilLimits,
) -> WarningSet {
    let has_target = target_voltage_mv != 0;

    let current_limit = if has_target {
        percent_of(target_current_ma, limits.ocp_limit_percent)
    } else {
        limits.max_out_current_ma
    };
    let voltage_limit = if has_target {
        percent_of(target_voltage_mv, limits.ovp_limit_percent)
    } else {
        limits.ovp_limit_default_mv
    };

    WarningSet {
        load_loss: has_target && m.current_ma == 0,
        overcurrent: m.current_ma > current_limit,
        voltage_high: m.voltage_mv > voltage_limit,
        voltage_low: has_target
            && m.voltage_mv < percent_of(target_voltage_mv, limits.uvp_limit_percent),
        supply_high: m.supply_mv > limits.supply_max_mv,
        supply_low: m.supply_mv < limits.supply_min_mv,
    }
}
