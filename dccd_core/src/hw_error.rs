//! Maps `Box<dyn Error>` from trait boundaries to typed `ActuatorError`.
//!
//! The traits in `dccd_traits` box their errors; this module converts those to
//! our typed enum, with a feature-gated path for `dccd_hardware::HwError`.

use crate::error::ActuatorError;

/// Map a trait-boundary error to a typed `ActuatorError`.
///
/// Known hardware error types are downcast first, then string heuristics apply.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> ActuatorError {
    #[cfg(feature = "hardware-errors")]
    {
        use dccd_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout => ActuatorError::Timeout,
                other => ActuatorError::HardwareFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        ActuatorError::Timeout
    } else {
        ActuatorError::Hardware(s)
    }
}

/// Same as [`map_hw_error`] but for the boxed form the traits return.
pub fn map_boxed(e: Box<dyn std::error::Error + Send + Sync>) -> ActuatorError {
    map_hw_error(e.as_ref())
}
