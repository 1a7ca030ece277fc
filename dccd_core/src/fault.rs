//! Trip / cooldown / retry / lockdown state machine.
//!
//! Evaluated once per tick before the PID. Hard warnings accumulate in an
//! inrush counter; exceeding the trip threshold fuses the output. After a
//! cooldown the output is retried; repeated trips while retrying lock the
//! output off until [`FaultManager::reset`].

use crate::config::ProtectionCfg;
use crate::warnings::WarningSet;

const INRUSH_MAX: u8 = 254;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FaultState {
    #[default]
    Normal,
    Fused,
    Retrying,
    Lockdown,
}

impl FaultState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Fused => "fused",
            Self::Retrying => "retrying",
            Self::Lockdown => "lockdown",
        }
    }
}

impl std::fmt::Display for FaultState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transition taken on the last update, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FaultEvent {
    #[default]
    None,
    /// Entered `Fused` from `Normal` or `Retrying`.
    Tripped,
    /// Cooldown elapsed; output re-enabled on probation.
    Retrying,
    /// Probation passed without a trip.
    Recovered,
    Lockdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultManager {
    cfg: ProtectionCfg,
    state: FaultState,
    inrush_counter: u8,
    cooldown_timer: u16,
    retry_counter: u8,
    protection_deadtime: u16,
}

impl FaultManager {
    pub fn new(cfg: ProtectionCfg) -> Self {
        Self {
            cfg,
            state: FaultState::Normal,
            inrush_counter: 0,
            cooldown_timer: 0,
            retry_counter: 0,
            protection_deadtime: 0,
        }
    }

    pub fn state(&self) -> FaultState {
        self.state
    }

    pub fn inrush_counter(&self) -> u8 {
        self.inrush_counter
    }

    pub fn cooldown_timer(&self) -> u16 {
        self.cooldown_timer
    }

    pub fn retry_counter(&self) -> u8 {
        self.retry_counter
    }

    pub fn protection_deadtime(&self) -> u16 {
        self.protection_deadtime
    }

    /// Whether the PID/PWM path may drive the coil this tick.
    pub fn output_enabled(&self) -> bool {
        matches!(self.state, FaultState::Normal | FaultState::Retrying)
    }

    /// Suppress inrush accumulation for the configured blanking window.
    pub fn start_deadtime(&mut self) {
        self.protection_deadtime = self.cfg.deadtime_ticks;
    }

    /// Power-on state. The only way out of `Lockdown`.
    pub fn reset(&mut self) {
        *self = Self::new(self.cfg.clone());
    }

    /// Advance one tick.
    pub fn update(&mut self, warnings: &WarningSet) -> FaultEvent {
        if warnings.any_hard() && self.protection_deadtime == 0 {
            self.inrush_counter = self.inrush_counter.saturating_add(1).min(INRUSH_MAX);
            if self.cooldown_timer != 0 {
                self.cooldown_timer = self.cfg.cooldown_ticks;
            }
        } else {
            self.inrush_counter = self.inrush_counter.saturating_sub(1);
            self.cooldown_timer = self.cooldown_timer.saturating_sub(1);
        }
        self.protection_deadtime = self.protection_deadtime.saturating_sub(1);

        let tripped = self.inrush_counter > self.cfg.inrush_trip_threshold;
        match self.state {
            FaultState::Normal if tripped => {
                self.fuse();
                FaultEvent::Tripped
            }
            FaultState::Fused if self.retry_counter > self.cfg.retry_limit => {
                self.state = FaultState::Lockdown;
                FaultEvent::Lockdown
            }
            FaultState::Fused if self.cooldown_timer == 0 => {
                self.state = FaultState::Retrying;
                self.cooldown_timer = self.cfg.cooldown_ticks;
                FaultEvent::Retrying
            }
            FaultState::Retrying if tripped => {
                self.retry_counter = self.retry_counter.saturating_add(1);
                self.fuse();
                FaultEvent::Tripped
            }
            FaultState::Retrying if self.cooldown_timer == 0 => {
                self.state = FaultState::Normal;
                self.retry_counter = 0;
                FaultEvent::Recovered
            }
            _ => FaultEvent::None,
        }
    }

    fn fuse(&mut self) {
        self.state = FaultState::Fused;
        self.cooldown_timer = self.cfg.cooldown_ticks;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HARD: WarningSet = WarningSet {
        load_loss: false,
        overcurrent: true,
        voltage_high: false,
        voltage_low: false,
        supply_high: false,
        supply_low: false,
    };
    const CLEAR: WarningSet = WarningSet {
        load_loss: false,
        overcurrent: false,
        voltage_high: false,
        voltage_low: false,
        supply_high: false,
        supply_low: false,
    };

    fn short_cfg() -> ProtectionCfg {
        ProtectionCfg {
            inrush_trip_threshold: 3,
            cooldown_ticks: 5,
            retry_limit: 1,
            deadtime_ticks: 4,
        }
    }

    #[test]
    fn trips_on_the_tick_the_threshold_is_exceeded() {
        let mut f = FaultManager::new(ProtectionCfg::default());
        for _ in 0..10 {
            assert_eq!(f.update(&HARD), FaultEvent::None);
        }
        assert_eq!(f.state(), FaultState::Normal);
        assert_eq!(f.update(&HARD), FaultEvent::Tripped);
        assert_eq!(f.state(), FaultState::Fused);
        assert_eq!(f.cooldown_timer(), 2000);
        assert!(!f.output_enabled());
    }

    #[test]
    fn intermittent_warnings_do_not_accumulate() {
        let mut f = FaultManager::new(short_cfg());
        for _ in 0..50 {
            f.update(&HARD);
            f.update(&CLEAR);
        }
        assert_eq!(f.state(), FaultState::Normal);
        assert!(f.inrush_counter() <= 1);
    }

    #[test]
    fn supply_high_and_load_loss_never_trip() {
        let mut f = FaultManager::new(short_cfg());
        let soft = WarningSet {
            supply_high: true,
            load_loss: true,
            ..WarningSet::default()
        };
        for _ in 0..100 {
            f.update(&soft);
        }
        assert_eq!(f.state(), FaultState::Normal);
        assert_eq!(f.inrush_counter(), 0);
    }

    #[test]
    fn deadtime_suppresses_accumulation() {
        let mut f = FaultManager::new(short_cfg());
        f.start_deadtime();
        for _ in 0..4 {
            f.update(&HARD);
        }
        assert_eq!(f.inrush_counter(), 0);
        assert_eq!(f.protection_deadtime(), 0);
        f.update(&HARD);
        assert_eq!(f.inrush_counter(), 1);
    }

    #[test]
    fn inrush_counter_saturates() {
        let cfg = ProtectionCfg {
            inrush_trip_threshold: 255,
            ..short_cfg()
        };
        let mut f = FaultManager::new(cfg);
        for _ in 0..400 {
            f.update(&HARD);
        }
        assert_eq!(f.inrush_counter(), 254);
        assert_eq!(f.state(), FaultState::Normal);
    }

    #[test]
    fn cooldown_then_retry_then_recover() {
        let mut f = FaultManager::new(short_cfg());
        while f.update(&HARD) != FaultEvent::Tripped {}
        let mut ticks = 0;
        while f.update(&CLEAR) != FaultEvent::Retrying {
            ticks += 1;
            assert!(ticks < 100);
        }
        assert_eq!(f.state(), FaultState::Retrying);
        assert!(f.output_enabled());
        while f.update(&CLEAR) != FaultEvent::Recovered {}
        assert_eq!(f.state(), FaultState::Normal);
        assert_eq!(f.retry_counter(), 0);
    }

    #[test]
    fn warning_during_cooldown_rearms_it() {
        let mut f = FaultManager::new(short_cfg());
        while f.update(&HARD) != FaultEvent::Tripped {}
        f.update(&CLEAR);
        f.update(&CLEAR);
        assert_eq!(f.cooldown_timer(), 3);
        f.update(&HARD);
        assert_eq!(f.cooldown_timer(), 5);
        assert_eq!(f.state(), FaultState::Fused);
    }

    #[test]
    fn repeated_trips_while_retrying_lock_down() {
        let mut f = FaultManager::new(short_cfg());
        let mut fused_entries = 0;
        let mut guard = 0;
        while f.state() != FaultState::Lockdown {
            let w = if f.state() == FaultState::Fused { CLEAR } else { HARD };
            if f.update(&w) == FaultEvent::Tripped {
                fused_entries += 1;
            }
            guard += 1;
            assert!(guard < 1000);
        }
        // initial trip plus retry_limit + 1 re-entries from Retrying
        assert_eq!(fused_entries, 3);
        assert_eq!(f.retry_counter(), 2);
    }

    #[test]
    fn lockdown_is_terminal_until_reset() {
        let mut f = FaultManager::new(short_cfg());
        let mut guard = 0;
        while f.state() != FaultState::Lockdown {
            let w = if f.state() == FaultState::Fused { CLEAR } else { HARD };
            f.update(&w);
            guard += 1;
            assert!(guard < 1000);
        }
        for _ in 0..10_000 {
            assert_eq!(f.update(&CLEAR), FaultEvent::None);
        }
        assert_eq!(f.state(), FaultState::Lockdown);
        assert!(!f.output_enabled());
        f.reset();
        assert_eq!(f.state(), FaultState::Normal);
        assert_eq!(f.retry_counter(), 0);
    }
}
