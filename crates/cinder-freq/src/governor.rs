//! # Bias-Mode Frequency Governor
//!
//! Turns utilization samples into frequency-tier requests through three bias
//! modes, each with its own asymmetric hysteresis window. Lower-power modes
//! use the most demanding "up" window and the most reluctant "down" window,
//! keeping the engine conservative under bursty load.
//!
//! Mode transitions follow the request direction: demote only while the
//! request is falling through the mode's efficiency point, promote when it
//! reaches the mode's ceiling point. Re-accelerating through the same value
//! never demotes.

use cinder_core::{Error, FreqCurve, FreqTier, Result, UtilizationSample};

// =============================================================================
// BIAS MODES
// =============================================================================

/// The governor's current posture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BiasMode {
    /// Conservative: hardest to clock up, easiest to keep down
    Low,
    /// Balanced
    Mid,
    /// Aggressive: clocks up readily, holds frequency longest
    High,
}

/// One bias mode's asymmetric hysteresis window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HysteresisWindow {
    /// Evaluation interval for the up decision, microseconds
    pub up_window_us: u32,
    /// Busy percentage at or above which the tier steps up
    pub up_threshold_pct: u32,
    /// Evaluation interval for the down decision, microseconds
    pub down_window_us: u32,
    /// Busy percentage below which the tier steps down
    pub down_threshold_pct: u32,
}

impl BiasMode {
    /// The mode's hysteresis window.
    pub const fn window(self) -> HysteresisWindow {
        match self {
            // Upclock if more than 95% busy over 16ms, downclock if less
            // than 85% busy over 32ms.
            Self::Low => HysteresisWindow {
                up_window_us: 16_000,
                up_threshold_pct: 95,
                down_window_us: 32_000,
                down_threshold_pct: 85,
            },
            // Upclock if more than 90% busy over 13ms, downclock if less
            // than 75% busy over 32ms.
            Self::Mid => HysteresisWindow {
                up_window_us: 13_000,
                up_threshold_pct: 90,
                down_window_us: 32_000,
                down_threshold_pct: 75,
            },
            // Upclock if more than 85% busy over 10ms, downclock if less
            // than 60% busy over 32ms.
            Self::High => HysteresisWindow {
                up_window_us: 10_000,
                up_threshold_pct: 85,
                down_window_us: 32_000,
                down_threshold_pct: 60,
            },
        }
    }
}

// =============================================================================
// TEARDOWN OBLIGATIONS
// =============================================================================

/// What a caller must unwind after disabling the governor.
///
/// Explicitly enumerated so the obligation cannot be mistaken for a status
/// code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Teardown {
    /// Governor was not enabled; nothing to unwind
    Nothing,
    /// Restore this tier when re-enabling
    RestoreFrequency(FreqTier),
    /// Restore this tier and re-arm the threshold events: the hysteresis
    /// setup was reprogrammed since enable
    RestoreFrequencyAndEvents(FreqTier),
}

// =============================================================================
// GOVERNOR
// =============================================================================

/// Counters for observability.
#[derive(Debug, Clone, Copy, Default)]
pub struct GovernorStats {
    /// Issued frequency changes
    pub transitions: u64,
    /// Bias-mode changes
    pub bias_flips: u64,
    /// Boost requests honored
    pub boosts: u64,
}

/// The closed-loop frequency governor.
#[derive(Debug)]
pub struct Governor {
    curve: FreqCurve,
    /// Soft limits, externally mutable: (min, max)
    limits: (FreqTier, FreqTier),
    cur: FreqTier,
    mode: BiasMode,
    /// Idle request issued; regular sampling is suspended
    parked: bool,
    /// Tier to restore when leaving the parked state
    last_active: FreqTier,
    acc_busy_us: u64,
    acc_total_us: u64,
    thresholds_armed: bool,
    enabled: bool,
    stats: GovernorStats,
}

impl Governor {
    /// Create a governor for the given frequency curve.
    ///
    /// Starts at the efficiency point in the conservative mode with the soft
    /// limits wide open.
    pub fn new(curve: FreqCurve) -> Self {
        Self {
            curve,
            limits: (curve.floor, curve.ceiling),
            cur: curve.efficient,
            mode: BiasMode::Low,
            parked: false,
            last_active: curve.efficient,
            acc_busy_us: 0,
            acc_total_us: 0,
            thresholds_armed: false,
            enabled: true,
            stats: GovernorStats::default(),
        }
    }

    /// Currently issued tier
    #[inline]
    pub fn current(&self) -> FreqTier {
        self.cur
    }

    /// Current bias mode
    #[inline]
    pub fn bias_mode(&self) -> BiasMode {
        self.mode
    }

    /// Current soft limits (min, max)
    #[inline]
    pub fn soft_limits(&self) -> (FreqTier, FreqTier) {
        self.limits
    }

    /// True while the idle request is in effect
    #[inline]
    pub fn is_parked(&self) -> bool {
        self.parked
    }

    /// Observability counters
    #[inline]
    pub fn stats(&self) -> GovernorStats {
        self.stats
    }

    /// Update the soft limits.
    ///
    /// Rejects `min > max` and keeps the previous limits. On success the
    /// current request is immediately re-issued so it re-enters the new
    /// range; the clamp is never skipped, even transiently.
    pub fn set_soft_limits(&mut self, min: FreqTier, max: FreqTier) -> Result<()> {
        if min > max {
            log::warn!("rejecting soft limits {}..{}", min, max);
            return Err(Error::InvalidSoftLimit);
        }
        self.limits = (min, max);
        if !self.parked {
            let val = self.cur;
            self.request(val);
        }
        Ok(())
    }

    /// Issue a frequency request.
    ///
    /// The value is clamped to the soft limits first, then the bias mode is
    /// re-evaluated against the clamped value. Returns the issued tier.
    pub fn request(&mut self, val: FreqTier) -> FreqTier {
        let val = val.clamp(self.limits.0, self.limits.1);
        self.rebias(val);
        if val != self.cur {
            self.stats.transitions += 1;
            log::trace!("frequency request {} -> {}", self.cur, val);
        }
        self.cur = val;
        if !self.parked {
            self.last_active = val;
        }
        val
    }

    /// Re-evaluate the bias mode for a new (already clamped) request.
    fn rebias(&mut self, val: FreqTier) {
        let mut next = self.mode;
        match self.mode {
            BiasMode::Low => {
                if val.raw() as u16 > self.curve.efficient.raw() as u16 + 1 && val > self.cur {
                    next = BiasMode::Mid;
                }
            }
            BiasMode::Mid => {
                if val <= self.curve.efficient && val < self.cur {
                    next = BiasMode::Low;
                } else if val >= self.curve.ceiling && val > self.cur {
                    next = BiasMode::High;
                }
            }
            BiasMode::High => {
                if val < FreqTier::midpoint(self.curve.balance, self.curve.ceiling)
                    && val < self.cur
                {
                    next = BiasMode::Mid;
                }
            }
        }
        // The extreme bins are special.
        if val <= self.limits.0 {
            next = BiasMode::Low;
        }
        if val >= self.limits.1 {
            next = BiasMode::High;
        }
        if next != self.mode {
            log::debug!("bias {:?} -> {:?} at tier {}", self.mode, next, val);
            self.mode = next;
            self.stats.bias_flips += 1;
            self.thresholds_armed = true;
            self.reset_window();
        }
    }

    #[inline]
    fn reset_window(&mut self) {
        self.acc_busy_us = 0;
        self.acc_total_us = 0;
    }

    /// Feed one utilization sample; returns the newly issued tier when the
    /// sample closed a hysteresis window and moved the request.
    ///
    /// Samples are ignored while parked: the racing-submission case is
    /// handled by [`notify_busy`](Self::notify_busy) re-issuing a tier, not
    /// by cancelling the idle request.
    pub fn sample(&mut self, s: UtilizationSample) -> Option<FreqTier> {
        if !self.enabled || self.parked {
            return None;
        }

        self.acc_busy_us += s.busy_us();
        self.acc_total_us += s.window_us as u64;
        if self.acc_total_us == 0 {
            return None;
        }

        let busy_pct = (self.acc_busy_us * 100 / self.acc_total_us) as u32;
        let w = self.mode.window();

        if self.acc_total_us >= w.up_window_us as u64 && busy_pct >= w.up_threshold_pct {
            self.reset_window();
            if self.cur < self.limits.1 {
                let next = self.cur.step_up();
                return Some(self.request(next));
            }
            return None;
        }

        if self.acc_total_us >= w.down_window_us as u64 {
            let step_down = busy_pct < w.down_threshold_pct && self.cur > self.limits.0;
            self.reset_window();
            if step_down {
                let next = self.cur.step_down();
                return Some(self.request(next));
            }
        }

        None
    }

    /// Park the engine: issue the idle operating point, below the lowest
    /// regular tier.
    ///
    /// Non-blocking by design. A work submission racing this request is
    /// tolerated: the next busy signal re-issues a regular tier instead of
    /// this path attempting synchronous cancellation.
    pub fn notify_idle(&mut self) {
        if !self.enabled || self.parked {
            return;
        }
        if self.cur > self.curve.idle {
            self.last_active = self.cur;
            self.cur = self.curve.idle;
            self.stats.transitions += 1;
            log::debug!("parked at idle tier {}", self.curve.idle);
        }
        self.parked = true;
        self.reset_window();
    }

    /// Work arrived. Unparks and re-issues a regular tier; with `boost` set
    /// the soft maximum is requested directly.
    pub fn notify_busy(&mut self, boost: bool) {
        if !self.enabled {
            return;
        }
        let was_parked = self.parked;
        self.parked = false;

        if boost && self.cur < self.limits.1 {
            self.stats.boosts += 1;
            self.request(self.limits.1);
        } else if was_parked {
            let restore = self.last_active;
            self.request(restore);
        }
    }

    /// Disable the governor, returning the caller's teardown obligation.
    pub fn disable(&mut self) -> Teardown {
        if !self.enabled {
            return Teardown::Nothing;
        }
        self.enabled = false;
        let restore = if self.parked { self.last_active } else { self.cur };
        if self.thresholds_armed {
            Teardown::RestoreFrequencyAndEvents(restore)
        } else {
            Teardown::RestoreFrequency(restore)
        }
    }

    /// Re-enable after a disable, restoring the given tier.
    pub fn enable(&mut self, restore: FreqTier) {
        self.enabled = true;
        self.parked = false;
        self.thresholds_armed = false;
        self.reset_window();
        self.request(restore);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_core::HardwareProfile;

    fn governor() -> Governor {
        Governor::new(HardwareProfile::large().freq)
    }

    fn saturate(gov: &mut Governor, busy_pct: u32, windows: usize) {
        // 4 ms samples; enough of them to close any window several times
        for _ in 0..windows * 10 {
            gov.sample(UtilizationSample::new(busy_pct, 4_000));
        }
    }

    #[test]
    fn test_full_ramp_up_and_back_down() {
        let mut gov = governor();
        let (min, max) = gov.soft_limits();

        saturate(&mut gov, 100, 100);
        assert_eq!(gov.current(), max, "sustained load must reach the max");
        assert_eq!(gov.bias_mode(), BiasMode::High);

        saturate(&mut gov, 0, 100);
        assert_eq!(gov.current(), min, "sustained idle must reach the min");
        assert_eq!(gov.bias_mode(), BiasMode::Low);
    }

    #[test]
    fn test_output_never_leaves_soft_limits() {
        let mut gov = governor();
        gov.set_soft_limits(FreqTier::new(6), FreqTier::new(12)).unwrap();
        // adversarial: alternating saturation and silence in odd chunks
        for i in 0..5_000u32 {
            let busy = if (i / 7) % 2 == 0 { 100 } else { 0 };
            gov.sample(UtilizationSample::new(busy, 1_000 + (i % 13) * 100));
            let cur = gov.current();
            assert!(cur >= FreqTier::new(6) && cur <= FreqTier::new(12));
        }
    }

    #[test]
    fn test_direct_requests_are_clamped() {
        let mut gov = governor();
        gov.set_soft_limits(FreqTier::new(6), FreqTier::new(12)).unwrap();
        assert_eq!(gov.request(FreqTier::new(0)), FreqTier::new(6));
        assert_eq!(gov.request(FreqTier::new(200)), FreqTier::new(12));
    }

    #[test]
    fn test_invalid_soft_limits_rejected() {
        let mut gov = governor();
        let before = gov.soft_limits();
        assert_eq!(
            gov.set_soft_limits(FreqTier::new(10), FreqTier::new(5)),
            Err(Error::InvalidSoftLimit)
        );
        assert_eq!(gov.soft_limits(), before);
    }

    #[test]
    fn test_shrinking_limits_reclamp_current() {
        let mut gov = governor();
        saturate(&mut gov, 100, 100);
        let max = gov.soft_limits().1;
        assert_eq!(gov.current(), max);
        gov.set_soft_limits(FreqTier::new(5), FreqTier::new(8)).unwrap();
        assert_eq!(gov.current(), FreqTier::new(8));
    }

    #[test]
    fn test_boundary_signal_does_not_oscillate() {
        let mut gov = governor();
        // Hold the signal exactly at the Low mode's down threshold: neither
        // the up nor the down predicate fires, so nothing may move.
        let w = BiasMode::Low.window();
        let start_mode = gov.bias_mode();
        let start_freq = gov.current();
        let flips_before = gov.stats().bias_flips;
        saturate(&mut gov, w.down_threshold_pct, 50);
        assert_eq!(gov.bias_mode(), start_mode);
        assert_eq!(gov.current(), start_freq);
        assert_eq!(gov.stats().bias_flips, flips_before);
    }

    #[test]
    fn test_no_demotion_while_reaccelerating() {
        let mut gov = governor();
        saturate(&mut gov, 100, 100);
        assert_eq!(gov.bias_mode(), BiasMode::High);
        // Fall just below the ceiling, then rise through the same value:
        // the falling edge demotes at most once, rising must not demote.
        let mid = FreqTier::midpoint(
            HardwareProfile::large().freq.balance,
            HardwareProfile::large().freq.ceiling,
        );
        gov.request(mid.step_down());
        assert_eq!(gov.bias_mode(), BiasMode::Mid);
        let flips = gov.stats().bias_flips;
        gov.request(mid.step_down());
        assert_eq!(gov.stats().bias_flips, flips, "same value must not flip");
    }

    #[test]
    fn test_idle_park_and_busy_restore() {
        let mut gov = governor();
        saturate(&mut gov, 100, 100);
        let active = gov.current();

        gov.notify_idle();
        assert!(gov.is_parked());
        assert_eq!(gov.current(), HardwareProfile::large().freq.idle);
        // samples are ignored while parked
        assert_eq!(gov.sample(UtilizationSample::new(100, 32_000)), None);

        gov.notify_busy(false);
        assert!(!gov.is_parked());
        assert_eq!(gov.current(), active);
    }

    #[test]
    fn test_boost_requests_soft_max() {
        let mut gov = governor();
        gov.notify_busy(true);
        assert_eq!(gov.current(), gov.soft_limits().1);
        assert_eq!(gov.stats().boosts, 1);
    }

    #[test]
    fn test_teardown_obligations() {
        let mut gov = governor();
        // no threshold reprogramming yet
        assert_eq!(
            gov.disable(),
            Teardown::RestoreFrequency(HardwareProfile::large().freq.efficient)
        );
        assert_eq!(gov.disable(), Teardown::Nothing);

        let mut gov = governor();
        saturate(&mut gov, 100, 100);
        let restore = gov.current();
        assert_eq!(gov.disable(), Teardown::RestoreFrequencyAndEvents(restore));
    }
}
