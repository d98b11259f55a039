//! # Deep Idle
//!
//! Deep idle is a separate power state below the frequency ladder, entered
//! only when the whole engine has provably nothing to do: utilization must
//! stay under the idle threshold for a full evaluation window, no veto may
//! be pending, and some hardware only tolerates the state with a single
//! consumer lit. Exit is the opposite of entry: immediate and unconditional
//! on any busy signal, no evaluation, no window.

use bitflags::bitflags;

use cinder_core::{DiagReason, UtilizationSample};

// =============================================================================
// VETO FLAGS
// =============================================================================

bitflags! {
    /// Conditions blocking deep-idle entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IdleVeto: u32 {
        /// A consumer reported outstanding work
        const CONSUMER_BUSY = 1 << 0;
        /// An external client holds the engine awake
        const EXTERNAL = 1 << 1;
        /// A reconfiguration is in flight
        const CONFIG_CHANGE = 1 << 2;
    }
}

// =============================================================================
// DEEP IDLE GATE
// =============================================================================

/// Evaluation window deep-idle entry must stay quiet for, microseconds.
const ENTRY_WINDOW_US: u64 = 32_000;

/// Utilization at or below which a sample counts as quiet, percent.
const QUIET_THRESHOLD_PCT: u32 = 10;

/// The deep-idle decision gate.
#[derive(Debug)]
pub struct DeepIdleGate {
    /// Quiet time accumulated since the last busy sample
    quiet_us: u64,
    vetoes: IdleVeto,
    engaged: bool,
    /// Hardware restriction: deep idle only with at most one consumer lit
    single_consumer_only: bool,
    active_consumers: usize,
}

impl DeepIdleGate {
    /// Create a gate; `single_consumer_only` comes from the hardware
    /// profile.
    pub fn new(single_consumer_only: bool) -> Self {
        Self {
            quiet_us: 0,
            vetoes: IdleVeto::empty(),
            engaged: false,
            single_consumer_only,
            active_consumers: 0,
        }
    }

    /// Deep idle currently engaged
    #[inline]
    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    /// Why entry is blocked right now, if it is
    pub fn blocked_reason(&self) -> Option<DiagReason> {
        if self.single_consumer_only && self.active_consumers > 1 {
            return Some(DiagReason::MultipleConsumers);
        }
        None
    }

    /// Record a change of the active consumer count. Any reconfiguration
    /// restarts the quiet window.
    pub fn set_active_consumers(&mut self, n: usize) {
        if n != self.active_consumers {
            self.active_consumers = n;
            self.quiet_us = 0;
        }
    }

    /// Set or clear a veto. Setting a veto while engaged disengages.
    ///
    /// Returns `true` when the engaged state changed.
    pub fn set_veto(&mut self, veto: IdleVeto, on: bool) -> bool {
        self.vetoes.set(veto, on);
        if on && self.engaged {
            log::debug!("deep idle vetoed by {:?}", veto);
            self.engaged = false;
            self.quiet_us = 0;
            return true;
        }
        false
    }

    /// Immediate, unconditional exit on new work.
    ///
    /// Returns `true` when deep idle was engaged and is now left.
    pub fn busy(&mut self) -> bool {
        self.quiet_us = 0;
        if self.engaged {
            self.engaged = false;
            log::debug!("deep idle exit on busy signal");
            return true;
        }
        false
    }

    /// Feed one utilization sample.
    ///
    /// Returns `Some(true)` when the gate decides to engage, `Some(false)`
    /// when a busy sample forces an exit, `None` otherwise.
    pub fn sample(&mut self, s: UtilizationSample) -> Option<bool> {
        if s.busy_pct > QUIET_THRESHOLD_PCT {
            let was = self.engaged;
            self.quiet_us = 0;
            self.engaged = false;
            return was.then_some(false);
        }

        self.quiet_us += s.window_us as u64;
        if self.engaged {
            return None;
        }
        if self.quiet_us < ENTRY_WINDOW_US {
            return None;
        }
        if !self.vetoes.is_empty() {
            return None;
        }
        if self.single_consumer_only && self.active_consumers > 1 {
            return None;
        }

        self.engaged = true;
        log::debug!("deep idle engaged after {} us quiet", self.quiet_us);
        Some(true)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet(gate: &mut DeepIdleGate, times: usize) -> Option<bool> {
        let mut last = None;
        for _ in 0..times {
            if let Some(d) = gate.sample(UtilizationSample::new(0, 8_000)) {
                last = Some(d);
            }
        }
        last
    }

    #[test]
    fn test_engages_only_after_full_window() {
        let mut gate = DeepIdleGate::new(false);
        gate.set_active_consumers(1);
        assert_eq!(quiet(&mut gate, 3), None, "window not yet elapsed");
        assert_eq!(quiet(&mut gate, 1), Some(true));
        assert!(gate.is_engaged());
    }

    #[test]
    fn test_busy_sample_resets_window() {
        let mut gate = DeepIdleGate::new(false);
        gate.set_active_consumers(1);
        quiet(&mut gate, 3);
        gate.sample(UtilizationSample::new(50, 8_000));
        assert_eq!(quiet(&mut gate, 3), None, "quiet time must restart");
    }

    #[test]
    fn test_veto_blocks_entry_and_forces_exit() {
        let mut gate = DeepIdleGate::new(false);
        gate.set_active_consumers(1);
        gate.set_veto(IdleVeto::EXTERNAL, true);
        assert_eq!(quiet(&mut gate, 10), None);

        gate.set_veto(IdleVeto::EXTERNAL, false);
        assert_eq!(quiet(&mut gate, 10), Some(true));

        assert!(gate.set_veto(IdleVeto::CONSUMER_BUSY, true));
        assert!(!gate.is_engaged());
    }

    #[test]
    fn test_single_consumer_restriction() {
        let mut gate = DeepIdleGate::new(true);
        gate.set_active_consumers(2);
        assert_eq!(quiet(&mut gate, 10), None);
        assert_eq!(gate.blocked_reason(), Some(DiagReason::MultipleConsumers));

        gate.set_active_consumers(1);
        assert_eq!(gate.blocked_reason(), None);
        assert_eq!(quiet(&mut gate, 10), Some(true));
    }

    #[test]
    fn test_exit_is_immediate_and_unconditional() {
        let mut gate = DeepIdleGate::new(false);
        gate.set_active_consumers(1);
        quiet(&mut gate, 10);
        assert!(gate.is_engaged());
        assert!(gate.busy());
        assert!(!gate.is_engaged());
        // a second busy signal is a no-op
        assert!(!gate.busy());
    }
}
