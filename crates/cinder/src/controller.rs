//! # Display Controller Context
//!
//! The explicit context object tying the pool side and the power side
//! together. One `spin::Mutex` owns every piece of mutable state; every
//! operation acquires it, runs to completion, and releases it. The only
//! in-lock waiting is the sequencer's bounded refresh wait, which is
//! deliberate: reallocations are serialized by design.
//!
//! State is recomputed wholesale from the supplied active set on every
//! update; nothing here survives a consumer's removal.

use alloc::vec::Vec;

use arrayvec::ArrayVec;
use spin::Mutex;

use cinder_core::{
    Consumer, ConsumerId, FreqTier, HardwareProfile, PlaneId, Result, SlotKind,
    UtilizationSample, MAX_CONSUMERS,
};
use cinder_freq::{BiasMode, DeepIdleGate, Governor, IdleVeto, Teardown};
use cinder_pool::{
    allocate, commit, compute_slot, AllocationTable, CommitReport, CommitSink, SlotWatermarks,
    MAX_SLOTS,
};

// =============================================================================
// OUTPUT SNAPSHOTS
// =============================================================================

/// Snapshot of the power side, for the register layer and observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerState {
    /// Currently issued frequency tier
    pub frequency_tier: FreqTier,
    /// Deep idle currently engaged
    pub deep_idle_enabled: bool,
    /// Governor posture
    pub bias_mode: BiasMode,
}

/// What one utilization sample changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PowerDecision {
    /// Newly issued tier, when the sample closed a hysteresis window
    pub frequency: Option<FreqTier>,
    /// Deep-idle engage (`true`) or forced exit (`false`)
    pub deep_idle: Option<bool>,
}

/// Watermark levels for every fetching slot of one consumer.
#[derive(Debug, Clone, Default)]
pub struct ConsumerWatermarks {
    /// Per-slot level ladders
    pub slots: ArrayVec<(PlaneId, SlotKind, SlotWatermarks), MAX_SLOTS>,
}

// =============================================================================
// CONTROLLER
// =============================================================================

struct ControllerState {
    consumers: Vec<Consumer>,
    table: AllocationTable,
    governor: Governor,
    deep_idle: DeepIdleGate,
}

/// The controller context.
///
/// Owns the buffer-pool snapshot and the power state behind one
/// serialization point. Construct one per display engine instance and pass
/// it around explicitly.
pub struct DisplayController {
    profile: HardwareProfile,
    state: Mutex<ControllerState>,
}

impl DisplayController {
    /// Create a controller for the given hardware profile.
    pub fn new(profile: HardwareProfile) -> Self {
        Self {
            profile,
            state: Mutex::new(ControllerState {
                consumers: Vec::new(),
                table: AllocationTable::new(profile.pool_blocks),
                governor: Governor::new(profile.freq),
                deep_idle: DeepIdleGate::new(profile.deep_idle_single_consumer),
            }),
        }
    }

    /// The profile this controller was initialized with
    #[inline]
    pub fn profile(&self) -> &HardwareProfile {
        &self.profile
    }

    // =========================================================================
    // Pool side
    // =========================================================================

    /// Replace the active consumer set.
    ///
    /// Recomputes the pool partition from scratch, migrates the hardware to
    /// it through `sink` in drain-safe order, and adopts the new table. The
    /// lock is held across the migration; see the module notes.
    pub fn update_consumers(
        &self,
        consumers: &[Consumer],
        sink: &mut dyn CommitSink,
    ) -> CommitReport {
        let mut st = self.state.lock();

        let new_table = allocate(&self.profile, consumers);

        let mut active: ArrayVec<ConsumerId, MAX_CONSUMERS> = ArrayVec::new();
        for c in consumers.iter().filter(|c| c.is_active()) {
            let _ = active.try_push(c.id);
        }
        active.sort_unstable();

        let report = commit(&st.table, &new_table, &active, sink);
        if report.has_risk() {
            log::warn!("reallocation completed with {} risk events", report.risks.len());
        }

        st.table = new_table;
        st.consumers = consumers.to_vec();
        st.deep_idle.set_active_consumers(active.len());
        report
    }

    /// Snapshot of the current allocation table.
    pub fn allocation(&self) -> AllocationTable {
        self.state.lock().table.clone()
    }

    /// Watermark ladders for one consumer against its current allocation.
    ///
    /// Computed fresh from the current inputs on every call; returns `None`
    /// for a consumer outside the active set.
    pub fn watermarks(&self, id: ConsumerId) -> Option<ConsumerWatermarks> {
        let st = self.state.lock();
        let consumer = st.consumers.iter().find(|c| c.id == id)?;
        let share = st.table.get(id)?;

        let mut out = ConsumerWatermarks::default();
        for plane in consumer.fetch_planes() {
            for slot in plane.slots() {
                let alloc_blocks = share
                    .slot_range(plane.id, slot)
                    .map_or(0, |r| r.size());
                let wm = compute_slot(&self.profile, consumer, plane, slot, alloc_blocks);
                let _ = out.slots.try_push((plane.id, slot, wm));
            }
        }
        // the cursor fetches from its own reservation
        for plane in consumer.planes.iter().filter(|p| p.visible && p.is_cursor()) {
            let wm = compute_slot(&self.profile, consumer, plane, SlotKind::Main, share.cursor.size());
            let _ = out.slots.try_push((plane.id, SlotKind::Main, wm));
        }
        Some(out)
    }

    // =========================================================================
    // Power side
    // =========================================================================

    /// Feed one utilization sample to the governor and the deep-idle gate.
    pub fn sample(&self, s: UtilizationSample) -> PowerDecision {
        let mut st = self.state.lock();
        PowerDecision {
            frequency: st.governor.sample(s),
            deep_idle: st.deep_idle.sample(s),
        }
    }

    /// Update the soft frequency limits. Rejects `min > max` and keeps the
    /// previous limits.
    pub fn set_soft_limits(&self, min: FreqTier, max: FreqTier) -> Result<()> {
        self.state.lock().governor.set_soft_limits(min, max)
    }

    /// The pipeline has outstanding work: unpark, optionally boost, and
    /// leave deep idle immediately.
    pub fn notify_busy(&self, boost: bool) {
        let mut st = self.state.lock();
        st.deep_idle.busy();
        st.deep_idle.set_veto(IdleVeto::CONSUMER_BUSY, true);
        st.governor.notify_busy(boost);
    }

    /// The pipeline reports no outstanding work: issue the non-blocking
    /// idle request and allow deep-idle evaluation again.
    pub fn notify_idle(&self) {
        let mut st = self.state.lock();
        st.deep_idle.set_veto(IdleVeto::CONSUMER_BUSY, false);
        st.governor.notify_idle();
    }

    /// Set or clear an external deep-idle veto.
    pub fn set_idle_veto(&self, veto: IdleVeto, on: bool) {
        self.state.lock().deep_idle.set_veto(veto, on);
    }

    /// Disable the governor, returning the teardown obligation.
    pub fn disable_governor(&self) -> Teardown {
        self.state.lock().governor.disable()
    }

    /// Re-enable the governor at the given tier.
    pub fn enable_governor(&self, restore: FreqTier) {
        self.state.lock().governor.enable(restore);
    }

    /// Snapshot of the power side.
    pub fn power_state(&self) -> PowerState {
        let st = self.state.lock();
        PowerState {
            frequency_tier: st.governor.current(),
            deep_idle_enabled: st.deep_idle.is_engaged(),
            bias_mode: st.governor.bias_mode(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_core::{KiloHertz, Plane, PlaneClass};

    struct NullSink;

    impl CommitSink for NullSink {
        fn latch(&mut self, _consumer: ConsumerId) {}
        fn wait_refresh(&mut self, _consumer: ConsumerId) -> Result<()> {
            Ok(())
        }
    }

    fn consumer(id: u16) -> Consumer {
        Consumer::new(ConsumerId::new(id), KiloHertz::new(148_500), 2200)
            .with_plane(Plane::new(PlaneId::new(0), PlaneClass::Primary, 1920, 1080, 4))
    }

    #[test]
    fn test_watermarks_follow_current_allocation() {
        let ctl = DisplayController::new(HardwareProfile::large());
        ctl.update_consumers(&[consumer(0)], &mut NullSink);
        let wm = ctl.watermarks(ConsumerId::new(0)).unwrap();
        assert_eq!(wm.slots.len(), 1);
        assert!(wm.slots[0].2.levels[0].feasible);
        assert!(ctl.watermarks(ConsumerId::new(9)).is_none());
    }

    #[test]
    fn test_power_state_snapshot() {
        let ctl = DisplayController::new(HardwareProfile::large());
        let ps = ctl.power_state();
        assert_eq!(ps.frequency_tier, ctl.profile().freq.efficient);
        assert!(!ps.deep_idle_enabled);
        assert_eq!(ps.bias_mode, BiasMode::Low);
    }

    #[test]
    fn test_busy_veto_blocks_deep_idle() {
        let ctl = DisplayController::new(HardwareProfile::large());
        ctl.update_consumers(&[consumer(0)], &mut NullSink);
        ctl.notify_busy(false);
        for _ in 0..20 {
            ctl.sample(UtilizationSample::new(0, 8_000));
        }
        assert!(!ctl.power_state().deep_idle_enabled);

        ctl.notify_idle();
        for _ in 0..20 {
            ctl.sample(UtilizationSample::new(0, 8_000));
        }
        assert!(ctl.power_state().deep_idle_enabled);
    }
}
