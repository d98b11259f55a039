//! # Reallocation Sequencer
//!
//! Migrates the pool between two allocation tables while hardware is live.
//!
//! When the partition changes, the order in which consumers pick up their new
//! ranges matters: a consumer must never fetch from space a neighbour has not
//! finished vacating. Roughly:
//!
//! 1. Latch the consumers whose new range sits strictly inside their old one,
//!    and wait a refresh cycle each so the vacated space is really free.
//! 2. Latch the remaining shrinking consumers (their new range may touch a
//!    neighbour's old space), waiting a refresh cycle each as well.
//! 3. Latch the growing or unchanged consumers without waiting; every
//!    overlapping shrink has already drained by now.
//!
//! Consider a pool `| B | C |` where lighting up consumer A produces
//! `| A | B | C |`: B's reduced range overlaps C's old one, so the latch
//! order must be C, B, A and never B, C, A.
//!
//! A refresh wait that never completes (output unplugged, wedged hardware)
//! is capped by the sink; the sequencer then proceeds and records a
//! correctness-risk event instead of blocking the controller forever.

use arrayvec::ArrayVec;

use cinder_core::{BlockRange, ConsumerId, DiagReason, Result, MAX_CONSUMERS};

use crate::budget::AllocationTable;

// =============================================================================
// COMMIT SINK
// =============================================================================

/// The seam to the register-programming layer.
///
/// The sequencer decides *order*; the sink performs the actual latch and the
/// bounded refresh-cycle wait.
pub trait CommitSink {
    /// Re-arm the consumer's scanout so the new ranges take effect at the
    /// next refresh.
    fn latch(&mut self, consumer: ConsumerId);

    /// Block until the consumer has completed one refresh cycle, or until
    /// the implementation's bounded retry budget expires
    /// ([`Error::WaitTimeout`](cinder_core::Error::WaitTimeout)).
    fn wait_refresh(&mut self, consumer: ConsumerId) -> Result<()>;
}

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// How a consumer's range moves between the old and new tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitClass {
    /// New range strictly inside the old one; vacates space, touches nobody
    ContainedShrink,
    /// Range shrinks but may land on a neighbour's old space
    OverlapShrink,
    /// Range grows or is unchanged
    GrowOrSame,
}

/// Classify one consumer's move.
pub fn classify(old: BlockRange, new: BlockRange) -> CommitClass {
    if new.size() != old.size() && old.contains(new) {
        CommitClass::ContainedShrink
    } else if new.size() < old.size() {
        CommitClass::OverlapShrink
    } else {
        CommitClass::GrowOrSame
    }
}

// =============================================================================
// COMMIT REPORT
// =============================================================================

/// What the sequencer did, for observability.
#[derive(Debug, Clone, Default)]
pub struct CommitReport {
    /// Pass (1..=3) each latched consumer was assigned to
    pub passes: ArrayVec<(ConsumerId, u8), MAX_CONSUMERS>,
    /// Consumers whose bounded refresh wait expired
    pub risks: ArrayVec<(ConsumerId, DiagReason), MAX_CONSUMERS>,
}

impl CommitReport {
    /// Pass a consumer was latched in, if it was latched
    pub fn pass_of(&self, id: ConsumerId) -> Option<u8> {
        self.passes.iter().find(|(c, _)| *c == id).map(|(_, p)| *p)
    }

    /// True when at least one wait expired and a risk was accepted
    #[inline]
    pub fn has_risk(&self) -> bool {
        !self.risks.is_empty()
    }
}

// =============================================================================
// COMMIT
// =============================================================================

/// Migrate `active` consumers from `old` to `new`.
///
/// Holds the caller's serialization point for the whole migration; the only
/// waiting is the sink's bounded refresh wait. Never blocks forever and never
/// latches a grower before every overlapping shrinker has drained.
pub fn commit(
    old: &AllocationTable,
    new: &AllocationTable,
    active: &[ConsumerId],
    sink: &mut dyn CommitSink,
) -> CommitReport {
    let mut report = CommitReport::default();
    let mut done: ArrayVec<ConsumerId, MAX_CONSUMERS> = ArrayVec::new();

    let mut latch_and_drain = |id: ConsumerId, pass: u8, report: &mut CommitReport| {
        log::debug!("latch {:?} (pass {})", id, pass);
        sink.latch(id);
        if sink.wait_refresh(id).is_err() {
            log::warn!("{:?}: refresh wait expired, proceeding at risk", id);
            let _ = report.risks.try_push((id, DiagReason::WaitTimeout));
        }
        let _ = report.passes.try_push((id, pass));
    };

    // Pass 1: contained shrinks. Waiting here guarantees the freed space is
    // no longer being fetched before anyone else may claim it.
    for &id in active {
        if classify(old.envelope(id), new.envelope(id)) == CommitClass::ContainedShrink {
            latch_and_drain(id, 1, &mut report);
            let _ = done.try_push(id);
        }
    }

    // Pass 2: remaining shrinks, same drain requirement.
    for &id in active {
        if done.contains(&id) {
            continue;
        }
        if new.envelope(id).size() < old.envelope(id).size() {
            latch_and_drain(id, 2, &mut report);
            let _ = done.try_push(id);
        }
    }

    // Pass 3: growers and unchanged consumers. No wait needed; the next
    // refresh simply fetches from the (now drained) larger range.
    for &id in active {
        if done.contains(&id) {
            continue;
        }
        log::debug!("latch {:?} (pass 3)", id);
        sink.latch(id);
        let _ = report.passes.try_push((id, 3));
    }

    report
}

// =============================================================================
// TESTS
// =============================================================================
