//! # Buffer Budget Allocator
//!
//! Partitions the shared buffer pool across the active consumer set.
//!
//! The split is total and never fails:
//!
//! 1. A fixed bypass region comes off the pool, independent of consumer
//!    count.
//! 2. The remainder is divided into equal per-consumer envelopes in
//!    consumer-id order.
//! 3. The cursor reservation is carved off the top of each envelope (larger
//!    when a single consumer owns the whole pool).
//! 4. Every fetching plane slot gets its fixed minimum (doubled for the
//!    auxiliary slot of bi-planar formats), then the envelope remainder is
//!    distributed proportionally to slot bandwidth with floor division.
//!
//! Rounding loss is tolerated and not redistributed. No feasibility check
//! happens here; an undersized result surfaces later through the watermark
//! calculator. When even the fixed minimums cannot fit, overlay planes are
//! shed rather than emitting an overlapping table.

use arrayvec::ArrayVec;
use hashbrown::HashMap;

use cinder_core::{
    BlockRange, Consumer, ConsumerId, DiagReason, HardwareProfile, Plane, PlaneClass, PlaneId,
    SlotKind, MAX_PLANES,
};

/// Upper bound on fetchable slots per consumer (every plane bi-planar).
pub const MAX_SLOTS: usize = MAX_PLANES * 2;

// =============================================================================
// ALLOCATION TABLE
// =============================================================================

/// The pool range handed to one plane slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotAllocation {
    /// Owning plane
    pub plane: PlaneId,
    /// Which of the plane's slots
    pub slot: SlotKind,
    /// Assigned block span
    pub range: BlockRange,
}

/// One consumer's share of the pool.
#[derive(Debug, Clone, Default)]
pub struct ConsumerAllocation {
    /// The consumer's whole envelope, cursor region included
    pub envelope: BlockRange,
    /// Reserved cursor region at the top of the envelope
    pub cursor: BlockRange,
    /// Per-slot spans, packed bottom-up inside the envelope
    pub slots: ArrayVec<SlotAllocation, MAX_SLOTS>,
    /// Planes shed to make the minimums fit
    pub shed_planes: ArrayVec<PlaneId, MAX_PLANES>,
    /// Degradation diagnostic, if any
    pub diag: Option<DiagReason>,
}

impl ConsumerAllocation {
    /// An empty share (consumer not lit)
    pub fn dark(diag: DiagReason) -> Self {
        Self {
            diag: Some(diag),
            ..Self::default()
        }
    }

    /// Look up the span of one plane slot
    pub fn slot_range(&self, plane: PlaneId, slot: SlotKind) -> Option<BlockRange> {
        self.slots
            .iter()
            .find(|s| s.plane == plane && s.slot == slot)
            .map(|s| s.range)
    }

    /// Blocks actually assigned (slots plus cursor)
    pub fn assigned_blocks(&self) -> u32 {
        self.cursor.size() as u32
            + self
                .slots
                .iter()
                .map(|s| s.range.size() as u32)
                .sum::<u32>()
    }
}

/// The full pool partition for one active set.
#[derive(Debug, Clone, Default)]
pub struct AllocationTable {
    consumers: HashMap<ConsumerId, ConsumerAllocation>,
    pool_blocks: u16,
}

impl AllocationTable {
    /// Create an empty table for a pool of the given capacity
    pub fn new(pool_blocks: u16) -> Self {
        Self {
            consumers: HashMap::new(),
            pool_blocks,
        }
    }

    /// Pool capacity this table was computed for
    #[inline]
    pub fn pool_blocks(&self) -> u16 {
        self.pool_blocks
    }

    /// Look up one consumer's share
    pub fn get(&self, id: ConsumerId) -> Option<&ConsumerAllocation> {
        self.consumers.get(&id)
    }

    /// A consumer's envelope; empty when the consumer is absent or dark
    pub fn envelope(&self, id: ConsumerId) -> BlockRange {
        self.get(id).map_or(BlockRange::empty(), |c| c.envelope)
    }

    /// Iterate over all shares
    pub fn iter(&self) -> impl Iterator<Item = (ConsumerId, &ConsumerAllocation)> {
        self.consumers.iter().map(|(&id, alloc)| (id, alloc))
    }

    /// Total blocks assigned across all consumers
    pub fn total_assigned(&self) -> u32 {
        self.consumers.values().map(|c| c.assigned_blocks()).sum()
    }

    pub(crate) fn insert(&mut self, id: ConsumerId, alloc: ConsumerAllocation) {
        self.consumers.insert(id, alloc);
    }
}

// =============================================================================
// ALLOCATION
// =============================================================================

/// Partition the pool for the given consumer set.
///
/// Total: always returns a table. Idempotent: the table depends only on the
/// supplied set, never on any previous partition.
pub fn allocate(profile: &HardwareProfile, consumers: &[Consumer]) -> AllocationTable {
    let mut table = AllocationTable::new(profile.pool_blocks);

    let mut active: ArrayVec<&Consumer, { cinder_core::MAX_CONSUMERS }> = ArrayVec::new();
    for c in consumers {
        if !c.is_active() {
            table.insert(c.id, ConsumerAllocation::dark(DiagReason::NoOutput));
        } else if active.is_full() {
            log::warn!("{:?}: active set over hardware limit, left dark", c.id);
            table.insert(c.id, ConsumerAllocation::dark(DiagReason::MultipleConsumers));
        } else {
            active.push(c);
        }
    }
    active.sort_by_key(|c| c.id);

    let n = active.len();
    if n == 0 {
        return table;
    }

    let usable = profile.usable_blocks() as u32;
    for (nth, c) in active.iter().enumerate() {
        let start = (nth as u32 * usable / n as u32) as u16;
        let size = (usable / n as u32) as u16;
        let envelope = BlockRange::new(start, start + size);
        table.insert(c.id, carve_envelope(profile, c, envelope, n));
    }

    log::trace!(
        "allocated {} consumers, {}/{} blocks",
        n,
        table.total_assigned(),
        profile.pool_blocks
    );
    table
}

struct SlotRequest {
    plane: PlaneId,
    class: PlaneClass,
    slot: SlotKind,
    min: u16,
    rate: u64,
}

/// The fetch unit walks cache-line aligned strides up to 32 KiB.
fn stride_ok(plane: &Plane) -> bool {
    let stride = plane.src_w * plane.bytes_per_pixel;
    stride > 0 && stride <= 32 * 1024 && stride % 64 == 0
}

/// Split one consumer's envelope between its cursor and fetching slots.
fn carve_envelope(
    profile: &HardwareProfile,
    consumer: &Consumer,
    envelope: BlockRange,
    active_consumers: usize,
) -> ConsumerAllocation {
    let mut out = ConsumerAllocation {
        envelope,
        ..ConsumerAllocation::default()
    };

    let cursor_blocks = profile.cursor_blocks(active_consumers).min(envelope.size());
    out.cursor = BlockRange::new(envelope.end - cursor_blocks, envelope.end);
    let avail = BlockRange::new(envelope.start, envelope.end - cursor_blocks);

    let mut requests: ArrayVec<SlotRequest, MAX_SLOTS> = ArrayVec::new();
    for plane in consumer.fetch_planes() {
        if !stride_ok(plane) {
            log::warn!("{:?}: {:?} left dark: {}", consumer.id, plane.id, DiagReason::BadStride);
            let _ = out.shed_planes.try_push(plane.id);
            out.diag = Some(DiagReason::BadStride);
            continue;
        }
        for slot in plane.slots() {
            let min = match slot {
                SlotKind::Main => profile.plane_min_blocks,
                SlotKind::Aux => profile.plane_min_blocks * 2,
            };
            requests.push(SlotRequest {
                plane: plane.id,
                class: plane.class,
                slot,
                min,
                rate: plane.data_rate(slot),
            });
        }
    }

    // Shed overlays, highest plane id first, until the minimums fit. The
    // primary is never shed; an oversubscribed primary is clamped below and
    // surfaces as a tier-0 degradation instead.
    loop {
        let total_min: u32 = requests.iter().map(|r| r.min as u32).sum();
        if total_min <= avail.size() as u32 {
            break;
        }
        let victim = requests
            .iter()
            .filter(|r| r.class == PlaneClass::Overlay)
            .map(|r| r.plane)
            .max();
        let Some(victim) = victim else { break };
        requests.retain(|r| r.plane != victim);
        let _ = out.shed_planes.try_push(victim);
        out.diag = Some(DiagReason::PoolExhausted);
        log::warn!(
            "{:?}: shedding {:?} to fit minimum reservations",
            consumer.id,
            victim
        );
    }

    let total_min: u32 = requests.iter().map(|r| r.min as u32).sum();
    let total_rate: u64 = requests.iter().map(|r| r.rate).sum();
    let spare = (avail.size() as u32).saturating_sub(total_min);

    let mut fill = avail.start;
    for req in &requests {
        let share = if total_rate > 0 {
            (spare as u64 * req.rate / total_rate) as u32
        } else {
            0
        };
        let want = req.min as u32 + share;
        let room = (avail.end - fill) as u32;
        let got = want.min(room) as u16;
        if (got as u32) < want && out.diag.is_none() {
            out.diag = Some(DiagReason::PoolExhausted);
        }
        out.slots.push(SlotAllocation {
            plane: req.plane,
            slot: req.slot,
            range: BlockRange::new(fill, fill + got),
        });
        fill += got;
    }

    out
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_core::{KiloHertz, Plane};

    fn consumer(id: u16) -> Consumer {
        Consumer::new(ConsumerId::new(id), KiloHertz::new(148_500), 2200)
            .with_plane(Plane::new(PlaneId::new(0), PlaneClass::Primary, 1920, 1080, 4))
            .with_plane(Plane::new(PlaneId::new(3), PlaneClass::Cursor, 64, 64, 4))
    }

    fn overlay(id: u8, w: u32, h: u32) -> Plane {
        Plane::new(PlaneId::new(id), PlaneClass::Overlay, w, h, 4)
    }

    #[test]
    fn test_total_never_exceeds_capacity() {
        let profile = HardwareProfile::large();
        for set in [
            alloc::vec![consumer(0)],
            alloc::vec![consumer(0), consumer(1)],
            alloc::vec![
                consumer(0).with_plane(overlay(1, 1280, 720)),
                consumer(1),
                consumer(2).with_plane(overlay(1, 640, 480)),
            ],
        ] {
            let table = allocate(&profile, &set);
            assert!(table.total_assigned() <= profile.pool_blocks as u32);
        }
    }

    #[test]
    fn test_no_overlap_between_consumers() {
        let profile = HardwareProfile::large();
        let set = alloc::vec![consumer(0), consumer(1), consumer(2)];
        let table = allocate(&profile, &set);
        for a in &set {
            for b in &set {
                if a.id != b.id {
                    assert!(!table.envelope(a.id).overlaps(table.envelope(b.id)));
                }
            }
        }
    }

    #[test]
    fn test_slots_respect_minimums() {
        let profile = HardwareProfile::large();
        let mut nv12 = overlay(1, 1280, 720);
        nv12.bi_planar = true;
        nv12.bytes_per_pixel = 1;
        let set = alloc::vec![consumer(0).with_plane(nv12), consumer(1)];
        let table = allocate(&profile, &set);
        let share = table.get(ConsumerId::new(0)).unwrap();
        for s in &share.slots {
            let floor = match s.slot {
                SlotKind::Main => profile.plane_min_blocks,
                SlotKind::Aux => profile.plane_min_blocks * 2,
            };
            assert!(
                s.range.size() >= floor,
                "{:?}/{:?} got {} blocks",
                s.plane,
                s.slot,
                s.range.size()
            );
        }
    }

    #[test]
    fn test_cursor_reservation_solo_vs_shared() {
        let profile = HardwareProfile::large();
        let solo = allocate(&profile, &[consumer(0)]);
        assert_eq!(
            solo.get(ConsumerId::new(0)).unwrap().cursor.size(),
            profile.cursor_blocks_solo
        );
        let shared = allocate(&profile, &[consumer(0), consumer(1)]);
        assert_eq!(
            shared.get(ConsumerId::new(0)).unwrap().cursor.size(),
            profile.cursor_blocks_shared
        );
    }

    #[test]
    fn test_idempotent_across_set_changes() {
        let profile = HardwareProfile::large();
        let first = allocate(&profile, &[consumer(0)]);
        let _both = allocate(&profile, &[consumer(0), consumer(1)]);
        let again = allocate(&profile, &[consumer(0)]);
        let a = first.get(ConsumerId::new(0)).unwrap();
        let b = again.get(ConsumerId::new(0)).unwrap();
        assert_eq!(a.envelope, b.envelope);
        assert_eq!(a.cursor, b.cursor);
        assert_eq!(a.slots.as_slice(), b.slots.as_slice());
    }

    #[test]
    fn test_dark_consumer_gets_empty_share() {
        let profile = HardwareProfile::large();
        let mut dark = consumer(5);
        dark.visible = false;
        let table = allocate(&profile, &[consumer(0), dark]);
        let share = table.get(ConsumerId::new(5)).unwrap();
        assert!(share.envelope.is_empty());
        assert_eq!(share.diag, Some(DiagReason::NoOutput));
    }

    #[test]
    fn test_bandwidth_proportional_distribution() {
        let profile = HardwareProfile::large();
        let set = alloc::vec![consumer(0).with_plane(overlay(1, 480, 270))];
        let table = allocate(&profile, &set);
        let share = table.get(ConsumerId::new(0)).unwrap();
        let primary = share
            .slot_range(PlaneId::new(0), SlotKind::Main)
            .unwrap()
            .size();
        let small = share
            .slot_range(PlaneId::new(1), SlotKind::Main)
            .unwrap()
            .size();
        // 1920x1080 vs 480x270: sixteen times the bandwidth
        assert!(primary > small * 8);
    }

    #[test]
    fn test_unaligned_stride_leaves_plane_dark() {
        let profile = HardwareProfile::large();
        // 333 px * 4 B is not cache-line aligned
        let set = alloc::vec![consumer(0).with_plane(overlay(1, 333, 200))];
        let table = allocate(&profile, &set);
        let share = table.get(ConsumerId::new(0)).unwrap();
        assert!(share.slot_range(PlaneId::new(1), SlotKind::Main).is_none());
        assert_eq!(share.shed_planes.as_slice(), &[PlaneId::new(1)]);
        assert_eq!(share.diag, Some(DiagReason::BadStride));
    }

    #[test]
    fn test_minimum_overflow_sheds_overlays() {
        // A pool so small the minimums cannot fit four consumers' overlays.
        let mut profile = HardwareProfile::small();
        profile.pool_blocks = 64;
        let set = alloc::vec![
            consumer(0)
                .with_plane(overlay(1, 1280, 720))
                .with_plane(overlay(2, 640, 480)),
            consumer(1),
            consumer(2),
            consumer(3),
        ];
        let table = allocate(&profile, &set);
        assert!(table.total_assigned() <= profile.pool_blocks as u32);
        let share = table.get(ConsumerId::new(0)).unwrap();
        assert!(!share.shed_planes.is_empty());
        assert_eq!(share.diag, Some(DiagReason::PoolExhausted));
        // highest overlay goes first
        assert_eq!(share.shed_planes[0], PlaneId::new(2));
    }
}
