//! # Watermark Calculator
//!
//! Computes, per consumer plane and per tier, the minimum buffer occupancy
//! that avoids starvation under the tier's assumed memory-latency budget.
//!
//! Two candidate sizes are derived for every level:
//!
//! - **by rate**: bytes the plane fetches during the latency window, in
//!   blocks
//! - **by line**: whole display lines spanned by the latency window, in
//!   blocks per line
//!
//! Line-granular tiled layouts are additionally floored to the hardware's
//! minimum fetched line group. A level that does not fit the plane's current
//! allocation, or that needs more lines than the hardware can count, is
//! marked infeasible. Tier 0 is the exception: it is clamped and flagged
//! instead, because one tier must always remain active.

use arrayvec::ArrayVec;

use cinder_core::{
    Consumer, DiagReason, HardwareProfile, Plane, SlotKind, TileMode, MAX_TIERS,
};

// =============================================================================
// LEVEL RESULTS
// =============================================================================

/// One computed watermark level for a plane slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WatermarkLevel {
    /// Required buffer occupancy in blocks
    pub blocks: u16,
    /// Required occupancy in display lines
    pub lines: u16,
    /// Level fits the slot's current allocation
    pub feasible: bool,
}

/// Outcome of computing a single level: the level plus an optional
/// degraded-operation diagnostic (tier-0 clamping).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelResult {
    /// The computed level
    pub level: WatermarkLevel,
    /// Set when the level was clamped rather than disabled
    pub diag: Option<DiagReason>,
}

/// All levels of one plane slot, lowest tier first.
#[derive(Debug, Clone, Default)]
pub struct SlotWatermarks {
    /// Per-tier levels
    pub levels: ArrayVec<WatermarkLevel, MAX_TIERS>,
    /// Degraded-operation diagnostic raised while computing, if any
    pub diag: Option<DiagReason>,
}

// =============================================================================
// CANDIDATE FORMULAS
// =============================================================================

#[inline]
const fn div_round_up(n: u64, d: u64) -> u64 {
    (n + d - 1) / d
}

/// Bytes-per-pixel as the fetch unit sees it.
///
/// The tight tiled layout fetches single-byte formats in pairs.
#[inline]
fn effective_bpp(plane: &Plane, slot: SlotKind) -> u32 {
    let bpp = plane.slot_bpp(slot);
    if plane.tiling == TileMode::TiledYf && bpp == 1 {
        2
    } else {
        bpp
    }
}

/// Blocks covering one display line of the slot.
///
/// Line-granular tiled layouts round at the fetch group (four lines) before
/// dividing back down, which can round a partial trailing block away.
fn blocks_per_line(profile: &HardwareProfile, plane: &Plane, slot: SlotKind) -> u32 {
    let line_bytes = plane.slot_width(slot) * effective_bpp(plane, slot);
    let bpl = if plane.tiling.is_line_granular() {
        div_round_up(4 * line_bytes as u64, profile.block_bytes as u64) / 4
    } else {
        div_round_up(line_bytes as u64, profile.block_bytes as u64)
    };
    (bpl as u32).max(1)
}

/// Candidate: bytes fetched during the latency window, in blocks.
fn wm_by_rate(pixel_rate_khz: u32, bpp: u32, latency_us: u32, block_bytes: u32) -> u64 {
    let intermediate = latency_us as u64 * pixel_rate_khz as u64 * bpp as u64 / block_bytes as u64;
    div_round_up(intermediate, 1000)
}

/// Candidate: display lines spanned by the latency window, in blocks.
fn wm_by_line(pixel_rate_khz: u32, line_total: u32, latency_us: u32, bpl: u32) -> u64 {
    let intermediate = latency_us as u64 * pixel_rate_khz as u64;
    div_round_up(intermediate, line_total as u64 * 1000) * bpl as u64
}

// =============================================================================
// LEVEL COMPUTATION
// =============================================================================

/// Compute one watermark level for a plane slot.
///
/// `alloc_blocks` is the slot's current allocation; feasibility is judged
/// against it. Monotonic in the tier's latency budget for fixed geometry.
pub fn compute_level(
    profile: &HardwareProfile,
    consumer: &Consumer,
    plane: &Plane,
    slot: SlotKind,
    alloc_blocks: u16,
    tier: usize,
) -> LevelResult {
    let disabled = LevelResult {
        level: WatermarkLevel::default(),
        diag: None,
    };

    let Some(latency_us) = profile.tier_latency(tier) else {
        return disabled;
    };
    if !consumer.is_active() || !plane.visible || consumer.line_total == 0 {
        return disabled;
    }

    let pixel_rate = consumer.pixel_clock.raw();
    let bpp = effective_bpp(plane, slot);
    let bpl = blocks_per_line(profile, plane, slot);

    let by_rate = wm_by_rate(pixel_rate, bpp, latency_us, profile.block_bytes);
    let by_line = wm_by_line(pixel_rate, consumer.line_total, latency_us, bpl);

    let selected = if plane.tiling.is_line_granular() {
        let min_lines =
            profile.tile_min_lines_for(plane.bytes_per_pixel, plane.rotation.is_sideways());
        by_line.max(min_lines as u64 * bpl as u64)
    } else if alloc_blocks as u32 / bpl >= 1 {
        by_rate.min(by_line)
    } else {
        by_rate
    };

    let mut blocks = selected + 1;
    let mut lines = div_round_up(selected, bpl as u64);

    // Upper tiers carry a refill margin.
    if tier >= 1 {
        if plane.tiling.is_line_granular() {
            lines += 4;
        } else {
            blocks += 1;
        }
    }

    let fits = blocks < alloc_blocks as u64 && lines <= profile.line_ceiling as u64;

    if !fits && tier == 0 {
        // Tier 0 must stay active: clamp to the allocation and flag the
        // degradation instead of disabling the last tier.
        let diag = if lines > profile.line_ceiling as u64 {
            DiagReason::ModeTooLarge
        } else {
            DiagReason::PoolExhausted
        };
        log::warn!(
            "{:?} {:?}: tier 0 clamped ({} blocks, {} lines): {}",
            consumer.id,
            plane.id,
            blocks,
            lines,
            diag
        );
        return LevelResult {
            level: WatermarkLevel {
                blocks: blocks.min(alloc_blocks as u64) as u16,
                lines: lines.min(profile.line_ceiling as u64) as u16,
                feasible: true,
            },
            diag: Some(diag),
        };
    }

    LevelResult {
        level: WatermarkLevel {
            blocks: blocks.min(u16::MAX as u64) as u16,
            lines: lines.min(u16::MAX as u64) as u16,
            feasible: fits,
        },
        diag: None,
    }
}

/// Time the consumer spends scanning one display line, in eighths of a
/// microsecond (the granularity the arbitration hardware counts in).
pub fn line_time_eighths_us(consumer: &Consumer) -> u32 {
    if !consumer.is_active() || consumer.pixel_clock.raw() == 0 {
        return 0;
    }
    div_round_up(
        8 * consumer.line_total as u64 * 1000,
        consumer.pixel_clock.raw() as u64,
    ) as u32
}

/// Compute every tier for one plane slot.
pub fn compute_slot(
    profile: &HardwareProfile,
    consumer: &Consumer,
    plane: &Plane,
    slot: SlotKind,
    alloc_blocks: u16,
) -> SlotWatermarks {
    let mut out = SlotWatermarks::default();
    for tier in 0..profile.num_tiers() {
        let result = compute_level(profile, consumer, plane, slot, alloc_blocks, tier);
        out.levels.push(result.level);
        if out.diag.is_none() {
            out.diag = result.diag;
        }
    }
    out
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_core::{ConsumerId, KiloHertz, PlaneClass, PlaneId, Rotation};

    fn consumer_1080p() -> Consumer {
        Consumer::new(ConsumerId::new(0), KiloHertz::new(148_500), 2200)
            .with_plane(Plane::new(PlaneId::new(0), PlaneClass::Primary, 1920, 1080, 4))
    }

    #[test]
    fn test_1080p_tier0_is_reproducible() {
        let profile = HardwareProfile::large();
        let c = consumer_1080p();
        let p = c.planes[0];
        for _ in 0..3 {
            let r = compute_level(&profile, &c, &p, SlotKind::Main, 160, 0);
            assert_eq!(r.level.blocks, 4);
            assert_eq!(r.level.lines, 1);
            assert!(r.level.feasible);
            assert!(r.diag.is_none());
        }
    }

    #[test]
    fn test_monotonic_in_latency() {
        let profile = HardwareProfile::large();
        let c = consumer_1080p();
        let p = c.planes[0];
        let mut prev = 0u16;
        for tier in 0..profile.num_tiers() {
            let r = compute_level(&profile, &c, &p, SlotKind::Main, 400, tier);
            assert!(
                r.level.blocks >= prev,
                "tier {} regressed: {} < {}",
                tier,
                r.level.blocks,
                prev
            );
            prev = r.level.blocks;
        }
    }

    #[test]
    fn test_tiled_line_floor_dominates() {
        let profile = HardwareProfile::large();
        let mut c = consumer_1080p();
        c.planes[0].tiling = TileMode::TiledY;
        let p = c.planes[0];
        let r = compute_level(&profile, &c, &p, SlotKind::Main, 200, 0);
        // 15 blocks/line, four-line fetch group -> 60 selected, plus margin
        assert_eq!(r.level.blocks, 61);
        assert_eq!(r.level.lines, 4);
    }

    #[test]
    fn test_rotated_narrow_format_needs_taller_group() {
        let profile = HardwareProfile::large();
        let mut c = consumer_1080p();
        c.planes[0].tiling = TileMode::TiledY;
        c.planes[0].bytes_per_pixel = 1;
        c.planes[0].rotation = Rotation::Deg90;
        let p = c.planes[0];
        let flat = {
            let mut q = p;
            q.rotation = Rotation::Deg0;
            compute_level(&profile, &c, &q, SlotKind::Main, 400, 0)
        };
        let rotated = compute_level(&profile, &c, &p, SlotKind::Main, 400, 0);
        assert!(rotated.level.blocks > flat.level.blocks);
    }

    #[test]
    fn test_upper_tier_infeasible_when_allocation_small() {
        let profile = HardwareProfile::large();
        let c = consumer_1080p();
        let p = c.planes[0];
        let r = compute_level(&profile, &c, &p, SlotKind::Main, 6, 7);
        assert!(!r.level.feasible);
        assert!(r.diag.is_none());
    }

    #[test]
    fn test_tier0_clamped_not_disabled() {
        let profile = HardwareProfile::large();
        let c = consumer_1080p();
        let p = c.planes[0];
        // An allocation smaller than even the tier-0 requirement.
        let r = compute_level(&profile, &c, &p, SlotKind::Main, 3, 0);
        assert!(r.level.feasible, "tier 0 must never be disabled");
        assert!(r.level.blocks <= 3);
        assert_eq!(r.diag, Some(DiagReason::PoolExhausted));
    }

    #[test]
    fn test_hidden_plane_has_no_levels() {
        let profile = HardwareProfile::large();
        let mut c = consumer_1080p();
        c.planes[0].visible = false;
        let p = c.planes[0];
        let r = compute_level(&profile, &c, &p, SlotKind::Main, 160, 0);
        assert_eq!(r.level, WatermarkLevel::default());
    }

    #[test]
    fn test_line_time() {
        let c = consumer_1080p();
        // 8 * 2200 * 1000 / 148500 = 118.5..., rounded up
        assert_eq!(line_time_eighths_us(&c), 119);
        let mut dark = c.clone();
        dark.visible = false;
        assert_eq!(line_time_eighths_us(&dark), 0);
    }

    #[test]
    fn test_compute_slot_covers_all_tiers() {
        let profile = HardwareProfile::large();
        let c = consumer_1080p();
        let p = c.planes[0];
        let wm = compute_slot(&profile, &c, &p, SlotKind::Main, 160);
        assert_eq!(wm.levels.len(), profile.num_tiers());
        assert!(wm.levels[0].feasible);
    }
}
