//! # Hardware Profiles
//!
//! One capability object per hardware variant, selected once at
//! initialization. Everything the controller needs to know about a variant
//! lives here: pool geometry, the tier latency ladder, tiling minimums and
//! the frequency curve. No operation re-checks a revision code at call time.

use core::fmt;

use static_assertions::const_assert;

use crate::types::{FreqTier, MAX_TIERS};

// =============================================================================
// FREQUENCY CURVE
// =============================================================================

/// Named operating points on a variant's frequency ladder.
///
/// All points are tier codepoints; `idle` sits below `floor` and is only ever
/// issued by the idle request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreqCurve {
    /// Lowest regular operating point
    pub floor: FreqTier,
    /// Knee of the efficiency curve; demotion point for the low-bias mode
    pub efficient: FreqTier,
    /// Balanced operating point
    pub balance: FreqTier,
    /// Highest operating point
    pub ceiling: FreqTier,
    /// Parked request issued when the pipeline reports no work
    pub idle: FreqTier,
}

// =============================================================================
// HARDWARE PROFILE
// =============================================================================

/// Capability object describing one display-engine variant.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct HardwareProfile {
    /// Variant name, for logs
    pub name: &'static str,
    /// Size of one pool block in bytes
    pub block_bytes: u32,
    /// Total pool capacity in blocks
    pub pool_blocks: u16,
    /// Assumed memory-latency budget per tier, in microseconds.
    ///
    /// Monotonically increasing; a zero entry disables the tier.
    pub latency_us: [u32; MAX_TIERS],
    /// Hardware ceiling on a watermark's line count
    pub line_ceiling: u16,
    /// Minimum line group fetched from line-granular tiled layouts
    pub tile_min_lines: u32,
    /// Cursor reservation when exactly one consumer is active
    pub cursor_blocks_solo: u16,
    /// Cursor reservation per consumer otherwise
    pub cursor_blocks_shared: u16,
    /// Fixed bypass-path reservation, independent of consumer count
    pub bypass_blocks: u16,
    /// Fixed per-slot minimum allocation
    pub plane_min_blocks: u16,
    /// Frequency operating points
    pub freq: FreqCurve,
    /// Deep idle is only permitted with at most one active consumer
    pub deep_idle_single_consumer: bool,
}

// Latency ladders. Tier 0 carries the fast-path budget; upper tiers trade
// latency tolerance for power.
const LARGE_LATENCY_US: [u32; MAX_TIERS] = [2, 6, 11, 18, 26, 36, 48, 62];
const SMALL_LATENCY_US: [u32; MAX_TIERS] = [4, 8, 14, 22, 32, 44, 58, 74];

const_assert!(LARGE_LATENCY_US[0] > 0);
const_assert!(SMALL_LATENCY_US[0] > 0);
const_assert!(LARGE_LATENCY_US[MAX_TIERS - 1] < 257);
const_assert!(SMALL_LATENCY_US[MAX_TIERS - 1] < 257);

impl HardwareProfile {
    /// The large desktop variant: 896-block pool, deep idle unrestricted.
    pub const fn large() -> Self {
        Self {
            name: "large",
            block_bytes: 512,
            pool_blocks: 896,
            latency_us: LARGE_LATENCY_US,
            line_ceiling: 31,
            tile_min_lines: 4,
            cursor_blocks_solo: 32,
            cursor_blocks_shared: 8,
            bypass_blocks: 4,
            plane_min_blocks: 8,
            freq: FreqCurve {
                floor: FreqTier::new(4),
                efficient: FreqTier::new(9),
                balance: FreqTier::new(14),
                ceiling: FreqTier::new(22),
                idle: FreqTier::new(2),
            },
            deep_idle_single_consumer: false,
        }
    }

    /// The small low-power variant: 512-block pool, deep idle only while a
    /// single consumer is lit.
    pub const fn small() -> Self {
        Self {
            name: "small",
            block_bytes: 512,
            pool_blocks: 512,
            latency_us: SMALL_LATENCY_US,
            line_ceiling: 31,
            tile_min_lines: 4,
            cursor_blocks_solo: 32,
            cursor_blocks_shared: 8,
            bypass_blocks: 4,
            plane_min_blocks: 8,
            freq: FreqCurve {
                floor: FreqTier::new(3),
                efficient: FreqTier::new(6),
                balance: FreqTier::new(10),
                ceiling: FreqTier::new(16),
                idle: FreqTier::new(1),
            },
            deep_idle_single_consumer: true,
        }
    }

    /// Number of tiers with a nonzero latency budget
    pub fn num_tiers(&self) -> usize {
        self.latency_us.iter().take_while(|&&l| l > 0).count()
    }

    /// Latency budget of a tier, if the tier exists
    #[inline]
    pub fn tier_latency(&self, tier: usize) -> Option<u32> {
        match self.latency_us.get(tier) {
            Some(&l) if l > 0 => Some(l),
            _ => None,
        }
    }

    /// Minimum fetched line group for a tiled plane, honoring rotation.
    ///
    /// Sideways scanout walks the tile column-wise, so narrow formats need
    /// proportionally taller groups.
    pub const fn tile_min_lines_for(&self, bytes_per_pixel: u32, sideways: bool) -> u32 {
        if !sideways {
            return self.tile_min_lines;
        }
        match bytes_per_pixel {
            1 => 16,
            2 => 8,
            _ => self.tile_min_lines,
        }
    }

    /// Cursor reservation for a given active-consumer count
    #[inline]
    pub const fn cursor_blocks(&self, active_consumers: usize) -> u16 {
        if active_consumers == 1 {
            self.cursor_blocks_solo
        } else {
            self.cursor_blocks_shared
        }
    }

    /// Pool blocks left for consumer envelopes after the bypass carve
    #[inline]
    pub const fn usable_blocks(&self) -> u16 {
        self.pool_blocks - self.bypass_blocks
    }
}

impl fmt::Debug for HardwareProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HardwareProfile({}, {} blocks x {} B, {} tiers)",
            self.name,
            self.pool_blocks,
            self.block_bytes,
            self.num_tiers()
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
