//! # Cinder Core Types
//!
//! Fundamental type definitions used across the controller stack.
//!
//! These types provide:
//! - Strong typing for block ranges within the shared buffer pool
//! - Identifiers for consumers and planes
//! - Frequency tier codepoints and clock rates

use core::fmt;

// =============================================================================
// CAPACITY BOUNDS
// =============================================================================

/// Maximum planes a single consumer can drive (primary + overlays + cursor).
pub const MAX_PLANES: usize = 4;

/// Maximum watermark tiers any profile exposes.
pub const MAX_TIERS: usize = 8;

/// Maximum concurrently active consumers.
pub const MAX_CONSUMERS: usize = 4;

// =============================================================================
// BLOCK RANGE
// =============================================================================

/// A half-open `[start, end)` span of pool blocks.
///
/// The block is the pool's fixed allocation unit; all budgeting and
/// reallocation operates on these spans, never on byte addresses.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlockRange {
    /// First block of the span
    pub start: u16,
    /// One past the last block of the span
    pub end: u16,
}

impl BlockRange {
    /// Create a new range
    #[inline]
    pub const fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    /// The empty range
    #[inline]
    pub const fn empty() -> Self {
        Self { start: 0, end: 0 }
    }

    /// Number of blocks in the span
    #[inline]
    pub const fn size(self) -> u16 {
        self.end.saturating_sub(self.start)
    }

    /// Check if the span holds no blocks
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.size() == 0
    }

    /// Check if `other` lies entirely within this span
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    /// Check if the spans share any block
    #[inline]
    pub const fn overlaps(self, other: Self) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end && other.start < self.end
    }
}

impl fmt::Debug for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockRange[{}, {})", self.start, self.end)
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier for one display consumer (a pipe driving an output).
///
/// The controller holds ids only; consumer state is re-supplied wholesale on
/// every run and never cached across removals.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ConsumerId(u16);

impl ConsumerId {
    /// Create a new consumer id
    #[inline]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Get the raw value
    #[inline]
    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl fmt::Debug for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "consumer {}", self.0)
    }
}

/// Identifier for one plane within a consumer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PlaneId(u8);

impl PlaneId {
    /// Create a new plane id
    #[inline]
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// Get the raw value
    #[inline]
    pub const fn raw(self) -> u8 {
        self.0
    }
}

impl fmt::Debug for PlaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "plane {}", self.0)
    }
}

// =============================================================================
// FREQUENCY TIER
// =============================================================================

/// A discrete operating-frequency codepoint.
///
/// Tiers are opaque ordinals; the mapping to an actual clock belongs to the
/// out-of-scope register layer. Higher is faster.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct FreqTier(u8);

impl FreqTier {
    /// Create a new tier codepoint
    #[inline]
    pub const fn new(val: u8) -> Self {
        Self(val)
    }

    /// Get the raw codepoint
    #[inline]
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// One tier up, saturating
    #[inline]
    pub const fn step_up(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// One tier down, saturating
    #[inline]
    pub const fn step_down(self) -> Self {
        Self(self.0.saturating_sub(1))
    }

    /// Clamp into `[lo, hi]`
    #[inline]
    pub fn clamp(self, lo: Self, hi: Self) -> Self {
        Self(self.0.clamp(lo.0, hi.0))
    }

    /// Midpoint of two tiers, rounding down
    #[inline]
    pub const fn midpoint(a: Self, b: Self) -> Self {
        Self(((a.0 as u16 + b.0 as u16) >> 1) as u8)
    }
}

impl fmt::Debug for FreqTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier {}", self.0)
    }
}

impl fmt::Display for FreqTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// CLOCK RATE
// =============================================================================

/// A clock rate in kilohertz (pixel clocks arrive at kHz granularity).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct KiloHertz(u32);

impl KiloHertz {
    /// Create from a kHz value
    #[inline]
    pub const fn new(khz: u32) -> Self {
        Self(khz)
    }

    /// Create from a MHz value
    #[inline]
    pub const fn from_mhz(mhz: u32) -> Self {
        Self(mhz * 1000)
    }

    /// Get the raw kHz value
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for KiloHertz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} kHz", self.0)
    }
}

// =============================================================================
// UTILIZATION SAMPLE
// =============================================================================

/// One periodic busy/idle measurement from the utilization sampler.
///
/// Samples are lossy control-loop input; at most a short accumulation is
/// retained for the hysteresis windows, never a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtilizationSample {
    /// Busy fraction over the sample window, in percent (0..=100)
    pub busy_pct: u32,
    /// Length of the sample window in microseconds
    pub window_us: u32,
}

impl UtilizationSample {
    /// Create a new sample; the busy fraction is clamped to 100 %
    #[inline]
    pub const fn new(busy_pct: u32, window_us: u32) -> Self {
        Self {
            busy_pct: if busy_pct > 100 { 100 } else { busy_pct },
            window_us,
        }
    }

    /// Busy time covered by this sample, in microseconds
    #[inline]
    pub const fn busy_us(self) -> u64 {
        self.busy_pct as u64 * self.window_us as u64 / 100
    }
}

// =============================================================================
// TESTS
// =============================================================================
