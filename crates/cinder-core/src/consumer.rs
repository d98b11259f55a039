//! # Consumer Model
//!
//! The controller's view of one active display pipeline and its planes.
//!
//! Consumers are owned by the configuration layer; the controller receives
//! the full active set on every run and recomputes from scratch. Visibility
//! toggles without destroying the consumer.

use arrayvec::ArrayVec;

use crate::types::{ConsumerId, KiloHertz, PlaneId, MAX_PLANES};

// =============================================================================
// TILING
// =============================================================================

/// Surface tiling layout of a plane's framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileMode {
    /// Linear (row-major) layout
    Linear,
    /// Legacy horizontal tiling
    TiledX,
    /// Tiled layout fetched at line-group granularity
    TiledY,
    /// Tight tiled layout fetched at line-group granularity
    TiledYf,
}

impl TileMode {
    /// Tiled layouts whose fetch unit spans whole line groups.
    ///
    /// These dominate the watermark with a line-granularity floor instead of
    /// the raw byte-rate candidate.
    #[inline]
    pub const fn is_line_granular(self) -> bool {
        matches!(self, Self::TiledY | Self::TiledYf)
    }
}

// =============================================================================
// ROTATION
// =============================================================================

/// Plane rotation, as committed by the configuration layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    /// No rotation
    #[default]
    Deg0,
    /// 90 degrees
    Deg90,
    /// 180 degrees
    Deg180,
    /// 270 degrees
    Deg270,
}

impl Rotation {
    /// True for the orientations that scan the surface sideways
    #[inline]
    pub const fn is_sideways(self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }
}

// =============================================================================
// PLANE
// =============================================================================

/// Class of a plane within its consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaneClass {
    /// The consumer's primary surface
    Primary,
    /// An overlay/sprite surface
    Overlay,
    /// The cursor; draws from the separately reserved cursor region
    Cursor,
}

/// Buffer slot of a plane.
///
/// Packed formats use `Main` only. Bi-planar formats own a second region for
/// the subsampled chroma surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SlotKind {
    /// The main (full resolution) surface
    Main,
    /// The auxiliary chroma surface of a bi-planar format
    Aux,
}

/// One plane of a consumer: geometry, format and layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plane {
    /// Plane identifier, unique within the consumer
    pub id: PlaneId,
    /// Plane class
    pub class: PlaneClass,
    /// Source width in pixels
    pub src_w: u32,
    /// Source height in pixels
    pub src_h: u32,
    /// Bytes per pixel of the main surface
    pub bytes_per_pixel: u32,
    /// Tiling layout
    pub tiling: TileMode,
    /// Committed rotation
    pub rotation: Rotation,
    /// Bi-planar format (owns an auxiliary chroma slot)
    pub bi_planar: bool,
    /// Plane is currently visible
    pub visible: bool,
}

impl Plane {
    /// Create a visible, unrotated, linear packed-format plane
    pub const fn new(id: PlaneId, class: PlaneClass, w: u32, h: u32, bpp: u32) -> Self {
        Self {
            id,
            class,
            src_w: w,
            src_h: h,
            bytes_per_pixel: bpp,
            tiling: TileMode::Linear,
            rotation: Rotation::Deg0,
            bi_planar: false,
            visible: true,
        }
    }

    /// Check if this is the cursor plane
    #[inline]
    pub const fn is_cursor(&self) -> bool {
        matches!(self.class, PlaneClass::Cursor)
    }

    /// Buffer slots this plane owns
    pub fn slots(&self) -> ArrayVec<SlotKind, 2> {
        let mut v = ArrayVec::new();
        v.push(SlotKind::Main);
        if self.bi_planar {
            v.push(SlotKind::Aux);
        }
        v
    }

    /// Source width of a slot (chroma is subsampled 2x horizontally)
    #[inline]
    pub const fn slot_width(&self, slot: SlotKind) -> u32 {
        match slot {
            SlotKind::Main => self.src_w,
            SlotKind::Aux => self.src_w / 2,
        }
    }

    /// Source height of a slot (chroma is subsampled 2x vertically)
    #[inline]
    pub const fn slot_height(&self, slot: SlotKind) -> u32 {
        match slot {
            SlotKind::Main => self.src_h,
            SlotKind::Aux => self.src_h / 2,
        }
    }

    /// Bytes per pixel of a slot (interleaved chroma packs two samples)
    #[inline]
    pub const fn slot_bpp(&self, slot: SlotKind) -> u32 {
        match slot {
            SlotKind::Main => self.bytes_per_pixel,
            SlotKind::Aux => self.bytes_per_pixel * 2,
        }
    }

    /// Relative memory bandwidth of a slot: pixel count times bytes-per-pixel.
    ///
    /// This is the weight used when distributing leftover pool space.
    pub const fn data_rate(&self, slot: SlotKind) -> u64 {
        self.slot_width(slot) as u64 * self.slot_height(slot) as u64 * self.slot_bpp(slot) as u64
    }
}

// =============================================================================
// CONSUMER
// =============================================================================

/// One active display pipeline competing for the shared buffer pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consumer {
    /// Consumer identifier
    pub id: ConsumerId,
    /// Pixel clock of the committed mode
    pub pixel_clock: KiloHertz,
    /// Total line length in pixels, including blanking
    pub line_total: u32,
    /// Output is lit; toggles without destroying the consumer
    pub visible: bool,
    /// Planes driven by this consumer
    pub planes: ArrayVec<Plane, MAX_PLANES>,
}

impl Consumer {
    /// Create a consumer with no planes attached yet
    pub fn new(id: ConsumerId, pixel_clock: KiloHertz, line_total: u32) -> Self {
        Self {
            id,
            pixel_clock,
            line_total,
            visible: true,
            planes: ArrayVec::new(),
        }
    }

    /// Attach a plane (builder style)
    #[must_use]
    pub fn with_plane(mut self, plane: Plane) -> Self {
        self.planes.push(plane);
        self
    }

    /// A consumer takes part in budgeting only while its output is lit
    #[inline]
    pub fn is_active(&self) -> bool {
        self.visible
    }

    /// Look up a plane by id
    pub fn plane(&self, id: PlaneId) -> Option<&Plane> {
        self.planes.iter().find(|p| p.id == id)
    }

    /// Visible non-cursor planes, in plane-id order as supplied
    pub fn fetch_planes(&self) -> impl Iterator<Item = &Plane> {
        self.planes.iter().filter(|p| p.visible && !p.is_cursor())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn nv12_plane() -> Plane {
        Plane {
            bi_planar: true,
            bytes_per_pixel: 1,
            ..Plane::new(PlaneId::new(0), PlaneClass::Primary, 1920, 1080, 1)
        }
    }

    #[test]
    fn test_packed_plane_single_slot() {
        let p = Plane::new(PlaneId::new(0), PlaneClass::Primary, 1920, 1080, 4);
        assert_eq!(p.slots().as_slice(), &[SlotKind::Main]);
        assert_eq!(p.data_rate(SlotKind::Main), 1920 * 1080 * 4);
    }

    #[test]
    fn test_biplanar_slots_and_rates() {
        let p = nv12_plane();
        assert_eq!(p.slots().as_slice(), &[SlotKind::Main, SlotKind::Aux]);
        assert_eq!(p.data_rate(SlotKind::Main), 1920 * 1080);
        // chroma: quarter resolution, two bytes per sample
        assert_eq!(p.data_rate(SlotKind::Aux), 960 * 540 * 2);
    }

    #[test]
    fn test_fetch_planes_skips_cursor_and_hidden() {
        let mut hidden = Plane::new(PlaneId::new(1), PlaneClass::Overlay, 640, 480, 4);
        hidden.visible = false;
        let consumer = Consumer::new(ConsumerId::new(0), KiloHertz::new(148_500), 2200)
            .with_plane(Plane::new(PlaneId::new(0), PlaneClass::Primary, 1920, 1080, 4))
            .with_plane(hidden)
            .with_plane(Plane::new(PlaneId::new(2), PlaneClass::Cursor, 64, 64, 4));
        assert_eq!(consumer.fetch_planes().count(), 1);
    }
}
