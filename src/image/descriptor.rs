//! Immutable image descriptor with reduction-aware geometry queries.

use std::sync::Arc;

use crate::codec::{DecodeService, HeaderRecord, HeaderStatus};
use crate::error::CodecError;

// =============================================================================
// Reduction Arithmetic
// =============================================================================

/// Apply ceiling-halving `reduction` times to a level-0 value.
///
/// The iterative form (halve and round up, once per level) is the contract:
/// it is what the codec does when it drops resolution levels, and every
/// geometry value at a reduced level must be derived the same way.
fn reduce(mut value: u32, reduction: u32) -> u32 {
    for _ in 0..reduction {
        value = value.div_ceil(2);
    }
    value
}

// =============================================================================
// Image Descriptor
// =============================================================================

/// Immutable metadata for one opened image.
///
/// Created from a single [`HeaderRecord`] fetch and never mutated afterwards.
/// All geometry queries take a reduction level; callers clamp the level into
/// `[0, max_reduction]` before asking (an out-of-range level is a programming
/// error, not a recoverable condition).
///
/// # Example
///
/// ```ignore
/// let image = ImageDescriptor::open(&codec, "scans/page_001.jp2").await?;
/// if image.header_loaded() {
///     println!("{}x{} pixels, {} tiles", image.width(0), image.height(0), image.tile_count());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ImageDescriptor {
    /// Opaque handle passed through to the decode service.
    image_id: Arc<str>,

    status: HeaderStatus,

    /// Level-0 image dimensions.
    width: u32,
    height: u32,

    /// Tile grid dimensions (counts, not pixels).
    tiles_x: u32,
    tiles_y: u32,

    /// Nominal tile size at level 0.
    tile_width: u32,
    tile_height: u32,

    /// Highest valid reduction index.
    max_reduction: u32,

    /// Component planes per decoded tile.
    num_components: u32,
}

impl ImageDescriptor {
    /// Build a descriptor from a header record.
    ///
    /// The record's reported resolution count becomes `max_reduction =
    /// reduction_count - 1` (saturating, so a degenerate count of 0 still
    /// yields a usable level 0).
    pub fn from_header(image_id: impl Into<Arc<str>>, record: HeaderRecord) -> Self {
        Self {
            image_id: image_id.into(),
            status: record.status,
            width: record.width,
            height: record.height,
            tiles_x: record.tiles_x,
            tiles_y: record.tiles_y,
            tile_width: record.tile_width,
            tile_height: record.tile_height,
            max_reduction: record.reduction_count.saturating_sub(1),
            num_components: record.num_components,
        }
    }

    /// Fetch the header for `image_id` and build a descriptor.
    ///
    /// A header that fails to *parse* still yields `Ok` with a descriptor in
    /// the [`HeaderStatus::Failed`] state (check [`header_loaded`] before
    /// issuing region requests); `Err` means the service itself could not be
    /// reached.
    ///
    /// [`header_loaded`]: ImageDescriptor::header_loaded
    pub async fn open<D: DecodeService + ?Sized>(
        codec: &D,
        image_id: &str,
    ) -> Result<Self, CodecError> {
        let record = codec.fetch_header(image_id).await?;
        Ok(Self::from_header(image_id, record))
    }

    /// Whether the codec parsed this image's header successfully.
    pub fn header_loaded(&self) -> bool {
        self.status == HeaderStatus::Loaded
    }

    /// The opaque handle passed to the decode service.
    pub fn image_id(&self) -> &str {
        &self.image_id
    }

    /// Shared handle for moving into spawned tasks.
    pub(crate) fn image_id_arc(&self) -> Arc<str> {
        Arc::clone(&self.image_id)
    }

    /// Number of tiles along the X axis.
    pub fn tiles_x(&self) -> u32 {
        self.tiles_x
    }

    /// Number of tiles along the Y axis.
    pub fn tiles_y(&self) -> u32 {
        self.tiles_y
    }

    /// Total number of tiles in the grid.
    pub fn tile_count(&self) -> u32 {
        self.tiles_x * self.tiles_y
    }

    /// Highest valid reduction index.
    pub fn max_reduction(&self) -> u32 {
        self.max_reduction
    }

    /// Component planes per decoded tile, as reported by the header.
    pub fn num_components(&self) -> u32 {
        self.num_components
    }

    /// Image width at the given reduction level.
    pub fn width(&self, reduction: u32) -> u32 {
        debug_assert!(reduction <= self.max_reduction);
        reduce(self.width, reduction)
    }

    /// Image height at the given reduction level.
    pub fn height(&self, reduction: u32) -> u32 {
        debug_assert!(reduction <= self.max_reduction);
        reduce(self.height, reduction)
    }

    /// Nominal tile width at the given reduction level.
    pub fn tile_width(&self, reduction: u32) -> u32 {
        debug_assert!(reduction <= self.max_reduction);
        reduce(self.tile_width, reduction)
    }

    /// Nominal tile height at the given reduction level.
    pub fn tile_height(&self, reduction: u32) -> u32 {
        debug_assert!(reduction <= self.max_reduction);
        reduce(self.tile_height, reduction)
    }

    /// Row-major tile index for a 2-D tile coordinate.
    pub fn tile_index(&self, tile_x: u32, tile_y: u32) -> u32 {
        self.tiles_x * tile_y + tile_x
    }

    /// Tile columns whose spans intersect the range `[x, x + w]` at the
    /// given reduction, in ascending order.
    pub fn select_tiles_x(&self, x: u32, w: u32, reduction: u32) -> Vec<u32> {
        debug_assert!(reduction <= self.max_reduction);
        select_axis(x, x + w, self.tiles_x, self.tile_width, reduction)
    }

    /// Tile rows whose spans intersect the range `[y, y + h]` at the given
    /// reduction, in ascending order.
    pub fn select_tiles_y(&self, y: u32, h: u32, reduction: u32) -> Vec<u32> {
        debug_assert!(reduction <= self.max_reduction);
        select_axis(y, y + h, self.tiles_y, self.tile_height, reduction)
    }
}

// =============================================================================
// Tile Selection
// =============================================================================

/// Select the tiles along one axis that a request range touches.
///
/// Tile `i` occupies the span `[i * size, (i + 1) * size]` at the given
/// reduction; it is selected when either endpoint of the request falls within
/// that closed span, or the span is entirely contained in the request. The
/// boundary test is deliberately inclusive: when a request endpoint coincides
/// exactly with a tile boundary, the neighboring tile is selected as well and
/// contributes an empty crop. Never skipping a touched tile is the invariant;
/// the occasional extra tile is harmless.
fn select_axis(start: u32, finish: u32, tile_count: u32, nominal_size: u32, reduction: u32) -> Vec<u32> {
    let size = reduce(nominal_size, reduction);
    let mut indices = Vec::new();
    for i in 0..tile_count {
        let lo = i * size;
        let hi = (i + 1) * size;
        if (start >= lo && start <= hi) || (finish >= lo && finish <= hi) || (start <= lo && finish >= hi)
        {
            indices.push(i);
        }
    }
    indices
}

// =============================================================================
// Tests
// =============================================================================
