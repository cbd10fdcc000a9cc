//! DecodeService trait for codec-agnostic tile access.
//!
//! This module defines the seam between the compositing core and the native
//! JPEG 2000 codec. The core never touches a codestream: it asks the service
//! for a header record once per image and for individual decoded tiles during
//! region requests, and treats everything in between as a black box.
//!
//! # Usage
//!
//! The trait is implemented by codec bindings (e.g. an OpenJPEG-backed
//! service) and by deterministic fakes in tests. The compositor layer works
//! against the trait only, so any backend that can produce per-tile component
//! planes at a given reduction level will do.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::CodecError;

/// Status value the codec reports for a successfully parsed header.
///
/// The native record encodes status as an integer where 1 means success and
/// anything else means failure.
const HEADER_READ_SUCCESS: u32 = 1;

// =============================================================================
// Header Record
// =============================================================================

/// Outcome of the codec's header parse for one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderStatus {
    /// The header parsed; geometry fields are valid.
    Loaded,

    /// The codec could not parse the image; geometry fields are meaningless.
    Failed,
}

impl HeaderStatus {
    /// Map the codec's raw status integer onto the enum.
    pub fn from_raw(raw: u32) -> Self {
        if raw == HEADER_READ_SUCCESS {
            HeaderStatus::Loaded
        } else {
            HeaderStatus::Failed
        }
    }
}

/// The fixed 9-field record returned by [`DecodeService::fetch_header`].
///
/// All dimension fields are full-resolution (reduction level 0) values.
/// When `status` is [`HeaderStatus::Failed`] the remaining fields carry no
/// meaning and must not be used for geometry queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderRecord {
    /// Whether the header parsed successfully.
    pub status: HeaderStatus,

    /// Full-resolution image width in pixels.
    pub width: u32,

    /// Full-resolution image height in pixels.
    pub height: u32,

    /// Number of tiles along the X axis.
    pub tiles_x: u32,

    /// Number of tiles along the Y axis.
    pub tiles_y: u32,

    /// Nominal tile width at reduction 0. Edge tiles may decode smaller.
    pub tile_width: u32,

    /// Nominal tile height at reduction 0. Edge tiles may decode smaller.
    pub tile_height: u32,

    /// Number of resolution levels the codestream carries.
    ///
    /// The highest valid reduction index is `reduction_count - 1`.
    pub reduction_count: u32,

    /// Number of component planes per decoded tile (color + alpha).
    pub num_components: u32,
}

// =============================================================================
// Decoded Tile
// =============================================================================

/// One decoded tile as returned by [`DecodeService::fetch_tile`].
///
/// `width` and `height` are the tile's *actual* decoded extent at the
/// requested reduction, which is smaller than the nominal tile size for tiles
/// on the right and bottom image edges. Each component plane is a flat array
/// of 8-bit samples, row-major over that actual extent.
#[derive(Debug, Clone)]
pub struct DecodedTile {
    /// Actual decoded width in pixels.
    pub width: u32,

    /// Actual decoded height in pixels.
    pub height: u32,

    /// One flat sample plane per component, `width * height` bytes each.
    pub planes: Vec<Bytes>,
}

impl DecodedTile {
    /// Number of pixels in the tile's actual extent.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Check that the planes needed for color assembly are present and cover
    /// the full extent.
    ///
    /// Color assembly reads planes 0..3 when three or more are present, and
    /// plane 0 alone otherwise; a tile whose used planes are shorter than
    /// `width * height` samples is malformed.
    pub fn is_well_formed(&self) -> bool {
        if self.planes.is_empty() {
            return false;
        }
        let needed = self.pixel_count();
        let used = if self.planes.len() >= 3 { 3 } else { 1 };
        self.planes[..used].iter().all(|p| p.len() >= needed)
    }
}

// =============================================================================
// DecodeService Trait
// =============================================================================

/// Codec-agnostic interface to the external decode service.
///
/// The compositing core depends only on this trait. Implementations wrap the
/// actual codestream decoder; the `image_id` is an opaque handle (typically a
/// file path) that the service resolves on every call, so the service itself
/// decides how to manage open files or decoder instances.
///
/// Calls for different tiles are independent and may run concurrently; any
/// internal synchronization is the implementation's concern.
#[async_trait]
pub trait DecodeService: Send + Sync {
    /// Fetch the header record for an image.
    ///
    /// A header that fails to *parse* is reported in-band via
    /// [`HeaderRecord::status`]; `Err` is reserved for transport-level
    /// failures (the file could not be reached at all).
    async fn fetch_header(&self, image_id: &str) -> Result<HeaderRecord, CodecError>;

    /// Decode one tile at the given reduction level.
    ///
    /// `tile_index` is the row-major tile index
    /// (`tiles_x * tile_row + tile_col`).
    ///
    /// # Errors
    ///
    /// Returns an error if the codec fails to decode the tile. The caller
    /// degrades that tile locally; it never retries.
    async fn fetch_tile(
        &self,
        image_id: &str,
        tile_index: u32,
        reduction: u32,
    ) -> Result<DecodedTile, CodecError>;
}
