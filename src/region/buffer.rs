//! Output pixel buffer and per-tile patches.

// =============================================================================
// Tile Patch
// =============================================================================

/// The cropped, RGB-assembled result of one tile decode task.
///
/// A patch holds only the pixels of its tile that the request actually needs,
/// already converted to flat RGB, together with the destination offset in the
/// output buffer. Patches from the tiles of one request cover pairwise
/// disjoint destination rectangles, so they can be blitted in any order.
#[derive(Debug, Clone)]
pub struct TilePatch {
    /// Destination X offset in the output buffer.
    pub dest_x: u32,

    /// Destination Y offset in the output buffer.
    pub dest_y: u32,

    /// Patch width in pixels. May be zero for boundary-coincidence tiles.
    pub width: u32,

    /// Patch height in pixels. May be zero for boundary-coincidence tiles.
    pub height: u32,

    /// Flat RGB pixels, row-major, 3 bytes per pixel.
    pub pixels: Vec<u8>,
}

impl TilePatch {
    /// Whether the patch carries no pixels at all.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

// =============================================================================
// Region Buffer
// =============================================================================

/// A W×H RGB raster, row-major, 3 bytes per pixel, zero-filled at allocation.
///
/// One buffer is created per region request and receives every tile patch
/// before being returned. Tiles that fail to decode leave their area at the
/// zero fill (black).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RegionBuffer {
    /// Allocate a zero-filled buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 3],
        }
    }

    /// The 1×1 placeholder returned for degenerate (empty after clamping)
    /// region requests.
    pub fn placeholder() -> Self {
        Self::new(1, 1)
    }

    /// Buffer width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Buffer height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The raw RGB pixel data.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Consume the buffer, returning the raw RGB pixel data.
    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Read one pixel. `None` outside the buffer.
    pub fn get_rgb(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 3;
        Some([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]])
    }

    /// Write one pixel. Returns `false` (and writes nothing) when the
    /// destination lies outside the buffer.
    pub fn put_rgb(&mut self, x: u32, y: u32, rgb: [u8; 3]) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let i = (y as usize * self.width as usize + x as usize) * 3;
        self.pixels[i..i + 3].copy_from_slice(&rgb);
        true
    }

    /// Copy a patch into the buffer at its destination offset.
    ///
    /// Destination pixels that fall outside the buffer are dropped, not
    /// written; the returned count is the number of dropped pixels. On
    /// well-formed requests the patch rectangle fits entirely and the count
    /// is zero — a nonzero count means the codec reported malformed tile
    /// geometry.
    pub fn blit(&mut self, patch: &TilePatch) -> u64 {
        let mut dropped = 0u64;
        for row in 0..patch.height {
            for col in 0..patch.width {
                let i = (row as usize * patch.width as usize + col as usize) * 3;
                let rgb = [patch.pixels[i], patch.pixels[i + 1], patch.pixels[i + 2]];
                if !self.put_rgb(patch.dest_x + col, patch.dest_y + row, rgb) {
                    dropped += 1;
                }
            }
        }
        dropped
    }
}

// =============================================================================
// Tests
// =============================================================================
