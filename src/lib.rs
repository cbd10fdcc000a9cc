//! # jp2-render
//!
//! A region renderer for tiled, multi-resolution JPEG 2000 images.
//!
//! Given an image handle and a reduction level, this library returns the
//! whole image or an arbitrary rectangular sub-region as a flat RGB pixel
//! buffer. The compressed-codestream decoding itself is delegated to an
//! external decode service behind the [`DecodeService`] trait; this crate is
//! the orchestration layer around it:
//!
//! - **Reduction arithmetic**: maps full-resolution geometry onto any
//!   reduced resolution level by iterative ceiling-halving
//! - **Tile selection**: determines which tiles intersect a requested region
//! - **Bounded scheduling**: one decode task per intersecting tile, at most
//!   K in flight at once
//! - **Compositing**: stitches (possibly edge-clipped) per-tile results into
//!   a single output buffer without overlap or gaps
//!
//! ## Architecture
//!
//! - [`codec`] - the decode-service seam: header records and decoded tiles
//! - [`image`] - immutable per-image metadata and geometry queries
//! - [`region`] - the compositor, output buffer and dispatch primitives
//! - [`error`] - error types
//!
//! ## Example
//!
//! ```ignore
//! use jp2_render::{ImageDescriptor, RegionCompositor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let codec = MyOpenJpegService::load()?;
//!     let compositor = RegionCompositor::new(codec);
//!
//!     let image = ImageDescriptor::open(compositor.codec().as_ref(), "page.jp2").await?;
//!     if !image.header_loaded() {
//!         return Err("header failed to parse".into());
//!     }
//!
//!     // Whole image at a quarter of full resolution.
//!     let full = compositor.get_full_image(&image, 2).await?;
//!
//!     // An arbitrary crop at half resolution.
//!     let crop = compositor.get_region(&image, 1, 250, 135, 180, 400).await?;
//!     assert!(crop.diagnostics.is_clean());
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod error;
pub mod image;
pub mod region;

// Re-export commonly used types
pub use codec::{DecodeService, DecodedTile, HeaderRecord, HeaderStatus};
pub use error::{CodecError, RegionError};
pub use image::ImageDescriptor;
pub use region::{
    AdmissionQueue, DispatchMode, RegionBuffer, RegionCompositor, RegionDiagnostics,
    RegionResponse, TilePatch, WorkerPool, DEFAULT_MAX_IN_FLIGHT,
};
