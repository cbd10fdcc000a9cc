//! Region compositor: bounded concurrent tile decode plus pixel compositing.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::codec::{DecodeService, DecodedTile};
use crate::error::RegionError;
use crate::image::ImageDescriptor;

use super::buffer::{RegionBuffer, TilePatch};
use super::dispatch::{AdmissionQueue, DispatchMode, WorkerPool, DEFAULT_MAX_IN_FLIGHT};

// =============================================================================
// Diagnostics
// =============================================================================

/// Countable diagnostic events accumulated while serving one region request.
///
/// Both counters are zero on well-formed inputs; tests assert exactly that.
/// A nonzero `failed_tiles` means some tile areas were left at the zero fill,
/// a nonzero `dropped_writes` means the codec reported tile geometry that
/// landed pixels outside the output buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegionDiagnostics {
    /// Tiles whose decode failed, returned malformed planes, or whose task
    /// could not be joined. Their destination area stays blank.
    pub failed_tiles: u32,

    /// Destination pixels dropped because they fell outside the buffer.
    pub dropped_writes: u64,
}

impl RegionDiagnostics {
    /// Whether the request completed without any diagnostic events.
    pub fn is_clean(&self) -> bool {
        self.failed_tiles == 0 && self.dropped_writes == 0
    }
}

/// A completed region request: the composited buffer plus its diagnostics.
#[derive(Debug, Clone)]
pub struct RegionResponse {
    /// The composited RGB raster.
    pub buffer: RegionBuffer,

    /// Diagnostic events observed while compositing.
    pub diagnostics: RegionDiagnostics,
}

// =============================================================================
// Tile Planning
// =============================================================================

/// Decode-and-crop instructions for one selected tile.
///
/// Crop bounds are in tile-local pixels at the request's reduction level.
/// The end bounds are clipped against the *nominal* tile size here; the task
/// re-clamps them against the tile's actual decoded extent, which is smaller
/// for edge tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TilePlan {
    /// Row-major tile index passed to the decode service.
    tile_index: u32,

    /// First needed column/row within the tile.
    crop_x: u32,
    crop_y: u32,

    /// One past the last needed column/row, before decoded-extent clamping.
    crop_x_end: u32,
    crop_y_end: u32,

    /// Destination offset of the crop in the output buffer.
    dest_x: u32,
    dest_y: u32,
}

impl TilePlan {
    /// Destination rectangle as `(x, y, w, h)`, using the nominal crop size.
    #[cfg(test)]
    fn dest_rect(&self) -> (u32, u32, u32, u32) {
        (
            self.dest_x,
            self.dest_y,
            self.crop_x_end.saturating_sub(self.crop_x),
            self.crop_y_end.saturating_sub(self.crop_y),
        )
    }
}

/// Compute one plan per tile intersecting the clamped rectangle.
///
/// `x, y, w, h` must already be clamped to the image extent at `reduction`.
/// Plans come out in column-major order over (selected column, selected row),
/// matching the submission order of the legacy scheduler.
fn plan_tiles(
    image: &ImageDescriptor,
    reduction: u32,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
) -> Vec<TilePlan> {
    let tile_w = image.tile_width(reduction);
    let tile_h = image.tile_height(reduction);

    let cols = image.select_tiles_x(x, w, reduction);
    let rows = image.select_tiles_y(y, h, reduction);

    let mut plans = Vec::with_capacity(cols.len() * rows.len());
    for &tile_x in &cols {
        let origin_x = tile_x * tile_w;
        for &tile_y in &rows {
            let origin_y = tile_y * tile_h;
            plans.push(TilePlan {
                tile_index: image.tile_index(tile_x, tile_y),
                crop_x: x.saturating_sub(origin_x),
                crop_y: y.saturating_sub(origin_y),
                // A selected tile's origin never exceeds x + w, so the
                // subtraction cannot underflow.
                crop_x_end: tile_w.min(x + w - origin_x),
                crop_y_end: tile_h.min(y + h - origin_y),
                dest_x: origin_x.saturating_sub(x),
                dest_y: origin_y.saturating_sub(y),
            });
        }
    }
    plans
}

// =============================================================================
// Per-Tile Task
// =============================================================================

/// Outcome of one decode-and-crop task.
enum TileOutcome {
    Patch(TilePatch),
    Failed,
}

/// Decode a tile and crop the needed sub-rectangle into an RGB patch.
///
/// Color assembly keys off the planes the decoded tile actually carries:
/// planes 0, 1, 2 become R, G, B when three or more are present (further
/// planes, e.g. alpha, are ignored); otherwise plane 0 is replicated into
/// all three channels (grayscale).
async fn decode_tile_patch<D: DecodeService + ?Sized>(
    codec: Arc<D>,
    image_id: Arc<str>,
    plan: TilePlan,
    reduction: u32,
) -> TileOutcome {
    let tile = match codec.fetch_tile(&image_id, plan.tile_index, reduction).await {
        Ok(tile) => tile,
        Err(e) => {
            warn!(
                image = %image_id,
                tile_index = plan.tile_index,
                reduction,
                error = %e,
                "tile decode failed, leaving its region blank"
            );
            return TileOutcome::Failed;
        }
    };

    if !tile.is_well_formed() {
        warn!(
            image = %image_id,
            tile_index = plan.tile_index,
            width = tile.width,
            height = tile.height,
            planes = tile.planes.len(),
            "tile decode returned malformed planes, leaving its region blank"
        );
        return TileOutcome::Failed;
    }

    TileOutcome::Patch(crop_tile(&tile, &plan))
}

/// Crop the planned sub-rectangle out of a decoded tile.
///
/// The crop's end bounds are re-clamped against the tile's actual decoded
/// extent: edge tiles decode smaller than the nominal tile size, and the
/// plan's nominal clipping cannot know that.
fn crop_tile(tile: &DecodedTile, plan: &TilePlan) -> TilePatch {
    let end_x = plan.crop_x_end.min(tile.width);
    let end_y = plan.crop_y_end.min(tile.height);
    let width = end_x.saturating_sub(plan.crop_x);
    let height = end_y.saturating_sub(plan.crop_y);

    let grayscale = tile.planes.len() < 3;
    let mut pixels = Vec::with_capacity(width as usize * height as usize * 3);
    for ty in plan.crop_y..end_y {
        for tx in plan.crop_x..end_x {
            let i = ty as usize * tile.width as usize + tx as usize;
            if grayscale {
                let v = tile.planes[0][i];
                pixels.extend_from_slice(&[v, v, v]);
            } else {
                pixels.extend_from_slice(&[tile.planes[0][i], tile.planes[1][i], tile.planes[2][i]]);
            }
        }
    }

    TilePatch {
        dest_x: plan.dest_x,
        dest_y: plan.dest_y,
        width,
        height,
        pixels,
    }
}

// =============================================================================
// Region Compositor
// =============================================================================

/// Translates `(reduction, rectangle)` requests into bounded concurrent tile
/// decodes and composites the results into one RGB buffer.
///
/// The compositor owns nothing mutable: it holds a shared handle to the
/// decode service plus its scheduling parameters, so one instance serves any
/// number of images and requests.
///
/// # Example
///
/// ```ignore
/// let compositor = RegionCompositor::new(codec);
/// let image = ImageDescriptor::open(compositor.codec().as_ref(), "page.jp2").await?;
/// let response = compositor.get_full_image(&image, 2).await?;
/// assert!(response.diagnostics.is_clean());
/// ```
pub struct RegionCompositor<D: DecodeService + ?Sized> {
    codec: Arc<D>,
    max_in_flight: usize,
    mode: DispatchMode,
}

impl<D: DecodeService + 'static> RegionCompositor<D> {
    /// Create a compositor with the default in-flight cap and dispatch mode.
    pub fn new(codec: D) -> Self {
        Self::with_shared_codec(Arc::new(codec))
    }
}

impl<D: DecodeService + ?Sized + 'static> RegionCompositor<D> {
    /// Create a compositor around an already-shared decode service.
    pub fn with_shared_codec(codec: Arc<D>) -> Self {
        Self {
            codec,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            mode: DispatchMode::default(),
        }
    }

    /// Set the maximum number of decode tasks in flight per request.
    ///
    /// # Panics
    ///
    /// Panics if `max_in_flight` is zero.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        assert!(max_in_flight > 0, "max_in_flight must be at least 1");
        self.max_in_flight = max_in_flight;
        self
    }

    /// Select the dispatch primitive. [`DispatchMode::AdmissionOrdered`]
    /// reproduces the legacy head-of-line scheduling exactly; the default
    /// completion-ordered pool keeps the same in-flight bound with better
    /// throughput. Output buffers are byte-identical under either mode.
    pub fn with_dispatch_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// The shared decode service handle.
    pub fn codec(&self) -> &Arc<D> {
        &self.codec
    }

    /// Render the whole image at a reduction level.
    ///
    /// Defined as `get_region(image, r, 0, 0, width(r), height(r))` after
    /// clamping `r`; the output is byte-identical to that explicit call.
    pub async fn get_full_image(
        &self,
        image: &ImageDescriptor,
        reduction: u32,
    ) -> Result<RegionResponse, RegionError> {
        let reduction = reduction.min(image.max_reduction());
        self.get_region(
            image,
            reduction,
            0,
            0,
            image.width(reduction),
            image.height(reduction),
        )
        .await
    }

    /// Render a rectangular sub-region at a reduction level.
    ///
    /// The reduction is clamped to `[0, max_reduction]` and the rectangle to
    /// the image extent at that reduction. A rectangle that is empty after
    /// clamping returns a 1×1 placeholder buffer without touching the decode
    /// service. Per-tile decode failures degrade locally (blank area plus a
    /// warning and a diagnostics count) and never abort the request.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::HeaderNotLoaded`] if the descriptor's header
    /// failed to parse; no decode work is attempted in that case.
    pub async fn get_region(
        &self,
        image: &ImageDescriptor,
        reduction: u32,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
    ) -> Result<RegionResponse, RegionError> {
        if !image.header_loaded() {
            return Err(RegionError::HeaderNotLoaded {
                image: image.image_id().to_string(),
            });
        }

        let reduction = reduction.min(image.max_reduction());
        let image_w = image.width(reduction);
        let image_h = image.height(reduction);

        let x = x.min(image_w);
        let y = y.min(image_h);
        let w = w.min(image_w - x);
        let h = h.min(image_h - y);

        if w == 0 || h == 0 {
            debug!(image = %image.image_id(), reduction, "degenerate region after clamping");
            return Ok(RegionResponse {
                buffer: RegionBuffer::placeholder(),
                diagnostics: RegionDiagnostics::default(),
            });
        }

        let plans = plan_tiles(image, reduction, x, y, w, h);
        debug!(
            image = %image.image_id(),
            reduction,
            x, y, w, h,
            tiles = plans.len(),
            mode = ?self.mode,
            "compositing region"
        );

        let mut buffer = RegionBuffer::new(w, h);
        let mut diagnostics = RegionDiagnostics::default();

        match self.mode {
            DispatchMode::AdmissionOrdered => {
                let mut queue = AdmissionQueue::new(self.max_in_flight);
                for plan in plans {
                    let task = decode_tile_patch(
                        Arc::clone(&self.codec),
                        image.image_id_arc(),
                        plan,
                        reduction,
                    );
                    if let Some(outcome) = queue.submit(task).await {
                        Self::apply_outcome(&mut buffer, &mut diagnostics, outcome);
                    }
                }
                for outcome in queue.drain().await {
                    Self::apply_outcome(&mut buffer, &mut diagnostics, outcome);
                }
            }
            DispatchMode::CompletionOrdered => {
                let mut pool = WorkerPool::new(self.max_in_flight);
                for plan in plans {
                    pool.submit(decode_tile_patch(
                        Arc::clone(&self.codec),
                        image.image_id_arc(),
                        plan,
                        reduction,
                    ));
                }
                while let Some(outcome) = pool.join_next().await {
                    Self::apply_outcome(&mut buffer, &mut diagnostics, outcome);
                }
            }
        }

        if !diagnostics.is_clean() {
            warn!(
                image = %image.image_id(),
                failed_tiles = diagnostics.failed_tiles,
                dropped_writes = diagnostics.dropped_writes,
                "region completed with diagnostic events"
            );
        }

        Ok(RegionResponse {
            buffer,
            diagnostics,
        })
    }

    /// Fold one reaped task outcome into the buffer and diagnostics.
    fn apply_outcome(
        buffer: &mut RegionBuffer,
        diagnostics: &mut RegionDiagnostics,
        outcome: Result<TileOutcome, tokio::task::JoinError>,
    ) {
        match outcome {
            Ok(TileOutcome::Patch(patch)) => {
                diagnostics.dropped_writes += buffer.blit(&patch);
            }
            Ok(TileOutcome::Failed) => {
                diagnostics.failed_tiles += 1;
            }
            Err(e) => {
                // The task panicked or was aborted before producing a patch.
                warn!(error = %e, "tile task failed to join");
                diagnostics.failed_tiles += 1;
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
