//! Region compositing layer.
//!
//! This module turns a `(reduction, rectangle)` request into bounded
//! concurrent tile decodes and stitches the per-tile results into one flat
//! RGB buffer:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            RegionCompositor             │
//! │  clamp → select tiles → plan crops      │
//! └────────────────────┬────────────────────┘
//!                      │ one task per tile, at most K in flight
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │    AdmissionQueue  /  WorkerPool        │
//! └────────────────────┬────────────────────┘
//!                      │ DecodeService::fetch_tile, crop, assemble RGB
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │   TilePatch → RegionBuffer (disjoint)   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`RegionCompositor`]: entry point for region and full-image requests
//! - [`RegionBuffer`]: the shared W×H RGB output raster
//! - [`TilePatch`]: one tile's cropped, RGB-assembled contribution
//! - [`AdmissionQueue`] / [`WorkerPool`]: the two bounded dispatch primitives
//! - [`RegionDiagnostics`]: countable events (failed tiles, dropped writes)

mod buffer;
mod compositor;
mod dispatch;

pub use buffer::{RegionBuffer, TilePatch};
pub use compositor::{RegionCompositor, RegionDiagnostics, RegionResponse};
pub use dispatch::{AdmissionQueue, DispatchMode, WorkerPool, DEFAULT_MAX_IN_FLIGHT};
