//! Image metadata layer.
//!
//! This module provides [`ImageDescriptor`], the immutable per-image metadata
//! record that answers every geometry question the compositor asks: image and
//! tile dimensions at any reduction level, and which tiles an arbitrary
//! request rectangle touches.
//!
//! A descriptor is built once from a single header fetch and is read-only for
//! the rest of its life, so it can be shared freely across concurrent decode
//! tasks without synchronization.

mod descriptor;

pub use descriptor::ImageDescriptor;
