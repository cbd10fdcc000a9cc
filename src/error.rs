use thiserror::Error;

/// Errors reported by the external decode service.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// The codec could not decode a specific tile.
    #[error("tile {tile_index} failed to decode at reduction {reduction}: {message}")]
    TileDecode {
        tile_index: u32,
        reduction: u32,
        message: String,
    },

    /// Transport-level failure reaching the codec (file open, IPC, ...).
    #[error("codec I/O error: {0}")]
    Io(String),
}

/// Errors that can occur when serving a region request.
#[derive(Debug, Clone, Error)]
pub enum RegionError {
    /// The descriptor's header failed to parse; no decode work is attempted.
    #[error("header not loaded for '{image}': refusing region request")]
    HeaderNotLoaded { image: String },

    /// Error from the decode service outside the per-tile degradation path.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}
