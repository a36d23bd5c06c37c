//! Asset resolution and decoding.

/// Decoded bitmaps and file-level decoding.
pub mod decode;
/// Sentinel-aware path resolution.
pub mod paths;
pub(crate) mod svg_raster;
