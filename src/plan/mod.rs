//! Hierarchy-derived conversion parameters and their on-disk cache.

mod params;

pub use params::{resolve_ids, ConversionParams, CACHE_VERSION, DEFAULT_DEPTH_CUTOFF};
