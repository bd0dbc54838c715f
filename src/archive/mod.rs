//! Batch archives: npz arrays plus biome side files, and merging.

mod batch;
mod merge;

pub use batch::{label_key, BatchOutput, MATRICES_KEY};
pub use merge::{batch_files, merge_batches, merge_directory, MERGED_NAME};
