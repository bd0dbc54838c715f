//! Emitters turning propagated node values into fixed-shape arrays.
//!
//! - **matrix**: species relative abundances along generation paths
//! - **labels**: biome presence flags per hierarchy level

mod labels;
mod matrix;

pub use labels::{emit_labels, LabelLayout};
pub use matrix::{emit_matrix, MatrixLayout};
