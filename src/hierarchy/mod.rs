//! Reference hierarchies and per-sample node values.

mod tree;
mod values;

pub use tree::{Hierarchy, Node, NodeIdx, ROOT_ID};
pub use values::NodeValues;
