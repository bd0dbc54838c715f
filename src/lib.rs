//! MGnify abundance table preprocessing
//!
//! This library converts per-sample taxonomic abundance tables into
//! fixed-shape feature matrices and per-level biome label vectors for
//! ontology-aware neural network training.
//!
//! # Overview
//!
//! - **hierarchy**: Reference trees and per-sample node values
//! - **taxonomy**: Raw path strings to hierarchy ids (fix rules, nearest ancestor)
//! - **sample**: Abundance records and their aggregation onto a tree
//! - **plan**: Generation paths and bottom-up order, cached on disk
//! - **emit**: Feature matrices and label vectors
//! - **data**: Table discovery, reading and validation
//! - **archive**: npz batch archives and merging
//! - **pipeline**: Configuration and parallel batch conversion
//!
//! # Example
//!
//! ```no_run
//! use onn_preprocess::prelude::*;
//!
//! let config = PrepConfig::load("prep.yaml").unwrap();
//! let archive = run_convert(&config).unwrap();
//! println!("wrote {:?}", archive);
//! ```

pub mod archive;
pub mod data;
pub mod emit;
pub mod error;
pub mod hierarchy;
pub mod pipeline;
pub mod plan;
pub mod sample;
pub mod taxonomy;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::archive::{merge_batches, merge_directory, BatchOutput};
    pub use crate::data::{check_files, load_samples, CheckReport, DataLoader, TableFormat};
    pub use crate::emit::{emit_labels, emit_matrix, LabelLayout, MatrixLayout};
    pub use crate::error::{PrepError, Result};
    pub use crate::hierarchy::{Hierarchy, NodeIdx, NodeValues};
    pub use crate::pipeline::{run_convert, Converter, PrepConfig, SampleOutput};
    pub use crate::plan::ConversionParams;
    pub use crate::sample::{aggregate, Sample, TaxonRecord};
    pub use crate::taxonomy::{IdScheme, PathResolver, ResolverConfig};
}
