//! Fixed-shape feature matrix read off generation paths.

use crate::error::Result;
use crate::hierarchy::{Hierarchy, NodeIdx, NodeValues};
use crate::plan::{resolve_ids, ConversionParams};
use ndarray::Array2;

/// Generation paths as node indices; identical for every sample of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixLayout {
    paths: Vec<Vec<NodeIdx>>,
    ncol: usize,
}

impl MatrixLayout {
    /// Resolve the cached generation paths against `species`.
    pub fn new(species: &Hierarchy, params: &ConversionParams) -> Result<Self> {
        let paths = params
            .paths_to_gen_matrix
            .iter()
            .map(|path| resolve_ids(species, path))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            paths,
            ncol: params.matrix_ncol,
        })
    }

    /// Matrix shape: (number of paths, columns).
    pub fn shape(&self) -> (usize, usize) {
        (self.paths.len(), self.ncol)
    }

    pub fn paths(&self) -> &[Vec<NodeIdx>] {
        &self.paths
    }
}

/// Row `i`, column `j` = value of the `j`-th node on path `i`; zero past its end.
pub fn emit_matrix(values: &NodeValues, layout: &MatrixLayout) -> Array2<f32> {
    let mut matrix = Array2::<f32>::zeros(layout.shape());
    for (row, path) in layout.paths.iter().enumerate() {
        for (col, &idx) in path.iter().take(layout.ncol).enumerate() {
            matrix[[row, col]] = values.get(idx) as f32;
        }
    }
    matrix
}
