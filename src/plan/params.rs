//! Conversion parameters derived from the species hierarchy, cached on disk.
//!
//! The bottom-up order and the matrix generation paths are fixed for a given
//! hierarchy. They are computed once and read back on later runs; a cache
//! that fails to parse or no longer matches the hierarchy is recomputed.

use crate::error::{PrepError, Result};
use crate::hierarchy::{Hierarchy, NodeIdx};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Bumped whenever the cached layout changes meaning.
pub const CACHE_VERSION: u32 = 1;

/// Depth at which generation paths are cut.
pub const DEFAULT_DEPTH_CUTOFF: usize = 7;

/// Parameters shared by every sample of every batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionParams {
    pub version: u32,
    /// Species ids, every child before its parent.
    pub st_bottom_up_ids: Vec<String>,
    /// Species ids grouped by depth, breadth-first.
    pub st_ids_by_level: Vec<Vec<String>>,
    /// Top-down id paths (root excluded), one per matrix row.
    pub paths_to_gen_matrix: Vec<Vec<String>>,
    /// Longest generation path.
    pub matrix_ncol: usize,
    pub depth_cutoff: usize,
    /// Node count of the hierarchy the parameters were computed from.
    pub n_nodes: usize,
}

impl ConversionParams {
    /// Compute parameters from the species hierarchy.
    pub fn compute(species: &Hierarchy, depth_cutoff: usize) -> Result<Self> {
        if depth_cutoff == 0 {
            return Err(PrepError::InvalidParameter(
                "Depth cutoff must be at least 1".to_string(),
            ));
        }
        let st_bottom_up_ids = species.bottom_up_ids();
        let st_ids_by_level = species.ids_by_level();
        let paths_to_gen_matrix = species.paths_to_level(&st_ids_by_level, depth_cutoff, true)?;
        let matrix_ncol = paths_to_gen_matrix.iter().map(Vec::len).max().unwrap_or(0);

        Ok(Self {
            version: CACHE_VERSION,
            st_bottom_up_ids,
            st_ids_by_level,
            paths_to_gen_matrix,
            matrix_ncol,
            depth_cutoff,
            n_nodes: species.len(),
        })
    }

    /// Whether these parameters can be used with `species` at `depth_cutoff`.
    ///
    /// The cached order must visit every node of `species` exactly once with
    /// children before parents, and every cached path must follow parent
    /// links down from the root.
    pub fn is_compatible(&self, species: &Hierarchy, depth_cutoff: usize) -> bool {
        self.version == CACHE_VERSION
            && self.depth_cutoff == depth_cutoff
            && self.n_nodes == species.len()
            && self.st_ids_by_level == species.ids_by_level()
            && is_bottom_up_order(species, &self.st_bottom_up_ids)
            && self
                .paths_to_gen_matrix
                .iter()
                .all(|p| p.len() <= depth_cutoff && is_top_down_path(species, p))
            && self.matrix_ncol
                == self.paths_to_gen_matrix.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Bottom-up order as node indices of `species`.
    pub fn bottom_up_order(&self, species: &Hierarchy) -> Result<Vec<NodeIdx>> {
        resolve_ids(species, &self.st_bottom_up_ids)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Read cached parameters from `path`, or compute and write them.
    pub fn load_or_compute<P: AsRef<Path>>(
        path: P,
        species: &Hierarchy,
        depth_cutoff: usize,
    ) -> Result<Self> {
        let path = path.as_ref();
        if path.is_file() {
            match Self::load(path) {
                Ok(params) if params.is_compatible(species, depth_cutoff) => {
                    info!("Recovered conversion parameters from {:?}", path);
                    return Ok(params);
                }
                Ok(_) => warn!(
                    "Cached parameters in {:?} do not match the species tree, recomputing",
                    path
                ),
                Err(e) => warn!("Unreadable parameter cache {:?} ({}), recomputing", path, e),
            }
        } else {
            info!("No parameter cache at {:?}, computing", path);
        }

        let params = Self::compute(species, depth_cutoff)?;
        info!(
            "Computed {} generation paths, {} matrix columns",
            params.paths_to_gen_matrix.len(),
            params.matrix_ncol
        );
        params.save(path)?;
        info!("Backed up conversion parameters to {:?}", path);
        Ok(params)
    }
}

/// `ids` is a permutation of the nodes of `tree` listing each child before its parent.
fn is_bottom_up_order(tree: &Hierarchy, ids: &[String]) -> bool {
    if ids.len() != tree.len() {
        return false;
    }
    let mut position: Vec<Option<usize>> = vec![None; tree.len()];
    for (pos, id) in ids.iter().enumerate() {
        match tree.index_of(id) {
            Some(idx) if position[idx].is_none() => position[idx] = Some(pos),
            _ => return false,
        }
    }
    (0..tree.len()).all(|idx| match tree.node(idx).parent() {
        Some(parent) => position[idx] < position[parent],
        None => true,
    })
}

/// `path` is non-empty and each id is a child of the previous one, starting below the root.
fn is_top_down_path(tree: &Hierarchy, path: &[String]) -> bool {
    let mut parent = tree.root();
    !path.is_empty()
        && path.iter().all(|id| match tree.index_of(id) {
            Some(idx) if tree.node(idx).parent() == Some(parent) => {
                parent = idx;
                true
            }
            _ => false,
        })
}

/// Map ids to node indices, failing on the first id missing from `tree`.
pub fn resolve_ids<S: AsRef<str>>(tree: &Hierarchy, ids: &[S]) -> Result<Vec<NodeIdx>> {
    ids.iter()
        .map(|id| {
            tree.index_of(id.as_ref())
                .ok_or_else(|| PrepError::UnknownNode(id.as_ref().to_string()))
        })
        .collect()
}
