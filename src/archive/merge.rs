//! Concatenation of batch archives along the sample axis.

use super::batch::BatchOutput;
use crate::error::{PrepError, Result};
use log::{debug, info};
use ndarray::{concatenate, Axis};
use std::fs;
use std::path::{Path, PathBuf};

/// File stem of the merged archive.
pub const MERGED_NAME: &str = "merged_matrices";

/// `batch_<n>.npz` files in `dir`, ordered by `n`. Other files are ignored.
pub fn batch_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let mut numbered: Vec<(usize, PathBuf)> = fs::read_dir(dir.as_ref())?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?;
            let index = name
                .strip_prefix("batch_")?
                .strip_suffix(".npz")?
                .parse::<usize>()
                .ok()?;
            Some((index, path))
        })
        .collect();
    numbered.sort_by_key(|(index, _)| *index);
    Ok(numbered.into_iter().map(|(_, path)| path).collect())
}

/// Concatenate batches in the given order.
///
/// All batches must share the matrix shape and the number and width of
/// label levels.
pub fn merge_batches(batches: &[BatchOutput]) -> Result<BatchOutput> {
    let first = batches
        .first()
        .ok_or_else(|| PrepError::EmptyData("No batches to merge".to_string()))?;
    let n_levels = first.labels.len();
    if let Some(bad) = batches.iter().find(|b| b.labels.len() != n_levels) {
        return Err(PrepError::DimensionMismatch {
            expected: n_levels,
            actual: bad.labels.len(),
        });
    }

    let matrix_views: Vec<_> = batches.iter().map(|b| b.matrices.view()).collect();
    let matrices = concatenate(Axis(0), &matrix_views)?;

    let labels = (0..n_levels)
        .map(|k| {
            let views: Vec<_> = batches.iter().map(|b| b.labels[k].view()).collect();
            concatenate(Axis(0), &views)
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let biomes = batches.iter().flat_map(|b| b.biomes.iter().cloned()).collect();

    Ok(BatchOutput {
        matrices,
        labels,
        biomes,
    })
}

/// Merge every `batch_<n>.npz` of `input_dir` into `output_dir/merged_matrices.npz`.
pub fn merge_directory<P: AsRef<Path>, Q: AsRef<Path>>(
    input_dir: P,
    output_dir: Q,
) -> Result<PathBuf> {
    let files = batch_files(&input_dir)?;
    info!("Merging {} batch archives", files.len());
    let batches = files
        .iter()
        .map(|path| {
            debug!("Reading {:?}", path);
            BatchOutput::load(path)
        })
        .collect::<Result<Vec<_>>>()?;
    let merged = merge_batches(&batches)?;
    merged.save(output_dir, MERGED_NAME)
}
