//! Stacked per-batch arrays and their npz + side-file persistence.
//!
//! `<name>.npz` holds `matrices` (samples x paths x columns) and
//! `label_0` .. `label_{L-1}` (samples x level size). `<name>.txt` lists the
//! raw biome string of each sample in the same order.

use crate::error::{PrepError, Result};
use log::info;
use ndarray::{Array2, Array3};
use ndarray_npy::{NpzReader, NpzWriter};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Key of the stacked feature matrices.
pub const MATRICES_KEY: &str = "matrices";

/// Key of the label array for level index `k` (biome depth `k + 1`).
pub fn label_key(k: usize) -> String {
    format!("label_{}", k)
}

/// Converted arrays of one batch, index-aligned across all fields.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutput {
    pub matrices: Array3<f32>,
    pub labels: Vec<Array2<f32>>,
    pub biomes: Vec<String>,
}

impl BatchOutput {
    pub fn n_samples(&self) -> usize {
        self.matrices.dim().0
    }

    /// Check that every field has one entry per sample.
    pub fn validate(&self) -> Result<()> {
        let n = self.n_samples();
        for labels in &self.labels {
            if labels.nrows() != n {
                return Err(PrepError::DimensionMismatch {
                    expected: n,
                    actual: labels.nrows(),
                });
            }
        }
        if self.biomes.len() != n {
            return Err(PrepError::DimensionMismatch {
                expected: n,
                actual: self.biomes.len(),
            });
        }
        Ok(())
    }

    /// Write `<dir>/<name>.npz` and `<dir>/<name>.txt`, returning the npz path.
    pub fn save<P: AsRef<Path>>(&self, dir: P, name: &str) -> Result<PathBuf> {
        self.validate()?;
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let npz_path = dir.join(format!("{}.npz", name));
        let mut npz = NpzWriter::new(BufWriter::new(File::create(&npz_path)?));
        npz.add_array(MATRICES_KEY, &self.matrices)?;
        for (k, labels) in self.labels.iter().enumerate() {
            npz.add_array(label_key(k), labels)?;
        }
        npz.finish()?;

        let mut side = BufWriter::new(File::create(dir.join(format!("{}.txt", name)))?);
        write!(side, "{}", self.biomes.join("\n"))?;
        side.flush()?;

        info!(
            "Saved {} samples to {:?} (matrices {:?}, {} label levels)",
            self.n_samples(),
            npz_path,
            self.matrices.dim(),
            self.labels.len()
        );
        Ok(npz_path)
    }

    /// Read an archive written by [`save`](Self::save).
    ///
    /// The side file is optional; without it `biomes` is empty.
    pub fn load<P: AsRef<Path>>(npz_path: P) -> Result<Self> {
        let npz_path = npz_path.as_ref();
        let mut npz = NpzReader::new(BufReader::new(File::open(npz_path)?))?;
        let names = npz.names()?;
        let entry = |key: &str| {
            names
                .iter()
                .find(|n| n.as_str() == key || n.strip_suffix(".npy") == Some(key))
                .cloned()
        };

        let matrices_name = entry(MATRICES_KEY).ok_or_else(|| {
            PrepError::EmptyData(format!("{:?} has no '{}' array", npz_path, MATRICES_KEY))
        })?;
        let matrices: Array3<f32> = npz.by_name(&matrices_name)?;

        let mut labels = Vec::new();
        while let Some(name) = entry(&label_key(labels.len())) {
            let level: Array2<f32> = npz.by_name(&name)?;
            labels.push(level);
        }

        let side_path = npz_path.with_extension("txt");
        let biomes = if side_path.is_file() {
            fs::read_to_string(&side_path)?
                .lines()
                .map(String::from)
                .collect()
        } else {
            Vec::new()
        };

        Ok(Self {
            matrices,
            labels,
            biomes,
        })
    }
}
