//! Discovery and reading of per-biome abundance tables.
//!
//! Expected layout: `input_dir/<biome>/<table>`, where `<biome>` is the raw
//! MGnify lineage (`root-Host-associated-Human-Skin`) and each table has
//! `header` leading lines followed by delimited rows.

use crate::error::{PrepError, Result};
use crate::sample::{Sample, TaxonRecord};
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Layout of an abundance table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableFormat {
    /// Number of leading lines to skip.
    pub header: usize,
    /// Column holding the abundance value.
    pub abundance_column: usize,
    /// Column holding the taxonomy string.
    pub taxonomy_column: usize,
    pub delimiter: char,
}

impl Default for TableFormat {
    /// MGnify OTU tables: `#OTU ID <tab> abundance <tab> taxonomy`, one header line.
    fn default() -> Self {
        Self {
            header: 1,
            abundance_column: 1,
            taxonomy_column: 2,
            delimiter: '\t',
        }
    }
}

/// A table file and the biome directory it was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleFile {
    pub path: PathBuf,
    /// Raw biome string (directory name).
    pub biome: String,
}

/// Sorted listing of every table under an input directory.
#[derive(Debug, Clone)]
pub struct DataLoader {
    files: Vec<SampleFile>,
}

impl DataLoader {
    /// List `input_dir/<biome>/<table>` files, sorted by path.
    pub fn discover<P: AsRef<Path>>(input_dir: P) -> Result<Self> {
        let root = input_dir.as_ref().to_path_buf();
        let mut files = Vec::new();

        for biome_entry in fs::read_dir(&root)? {
            let biome_dir = biome_entry?.path();
            if !biome_dir.is_dir() {
                continue;
            }
            let biome = match biome_dir.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => continue,
            };
            for entry in fs::read_dir(&biome_dir)? {
                let path = entry?.path();
                let hidden = path
                    .file_name()
                    .map_or(true, |n| n.to_string_lossy().starts_with('.'));
                if path.is_file() && !hidden {
                    files.push(SampleFile {
                        path,
                        biome: biome.clone(),
                    });
                }
            }
        }

        if files.is_empty() {
            return Err(PrepError::EmptyData(format!(
                "No tables found under {:?}",
                root
            )));
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        info!("Found {} tables under {:?}", files.len(), root);

        Ok(Self { files })
    }

    pub fn files(&self) -> &[SampleFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Files of batch `batch_index` with `batch_size` files per batch.
    ///
    /// `None` selects every file. The last batch may be short.
    pub fn batch(&self, batch_index: Option<usize>, batch_size: usize) -> Result<&[SampleFile]> {
        let Some(index) = batch_index else {
            return Ok(&self.files);
        };
        if batch_size == 0 {
            return Err(PrepError::InvalidParameter(
                "Batch size must be positive".to_string(),
            ));
        }
        let start = index.saturating_mul(batch_size);
        if start >= self.files.len() {
            return Err(PrepError::InvalidParameter(format!(
                "Batch {} is out of range: {} tables in batches of {}",
                index,
                self.files.len(),
                batch_size
            )));
        }
        let end = (start + batch_size).min(self.files.len());
        Ok(&self.files[start..end])
    }

    /// Number of tables per biome.
    pub fn sample_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for file in &self.files {
            *counts.entry(file.biome.clone()).or_insert(0) += 1;
        }
        counts
    }
}

/// Read one abundance table.
///
/// Every row after the header must have both configured columns and a
/// finite, non-negative abundance.
pub fn read_table<P: AsRef<Path>>(path: P, format: &TableFormat) -> Result<Vec<TaxonRecord>> {
    let path = path.as_ref();
    let file_name = path.display().to_string();
    let delimiter = u8::try_from(format.delimiter).map_err(|_| {
        PrepError::InvalidParameter(format!(
            "Delimiter {:?} is not a single-byte character",
            format.delimiter
        ))
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_path(path)?;

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate().skip(format.header) {
        let record = result?;
        let field = |column: usize| {
            record.get(column).ok_or_else(|| PrepError::MissingColumn {
                file: file_name.clone(),
                row,
                column,
            })
        };
        let value = field(format.abundance_column)?;
        let taxonomy = field(format.taxonomy_column)?;

        let abundance: f64 = value
            .trim()
            .parse()
            .ok()
            .filter(|v: &f64| v.is_finite() && *v >= 0.0)
            .ok_or_else(|| PrepError::InvalidAbundance {
                file: file_name.clone(),
                row,
                value: value.to_string(),
            })?;

        records.push(TaxonRecord {
            abundance,
            taxonomy: taxonomy.to_string(),
        });
    }

    debug!("Read {} rows from {}", records.len(), file_name);
    Ok(records)
}

/// Read every file into a [`Sample`] on the current rayon pool, keeping input order.
pub fn load_samples(files: &[SampleFile], format: &TableFormat) -> Result<Vec<Sample>> {
    files
        .par_iter()
        .map(|file| -> Result<Sample> {
            let records = read_table(&file.path, format)?;
            Ok(Sample::new(file.path.clone(), &file.biome, records))
        })
        .collect()
}
