//! Sample abundance tables and their aggregation onto a hierarchy.

mod aggregate;

pub use aggregate::{abundance_by_id, aggregate, NodeAbundance};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One row of an abundance table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonRecord {
    pub abundance: f64,
    /// Raw, unfixed taxonomy string.
    pub taxonomy: String,
}

impl TaxonRecord {
    pub fn new(abundance: f64, taxonomy: &str) -> Self {
        Self {
            abundance,
            taxonomy: taxonomy.to_string(),
        }
    }
}

/// A loaded sample: its table rows plus the biome it was filed under.
#[derive(Debug, Clone)]
pub struct Sample {
    /// File the table was read from.
    pub source: PathBuf,
    /// Raw biome string (name of the biome directory).
    pub biome: String,
    pub records: Vec<TaxonRecord>,
}

impl Sample {
    pub fn new(source: PathBuf, biome: &str, records: Vec<TaxonRecord>) -> Self {
        Self {
            source,
            biome: biome.to_string(),
            records,
        }
    }

    /// Sum of all record abundances.
    pub fn total_abundance(&self) -> f64 {
        self.records.iter().map(|r| r.abundance).sum()
    }
}
