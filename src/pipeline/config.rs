//! Conversion settings, serializable to YAML.

use crate::data::TableFormat;
use crate::error::{PrepError, Result};
use crate::plan::DEFAULT_DEPTH_CUTOFF;
use crate::taxonomy::ResolverConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default number of samples per batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Everything a conversion run needs besides the data itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepConfig {
    /// Root of the `<biome>/<table>` tree.
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Directory holding `species_tree` and `biome_tree`.
    pub tree_dir: PathBuf,
    /// Conversion parameter cache.
    pub cache_path: PathBuf,
    pub table: TableFormat,
    /// Worker threads; 0 lets rayon choose.
    pub n_jobs: usize,
    pub batch_size: usize,
    /// Only convert this batch; all samples when unset.
    pub batch_index: Option<usize>,
    /// Maximum generation path length.
    pub depth_cutoff: usize,
    pub species: ResolverConfig,
    pub biome: ResolverConfig,
}

impl Default for PrepConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("output"),
            tree_dir: PathBuf::from("trees"),
            cache_path: PathBuf::from("config/prep_conf.json"),
            table: TableFormat::default(),
            n_jobs: 1,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_index: None,
            depth_cutoff: DEFAULT_DEPTH_CUTOFF,
            species: ResolverConfig::species(),
            biome: ResolverConfig::biome(),
        }
    }
}

impl PrepConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(PrepError::from)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(PrepError::from)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Self::from_yaml(&fs::read_to_string(path)?)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    /// Reject settings no run could succeed with.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(PrepError::InvalidParameter(
                "batch_size must be positive".to_string(),
            ));
        }
        if self.depth_cutoff == 0 {
            return Err(PrepError::InvalidParameter(
                "depth_cutoff must be positive".to_string(),
            ));
        }
        if self.table.abundance_column == self.table.taxonomy_column {
            return Err(PrepError::InvalidParameter(format!(
                "abundance and taxonomy share column {}",
                self.table.abundance_column
            )));
        }
        Ok(())
    }

    /// Archive stem for the configured batch.
    pub fn batch_name(&self) -> String {
        match self.batch_index {
            Some(index) => format!("batch_{}", index),
            None => "batch_all".to_string(),
        }
    }
}
