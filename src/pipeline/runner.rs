//! Sample-to-array conversion and batch execution.

use super::config::PrepConfig;
use crate::archive::BatchOutput;
use crate::data::{find_tree, load_hierarchy, load_samples, DataLoader, BIOME_TREE, SPECIES_TREE};
use crate::emit::{emit_labels, emit_matrix, LabelLayout, MatrixLayout};
use crate::error::{PrepError, Result};
use crate::hierarchy::{Hierarchy, NodeIdx, NodeValues};
use crate::plan::ConversionParams;
use crate::sample::{aggregate, Sample};
use crate::taxonomy::PathResolver;
use log::{debug, info};
use ndarray::{Array1, Array2, Array3, Axis};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::path::{Path, PathBuf};

/// File name of the label column listing written next to the archives.
pub const ORDERED_LABELS: &str = "ordered_labels.txt";

/// Arrays produced for one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleOutput {
    /// Relative abundance along each generation path.
    pub matrix: Array2<f32>,
    /// Biome presence flags, one vector per biome level.
    pub labels: Vec<Array1<f32>>,
}

/// Converts samples against a fixed pair of hierarchies.
///
/// Hierarchies and layouts are read-only after construction, so one
/// `Converter` is shared by every worker of a batch.
#[derive(Debug, Clone)]
pub struct Converter {
    species: Hierarchy,
    biome: Hierarchy,
    species_resolver: PathResolver,
    biome_resolver: PathResolver,
    species_order: Vec<NodeIdx>,
    matrix_layout: MatrixLayout,
    label_layout: LabelLayout,
}

impl Converter {
    /// Resolve the cached id lists of `params` against `species` once.
    pub fn new(
        species: Hierarchy,
        biome: Hierarchy,
        params: &ConversionParams,
        species_resolver: PathResolver,
        biome_resolver: PathResolver,
    ) -> Result<Self> {
        let species_order = params.bottom_up_order(&species)?;
        let matrix_layout = MatrixLayout::new(&species, params)?;
        let label_layout = LabelLayout::new(&biome);
        Ok(Self {
            species,
            biome,
            species_resolver,
            biome_resolver,
            species_order,
            matrix_layout,
            label_layout,
        })
    }

    /// Load both hierarchies from `config.tree_dir` and the parameter cache.
    pub fn from_config(config: &PrepConfig) -> Result<Self> {
        let species_resolver = PathResolver::new(&config.species)?;
        let biome_resolver = PathResolver::new(&config.biome)?;

        let species_path = find_tree(&config.tree_dir, SPECIES_TREE)?;
        let species = load_hierarchy(species_path, &species_resolver)?;
        let biome = load_hierarchy(find_tree(&config.tree_dir, BIOME_TREE)?, &biome_resolver)?;
        let params =
            ConversionParams::load_or_compute(&config.cache_path, &species, config.depth_cutoff)?;

        Self::new(species, biome, &params, species_resolver, biome_resolver)
    }

    pub fn species(&self) -> &Hierarchy {
        &self.species
    }

    pub fn biome(&self) -> &Hierarchy {
        &self.biome
    }

    /// Per-sample matrix shape: (generation paths, columns).
    pub fn matrix_shape(&self) -> (usize, usize) {
        self.matrix_layout.shape()
    }

    pub fn label_layout(&self) -> &LabelLayout {
        &self.label_layout
    }

    /// Biome ids assigned to a raw biome string: its most specific id.
    ///
    /// A string naming no biome below the root is rejected.
    pub fn biome_assignment(&self, raw: &str) -> Result<Vec<String>> {
        match self.biome_resolver.parse(raw).pop() {
            Some(leaf) => Ok(vec![leaf]),
            None => Err(PrepError::UnknownNode(raw.to_string())),
        }
    }

    pub fn convert_sample(&self, sample: &Sample) -> Result<SampleOutput> {
        let abundance = aggregate(&self.species, &self.species_resolver, &sample.records)?;
        let mut values = NodeValues::fill(&self.species, &abundance)?;
        values.propagate(&self.species, &self.species_order);
        let matrix = emit_matrix(&values.relative(&self.species), &self.matrix_layout);

        let assigned = self.biome_assignment(&sample.biome)?;
        let labels = emit_labels(&self.biome, &assigned, &self.label_layout)?;

        Ok(SampleOutput { matrix, labels })
    }

    /// Convert `samples` on a dedicated pool of `n_jobs` threads.
    pub fn convert_batch(&self, samples: &[Sample], n_jobs: usize) -> Result<BatchOutput> {
        worker_pool(n_jobs)?.install(|| self.convert_samples(samples))
    }

    /// Convert `samples` on the current rayon pool.
    ///
    /// Output rows follow input order. Any failing sample fails the whole
    /// batch; the reported error is that of the lowest failing index.
    pub fn convert_samples(&self, samples: &[Sample]) -> Result<BatchOutput> {
        info!(
            "Converting {} samples on {} threads",
            samples.len(),
            rayon::current_num_threads()
        );

        let results: Vec<Result<SampleOutput>> = samples
            .par_iter()
            .enumerate()
            .map(|(index, sample)| {
                self.convert_sample(sample).map_err(|e| PrepError::Sample {
                    index,
                    source_name: sample.source.display().to_string(),
                    source: Box::new(e),
                })
            })
            .collect();
        let outputs = results.into_iter().collect::<Result<Vec<_>>>()?;

        Ok(self.stack(samples, &outputs))
    }

    fn stack(&self, samples: &[Sample], outputs: &[SampleOutput]) -> BatchOutput {
        let n = outputs.len();
        let (nrow, ncol) = self.matrix_shape();
        let mut matrices = Array3::<f32>::zeros((n, nrow, ncol));
        let mut labels: Vec<Array2<f32>> = self
            .label_layout
            .level_sizes()
            .into_iter()
            .map(|size| Array2::zeros((n, size)))
            .collect();

        for (i, output) in outputs.iter().enumerate() {
            matrices.index_axis_mut(Axis(0), i).assign(&output.matrix);
            for (level, values) in labels.iter_mut().zip(&output.labels) {
                level.row_mut(i).assign(values);
            }
        }

        BatchOutput {
            matrices,
            labels,
            biomes: samples.iter().map(|s| s.biome.clone()).collect(),
        }
    }

    /// Write the biome ids behind each label column to `dir/ordered_labels.txt`.
    pub fn write_ordered_labels<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let path = dir.as_ref().join(ORDERED_LABELS);
        self.label_layout.write_ordered_labels(&self.biome, &path)?;
        Ok(path)
    }
}

/// Thread pool of `n_jobs` workers; 0 lets rayon choose.
pub fn worker_pool(n_jobs: usize) -> Result<ThreadPool> {
    Ok(ThreadPoolBuilder::new().num_threads(n_jobs).build()?)
}

/// Convert the configured batch of `config.input_dir` and save it.
///
/// Reading and conversion share one pool of `config.n_jobs` threads.
///
/// Returns the path of the written archive.
pub fn run_convert(config: &PrepConfig) -> Result<PathBuf> {
    config.validate()?;
    let loader = DataLoader::discover(&config.input_dir)?;
    let files = loader.batch(config.batch_index, config.batch_size)?;
    info!(
        "Batch {}: {} of {} tables",
        config.batch_name(),
        files.len(),
        loader.len()
    );

    let converter = Converter::from_config(config)?;
    let (nrow, ncol) = converter.matrix_shape();
    debug!(
        "Matrix shape {}x{}, label levels {:?}",
        nrow,
        ncol,
        converter.label_layout().level_sizes()
    );

    let output = worker_pool(config.n_jobs)?.install(|| -> Result<BatchOutput> {
        let samples = load_samples(files, &config.table)?;
        converter.convert_samples(&samples)
    })?;

    let path = output.save(&config.output_dir, &config.batch_name())?;
    converter.write_ordered_labels(&config.output_dir)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::TaxonRecord;
    use approx::assert_relative_eq;
    use std::path::PathBuf;

    fn converter() -> Converter {
        let species_resolver = PathResolver::species().unwrap();
        let biome_resolver = PathResolver::biome().unwrap();
        let species = species_resolver.build_hierarchy(["Root;A;A1", "Root;A;A2"]);
        let biome = biome_resolver.build_hierarchy([
            "root-Host-associated-Human",
            "root-Environmental-Soil",
        ]);
        let params = ConversionParams::compute(&species, 7).unwrap();
        Converter::new(species, biome, &params, species_resolver, biome_resolver).unwrap()
    }

    fn sample(biome: &str, rows: &[(f64, &str)]) -> Sample {
        Sample::new(
            PathBuf::from(format!("{}.tsv", biome)),
            biome,
            rows.iter().map(|&(a, t)| TaxonRecord::new(a, t)).collect(),
        )
    }

    #[test]
    fn test_convert_sample_relative_abundance() {
        let converter = converter();
        let out = converter
            .convert_sample(&sample(
                "root-Host-associated-Human",
                &[(10.0, "Root;A;A1"), (30.0, "Root;A;A2")],
            ))
            .unwrap();

        // Rows: [A, A1], [A, A2]
        assert_eq!(out.matrix.dim(), (2, 2));
        assert_relative_eq!(out.matrix[[0, 0]], 1.0);
        assert_relative_eq!(out.matrix[[0, 1]], 0.25);
        assert_relative_eq!(out.matrix[[1, 0]], 1.0);
        assert_relative_eq!(out.matrix[[1, 1]], 0.75);

        // Level 1: [Host_associated, Environmental]; level 2: [Human, Soil]
        assert_eq!(out.labels[0].to_vec(), vec![1.0, 0.0]);
        assert_eq!(out.labels[1].to_vec(), vec![1.0, 0.0]);
    }

    #[test]
    fn test_unresolved_taxa_collapse_to_root() {
        let converter = converter();
        let out = converter
            .convert_sample(&sample("root-Environmental-Soil", &[(5.0, "Root;Z;Z1")]))
            .unwrap();
        assert!(out.matrix.iter().all(|&v| v == 0.0));
        assert_eq!(out.labels[0].to_vec(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_batch_preserves_order_and_is_deterministic() {
        let converter = converter();
        let samples: Vec<Sample> = (0..16)
            .map(|i| {
                let biome = if i % 2 == 0 {
                    "root-Host-associated-Human"
                } else {
                    "root-Environmental-Soil"
                };
                sample(biome, &[(1.0 + i as f64, "Root;A;A1"), (1.0, "Root;A;A2")])
            })
            .collect();

        let parallel = converter.convert_batch(&samples, 4).unwrap();
        let serial = converter.convert_batch(&samples, 1).unwrap();
        assert_eq!(parallel, serial);
        assert_eq!(parallel.matrices.dim(), (16, 2, 2));

        for (i, s) in samples.iter().enumerate() {
            let single = converter.convert_sample(s).unwrap();
            assert_eq!(parallel.matrices.index_axis(Axis(0), i), single.matrix);
            assert_eq!(parallel.biomes[i], s.biome);
        }
    }

    #[test]
    fn test_unknown_biome_fails_batch() {
        let converter = converter();
        let samples = vec![
            sample("root-Environmental-Soil", &[(1.0, "Root;A;A1")]),
            sample("root-Engineered-Bioreactor", &[(1.0, "Root;A;A1")]),
        ];
        let err = converter.convert_batch(&samples, 2).unwrap_err();
        assert!(matches!(err, PrepError::Sample { index: 1, .. }));
    }

    #[test]
    fn test_lowest_failing_index_is_reported() {
        let converter = converter();
        let samples: Vec<Sample> = (0..32)
            .map(|i| {
                let biome = if i == 5 || i == 20 {
                    "root-Engineered-Bioreactor"
                } else {
                    "root-Environmental-Soil"
                };
                sample(biome, &[(1.0, "Root;A;A1")])
            })
            .collect();
        for _ in 0..4 {
            let err = converter.convert_batch(&samples, 4).unwrap_err();
            assert!(matches!(err, PrepError::Sample { index: 5, .. }));
        }
    }

    #[test]
    fn test_root_only_biome_is_rejected() {
        let converter = converter();
        assert!(matches!(
            converter.biome_assignment("root"),
            Err(PrepError::UnknownNode(_))
        ));
        let err = converter
            .convert_sample(&sample("root", &[(1.0, "Root;A;A1")]))
            .unwrap_err();
        assert!(matches!(err, PrepError::UnknownNode(_)));
    }

    #[test]
    fn test_worker_pool_size() {
        let pool = worker_pool(3).unwrap();
        assert_eq!(pool.current_num_threads(), 3);
        assert_eq!(pool.install(rayon::current_num_threads), 3);
    }

    #[test]
    fn test_empty_batch() {
        let converter = converter();
        let output = converter.convert_batch(&[], 2).unwrap();
        assert_eq!(output.n_samples(), 0);
        assert_eq!(output.labels.len(), 2);
    }
}
