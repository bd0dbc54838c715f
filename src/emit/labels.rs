//! Per-level biome label vectors.

use crate::error::{PrepError, Result};
use crate::hierarchy::{Hierarchy, NodeIdx, NodeValues};
use crate::taxonomy::restore_biome;
use ndarray::Array1;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Biome node indices per depth level, breadth-first, plus the bottom-up order.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelLayout {
    /// `levels[k]` holds the nodes of depth `k + 1`; the root is excluded.
    levels: Vec<Vec<NodeIdx>>,
    bottom_up: Vec<NodeIdx>,
}

impl LabelLayout {
    pub fn new(biome: &Hierarchy) -> Self {
        let mut levels: Vec<Vec<NodeIdx>> = vec![Vec::new(); biome.depth()];
        let bfs = biome.bfs_order();
        for &idx in &bfs {
            let depth = biome.node(idx).depth();
            if depth > 0 {
                levels[depth - 1].push(idx);
            }
        }
        Self {
            levels,
            bottom_up: bfs.into_iter().rev().collect(),
        }
    }

    /// Number of label levels (biome depth).
    pub fn n_levels(&self) -> usize {
        self.levels.len()
    }

    /// Vector length of each level.
    pub fn level_sizes(&self) -> Vec<usize> {
        self.levels.iter().map(Vec::len).collect()
    }

    /// Write the ids behind each label column, one `layer_<k>` block per level.
    ///
    /// Each id is followed by its EBI spelling.
    pub fn write_ordered_labels<P: AsRef<Path>>(&self, biome: &Hierarchy, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        for (k, level) in self.levels.iter().enumerate() {
            writeln!(writer, "layer_{}", k + 1)?;
            for &idx in level {
                let id = biome.node(idx).id();
                writeln!(writer, "{}\t{}", id, restore_biome(id))?;
            }
            writeln!(writer)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Mark `assigned` biome ids and their ancestors, then read one vector per level.
///
/// Values are presence flags: 1.0 on the ancestor chain of any assigned id,
/// 0.0 elsewhere. An id missing from the biome tree is an error.
pub fn emit_labels<S: AsRef<str>>(
    biome: &Hierarchy,
    assigned: &[S],
    layout: &LabelLayout,
) -> Result<Vec<Array1<f32>>> {
    let marked = assigned
        .iter()
        .map(|id| {
            biome
                .index_of(id.as_ref())
                .ok_or_else(|| PrepError::UnknownNode(id.as_ref().to_string()))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut values = NodeValues::fill_constant(biome, marked, 1.0);
    values.propagate(biome, &layout.bottom_up);
    let presence = values.presence();

    Ok(layout
        .levels
        .iter()
        .map(|level| level.iter().map(|&idx| presence.get(idx) as f32).collect())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::PathResolver;
    use tempfile::TempDir;

    fn biome_tree() -> Hierarchy {
        PathResolver::biome().unwrap().build_hierarchy([
            "root-Host-associated-Human-Digestive system",
            "root-Host-associated-Human-Skin",
            "root-Host-associated-Mammals-Digestive system",
            "root-Environmental-Terrestrial-Soil",
        ])
    }

    #[test]
    fn test_layout_levels() {
        let tree = biome_tree();
        let layout = LabelLayout::new(&tree);
        assert_eq!(layout.n_levels(), 3);
        assert_eq!(layout.level_sizes(), vec![2, 3, 4]);
    }

    #[test]
    fn test_single_biome_marks_ancestor_chain() {
        let tree = biome_tree();
        let layout = LabelLayout::new(&tree);
        let leaf = "Host_associated-Human-Skin";
        let labels = emit_labels(&tree, &[leaf], &layout).unwrap();

        assert_eq!(labels.len(), 3);
        // Level 1: [Host_associated, Environmental]
        assert_eq!(labels[0].to_vec(), vec![1.0, 0.0]);
        // Level 2: [Human, Mammals, Terrestrial]
        assert_eq!(labels[1].to_vec(), vec![1.0, 0.0, 0.0]);
        // Level 3: [Human-Digestive, Human-Skin, Mammals-Digestive, Soil]
        assert_eq!(labels[2].to_vec(), vec![0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_multi_biome_stays_binary() {
        let tree = biome_tree();
        let layout = LabelLayout::new(&tree);
        let labels = emit_labels(
            &tree,
            &[
                "Host_associated-Human-Skin",
                "Host_associated-Human-Digestive system",
            ],
            &layout,
        )
        .unwrap();
        assert_eq!(labels[0].to_vec(), vec![1.0, 0.0]);
        assert_eq!(labels[1].to_vec(), vec![1.0, 0.0, 0.0]);
        assert_eq!(labels[2].to_vec(), vec![1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_unknown_biome_is_error() {
        let tree = biome_tree();
        let layout = LabelLayout::new(&tree);
        let result = emit_labels(&tree, &["Host_associated-Plants"], &layout);
        assert!(matches!(result, Err(PrepError::UnknownNode(_))));
    }

    #[test]
    fn test_write_ordered_labels() {
        let tree = biome_tree();
        let layout = LabelLayout::new(&tree);
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ordered_labels.txt");
        layout.write_ordered_labels(&tree, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("layer_1\nHost_associated\tHost-associated\n"));
        assert!(text.contains("layer_3"));
    }
}
