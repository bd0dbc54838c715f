//! Locating and loading the species and biome hierarchies.

use crate::error::{PrepError, Result};
use crate::hierarchy::Hierarchy;
use crate::taxonomy::PathResolver;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// File stem of the species hierarchy inside the tree directory.
pub const SPECIES_TREE: &str = "species_tree";
/// File stem of the biome hierarchy inside the tree directory.
pub const BIOME_TREE: &str = "biome_tree";

/// Find `<stem>.json` or, failing that, `<stem>.txt` in `tree_dir`.
pub fn find_tree(tree_dir: &Path, stem: &str) -> Result<PathBuf> {
    ["json", "txt"]
        .iter()
        .map(|ext| tree_dir.join(format!("{}.{}", stem, ext)))
        .find(|p| p.is_file())
        .ok_or_else(|| PrepError::MissingHierarchy(tree_dir.join(format!("{}.json", stem))))
}

/// Load a hierarchy file.
///
/// `.json` files hold a serialized [`Hierarchy`]; any other file is read as
/// one raw lineage per line and parsed with `resolver`.
pub fn load_hierarchy<P: AsRef<Path>>(path: P, resolver: &PathResolver) -> Result<Hierarchy> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(PrepError::MissingHierarchy(path.to_path_buf()));
    }
    let tree = if path.extension().map_or(false, |ext| ext == "json") {
        Hierarchy::load_json(path)?
    } else {
        let text = fs::read_to_string(path)?;
        resolver.build_hierarchy(text.lines())
    };
    info!(
        "Loaded {:?}: {} nodes, depth {}",
        path,
        tree.len(),
        tree.depth()
    );
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lineage_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("species_tree.txt");
        fs::write(&path, "Root;sk__Bacteria;p__Firmicutes\nRoot;sk__Archaea\n").unwrap();

        let found = find_tree(dir.path(), SPECIES_TREE).unwrap();
        assert_eq!(found, path);
        let tree = load_hierarchy(&found, &PathResolver::species().unwrap()).unwrap();
        assert_eq!(tree.len(), 4);
        assert!(tree.contains("p__Firmicutes"));
    }

    #[test]
    fn test_json_preferred() {
        let dir = TempDir::new().unwrap();
        let tree = Hierarchy::from_paths([vec!["X"]]);
        tree.save_json(dir.path().join("biome_tree.json")).unwrap();
        fs::write(dir.path().join("biome_tree.txt"), "root-Y\n").unwrap();

        let found = find_tree(dir.path(), BIOME_TREE).unwrap();
        let loaded = load_hierarchy(&found, &PathResolver::biome().unwrap()).unwrap();
        assert!(loaded.contains("X"));
    }

    #[test]
    fn test_missing_tree_is_fatal() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            find_tree(dir.path(), SPECIES_TREE),
            Err(PrepError::MissingHierarchy(_))
        ));
        assert!(matches!(
            load_hierarchy(dir.path().join("nope.txt"), &PathResolver::species().unwrap()),
            Err(PrepError::MissingHierarchy(_))
        ));
    }
}
