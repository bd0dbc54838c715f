//! Raw taxonomy string to hierarchy identifiers, and nearest-ancestor lookup.

use super::fix::{biome_rules, species_rules, FixRule, FixRules};
use crate::error::Result;
use crate::hierarchy::{Hierarchy, NodeIdx, ROOT_ID};
use serde::{Deserialize, Serialize};

/// How path labels become hierarchy identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdScheme {
    /// Identifier is the label itself (`p__Firmicutes`).
    Label,
    /// Identifier is every label from the top joined by the separator
    /// (`Host_associated-Human-Digestive system`).
    Lineage,
}

/// Settings for one kind of path string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Level delimiter.
    pub separator: char,
    /// Leading label naming the root, removed when present (case-insensitive).
    pub root_marker: Option<String>,
    /// Drop unnamed rank placeholders such as `k__`.
    pub drop_blank_ranks: bool,
    pub id_scheme: IdScheme,
    /// Replacements applied to the whole string before splitting.
    pub fix_rules: Vec<FixRule>,
}

impl ResolverConfig {
    /// MGnify OTU taxonomy strings: `Root;sk__Bacteria;k__;p__Firmicutes`.
    pub fn species() -> Self {
        Self {
            separator: ';',
            root_marker: Some("Root".to_string()),
            drop_blank_ranks: true,
            id_scheme: IdScheme::Label,
            fix_rules: species_rules(),
        }
    }

    /// MGnify biome lineages: `root-Host-associated-Human-Digestive system`.
    pub fn biome() -> Self {
        Self {
            separator: '-',
            root_marker: Some(ROOT_ID.to_string()),
            drop_blank_ranks: false,
            id_scheme: IdScheme::Lineage,
            fix_rules: biome_rules(),
        }
    }
}

/// Converts raw path strings into top-down identifier paths.
#[derive(Debug, Clone)]
pub struct PathResolver {
    separator: char,
    root_marker: Option<String>,
    drop_blank_ranks: bool,
    scheme: IdScheme,
    rules: FixRules,
}

impl PathResolver {
    pub fn new(config: &ResolverConfig) -> Result<Self> {
        Ok(Self {
            separator: config.separator,
            root_marker: config.root_marker.clone(),
            drop_blank_ranks: config.drop_blank_ranks,
            scheme: config.id_scheme,
            rules: FixRules::compile(&config.fix_rules)?,
        })
    }

    pub fn species() -> Result<Self> {
        Self::new(&ResolverConfig::species())
    }

    pub fn biome() -> Result<Self> {
        Self::new(&ResolverConfig::biome())
    }

    /// Fixed, split and trimmed labels, most general first, root marker removed.
    pub fn labels(&self, raw: &str) -> Vec<String> {
        let fixed = self.rules.apply(raw.trim());
        let mut labels: Vec<String> = fixed
            .split(self.separator)
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .filter(|label| !(self.drop_blank_ranks && is_blank_rank(label)))
            .map(String::from)
            .collect();

        let starts_at_root = matches!(
            (&self.root_marker, labels.first()),
            (Some(marker), Some(first)) if first.eq_ignore_ascii_case(marker)
        );
        if starts_at_root {
            labels.remove(0);
        }
        labels
    }

    /// Ancestor identifiers for `raw`, most general first.
    pub fn parse(&self, raw: &str) -> Vec<String> {
        let labels = self.labels(raw);
        match self.scheme {
            IdScheme::Label => labels,
            IdScheme::Lineage => {
                let sep = self.separator.to_string();
                (1..=labels.len()).map(|k| labels[..k].join(sep.as_str())).collect()
            }
        }
    }

    /// Parse `raw` and map it onto its nearest ancestor in `tree`.
    pub fn resolve(&self, tree: &Hierarchy, raw: &str) -> NodeIdx {
        nearest_ancestor(tree, &self.parse(raw))
    }

    /// Build a hierarchy from raw lineage lines using this resolver's rules.
    ///
    /// Blank lines and lines starting with `#` are skipped.
    pub fn build_hierarchy<I, S>(&self, lines: I) -> Hierarchy
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let paths: Vec<Vec<String>> = lines
            .into_iter()
            .filter(|line| {
                let line = line.as_ref().trim();
                !line.is_empty() && !line.starts_with('#')
            })
            .map(|line| self.parse(line.as_ref()))
            .collect();
        Hierarchy::from_paths(paths)
    }
}

/// Rank prefix with no name, e.g. `k__` or `sk__`.
fn is_blank_rank(label: &str) -> bool {
    label
        .strip_suffix("__")
        .map(|prefix| {
            !prefix.is_empty()
                && prefix.len() <= 2
                && prefix.chars().all(|c| c.is_ascii_lowercase())
        })
        .unwrap_or(false)
}

/// Most specific id of `path` present in `tree`, or the root when none is.
///
/// Raw data routinely contains taxa finer than the reference hierarchy or
/// misspelled labels, so a miss degrades to a coarser ancestor rather than
/// failing.
pub fn nearest_ancestor<S: AsRef<str>>(tree: &Hierarchy, path: &[S]) -> NodeIdx {
    path.iter()
        .rev()
        .find_map(|id| tree.index_of(id.as_ref()))
        .unwrap_or_else(|| tree.root())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn species_tree() -> Hierarchy {
        Hierarchy::from_paths([
            vec!["sk__Bacteria", "p__Firmicutes", "c__Bacilli"],
            vec!["sk__Bacteria", "p__Proteobacteria"],
            vec!["sk__Archaea"],
        ])
    }

    #[test]
    fn test_species_parse() {
        let resolver = PathResolver::species().unwrap();
        let path = resolver.parse("Root;sk__Bacteria;k__;p__Firmicutes; c__Bacilli");
        assert_eq!(path, vec!["sk__Bacteria", "p__Firmicutes", "c__Bacilli"]);
    }

    #[test]
    fn test_biome_parse_lineage_ids() {
        let resolver = PathResolver::biome().unwrap();
        let path = resolver.parse("root-Host-associated-Human-Digestive system");
        assert_eq!(
            path,
            vec![
                "Host_associated",
                "Host_associated-Human",
                "Host_associated-Human-Digestive system",
            ]
        );
    }

    #[test]
    fn test_nearest_ancestor_most_specific_match() {
        let tree = species_tree();
        let resolver = PathResolver::species().unwrap();

        // Finer than the tree: falls back to c__Bacilli
        let raw = "Root;sk__Bacteria;p__Firmicutes;c__Bacilli;o__Lactobacillales";
        let idx = resolver.resolve(&tree, raw);
        assert_eq!(tree.node(idx).id(), "c__Bacilli");

        // Typo at class level: falls back to phylum
        let idx = resolver.resolve(&tree, "Root;sk__Bacteria;p__Firmicutes;c__Bacilly");
        assert_eq!(tree.node(idx).id(), "p__Firmicutes");
    }

    #[test]
    fn test_nearest_ancestor_root_fallback() {
        let tree = species_tree();
        assert_eq!(nearest_ancestor(&tree, &["x", "y"]), tree.root());
        assert_eq!(nearest_ancestor::<&str>(&tree, &[]), tree.root());

        let resolver = PathResolver::species().unwrap();
        assert_eq!(resolver.resolve(&tree, "Root"), tree.root());
        assert_eq!(resolver.resolve(&tree, ""), tree.root());
    }

    #[test]
    fn test_result_always_in_tree() {
        let tree = species_tree();
        let resolver = PathResolver::species().unwrap();
        for raw in ["", "Root;", "sk__Archaea", "Unassigned", "Root;sk__Bacteria;p__X;c__Bacilli"] {
            let idx = resolver.resolve(&tree, raw);
            assert!(tree.contains(tree.node(idx).id()));
        }
    }

    #[test]
    fn test_blank_rank_detection() {
        assert!(is_blank_rank("k__"));
        assert!(is_blank_rank("sk__"));
        assert!(!is_blank_rank("k__Bacteria"));
        assert!(!is_blank_rank("__"));
        assert!(!is_blank_rank("Unassigned"));
    }

    #[test]
    fn test_build_hierarchy_from_lineages() {
        let resolver = PathResolver::biome().unwrap();
        let tree = resolver.build_hierarchy([
            "# biome lineages",
            "root-Host-associated-Human-Digestive system",
            "root-Host-associated-Mammals-Digestive system",
            "",
            "root-Environmental-Terrestrial-Soil",
        ]);
        assert_eq!(tree.depth(), 3);
        assert!(tree.contains("Host_associated-Mammals-Digestive system"));
        assert!(tree.contains("Host_associated-Human-Digestive system"));
        assert_eq!(tree.ids_by_level()[1], vec!["Host_associated", "Environmental"]);
    }
}
