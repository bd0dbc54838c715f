//! Immutable reference hierarchy (species taxonomy or biome taxonomy).
//!
//! A `Hierarchy` stores topology only: identifiers, parent/child edges and
//! depths. Per-sample quantities live in [`NodeValues`](super::NodeValues),
//! so one hierarchy can be shared read-only by every worker thread.

use crate::error::{PrepError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Index of a node inside its hierarchy. The root is always 0.
pub type NodeIdx = usize;

/// Identifier given to the root of hierarchies built from paths.
pub const ROOT_ID: &str = "root";

/// A single node of a reference hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    id: String,
    parent: Option<NodeIdx>,
    children: Vec<NodeIdx>,
    depth: usize,
}

impl Node {
    /// Node identifier.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Parent index, `None` for the root.
    #[inline]
    pub fn parent(&self) -> Option<NodeIdx> {
        self.parent
    }

    /// Child indices in insertion order.
    #[inline]
    pub fn children(&self) -> &[NodeIdx] {
        &self.children
    }

    /// Depth below the root (root = 0).
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// On-disk form: the root id plus parent edges, parents listed before children.
#[derive(Debug, Serialize, Deserialize)]
struct HierarchyFile {
    root: String,
    edges: Vec<Edge>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Edge {
    id: String,
    parent: String,
}

/// A rooted, acyclic tree of unique identifiers.
#[derive(Debug, Clone)]
pub struct Hierarchy {
    nodes: Vec<Node>,
    index: HashMap<String, NodeIdx>,
}

impl Hierarchy {
    /// Create a hierarchy holding only a root node.
    pub fn new(root_id: &str) -> Self {
        let mut index = HashMap::new();
        index.insert(root_id.to_string(), 0);
        Self {
            nodes: vec![Node {
                id: root_id.to_string(),
                parent: None,
                children: Vec::new(),
                depth: 0,
            }],
            index,
        }
    }

    /// Build a hierarchy rooted at [`ROOT_ID`] from top-down id paths.
    ///
    /// Each path lists ids from the most general to the most specific,
    /// without the root.
    pub fn from_paths<I, P, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[S]>,
        S: AsRef<str>,
    {
        let mut tree = Self::new(ROOT_ID);
        for path in paths {
            tree.insert_path(path.as_ref());
        }
        tree
    }

    /// Insert `id` as a child of `parent`.
    ///
    /// Re-inserting an existing edge is a no-op. Inserting an id that already
    /// hangs under a different parent is an error.
    pub fn insert(&mut self, id: &str, parent: &str) -> Result<NodeIdx> {
        let parent_idx = self
            .index_of(parent)
            .ok_or_else(|| PrepError::UnknownNode(parent.to_string()))?;

        if let Some(existing) = self.index_of(id) {
            if self.nodes[existing].parent == Some(parent_idx) {
                return Ok(existing);
            }
            return Err(PrepError::InvalidHierarchy(format!(
                "node '{}' already exists under a different parent than '{}'",
                id, parent
            )));
        }

        Ok(self.push_child(id, parent_idx))
    }

    /// Insert a top-down path below the root, returning the deepest node.
    ///
    /// Ids already present are reused where they are, even if the path
    /// places them under another parent; the remainder of the path continues
    /// from the existing node.
    pub fn insert_path<S: AsRef<str>>(&mut self, path: &[S]) -> NodeIdx {
        let mut current = self.root();
        for id in path {
            let id = id.as_ref();
            current = match self.index_of(id) {
                Some(existing) => {
                    if self.nodes[existing].parent != Some(current) && existing != current {
                        debug!(
                            "Node '{}' already placed under '{}', keeping existing edge",
                            id,
                            self.parent_id(existing).unwrap_or("")
                        );
                    }
                    existing
                }
                None => self.push_child(id, current),
            };
        }
        current
    }

    fn push_child(&mut self, id: &str, parent_idx: NodeIdx) -> NodeIdx {
        let idx = self.nodes.len();
        let depth = self.nodes[parent_idx].depth + 1;
        self.nodes.push(Node {
            id: id.to_string(),
            parent: Some(parent_idx),
            children: Vec::new(),
            depth,
        });
        self.nodes[parent_idx].children.push(idx);
        self.index.insert(id.to_string(), idx);
        idx
    }

    /// Index of the root node.
    #[inline]
    pub fn root(&self) -> NodeIdx {
        0
    }

    /// Identifier of the root node.
    #[inline]
    pub fn root_id(&self) -> &str {
        &self.nodes[0].id
    }

    /// Number of nodes, root included.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    #[inline]
    pub fn index_of(&self, id: &str) -> Option<NodeIdx> {
        self.index.get(id).copied()
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.index_of(id).map(|idx| &self.nodes[idx])
    }

    /// Node by index. Panics if `idx` is out of range.
    #[inline]
    pub fn node(&self, idx: NodeIdx) -> &Node {
        &self.nodes[idx]
    }

    fn parent_id(&self, idx: NodeIdx) -> Option<&str> {
        self.nodes[idx].parent.map(|p| self.nodes[p].id.as_str())
    }

    /// Maximum node depth (0 for a root-only hierarchy).
    pub fn depth(&self) -> usize {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    /// Iterate from `idx` up to the root, both included.
    pub fn ancestors(&self, idx: NodeIdx) -> impl Iterator<Item = NodeIdx> + '_ {
        std::iter::successors(Some(idx), move |&i| self.nodes[i].parent)
    }

    /// Top-down index path from the root to `idx`, both included.
    pub fn path_to(&self, idx: NodeIdx) -> Vec<NodeIdx> {
        let mut path: Vec<NodeIdx> = self.ancestors(idx).collect();
        path.reverse();
        path
    }

    /// Breadth-first order starting at the root; siblings keep insertion order.
    pub fn bfs_order(&self) -> Vec<NodeIdx> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut queue = VecDeque::from([self.root()]);
        while let Some(idx) = queue.pop_front() {
            order.push(idx);
            queue.extend(self.nodes[idx].children.iter().copied());
        }
        order
    }

    /// Ids visiting every child before its parent (reverse breadth-first).
    pub fn bottom_up_ids(&self) -> Vec<String> {
        self.bfs_order()
            .into_iter()
            .rev()
            .map(|idx| self.nodes[idx].id.clone())
            .collect()
    }

    /// Ids grouped by depth, breadth-first within each level. Entry 0 is the root.
    pub fn ids_by_level(&self) -> Vec<Vec<String>> {
        let mut levels: Vec<Vec<String>> = vec![Vec::new(); self.depth() + 1];
        for idx in self.bfs_order() {
            let node = &self.nodes[idx];
            levels[node.depth].push(node.id.clone());
        }
        levels
    }

    /// Top-down id paths (root excluded) ending at every node of depth `level`.
    ///
    /// With `include_inner_leaves`, childless nodes shallower than `level` also
    /// end a path. Paths follow the breadth-first order of `ids_by_level`.
    pub fn paths_to_level(
        &self,
        ids_by_level: &[Vec<String>],
        level: usize,
        include_inner_leaves: bool,
    ) -> Result<Vec<Vec<String>>> {
        let mut paths = Vec::new();
        for ids in ids_by_level.iter().take(level + 1).skip(1) {
            for id in ids {
                let idx = self
                    .index_of(id)
                    .ok_or_else(|| PrepError::UnknownNode(id.clone()))?;
                let node = &self.nodes[idx];
                let ends_path =
                    node.depth == level || (include_inner_leaves && node.is_leaf());
                if ends_path {
                    paths.push(
                        self.path_to(idx)
                            .into_iter()
                            .skip(1)
                            .map(|i| self.nodes[i].id.clone())
                            .collect(),
                    );
                }
            }
        }
        Ok(paths)
    }

    /// Load a hierarchy saved with [`Hierarchy::save_json`].
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(PrepError::MissingHierarchy(path.to_path_buf()));
        }
        let file: HierarchyFile = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        let mut tree = Self::new(&file.root);
        for edge in &file.edges {
            tree.insert(&edge.id, &edge.parent)?;
        }
        debug!(
            "Loaded hierarchy from {:?}: {} nodes, depth {}",
            path,
            tree.len(),
            tree.depth()
        );
        Ok(tree)
    }

    /// Save the hierarchy as JSON, parents listed before children.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let edges = self
            .bfs_order()
            .into_iter()
            .skip(1)
            .map(|idx| Edge {
                id: self.nodes[idx].id.clone(),
                parent: self.parent_id(idx).unwrap_or_default().to_string(),
            })
            .collect();
        let file = HierarchyFile {
            root: self.root_id().to_string(),
            edges,
        };
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, &file)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// root -> A -> (A1, A2), root -> B
    fn small_tree() -> Hierarchy {
        Hierarchy::from_paths([vec!["A", "A1"], vec!["A", "A2"], vec!["B"]])
    }

    #[test]
    fn test_structure() {
        let tree = small_tree();
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.root_id(), "root");

        let a = tree.get("A").unwrap();
        assert_eq!(a.depth(), 1);
        assert_eq!(a.children().len(), 2);
        assert_eq!(tree.get("A1").unwrap().parent(), tree.index_of("A"));
        assert!(tree.get("B").unwrap().is_leaf());
        assert!(!tree.contains("C"));
    }

    #[test]
    fn test_insert_rejects_reparenting() {
        let mut tree = small_tree();
        assert!(tree.insert("A1", "B").is_err());
        assert!(tree.insert("X", "missing").is_err());
        // Same edge twice is fine
        let idx = tree.insert("A1", "A").unwrap();
        assert_eq!(Some(idx), tree.index_of("A1"));
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn test_bottom_up_order_children_first() {
        let tree = small_tree();
        let ids = tree.bottom_up_ids();
        let pos = |id: &str| ids.iter().position(|x| x == id).unwrap();

        assert_eq!(ids.len(), tree.len());
        assert!(pos("A1") < pos("A"));
        assert!(pos("A2") < pos("A"));
        assert!(pos("A") < pos("root"));
        assert!(pos("B") < pos("root"));
        assert_eq!(ids.last().unwrap(), "root");
    }

    #[test]
    fn test_ids_by_level() {
        let tree = small_tree();
        let levels = tree.ids_by_level();
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[0], vec!["root"]);
        assert_eq!(levels[1], vec!["A", "B"]);
        assert_eq!(levels[2], vec!["A1", "A2"]);
    }

    #[test]
    fn test_paths_to_level_with_inner_leaves() {
        let tree = small_tree();
        let levels = tree.ids_by_level();

        let paths = tree.paths_to_level(&levels, 2, true).unwrap();
        assert_eq!(
            paths,
            vec![
                vec!["B".to_string()],
                vec!["A".into(), "A1".into()],
                vec!["A".into(), "A2".into()],
            ]
        );

        let paths = tree.paths_to_level(&levels, 2, false).unwrap();
        assert_eq!(paths.len(), 2);

        // Cut above the leaves: paths are truncated at the level
        let paths = tree.paths_to_level(&levels, 1, true).unwrap();
        assert_eq!(paths, vec![vec!["A".to_string()], vec!["B".to_string()]]);
    }

    #[test]
    fn test_ancestors_and_path() {
        let tree = small_tree();
        let a1 = tree.index_of("A1").unwrap();
        let ids: Vec<&str> = tree.ancestors(a1).map(|i| tree.node(i).id()).collect();
        assert_eq!(ids, vec!["A1", "A", "root"]);
        assert_eq!(tree.path_to(a1).first(), Some(&tree.root()));
    }

    #[test]
    fn test_json_roundtrip() {
        let tree = small_tree();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tree.json");
        tree.save_json(&path).unwrap();

        let loaded = Hierarchy::load_json(&path).unwrap();
        assert_eq!(loaded.len(), tree.len());
        assert_eq!(loaded.bottom_up_ids(), tree.bottom_up_ids());
        assert_eq!(loaded.ids_by_level(), tree.ids_by_level());
    }

    #[test]
    fn test_missing_file() {
        let result = Hierarchy::load_json("/nonexistent/species_tree.json");
        assert!(matches!(result, Err(PrepError::MissingHierarchy(_))));
    }
}
