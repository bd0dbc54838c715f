//! Per-sample node values over a shared hierarchy.
//!
//! Each conversion task owns its `NodeValues`; the hierarchy itself is never
//! mutated, so workers share it by reference.

use super::tree::{Hierarchy, NodeIdx};
use crate::error::{PrepError, Result};
use log::warn;
use sprs::CsVec;

/// Dense value slot for every node of a hierarchy, indexed by [`NodeIdx`].
#[derive(Debug, Clone, PartialEq)]
pub struct NodeValues {
    values: Vec<f64>,
}

impl NodeValues {
    /// All-zero values for `tree`.
    pub fn zeros(tree: &Hierarchy) -> Self {
        Self {
            values: vec![0.0; tree.len()],
        }
    }

    /// Zero-initialize, then assign every node present in `abundance`.
    ///
    /// Nodes missing from `abundance` stay at zero until [`propagate`](Self::propagate).
    pub fn fill(tree: &Hierarchy, abundance: &CsVec<f64>) -> Result<Self> {
        if abundance.dim() != tree.len() {
            return Err(PrepError::DimensionMismatch {
                expected: tree.len(),
                actual: abundance.dim(),
            });
        }
        let mut values = Self::zeros(tree);
        for (idx, &val) in abundance.iter() {
            values.values[idx] = val;
        }
        Ok(values)
    }

    /// Zero-initialize, then set each listed node to `value`.
    pub fn fill_constant<I>(tree: &Hierarchy, nodes: I, value: f64) -> Self
    where
        I: IntoIterator<Item = NodeIdx>,
    {
        let mut values = Self::zeros(tree);
        for idx in nodes {
            values.values[idx] = value;
        }
        values
    }

    /// Add every node's value into its parent, visiting nodes in `order`.
    ///
    /// `order` must list every child before its parent. Afterwards each node
    /// holds the sum over its own subtree and the root holds the total.
    pub fn propagate(&mut self, tree: &Hierarchy, order: &[NodeIdx]) {
        for &idx in order {
            if let Some(parent) = tree.node(idx).parent() {
                self.values[parent] += self.values[idx];
            }
        }
    }

    /// Divide every value by the root value.
    ///
    /// A zero root (empty or fully unresolved sample) yields all zeros
    /// instead of NaN.
    pub fn relative(&self, tree: &Hierarchy) -> Self {
        let total = self.values[tree.root()];
        if total == 0.0 {
            warn!("Root abundance is zero, emitting zero relative abundances");
            return Self::zeros(tree);
        }
        Self {
            values: self.values.iter().map(|v| v / total).collect(),
        }
    }

    /// Clamp values to presence: 1.0 where positive, 0.0 elsewhere.
    pub fn presence(&self) -> Self {
        Self {
            values: self
                .values
                .iter()
                .map(|&v| if v > 0.0 { 1.0 } else { 0.0 })
                .collect(),
        }
    }

    #[inline]
    pub fn get(&self, idx: NodeIdx) -> f64 {
        self.values[idx]
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}
