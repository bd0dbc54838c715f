//! Per-sample aggregation of abundances onto nearest hierarchy ancestors.

use super::TaxonRecord;
use crate::error::{PrepError, Result};
use crate::hierarchy::{Hierarchy, NodeIdx};
use crate::taxonomy::PathResolver;
use sprs::CsVec;
use std::collections::{BTreeMap, HashMap};

/// Sparse abundance over hierarchy node indices (unique, sorted keys).
pub type NodeAbundance = CsVec<f64>;

/// Resolve each record's nearest ancestor and sum abundances per ancestor.
///
/// Records are summed in input order, so repeated runs give identical
/// floating-point results. The output total equals the input total.
pub fn aggregate(
    tree: &Hierarchy,
    resolver: &PathResolver,
    records: &[TaxonRecord],
) -> Result<NodeAbundance> {
    let mut totals: BTreeMap<NodeIdx, f64> = BTreeMap::new();
    // Many rows share a taxonomy string; resolve each distinct string once
    let mut resolved: HashMap<&str, NodeIdx> = HashMap::new();

    for (row, record) in records.iter().enumerate() {
        if !record.abundance.is_finite() || record.abundance < 0.0 {
            return Err(PrepError::InvalidAbundance {
                file: String::from("<sample>"),
                row,
                value: record.abundance.to_string(),
            });
        }
        let idx = *resolved
            .entry(record.taxonomy.as_str())
            .or_insert_with(|| resolver.resolve(tree, &record.taxonomy));
        *totals.entry(idx).or_insert(0.0) += record.abundance;
    }

    let (indices, data): (Vec<NodeIdx>, Vec<f64>) = totals.into_iter().unzip();
    Ok(CsVec::new(tree.len(), indices, data))
}

/// View an aggregated abundance as an id -> abundance map.
pub fn abundance_by_id(tree: &Hierarchy, abundance: &NodeAbundance) -> BTreeMap<String, f64> {
    abundance
        .iter()
        .map(|(idx, &val)| (tree.node(idx).id().to_string(), val))
        .collect()
}
