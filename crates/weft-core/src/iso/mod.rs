// SPDX-License-Identifier: Apache-2.0
//! Graph / subgraph isomorphism strategies.
//!
//! One contract, several interchangeable implementations trading
//! preprocessing cost for search cost. Every strategy must produce the same
//! boolean answer for [`IsomorphismStrategy::is_isomorphic_to`]; they differ
//! only in the witness returned and in asymptotic behavior. The strategy in
//! use is explicit configuration passed into the explorer, never global
//! state.
use std::collections::BTreeMap;

use crate::graph::{GraphStore, NodeId};

mod backtracking;
mod canonical;
mod combinatorial;
mod csp;
mod parallel;

pub use backtracking::DepthFirstStrategy;
pub use canonical::CanonicalStrategy;
pub use combinatorial::CombinatorialStrategy;
pub use csp::{CspConflictStrategy, CspLowHighStrategy};
pub use parallel::ParallelStrategy;

/// A subgraph-isomorphism witness: sub-graph node → base-graph node.
pub type NodeMapping = BTreeMap<NodeId, NodeId>;

/// Common contract for all isomorphism strategies.
pub trait IsomorphismStrategy: Send + Sync {
    /// Finds an embedding of `sub` into `base`, if one exists.
    ///
    /// The witness proves `sub` is embeddable: every node maps to a distinct
    /// base node carrying at least the same attributes, and every sub edge
    /// exists (with at least the same multiplicity) between the images.
    fn mapping_from(&self, sub: &GraphStore, base: &GraphStore) -> Option<NodeMapping>;

    /// Decides full isomorphism.
    ///
    /// Derived: sizes equal and an embedding witness exists that is
    /// *reversible* — every edge and attribute of the mapped-into node holds
    /// in reverse, so the witness is an isomorphism rather than a mere
    /// embedding.
    fn is_isomorphic_to(&self, a: &GraphStore, b: &GraphStore) -> bool {
        a.len() == b.len()
            && self
                .mapping_from(a, b)
                .is_some_and(|m| is_full_witness(a, b, &m))
    }
}

/// Runtime-selectable strategy, defaulting to the robust middle ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    /// Exhaustive duplicate-free tuple enumeration. No heuristics.
    Combinatorial,
    /// Connectivity-ordered depth-first backtracking with singleton pruning.
    #[default]
    DepthFirst,
    /// CSP search with minimum-remaining-values / minimum-degree ordering.
    CspLowHigh,
    /// CSP search that additionally ranks candidates by conflict count.
    CspConflict,
    /// Canonical-form normalization; comparisons reduce to digest equality.
    Canonical,
    /// Combinatorial search partitioned across a worker pool.
    Parallel,
}

impl StrategyKind {
    /// Instantiates the strategy.
    #[must_use]
    pub fn build(self) -> Box<dyn IsomorphismStrategy> {
        match self {
            Self::Combinatorial => Box::new(CombinatorialStrategy),
            Self::DepthFirst => Box::new(DepthFirstStrategy),
            Self::CspLowHigh => Box::new(CspLowHighStrategy),
            Self::CspConflict => Box::new(CspConflictStrategy),
            Self::Canonical => Box::new(CanonicalStrategy),
            Self::Parallel => Box::new(ParallelStrategy::default()),
        }
    }
}

/// Local embedding feasibility: `bn` carries all of `sn`'s attributes and at
/// least its per-label edge counts in both directions.
///
/// An absent label behaves exactly as a zero-length edge list on either side.
pub(crate) fn locally_feasible(
    sub: &GraphStore,
    sn: NodeId,
    base: &GraphStore,
    bn: NodeId,
) -> bool {
    for (name, value) in sub.attrs(sn) {
        if base.attr(bn, name) != Some(value) {
            return false;
        }
    }
    for (label, targets) in sub.out_adjacency(sn) {
        if base.edges_out(bn, label).len() < targets.len() {
            return false;
        }
    }
    for (label, sources) in sub.in_adjacency(sn) {
        if base.edges_in(bn, label).len() < sources.len() {
            return false;
        }
    }
    true
}

/// Per-sub-node candidate lists in sub insertion order.
pub(crate) fn candidate_sets(sub: &GraphStore, base: &GraphStore) -> Vec<(NodeId, Vec<NodeId>)> {
    sub.node_ids()
        .map(|sn| {
            let cands = base
                .node_ids()
                .filter(|bn| locally_feasible(sub, sn, base, *bn))
                .collect();
            (sn, cands)
        })
        .collect()
}

/// Full edge-consistency check for a complete duplicate-free assignment.
///
/// Every sub edge must exist between the images with at least the sub's
/// multiplicity.
pub(crate) fn embedding_consistent(
    sub: &GraphStore,
    base: &GraphStore,
    mapping: &NodeMapping,
) -> bool {
    for (sn, bn) in mapping {
        for (label, targets) in sub.out_adjacency(*sn) {
            let mut need: BTreeMap<NodeId, usize> = BTreeMap::new();
            for t in targets {
                *need.entry(*t).or_default() += 1;
            }
            for (tn, count) in need {
                let Some(btn) = mapping.get(&tn) else {
                    return false;
                };
                if base.edge_multiplicity(label, *bn, *btn) < count {
                    return false;
                }
            }
        }
    }
    true
}

/// Verifies that an embedding witness is a full isomorphism: bijective, with
/// attributes and adjacency equal in both directions (not merely contained).
pub(crate) fn is_full_witness(sub: &GraphStore, base: &GraphStore, mapping: &NodeMapping) -> bool {
    if mapping.len() != sub.len() || mapping.len() != base.len() {
        return false;
    }
    let mut images: Vec<NodeId> = mapping.values().copied().collect();
    images.sort_unstable();
    images.dedup();
    if images.len() != mapping.len() {
        return false;
    }
    for (sn, bn) in mapping {
        let sub_attrs: Vec<_> = sub.attrs(*sn).collect();
        let base_attrs: Vec<_> = base.attrs(*bn).collect();
        if sub_attrs != base_attrs {
            return false;
        }
        let mut sub_out: Vec<(String, NodeId)> = sub
            .out_adjacency(*sn)
            .flat_map(|(label, targets)| {
                targets
                    .iter()
                    .filter_map(|t| mapping.get(t).map(|bt| (label.to_owned(), *bt)))
            })
            .collect();
        sub_out.sort();
        let mut base_out: Vec<(String, NodeId)> = base
            .out_adjacency(*bn)
            .flat_map(|(label, targets)| targets.iter().map(|t| (label.to_owned(), *t)))
            .collect();
        base_out.sort();
        if sub_out != base_out {
            return false;
        }
    }
    true
}
