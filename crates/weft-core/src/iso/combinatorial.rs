// SPDX-License-Identifier: Apache-2.0
//! Brute-force combinatorial strategy.
use crate::graph::GraphStore;
use crate::odometer::Odometer;
use rustc_hash::FxHashSet;

use super::{candidate_sets, embedding_consistent, IsomorphismStrategy, NodeMapping};

/// Generates all duplicate-free candidate tuples (after local
/// edge-count/attribute filtering) and tests each for full edge consistency.
///
/// The simplest strategy and the reference for the others: exponential worst
/// case, no heuristics.
#[derive(Debug, Clone, Copy, Default)]
pub struct CombinatorialStrategy;

impl IsomorphismStrategy for CombinatorialStrategy {
    fn mapping_from(&self, sub: &GraphStore, base: &GraphStore) -> Option<NodeMapping> {
        let candidates = candidate_sets(sub, base);
        let mut odo = Odometer::new(candidates.iter().map(|(_, c)| c.len()).collect());
        while let Some(cursors) = odo.current() {
            let mapping: NodeMapping = candidates
                .iter()
                .zip(cursors)
                .map(|((sn, cands), c)| (*sn, cands[*c]))
                .collect();
            let mut seen = FxHashSet::default();
            if mapping.values().all(|bn| seen.insert(*bn))
                && embedding_consistent(sub, base, &mapping)
            {
                return Some(mapping);
            }
            odo.advance();
        }
        None
    }
}
