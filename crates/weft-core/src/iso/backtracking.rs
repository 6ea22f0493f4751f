// SPDX-License-Identifier: Apache-2.0
//! Depth-first backtracking strategy with connectivity ordering.
use rustc_hash::FxHashSet;

use crate::graph::{GraphStore, NodeId};

use super::{locally_feasible, IsomorphismStrategy, NodeMapping};

/// Orders sub nodes by a connectivity-respecting depth-first traversal so
/// each newly placed node can be checked against already-placed neighbors
/// immediately (incremental consistency instead of a global re-check).
///
/// Also prunes singleton-candidate implications: a candidate that is the only
/// feasible target for some node is removed from every other node's
/// candidate set before the search starts (arc-consistency-lite).
#[derive(Debug, Clone, Copy, Default)]
pub struct DepthFirstStrategy;

impl IsomorphismStrategy for DepthFirstStrategy {
    fn mapping_from(&self, sub: &GraphStore, base: &GraphStore) -> Option<NodeMapping> {
        let order = dfs_order(sub);
        let mut candidates: Vec<Vec<NodeId>> = order
            .iter()
            .map(|sn| {
                base.node_ids()
                    .filter(|bn| locally_feasible(sub, *sn, base, *bn))
                    .collect()
            })
            .collect();
        if candidates.iter().any(Vec::is_empty) {
            return None;
        }
        if !prune_singletons(&mut candidates) {
            return None;
        }

        let mut placed: Vec<NodeId> = Vec::with_capacity(order.len());
        let mut used: FxHashSet<NodeId> = FxHashSet::default();
        if place(sub, base, &order, &candidates, &mut placed, &mut used) {
            Some(order.iter().copied().zip(placed).collect())
        } else {
            None
        }
    }
}

/// Depth-first traversal over undirected connectivity, starting from the
/// first node; components unreachable from it are appended in insertion
/// order and traversed the same way.
fn dfs_order(sub: &GraphStore) -> Vec<NodeId> {
    let mut order = Vec::new();
    let mut visited: FxHashSet<NodeId> = FxHashSet::default();
    for root in sub.node_ids() {
        if visited.contains(&root) {
            continue;
        }
        let mut stack = vec![root];
        while let Some(sn) = stack.pop() {
            if !visited.insert(sn) {
                continue;
            }
            order.push(sn);
            // Push neighbors in reverse so lower-labeled edges are visited
            // first; order only needs to be deterministic, not minimal.
            let mut neighbors: Vec<NodeId> = sub
                .out_adjacency(sn)
                .flat_map(|(_, targets)| targets.iter().copied())
                .chain(
                    sub.in_adjacency(sn)
                        .flat_map(|(_, sources)| sources.iter().copied()),
                )
                .collect();
            neighbors.sort_unstable();
            neighbors.dedup();
            for n in neighbors.into_iter().rev() {
                if !visited.contains(&n) {
                    stack.push(n);
                }
            }
        }
    }
    order
}

/// Removes each singleton candidate from every other list, to fixpoint.
/// Returns `false` if a list empties (no mapping can exist).
fn prune_singletons(candidates: &mut [Vec<NodeId>]) -> bool {
    loop {
        let mut changed = false;
        for i in 0..candidates.len() {
            if candidates[i].len() != 1 {
                continue;
            }
            let pinned = candidates[i][0];
            for (j, list) in candidates.iter_mut().enumerate() {
                if j == i || !list.contains(&pinned) {
                    continue;
                }
                list.retain(|c| *c != pinned);
                if list.is_empty() {
                    return false;
                }
                changed = true;
            }
        }
        if !changed {
            return true;
        }
    }
}

fn place(
    sub: &GraphStore,
    base: &GraphStore,
    order: &[NodeId],
    candidates: &[Vec<NodeId>],
    placed: &mut Vec<NodeId>,
    used: &mut FxHashSet<NodeId>,
) -> bool {
    let depth = placed.len();
    if depth == order.len() {
        return true;
    }
    let sn = order[depth];
    for bn in &candidates[depth] {
        if used.contains(bn) {
            continue;
        }
        if !consistent_with_placed(sub, base, order, placed, sn, *bn) {
            continue;
        }
        placed.push(*bn);
        used.insert(*bn);
        if place(sub, base, order, candidates, placed, used) {
            return true;
        }
        used.remove(bn);
        placed.pop();
    }
    false
}

/// Incremental consistency: every sub edge between `sn` and an
/// already-placed node must exist between `bn` and that node's image, with
/// sufficient multiplicity, in the matching direction.
fn consistent_with_placed(
    sub: &GraphStore,
    base: &GraphStore,
    order: &[NodeId],
    placed: &[NodeId],
    sn: NodeId,
    bn: NodeId,
) -> bool {
    for (pos, tn) in order[..placed.len()].iter().enumerate() {
        let bt = placed[pos];
        for (label, targets) in sub.out_adjacency(sn) {
            let need = targets.iter().filter(|t| **t == *tn).count();
            if need > 0 && base.edge_multiplicity(label, bn, bt) < need {
                return false;
            }
        }
        for (label, sources) in sub.in_adjacency(sn) {
            let need = sources.iter().filter(|s| **s == *tn).count();
            if need > 0 && base.edge_multiplicity(label, bt, bn) < need {
                return false;
            }
        }
    }
    // Self-loops must map to self-loops; local feasibility only counts
    // degrees and would let a 2-cycle impersonate one.
    for (label, targets) in sub.out_adjacency(sn) {
        let need = targets.iter().filter(|t| **t == sn).count();
        if need > 0 && base.edge_multiplicity(label, bn, bn) < need {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::AttrValue;

    #[test]
    fn dfs_order_walks_connectivity_before_stragglers() {
        let mut g = GraphStore::new();
        let a = g.add_node();
        let stray = g.add_node();
        let b = g.add_node();
        g.add_edge("e", a, b).unwrap();

        let order = dfs_order(&g);
        assert_eq!(order, vec![a, b, stray]);
    }

    #[test]
    fn singleton_pruning_clears_pinned_candidates() {
        let n = |v: u32| NodeId(v);
        let mut cands = vec![vec![n(0)], vec![n(0), n(1)], vec![n(0), n(1), n(2)]];
        assert!(prune_singletons(&mut cands));
        assert_eq!(cands, vec![vec![n(0)], vec![n(1)], vec![n(2)]]);
    }

    #[test]
    fn singleton_pruning_detects_dead_ends() {
        let n = |v: u32| NodeId(v);
        let mut cands = vec![vec![n(0)], vec![n(0)]];
        assert!(!prune_singletons(&mut cands));
    }

    #[test]
    fn maps_attributed_cycle_onto_itself_rotated() {
        let mut a = GraphStore::new();
        let a0 = a.add_node();
        let a1 = a.add_node();
        a.set_attr(a0, "tag", AttrValue::Int(1)).unwrap();
        a.add_edge("n", a0, a1).unwrap();
        a.add_edge("n", a1, a0).unwrap();

        let mut b = GraphStore::new();
        let b0 = b.add_node();
        let b1 = b.add_node();
        b.set_attr(b1, "tag", AttrValue::Int(1)).unwrap();
        b.add_edge("n", b0, b1).unwrap();
        b.add_edge("n", b1, b0).unwrap();

        let mapping = DepthFirstStrategy.mapping_from(&a, &b).unwrap();
        assert_eq!(mapping[&a0], b1);
        assert_eq!(mapping[&a1], b0);
        assert!(DepthFirstStrategy.is_isomorphic_to(&a, &b));
    }
}
