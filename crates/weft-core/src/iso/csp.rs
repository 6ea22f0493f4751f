// SPDX-License-Identifier: Apache-2.0
//! CSP-style strategies with dynamic variable ordering.
//!
//! Instead of fixing the search order upfront, each step picks the next
//! pattern variable by minimum-remaining-values with minimum-degree
//! tie-breaking. The conflict variant additionally ranks a variable's
//! candidates by how many options they would knock out of neighboring
//! domains, searching least-conflicting options first.
use rustc_hash::FxHashSet;

use crate::graph::{GraphStore, NodeId};

use super::{locally_feasible, IsomorphismStrategy, NodeMapping};

/// Candidate ordering used inside the shared CSP search core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CandidateOrder {
    /// Try candidates in domain order.
    Domain,
    /// Try candidates ranked by ascending conflict count.
    ConflictRanked,
}

/// Minimum-remaining-values variable ordering with minimum-degree
/// tie-breaking.
#[derive(Debug, Clone, Copy, Default)]
pub struct CspLowHighStrategy;

impl IsomorphismStrategy for CspLowHighStrategy {
    fn mapping_from(&self, sub: &GraphStore, base: &GraphStore) -> Option<NodeMapping> {
        solve(sub, base, CandidateOrder::Domain)
    }
}

/// [`CspLowHighStrategy`] plus conflict-ranked candidate ordering.
#[derive(Debug, Clone, Copy, Default)]
pub struct CspConflictStrategy;

impl IsomorphismStrategy for CspConflictStrategy {
    fn mapping_from(&self, sub: &GraphStore, base: &GraphStore) -> Option<NodeMapping> {
        solve(sub, base, CandidateOrder::ConflictRanked)
    }
}

fn solve(sub: &GraphStore, base: &GraphStore, order: CandidateOrder) -> Option<NodeMapping> {
    let vars: Vec<NodeId> = sub.node_ids().collect();
    let domains: Vec<Vec<NodeId>> = vars
        .iter()
        .map(|sn| {
            base.node_ids()
                .filter(|bn| locally_feasible(sub, *sn, base, *bn))
                .collect()
        })
        .collect();
    if domains.iter().any(Vec::is_empty) && !vars.is_empty() {
        return None;
    }
    let mut assignment: Vec<Option<NodeId>> = vec![None; vars.len()];
    if search(sub, base, &vars, domains, &mut assignment, order) {
        Some(
            vars.iter()
                .copied()
                .zip(assignment.into_iter().flatten())
                .collect(),
        )
    } else {
        None
    }
}

fn search(
    sub: &GraphStore,
    base: &GraphStore,
    vars: &[NodeId],
    domains: Vec<Vec<NodeId>>,
    assignment: &mut Vec<Option<NodeId>>,
    order: CandidateOrder,
) -> bool {
    let Some(pick) = pick_variable(sub, vars, &domains, assignment) else {
        return true; // every variable assigned
    };
    let mut candidates = domains[pick].clone();
    if order == CandidateOrder::ConflictRanked {
        rank_by_conflicts(sub, base, vars, &domains, assignment, pick, &mut candidates);
    }

    for bn in candidates {
        if !self_loops_ok(sub, base, vars[pick], bn) {
            continue;
        }
        assignment[pick] = Some(bn);
        if let Some(filtered) = forward_filter(sub, base, vars, &domains, assignment, pick, bn) {
            if search(sub, base, vars, filtered, assignment, order) {
                return true;
            }
        }
        assignment[pick] = None;
    }
    false
}

/// Minimum-remaining-values, tie broken by the fewest yet-unconstrained
/// edges (edges to still-unassigned neighbors).
fn pick_variable(
    sub: &GraphStore,
    vars: &[NodeId],
    domains: &[Vec<NodeId>],
    assignment: &[Option<NodeId>],
) -> Option<usize> {
    let unassigned_degree = |i: usize| -> usize {
        let unassigned: FxHashSet<NodeId> = vars
            .iter()
            .enumerate()
            .filter(|(j, _)| assignment[*j].is_none() && *j != i)
            .map(|(_, v)| *v)
            .collect();
        sub.out_adjacency(vars[i])
            .flat_map(|(_, targets)| targets.iter())
            .filter(|t| unassigned.contains(t))
            .count()
            + sub
                .in_adjacency(vars[i])
                .flat_map(|(_, sources)| sources.iter())
                .filter(|s| unassigned.contains(s))
                .count()
    };
    (0..vars.len())
        .filter(|i| assignment[*i].is_none())
        .min_by_key(|i| (domains[*i].len(), unassigned_degree(*i)))
}

/// Sorts candidates by ascending conflict count against neighboring
/// variables' current domains.
fn rank_by_conflicts(
    sub: &GraphStore,
    base: &GraphStore,
    vars: &[NodeId],
    domains: &[Vec<NodeId>],
    assignment: &[Option<NodeId>],
    pick: usize,
    candidates: &mut [NodeId],
) {
    let conflict_count = |bn: NodeId| -> usize {
        let mut conflicts = 0;
        for (j, q) in vars.iter().enumerate() {
            if j == pick || assignment[j].is_some() || !adjacent(sub, vars[pick], *q) {
                continue;
            }
            conflicts += domains[j]
                .iter()
                .filter(|c| **c == bn || !edge_pair_ok(sub, base, vars[pick], *q, bn, **c))
                .count();
        }
        conflicts
    };
    candidates.sort_by_key(|bn| conflict_count(*bn));
}

fn adjacent(sub: &GraphStore, v: NodeId, q: NodeId) -> bool {
    sub.out_adjacency(v)
        .any(|(_, targets)| targets.contains(&q))
        || sub.in_adjacency(v).any(|(_, sources)| sources.contains(&q))
}

/// Every sub edge between `v` and `q` must hold between their images with
/// sufficient multiplicity, in both directions.
fn edge_pair_ok(
    sub: &GraphStore,
    base: &GraphStore,
    v: NodeId,
    q: NodeId,
    b: NodeId,
    c: NodeId,
) -> bool {
    for (label, targets) in sub.out_adjacency(v) {
        let need = targets.iter().filter(|t| **t == q).count();
        if need > 0 && base.edge_multiplicity(label, b, c) < need {
            return false;
        }
    }
    for (label, sources) in sub.in_adjacency(v) {
        let need = sources.iter().filter(|s| **s == q).count();
        if need > 0 && base.edge_multiplicity(label, c, b) < need {
            return false;
        }
    }
    true
}

fn self_loops_ok(sub: &GraphStore, base: &GraphStore, v: NodeId, b: NodeId) -> bool {
    for (label, targets) in sub.out_adjacency(v) {
        let need = targets.iter().filter(|t| **t == v).count();
        if need > 0 && base.edge_multiplicity(label, b, b) < need {
            return false;
        }
    }
    true
}

/// Removes the assigned base node from every other domain and prunes
/// neighbor domains down to edge-consistent candidates. `None` when a
/// domain empties (the assignment cannot extend to a full mapping).
fn forward_filter(
    sub: &GraphStore,
    base: &GraphStore,
    vars: &[NodeId],
    domains: &[Vec<NodeId>],
    assignment: &[Option<NodeId>],
    pick: usize,
    bn: NodeId,
) -> Option<Vec<Vec<NodeId>>> {
    let mut filtered = domains.to_vec();
    for (j, domain) in filtered.iter_mut().enumerate() {
        if j == pick || assignment[j].is_some() {
            continue;
        }
        domain.retain(|c| *c != bn && edge_pair_ok(sub, base, vars[pick], vars[j], bn, *c));
        if domain.is_empty() {
            return None;
        }
    }
    Some(filtered)
}
