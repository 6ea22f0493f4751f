// SPDX-License-Identifier: Apache-2.0
//! Sorting/normalization-based strategy.
//!
//! Computes a canonical form per connected component via iterative
//! refinement (nodes repeatedly re-sorted by a structural signature over
//! their neighbors' current ranks, with deterministic individualization to
//! break surviving ties), then compares canonical serializations. After the
//! one-time normalization, isomorphism checks reduce to string/digest
//! equality, amortized across repeated comparisons against the same states.
use std::fmt::Write as _;

use rustc_hash::FxHashSet;

use crate::graph::{GraphStore, NodeId};
use crate::ident::Hash;
use crate::value::AttrValue;

use super::{is_full_witness, DepthFirstStrategy, IsomorphismStrategy, NodeMapping};

/// Canonical-form strategy.
///
/// `is_isomorphic_to` compares canonical digests; `mapping_from` uses the
/// canonical node orders to pair nodes when sizes match and falls back to
/// [`DepthFirstStrategy`] for strict subgraph embeddings, which the
/// normalization cannot answer by itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalStrategy;

impl IsomorphismStrategy for CanonicalStrategy {
    fn mapping_from(&self, sub: &GraphStore, base: &GraphStore) -> Option<NodeMapping> {
        if sub.len() == base.len() {
            let (form_a, order_a) = canonical_form_and_order(sub);
            let (form_b, order_b) = canonical_form_and_order(base);
            if form_a == form_b {
                let mapping: NodeMapping = order_a.into_iter().zip(order_b).collect();
                if is_full_witness(sub, base, &mapping) {
                    return Some(mapping);
                }
            }
            // Equal sizes but different canonical forms: not isomorphic, yet
            // a proper embedding may still exist (fewer edges in `sub`).
        }
        DepthFirstStrategy.mapping_from(sub, base)
    }

    fn is_isomorphic_to(&self, a: &GraphStore, b: &GraphStore) -> bool {
        a.len() == b.len() && canonical_digest(a) == canonical_digest(b)
    }
}

/// Canonical textual form of a graph, invariant under node renaming.
#[must_use]
pub fn canonical_form(graph: &GraphStore) -> String {
    canonical_form_and_order(graph).0
}

/// BLAKE3 digest of the canonical form (domain-separated).
#[must_use]
pub fn canonical_digest(graph: &GraphStore) -> Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"WEFT_CANON_V1\0");
    hasher.update(canonical_form(graph).as_bytes());
    *hasher.finalize().as_bytes()
}

/// Canonical form plus the node order that produced it (component orders
/// concatenated after sorting components by their canonical strings).
fn canonical_form_and_order(graph: &GraphStore) -> (String, Vec<NodeId>) {
    let mut pieces: Vec<(String, Vec<NodeId>)> = components(graph)
        .into_iter()
        .map(|nodes| {
            let ranks = initial_ranks(graph, &nodes);
            canon_search(graph, &nodes, ranks)
        })
        .collect();
    pieces.sort();
    let mut form = String::new();
    let mut order = Vec::new();
    for (piece, nodes) in pieces {
        form.push_str(&piece);
        form.push('\u{1d}'); // component separator
        order.extend(nodes);
    }
    (form, order)
}

/// Undirected connected components in insertion order.
fn components(graph: &GraphStore) -> Vec<Vec<NodeId>> {
    let mut seen: FxHashSet<NodeId> = FxHashSet::default();
    let mut out = Vec::new();
    for root in graph.node_ids() {
        if seen.contains(&root) {
            continue;
        }
        let mut component = Vec::new();
        let mut stack = vec![root];
        while let Some(n) = stack.pop() {
            if !seen.insert(n) {
                continue;
            }
            component.push(n);
            stack.extend(
                graph
                    .out_adjacency(n)
                    .flat_map(|(_, targets)| targets.iter().copied())
                    .chain(
                        graph
                            .in_adjacency(n)
                            .flat_map(|(_, sources)| sources.iter().copied()),
                    ),
            );
        }
        component.sort_unstable();
        out.push(component);
    }
    out
}

fn attr_sig(name: &str, value: &AttrValue) -> String {
    // Tag chars keep `Int(1)`, `Float(1.0)` and `Str("1")` distinct.
    let (tag, rendered) = match value {
        AttrValue::Bool(v) => ('b', v.to_string()),
        AttrValue::Int(v) => ('i', v.to_string()),
        AttrValue::Float(v) => ('f', crate::value::format_float(*v)),
        AttrValue::Str(v) => ('s', v.clone()),
    };
    format!("{name}\u{1f}{tag}{rendered}")
}

/// Initial structural signature: attributes plus per-label degree profile.
fn initial_ranks(graph: &GraphStore, nodes: &[NodeId]) -> Vec<usize> {
    let sigs: Vec<String> = nodes
        .iter()
        .map(|n| {
            let mut sig = String::new();
            for (name, value) in graph.attrs(*n) {
                let _ = write!(sig, "a{}\u{1e}", attr_sig(name, value));
            }
            for (label, targets) in graph.out_adjacency(*n) {
                let _ = write!(sig, "o{label}\u{1f}{}\u{1e}", targets.len());
            }
            for (label, sources) in graph.in_adjacency(*n) {
                let _ = write!(sig, "i{label}\u{1f}{}\u{1e}", sources.len());
            }
            sig
        })
        .collect();
    dense_ranks(&sigs)
}

/// Maps each signature to its dense sorted index.
fn dense_ranks(sigs: &[String]) -> Vec<usize> {
    let mut sorted: Vec<&String> = sigs.iter().collect();
    sorted.sort();
    sorted.dedup();
    sigs.iter()
        .map(|s| sorted.binary_search(&s).unwrap_or(0))
        .collect()
}

/// One refinement pass to fixpoint: signatures over neighbor ranks only ever
/// split classes (each signature is prefixed with the node's current rank),
/// so the loop terminates once the class count stops growing.
fn refine(graph: &GraphStore, nodes: &[NodeId], mut ranks: Vec<usize>) -> Vec<usize> {
    let index_of = |n: NodeId| nodes.binary_search(&n).unwrap_or(0);
    loop {
        let before = class_count(&ranks);
        let sigs: Vec<String> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| {
                let mut parts: Vec<String> = Vec::new();
                for (label, targets) in graph.out_adjacency(*n) {
                    for t in targets {
                        parts.push(format!("o{label}\u{1f}{}", ranks[index_of(*t)]));
                    }
                }
                for (label, sources) in graph.in_adjacency(*n) {
                    for s in sources {
                        parts.push(format!("i{label}\u{1f}{}", ranks[index_of(*s)]));
                    }
                }
                parts.sort();
                format!("{:08}\u{1e}{}", ranks[i], parts.join("\u{1e}"))
            })
            .collect();
        ranks = dense_ranks(&sigs);
        if class_count(&ranks) == before {
            return ranks;
        }
    }
}

fn class_count(ranks: &[usize]) -> usize {
    let mut seen: Vec<usize> = ranks.to_vec();
    seen.sort_unstable();
    seen.dedup();
    seen.len()
}

/// Refinement plus deterministic individualization.
///
/// When refinement leaves a tie, every member of the smallest tied class is
/// tried as the distinguished node in turn and the lexicographically
/// smallest serialization wins, keeping the result invariant under node
/// renaming.
fn canon_search(graph: &GraphStore, nodes: &[NodeId], ranks: Vec<usize>) -> (String, Vec<NodeId>) {
    let ranks = refine(graph, nodes, ranks);
    if class_count(&ranks) == nodes.len() {
        let mut order: Vec<(usize, NodeId)> =
            ranks.iter().copied().zip(nodes.iter().copied()).collect();
        order.sort_unstable();
        let ordered: Vec<NodeId> = order.into_iter().map(|(_, n)| n).collect();
        return (serialize(graph, &ordered), ordered);
    }

    // Smallest tied class.
    let tied_rank = (0..nodes.len())
        .map(|i| ranks[i])
        .filter(|r| ranks.iter().filter(|x| *x == r).count() > 1)
        .min()
        .unwrap_or(0);
    let mut best: Option<(String, Vec<NodeId>)> = None;
    for i in 0..nodes.len() {
        if ranks[i] != tied_rank {
            continue;
        }
        // Individualize node i: give it a fresh rank just below its class.
        let mut forced: Vec<usize> = ranks.iter().map(|r| r * 2 + 1).collect();
        forced[i] = tied_rank * 2;
        let sigs: Vec<String> = forced.iter().map(|r| format!("{r:08}")).collect();
        let candidate = canon_search(graph, nodes, dense_ranks(&sigs));
        let better = match &best {
            None => true,
            Some((form, _)) => candidate.0 < *form,
        };
        if better {
            best = Some(candidate);
        }
    }
    best.unwrap_or_else(|| {
        // Unreachable: a tied class always has members to individualize.
        let ordered: Vec<NodeId> = nodes.to_vec();
        (serialize(graph, &ordered), ordered)
    })
}

/// Serializes a component under a fixed node order, renumbering nodes by
/// position so the text is independent of arena ids.
fn serialize(graph: &GraphStore, order: &[NodeId]) -> String {
    let pos_of = |n: NodeId| order.iter().position(|x| *x == n).unwrap_or(usize::MAX);
    let mut out = String::new();
    for (pos, n) in order.iter().enumerate() {
        let _ = write!(out, "v{pos}");
        for (name, value) in graph.attrs(*n) {
            let _ = write!(out, "\u{1f}{}", attr_sig(name, value));
        }
        out.push('\u{1e}');
    }
    let mut edges: Vec<String> = Vec::new();
    for (pos, n) in order.iter().enumerate() {
        for (label, targets) in graph.out_adjacency(*n) {
            for t in targets {
                edges.push(format!("e{pos}\u{1f}{label}\u{1f}{}", pos_of(*t)));
            }
        }
    }
    edges.sort();
    for e in edges {
        out.push_str(&e);
        out.push('\u{1e}');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cycle(n: usize, label: &str) -> GraphStore {
        let mut g = GraphStore::new();
        let ids: Vec<NodeId> = (0..n).map(|_| g.add_node()).collect();
        for i in 0..n {
            g.add_edge(label, ids[i], ids[(i + 1) % n]).unwrap();
        }
        g
    }

    #[test]
    fn renamed_cycles_share_a_canonical_form() {
        let a = cycle(4, "n");
        // Same cycle built in a different insertion order.
        let mut b = GraphStore::new();
        let n0 = b.add_node();
        let n1 = b.add_node();
        let n2 = b.add_node();
        let n3 = b.add_node();
        b.add_edge("n", n2, n0).unwrap();
        b.add_edge("n", n0, n3).unwrap();
        b.add_edge("n", n3, n1).unwrap();
        b.add_edge("n", n1, n2).unwrap();

        assert_eq!(canonical_form(&a), canonical_form(&b));
        assert!(CanonicalStrategy.is_isomorphic_to(&a, &b));
        let mapping = CanonicalStrategy.mapping_from(&a, &b).unwrap();
        assert!(is_full_witness(&a, &b, &mapping));
    }

    #[test]
    fn different_cycle_lengths_have_different_forms() {
        let a = cycle(3, "n");
        let b = cycle(4, "n");
        assert_ne!(canonical_form(&a), canonical_form(&b));
        assert!(!CanonicalStrategy.is_isomorphic_to(&a, &b));
    }

    #[test]
    fn multi_component_graphs_compare_as_component_multisets() {
        let mut a = cycle(3, "n");
        let lone_a = a.add_node();
        let _ = lone_a;
        let mut b = GraphStore::new();
        let lone_b = b.add_node();
        let _ = lone_b;
        let ids: Vec<NodeId> = (0..3).map(|_| b.add_node()).collect();
        for i in 0..3 {
            b.add_edge("n", ids[i], ids[(i + 1) % 3]).unwrap();
        }
        assert!(CanonicalStrategy.is_isomorphic_to(&a, &b));
    }

    #[test]
    fn digest_distinguishes_edge_direction() {
        let mut a = GraphStore::new();
        let (a0, a1) = (a.add_node(), a.add_node());
        a.add_edge("d", a0, a1).unwrap();
        a.add_edge("d", a0, a1).unwrap();

        let mut b = GraphStore::new();
        let (b0, b1) = (b.add_node(), b.add_node());
        b.add_edge("d", b0, b1).unwrap();
        b.add_edge("d", b1, b0).unwrap();

        assert_ne!(canonical_digest(&a), canonical_digest(&b));
    }
}
