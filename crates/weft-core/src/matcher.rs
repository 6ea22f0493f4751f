// SPDX-License-Identifier: Apache-2.0
//! Pattern matching with positive and negative application conditions.
//!
//! Two-phase constraint search:
//! 1. loose per-node candidate generation (attribute predicates + required
//!    edge labels),
//! 2. odometer-style consistent-assignment search over positive nodes,
//!    followed by a separate witness search over negative nodes — any
//!    witness rejects the whole candidate match.
//!
//! Malformed predicate expressions are treated as "predicate is false": they
//! silently exclude candidates, never abort the search.
use std::collections::BTreeMap;

use rustc_hash::FxHashSet;

use crate::expr::ExprEval;
use crate::graph::{GraphStore, NodeId};
use crate::odometer::Odometer;
use crate::pattern::{
    Action, AttrAction, AttrSpec, LabelSpec, Match, PatternGraph, PatternNodeId,
};
use crate::value::AttrValue;

/// Finds consistent mappings from a pattern's nodes to a host graph's nodes.
pub struct Matcher<'e> {
    eval: &'e dyn ExprEval,
}

impl<'e> Matcher<'e> {
    /// Creates a matcher using the given expression evaluator.
    #[must_use]
    pub fn new(eval: &'e dyn ExprEval) -> Self {
        Self { eval }
    }

    /// Finds all (or the first) matches of `pattern` in `graph`.
    ///
    /// Zero matches is a normal outcome represented by an empty vector.
    #[must_use]
    pub fn find_matches(
        &self,
        graph: &GraphStore,
        pattern: &PatternGraph,
        first_only: bool,
    ) -> Vec<Match> {
        // Phase 1: loose candidates.
        let mut positives: Vec<PatternNodeId> = Vec::new();
        let mut negatives: Vec<PatternNodeId> = Vec::new();
        for (pid, node) in pattern.iter() {
            match node.action {
                Action::Match | Action::Delete => positives.push(pid),
                Action::Negative => negatives.push(pid),
                Action::Create => {}
            }
        }

        let mut pos_candidates: Vec<Vec<NodeId>> = Vec::with_capacity(positives.len());
        for pid in &positives {
            let cands = self.candidates(graph, pattern, *pid);
            if cands.is_empty() {
                // A required pattern node with no feasible host node means no
                // match can exist; fail fast.
                return Vec::new();
            }
            pos_candidates.push(cands);
        }
        let neg_candidates: Vec<Vec<NodeId>> = negatives
            .iter()
            .map(|pid| self.candidates(graph, pattern, *pid))
            .collect();

        // Phase 2: consistent assignment over positive nodes.
        let mut matches = Vec::new();
        let mut odo = Odometer::new(pos_candidates.iter().map(Vec::len).collect());
        while let Some(cursors) = odo.current() {
            let assignment: Vec<NodeId> = cursors
                .iter()
                .enumerate()
                .map(|(i, c)| pos_candidates[i][*c])
                .collect();
            match self.check_positive(graph, pattern, &positives, &assignment) {
                Err(failed_at) => {
                    odo.advance_at(failed_at);
                    continue;
                }
                Ok(()) => {}
            }

            // Phase 3: negative-node resolution.
            let mapping: BTreeMap<PatternNodeId, NodeId> = positives
                .iter()
                .copied()
                .zip(assignment.iter().copied())
                .collect();
            if !self.has_negative_witness(graph, pattern, &mapping, &negatives, &neg_candidates) {
                matches.push(Match::new(mapping));
                if first_only {
                    return matches;
                }
            }
            odo.advance();
        }
        matches
    }

    /// Computes a pattern node's loosely-feasible host candidates.
    ///
    /// A host node is feasible iff the node's attribute predicates hold and
    /// every required outgoing edge label is present (target unchecked).
    /// Edges into negative nodes belong to the application condition: they
    /// narrow the candidate set when they can, but never to emptiness — when
    /// no candidate carries such a label (removing the condition's node also
    /// cascades the edge away), the condition is left entirely to the
    /// witness search.
    fn candidates(
        &self,
        graph: &GraphStore,
        pattern: &PatternGraph,
        pid: PatternNodeId,
    ) -> Vec<NodeId> {
        let Some(pnode) = pattern.node(pid) else {
            return Vec::new();
        };
        let feasible = |n: NodeId, require_condition_edges: bool| -> bool {
            let bindings = graph.expr_bindings(n);
            if let Some(expr) = &pnode.expression {
                if !self.eval.is_true(&bindings, expr) {
                    return false;
                }
            }
            for attr in &pnode.attrs {
                let holds = self.attr_matches(graph, n, &attr.name, &attr.value);
                match attr.action {
                    AttrAction::Match | AttrAction::Delete => {
                        if !holds {
                            return false;
                        }
                    }
                    AttrAction::Forbid => {
                        if holds {
                            return false;
                        }
                    }
                    AttrAction::Create => {}
                }
            }
            for edge in &pnode.edges {
                if !matches!(edge.action, Action::Match | Action::Delete) {
                    continue;
                }
                let to_negative = pattern
                    .node(edge.target)
                    .is_some_and(|t| matches!(t.action, Action::Negative));
                if to_negative && !require_condition_edges {
                    continue;
                }
                let Some(label) = self.resolve_label(&edge.label, graph, n) else {
                    return false;
                };
                if graph.edges_out(n, &label).is_empty() {
                    return false;
                }
            }
            true
        };
        let strict: Vec<NodeId> = graph.node_ids().filter(|n| feasible(*n, true)).collect();
        if !strict.is_empty() {
            return strict;
        }
        graph.node_ids().filter(|n| feasible(*n, false)).collect()
    }

    /// Tests a required attribute against a host node.
    ///
    /// Literals compare by tag + payload; expressions compare by rendered
    /// result (numerically when both sides parse as numbers). Evaluation
    /// failure means the attribute does not match.
    fn attr_matches(
        &self,
        graph: &GraphStore,
        node: NodeId,
        name: &str,
        spec: &AttrSpec,
    ) -> bool {
        let Some(actual) = graph.attr(node, name) else {
            return false;
        };
        match spec {
            AttrSpec::Literal(expected) => actual == expected,
            AttrSpec::Expr(expr) => {
                let bindings = graph.expr_bindings(node);
                match self.eval.evaluate(&bindings, expr) {
                    Ok(expected) => renders_equal(actual, &expected),
                    Err(_) => false,
                }
            }
        }
    }

    /// Resolves an edge label against the source host node's bindings.
    ///
    /// `None` means the label expression failed to evaluate; the edge then
    /// behaves as unmatched.
    fn resolve_label(
        &self,
        label: &LabelSpec,
        graph: &GraphStore,
        source: NodeId,
    ) -> Option<String> {
        match label {
            LabelSpec::Literal(text) => Some(text.clone()),
            LabelSpec::Expr(expr) => {
                let bindings = graph.expr_bindings(source);
                self.eval.evaluate(&bindings, expr).ok()
            }
        }
    }

    /// Full consistency check for one positive assignment.
    ///
    /// On failure returns the highest positional index involved, so the
    /// odometer can skip every suffix combination sharing the failing prefix.
    fn check_positive(
        &self,
        graph: &GraphStore,
        pattern: &PatternGraph,
        positives: &[PatternNodeId],
        assignment: &[NodeId],
    ) -> Result<(), usize> {
        let pos_of = |pid: PatternNodeId| positives.iter().position(|p| *p == pid);

        // Injectivity: no two pattern nodes share a host node.
        let mut used: FxHashSet<NodeId> = FxHashSet::default();
        for (i, node) in assignment.iter().enumerate() {
            if !used.insert(*node) {
                return Err(i);
            }
        }

        for (i, pid) in positives.iter().enumerate() {
            let Some(pnode) = pattern.node(*pid) else {
                continue;
            };
            let source = assignment[i];
            for edge in &pnode.edges {
                let Some(j) = pos_of(edge.target) else {
                    // Target is a create or negative node; resolved elsewhere.
                    continue;
                };
                let target = assignment[j];
                let failed_at = i.max(j);
                match edge.action {
                    Action::Match | Action::Delete => {
                        let Some(label) = self.resolve_label(&edge.label, graph, source) else {
                            return Err(failed_at);
                        };
                        if !graph.has_edge(&label, source, target) {
                            return Err(failed_at);
                        }
                    }
                    Action::Negative => {
                        let Some(label) = self.resolve_label(&edge.label, graph, source) else {
                            continue;
                        };
                        if graph.has_edge(&label, source, target) {
                            return Err(failed_at);
                        }
                    }
                    Action::Create => {}
                }
            }
        }
        Ok(())
    }

    /// Searches for any witness of the pattern's negative nodes.
    ///
    /// A witness is a duplicate-free assignment of negative nodes (disjoint
    /// from the positive mapping) under which every non-create edge incident
    /// to a negative node exists in the host graph. One witness suffices to
    /// reject the candidate match.
    fn has_negative_witness(
        &self,
        graph: &GraphStore,
        pattern: &PatternGraph,
        mapping: &BTreeMap<PatternNodeId, NodeId>,
        negatives: &[PatternNodeId],
        neg_candidates: &[Vec<NodeId>],
    ) -> bool {
        if negatives.is_empty() {
            return false;
        }
        let used: FxHashSet<NodeId> = mapping.values().copied().collect();
        let filtered: Vec<Vec<NodeId>> = neg_candidates
            .iter()
            .map(|cands| {
                cands
                    .iter()
                    .copied()
                    .filter(|n| !used.contains(n))
                    .collect()
            })
            .collect();
        // A negative node with no candidates left means no witness can be
        // assembled at all.
        if filtered.iter().any(Vec::is_empty) {
            return false;
        }

        let mut odo = Odometer::new(filtered.iter().map(Vec::len).collect());
        while let Some(cursors) = odo.current() {
            let neg_assignment: Vec<NodeId> = cursors
                .iter()
                .enumerate()
                .map(|(i, c)| filtered[i][*c])
                .collect();
            let mut distinct: FxHashSet<NodeId> = FxHashSet::default();
            if neg_assignment.iter().all(|n| distinct.insert(*n))
                && self.witness_edges_hold(graph, pattern, mapping, negatives, &neg_assignment)
            {
                return true;
            }
            odo.advance();
        }
        false
    }

    /// Checks every non-create edge incident to a negative node under the
    /// combined positive + negative assignment, including edges from positive
    /// nodes into negative ones.
    fn witness_edges_hold(
        &self,
        graph: &GraphStore,
        pattern: &PatternGraph,
        mapping: &BTreeMap<PatternNodeId, NodeId>,
        negatives: &[PatternNodeId],
        neg_assignment: &[NodeId],
    ) -> bool {
        let resolve = |pid: PatternNodeId| -> Option<NodeId> {
            mapping.get(&pid).copied().or_else(|| {
                negatives
                    .iter()
                    .position(|n| *n == pid)
                    .map(|i| neg_assignment[i])
            })
        };
        for (from_pid, edge) in pattern.iter_edges() {
            if matches!(edge.action, Action::Create) {
                continue;
            }
            let from_is_neg = negatives.contains(&from_pid);
            let to_is_neg = negatives.contains(&edge.target);
            if !from_is_neg && !to_is_neg {
                continue;
            }
            let (Some(source), Some(target)) = (resolve(from_pid), resolve(edge.target)) else {
                // Create-node endpoint: not part of the matched graph yet.
                continue;
            };
            let Some(label) = self.resolve_label(&edge.label, graph, source) else {
                return false;
            };
            if !graph.has_edge(&label, source, target) {
                return false;
            }
        }
        true
    }
}

/// Compares a typed attribute against an evaluator result string.
fn renders_equal(actual: &AttrValue, expected: &str) -> bool {
    let rendered = actual.to_string();
    if rendered == expected {
        return true;
    }
    match (rendered.parse::<f64>(), expected.parse::<f64>()) {
        (Ok(a), Ok(b)) => (a - b).abs() == 0.0,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::SimpleEvaluator;
    use crate::value::AttrValue;

    fn two_node_graph() -> (GraphStore, NodeId, NodeId) {
        let mut g = GraphStore::new();
        let a = g.add_node();
        let b = g.add_node();
        g.add_edge("knows", a, b).unwrap();
        (g, a, b)
    }

    #[test]
    fn simple_edge_pattern_matches_once() {
        let (g, a, b) = two_node_graph();
        let mut p = PatternGraph::new();
        let pa = p.add_node(Action::Match);
        let pb = p.add_node(Action::Match);
        p.add_edge("knows", Action::Match, pa, pb);

        let eval = SimpleEvaluator;
        let matches = Matcher::new(&eval).find_matches(&g, &p, false);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].node(pa), Some(a));
        assert_eq!(matches[0].node(pb), Some(b));
    }

    #[test]
    fn required_node_with_no_candidates_fails_fast() {
        let (g, _, _) = two_node_graph();
        let mut p = PatternGraph::new();
        let pa = p.add_node(Action::Match);
        let pb = p.add_node(Action::Match);
        p.add_edge("likes", Action::Match, pa, pb);

        let eval = SimpleEvaluator;
        assert!(Matcher::new(&eval).find_matches(&g, &p, false).is_empty());
    }

    #[test]
    fn injectivity_forbids_mapping_two_pattern_nodes_to_one_host_node() {
        let mut g = GraphStore::new();
        let a = g.add_node();
        g.add_edge("me", a, a).unwrap();

        let mut p = PatternGraph::new();
        let pa = p.add_node(Action::Match);
        let pb = p.add_node(Action::Match);
        p.add_edge("me", Action::Match, pa, pb);

        let eval = SimpleEvaluator;
        assert!(Matcher::new(&eval).find_matches(&g, &p, false).is_empty());
    }

    #[test]
    fn negative_edge_between_positive_nodes_blocks_the_match() {
        let (mut g, a, b) = two_node_graph();
        let mut p = PatternGraph::new();
        let pa = p.add_node(Action::Match);
        let pb = p.add_node(Action::Match);
        p.add_edge("knows", Action::Match, pa, pb);
        p.add_edge("likes", Action::Negative, pa, pb);

        let eval = SimpleEvaluator;
        assert_eq!(Matcher::new(&eval).find_matches(&g, &p, false).len(), 1);

        g.add_edge("likes", a, b).unwrap();
        assert!(Matcher::new(&eval).find_matches(&g, &p, false).is_empty());
    }

    #[test]
    fn negative_node_rejects_on_any_witness() {
        // p --next--> k where k is a negative node with type=='blocker'.
        let mut g = GraphStore::new();
        let p0 = g.add_node();
        let k0 = g.add_node();
        g.set_attr(k0, "type", AttrValue::Str("blocker".into()))
            .unwrap();
        g.add_edge("next", p0, k0).unwrap();

        let mut pat = PatternGraph::new();
        let pp = pat.add_node(Action::Match);
        let pk = pat.add_node_with(Action::Negative, Some("#{type}=='blocker'"));
        pat.add_edge("next", Action::Match, pp, pk);

        let eval = SimpleEvaluator;
        assert!(Matcher::new(&eval).find_matches(&g, &pat, false).is_empty());

        // Removing the blocking type makes exactly one match appear.
        g.remove_attr(k0, "type");
        let matches = Matcher::new(&eval).find_matches(&g, &pat, false);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn removing_the_negative_witness_node_frees_the_match() {
        let mut g = GraphStore::new();
        let p0 = g.add_node();
        let k0 = g.add_node();
        g.set_attr(k0, "type", AttrValue::Str("blocker".into()))
            .unwrap();
        g.add_edge("next", p0, k0).unwrap();

        let mut pat = PatternGraph::new();
        let pp = pat.add_node(Action::Match);
        let pk = pat.add_node_with(Action::Negative, Some("#{type}=='blocker'"));
        pat.add_edge("next", Action::Match, pp, pk);

        let eval = SimpleEvaluator;
        assert!(Matcher::new(&eval).find_matches(&g, &pat, false).is_empty());

        // Removing the blocker cascades its `next` edge away; the condition
        // then has no possible witness and the match must appear anyway.
        g.remove_node(k0);
        let matches = Matcher::new(&eval).find_matches(&g, &pat, false);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].node(pp), Some(p0));
    }

    #[test]
    fn negative_witness_needs_both_the_node_and_its_edges() {
        // A blocker exists but is not reachable via `next`: no witness.
        let mut g = GraphStore::new();
        let a = g.add_node();
        let b = g.add_node();
        let stray = g.add_node();
        g.set_attr(stray, "type", AttrValue::Str("blocker".into()))
            .unwrap();
        g.add_edge("next", a, b).unwrap();

        let mut pat = PatternGraph::new();
        let pp = pat.add_node(Action::Match);
        let pk = pat.add_node_with(Action::Negative, Some("#{type}=='blocker'"));
        pat.add_edge("next", Action::Match, pp, pk);

        let eval = SimpleEvaluator;
        let matches = Matcher::new(&eval).find_matches(&g, &pat, false);
        // `a` is the only host node with an outgoing `next` edge, and the
        // stray blocker is not its `next` target, so the match survives.
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].node(pp), Some(a));
    }

    #[test]
    fn attribute_predicate_failure_is_false_not_an_error() {
        let (g, _, _) = two_node_graph();
        let mut p = PatternGraph::new();
        let _ = p.add_node_with(Action::Match, Some("#{missing}==1"));

        let eval = SimpleEvaluator;
        assert!(Matcher::new(&eval).find_matches(&g, &p, false).is_empty());
    }

    #[test]
    fn first_only_returns_a_single_match() {
        let mut g = GraphStore::new();
        let a = g.add_node();
        let b = g.add_node();
        let c = g.add_node();
        g.add_edge("knows", a, b).unwrap();
        g.add_edge("knows", a, c).unwrap();

        let mut p = PatternGraph::new();
        let pa = p.add_node(Action::Match);
        let pb = p.add_node(Action::Match);
        p.add_edge("knows", Action::Match, pa, pb);

        let eval = SimpleEvaluator;
        assert_eq!(Matcher::new(&eval).find_matches(&g, &p, true).len(), 1);
        assert_eq!(Matcher::new(&eval).find_matches(&g, &p, false).len(), 2);
    }

    #[test]
    fn forbidden_attribute_excludes_candidates() {
        let mut g = GraphStore::new();
        let a = g.add_node();
        let b = g.add_node();
        g.set_attr(a, "locked", AttrValue::Bool(true)).unwrap();
        let _ = b;

        let mut p = PatternGraph::new();
        let pn = p.add_node(Action::Match);
        p.add_attr(
            pn,
            "locked",
            AttrAction::Forbid,
            AttrSpec::Literal(AttrValue::Bool(true)),
        );

        let eval = SimpleEvaluator;
        let matches = Matcher::new(&eval).find_matches(&g, &p, false);
        assert_eq!(matches.len(), 1);
    }
}
