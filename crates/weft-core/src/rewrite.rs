// SPDX-License-Identifier: Apache-2.0
//! Transactional match application.
//!
//! [`Rewriter::apply`] clones the host graph before editing, so a produced
//! graph never aliases the one a match points into; discovered states stay
//! immutable once published to history.
use rustc_hash::FxHashMap;

use thiserror::Error;

use crate::expr::ExprEval;
use crate::graph::{GraphError, GraphStore, NodeId};
use crate::pattern::{Action, AttrAction, AttrSpec, LabelSpec, Match, PatternGraph, PatternNodeId};
use crate::value::AttrValue;

/// Errors emitted while applying a match.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewriteError {
    /// The match lacks a mapping for a pattern node the rewrite needs.
    ///
    /// This is a programming contract violation (a hand-built or stale
    /// match), not something the matcher can produce.
    #[error("no mapping for pattern node {0:?}")]
    UnmappedPatternNode(PatternNodeId),
    /// A structural edit failed (host node vanished mid-application).
    #[error("graph edit failed: {0}")]
    Graph(#[from] GraphError),
}

/// Applies matches to produce successor graphs.
pub struct Rewriter<'e> {
    eval: &'e dyn ExprEval,
}

impl<'e> Rewriter<'e> {
    /// Creates a rewriter using the given expression evaluator.
    #[must_use]
    pub fn new(eval: &'e dyn ExprEval) -> Self {
        Self { eval }
    }

    /// Applies `m` to a clone of `graph`, returning the successor graph.
    ///
    /// The source graph is never mutated. Node actions run first (deletes
    /// cascade, creates extend the mapping), then attribute edits, then edge
    /// edits, all in pattern authoring order. Elements on deleted or negative
    /// pattern nodes are skipped entirely.
    pub fn apply(
        &self,
        graph: &GraphStore,
        pattern: &PatternGraph,
        m: &Match,
    ) -> Result<GraphStore, RewriteError> {
        let mut out = graph.clone();
        // Clone preserves node identity, so the match mapping carries over
        // without remapping.
        let mut mapping: FxHashMap<PatternNodeId, NodeId> = m.iter().collect();
        let mut deleted: Vec<PatternNodeId> = Vec::new();

        // Pass 1: node actions.
        for (pid, pnode) in pattern.iter() {
            match pnode.action {
                Action::Delete => {
                    let node = *mapping
                        .get(&pid)
                        .ok_or(RewriteError::UnmappedPatternNode(pid))?;
                    out.remove_node(node);
                    deleted.push(pid);
                }
                Action::Create => {
                    let node = out.add_node();
                    mapping.insert(pid, node);
                }
                Action::Match => {
                    if !mapping.contains_key(&pid) {
                        return Err(RewriteError::UnmappedPatternNode(pid));
                    }
                }
                Action::Negative => {}
            }
        }

        let skip = |pid: PatternNodeId, pattern: &PatternGraph| {
            deleted.contains(&pid)
                || pattern
                    .node(pid)
                    .is_none_or(|n| matches!(n.action, Action::Negative))
        };

        // Pass 2: attribute edits.
        for (pid, pnode) in pattern.iter() {
            if skip(pid, pattern) {
                continue;
            }
            let node = *mapping
                .get(&pid)
                .ok_or(RewriteError::UnmappedPatternNode(pid))?;
            for attr in &pnode.attrs {
                match attr.action {
                    AttrAction::Delete => {
                        out.remove_attr(node, &attr.name);
                    }
                    AttrAction::Create => {
                        if let Some(value) = self.resolve_value(&out, node, &attr.value) {
                            out.set_attr(node, &attr.name, value)?;
                        }
                    }
                    AttrAction::Match | AttrAction::Forbid => {}
                }
            }
        }

        // Pass 3: edge edits.
        for (pid, pnode) in pattern.iter() {
            if skip(pid, pattern) {
                continue;
            }
            let source = *mapping
                .get(&pid)
                .ok_or(RewriteError::UnmappedPatternNode(pid))?;
            for edge in &pnode.edges {
                if skip(edge.target, pattern) {
                    continue;
                }
                let target = *mapping
                    .get(&edge.target)
                    .ok_or(RewriteError::UnmappedPatternNode(edge.target))?;
                match edge.action {
                    Action::Delete => {
                        let Some(label) = self.resolve_label(&edge.label, &out, source) else {
                            continue;
                        };
                        out.remove_edge(&label, source, target);
                    }
                    Action::Create => {
                        let Some(label) = self.resolve_label(&edge.label, &out, source) else {
                            continue;
                        };
                        out.add_edge(&label, source, target)?;
                    }
                    Action::Match | Action::Negative => {}
                }
            }
        }
        Ok(out)
    }

    /// Resolves a create-attribute value, evaluating expressions against the
    /// mapped node's current attributes. A failed evaluation yields `None`
    /// and the attribute edit is skipped; rewrites never abort on expression
    /// failures, matching the matcher's swallow-to-false convention.
    fn resolve_value(&self, graph: &GraphStore, node: NodeId, spec: &AttrSpec) -> Option<AttrValue> {
        match spec {
            AttrSpec::Literal(value) => Some(value.clone()),
            AttrSpec::Expr(expr) => {
                let bindings = graph.expr_bindings(node);
                self.eval
                    .evaluate(&bindings, expr)
                    .ok()
                    .map(|result| AttrValue::from_eval_result(&result))
            }
        }
    }

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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::SimpleEvaluator;
    use crate::matcher::Matcher;

    fn match_one(g: &GraphStore, p: &PatternGraph) -> Match {
        let eval = SimpleEvaluator;
        let mut matches = Matcher::new(&eval).find_matches(g, p, true);
        assert_eq!(matches.len(), 1, "expected exactly one match");
        matches.remove(0)
    }

    #[test]
    fn create_node_and_edge() {
        let mut g = GraphStore::new();
        let a = g.add_node();

        let mut p = PatternGraph::new();
        let pa = p.add_node(Action::Match);
        let pn = p.add_node(Action::Create);
        p.add_edge("spawned", Action::Create, pa, pn);
        p.add_attr(
            pn,
            "kind",
            AttrAction::Create,
            AttrSpec::Literal(AttrValue::Str("child".into())),
        );

        let eval = SimpleEvaluator;
        let m = match_one(&g, &p);
        let out = Rewriter::new(&eval).apply(&g, &p, &m).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(g.len(), 1, "source graph must stay untouched");
        let created = out.node_ids().find(|n| *n != a).unwrap();
        assert!(out.has_edge("spawned", a, created));
        assert_eq!(
            out.attr(created, "kind"),
            Some(&AttrValue::Str("child".into()))
        );
    }

    #[test]
    fn delete_node_skips_its_remaining_edits() {
        let mut g = GraphStore::new();
        let a = g.add_node();
        let b = g.add_node();
        g.add_edge("knows", a, b).unwrap();

        let mut p = PatternGraph::new();
        let pa = p.add_node(Action::Match);
        let pb = p.add_node(Action::Delete);
        p.add_edge("knows", Action::Match, pa, pb);
        // An edit hanging off the deleted node must be ignored.
        p.add_attr(
            pb,
            "ghost",
            AttrAction::Create,
            AttrSpec::Literal(AttrValue::Bool(true)),
        );

        let eval = SimpleEvaluator;
        let m = match_one(&g, &p);
        let out = Rewriter::new(&eval).apply(&g, &p, &m).unwrap();
        assert_eq!(out.len(), 1);
        assert!(!out.contains(b));
        assert!(out.edges_out(a, "knows").is_empty());
        // Source untouched.
        assert!(g.has_edge("knows", a, b));
    }

    #[test]
    fn computed_edge_labels_use_matched_attributes() {
        let mut g = GraphStore::new();
        let a = g.add_node();
        let b = g.add_node();
        g.set_attr(a, "from", AttrValue::Str("q0".into())).unwrap();
        g.set_attr(a, "to", AttrValue::Str("q1".into())).unwrap();
        let _ = b;

        let mut p = PatternGraph::new();
        let pa = p.add_node_with(Action::Match, Some("#{from}=='q0'"));
        let pb = p.add_node(Action::Create);
        p.add_edge_spec(
            LabelSpec::Expr("#{from}+'-'+#{to}".into()),
            Action::Create,
            pa,
            pb,
        );

        let eval = SimpleEvaluator;
        let m = match_one(&g, &p);
        let out = Rewriter::new(&eval).apply(&g, &p, &m).unwrap();
        let created = out.node_ids().max().unwrap();
        assert!(out.has_edge("q0-q1", a, created));
    }

    #[test]
    fn attribute_delete_and_create_in_one_rule() {
        let mut g = GraphStore::new();
        let a = g.add_node();
        g.set_attr(a, "state", AttrValue::Str("on".into())).unwrap();

        let mut p = PatternGraph::new();
        let pa = p.add_node_with(Action::Match, Some("#{state}=='on'"));
        p.add_attr(
            pa,
            "state",
            AttrAction::Delete,
            AttrSpec::Literal(AttrValue::Str("on".into())),
        );
        p.add_attr(
            pa,
            "mark",
            AttrAction::Create,
            AttrSpec::Expr("2*3".into()),
        );

        let eval = SimpleEvaluator;
        let m = match_one(&g, &p);
        let out = Rewriter::new(&eval).apply(&g, &p, &m).unwrap();
        assert_eq!(out.attr(a, "state"), None);
        assert_eq!(out.attr(a, "mark"), Some(&AttrValue::Float(6.0)));
    }

    #[test]
    fn incomplete_mapping_is_a_contract_violation() {
        let g = {
            let mut g = GraphStore::new();
            g.add_node();
            g
        };
        let mut p = PatternGraph::new();
        let pa = p.add_node(Action::Match);

        let eval = SimpleEvaluator;
        let bogus = Match::new(std::collections::BTreeMap::new());
        let err = Rewriter::new(&eval).apply(&g, &p, &bogus).unwrap_err();
        assert_eq!(err, RewriteError::UnmappedPatternNode(pa));
    }
}
