// SPDX-License-Identifier: Apache-2.0
//! Pattern graphs: declarative rewrite-rule templates.
//!
//! A [`PatternGraph`] is a second graph type whose nodes, edges, and
//! attributes carry an [`Action`]. Match-time elements constrain the host
//! graph, create-time elements describe edits, and negative elements are
//! application conditions that must have no witness. Patterns are built once
//! by rule authors and read-only thereafter.
use std::collections::BTreeMap;

use crate::graph::NodeId;
use crate::ident::{make_rule_id, Hash};
use crate::value::AttrValue;

/// Stable arena handle for a node within one [`PatternGraph`].
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct PatternNodeId(pub u32);

impl PatternNodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Role a pattern node or edge plays during matching and rewriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Action {
    /// Must exist in the host graph; preserved by the rewrite.
    Match,
    /// Does not exist yet; created by the rewrite. Never consulted by
    /// match-time predicates.
    Create,
    /// Must exist in the host graph; removed by the rewrite.
    Delete,
    /// Negative application condition: must have no witness.
    Negative,
}

/// Role a pattern attribute plays.
///
/// Attributes have no node-style `Negative`; [`AttrAction::Forbid`] is the
/// attribute-level negative predicate (the attribute must *not* match).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AttrAction {
    /// Must be present with a matching value; kept by the rewrite.
    Match,
    /// Set by the rewrite; ignored at match time.
    Create,
    /// Must be present with a matching value; removed by the rewrite.
    Delete,
    /// Must be absent or hold a different value.
    Forbid,
}

/// An attribute's value, either a typed literal or an expression evaluated
/// against the candidate node's bindings.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum AttrSpec {
    /// Literal value; compared by tag + payload equality at match time.
    Literal(AttrValue),
    /// Expression over `#{name}` placeholders; compared by rendered result.
    Expr(String),
}

/// An edge's label, either literal text or an expression computing the label
/// from the source node's matched attributes (used e.g. to build concatenated
/// transition labels during state elimination).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum LabelSpec {
    /// Literal label text.
    Literal(String),
    /// Expression rendered against the source node's bindings.
    Expr(String),
}

/// An attribute constraint / edit on a pattern node.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternAttr {
    /// Attribute name.
    pub name: String,
    /// Role of this attribute.
    pub action: AttrAction,
    /// Required value (match/delete/forbid) or value to set (create).
    pub value: AttrSpec,
}

/// A directed edge constraint / edit between pattern nodes.
///
/// Only outgoing edges are authored; inbound constraints are derived.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternEdge {
    /// Label or label expression.
    pub label: LabelSpec,
    /// Role of this edge.
    pub action: Action,
    /// Target pattern node. Must belong to the same [`PatternGraph`]; the
    /// engine does not validate this defensively.
    pub target: PatternNodeId,
}

/// A node template within a pattern.
#[derive(Debug, Clone)]
pub struct PatternNode {
    /// Role of this node.
    pub action: Action,
    /// Boolean attribute-match expression over `#{name}` placeholders, or
    /// `None` for "always true".
    pub expression: Option<String>,
    /// Attribute constraints and edits.
    pub attrs: Vec<PatternAttr>,
    /// Outgoing edge constraints and edits.
    pub edges: Vec<PatternEdge>,
}

/// A declarative graph-rewrite rule template.
#[derive(Debug, Clone, Default)]
pub struct PatternGraph {
    nodes: Vec<PatternNode>,
}

impl PatternGraph {
    /// Creates an empty pattern.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node with the given action and no predicate.
    pub fn add_node(&mut self, action: Action) -> PatternNodeId {
        self.add_node_with(action, None)
    }

    /// Adds a node with the given action and attribute-match expression.
    pub fn add_node_with(
        &mut self,
        action: Action,
        expression: Option<&str>,
    ) -> PatternNodeId {
        let id = PatternNodeId(self.nodes.len() as u32);
        self.nodes.push(PatternNode {
            action,
            expression: expression.map(str::to_owned),
            attrs: Vec::new(),
            edges: Vec::new(),
        });
        id
    }

    /// Adds an attribute constraint / edit to `node`.
    pub fn add_attr(&mut self, node: PatternNodeId, name: &str, action: AttrAction, value: AttrSpec) {
        if let Some(n) = self.nodes.get_mut(node.index()) {
            n.attrs.push(PatternAttr {
                name: name.to_owned(),
                action,
                value,
            });
        }
    }

    /// Adds an outgoing edge constraint / edit from `from` to `to` with a
    /// literal label.
    pub fn add_edge(&mut self, label: &str, action: Action, from: PatternNodeId, to: PatternNodeId) {
        self.add_edge_spec(LabelSpec::Literal(label.to_owned()), action, from, to);
    }

    /// Adds an outgoing edge with an explicit [`LabelSpec`].
    pub fn add_edge_spec(
        &mut self,
        label: LabelSpec,
        action: Action,
        from: PatternNodeId,
        to: PatternNodeId,
    ) {
        if let Some(n) = self.nodes.get_mut(from.index()) {
            n.edges.push(PatternEdge {
                label,
                action,
                target: to,
            });
        }
    }

    /// Returns the node template, if the handle is valid.
    #[must_use]
    pub fn node(&self, id: PatternNodeId) -> Option<&PatternNode> {
        self.nodes.get(id.index())
    }

    /// Iterates nodes as `(id, node)` in authoring order.
    pub fn iter(&self) -> impl Iterator<Item = (PatternNodeId, &PatternNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (PatternNodeId(i as u32), n))
    }

    /// Number of pattern nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the pattern has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates every edge as `(source id, edge)` in authoring order.
    pub fn iter_edges(&self) -> impl Iterator<Item = (PatternNodeId, &PatternEdge)> {
        self.iter()
            .flat_map(|(id, node)| node.edges.iter().map(move |e| (id, e)))
    }
}

/// A named rewrite rule: a pattern plus its stable identity.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Deterministic identifier (`blake3("rule:" || name)`).
    pub id: Hash,
    /// Human-readable name; labels reachability-graph transitions.
    pub name: String,
    /// The rule's pattern.
    pub pattern: PatternGraph,
}

impl Rule {
    /// Builds a rule, deriving its id from the name.
    #[must_use]
    pub fn new(name: &str, pattern: PatternGraph) -> Self {
        Self {
            id: make_rule_id(name),
            name: name.to_owned(),
            pattern,
        }
    }
}

/// An immutable record of one successful pattern match: a mapping from
/// pattern nodes to host-graph nodes.
///
/// Produced by the matcher and consumed exactly once by the rewriter; the
/// rewriter clones the host graph before applying, so a match is spent after
/// one application. Negative pattern nodes never appear in the mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    mapping: BTreeMap<PatternNodeId, NodeId>,
}

impl Match {
    pub(crate) fn new(mapping: BTreeMap<PatternNodeId, NodeId>) -> Self {
        Self { mapping }
    }

    /// The host node a pattern node was matched to, if any.
    #[must_use]
    pub fn node(&self, id: PatternNodeId) -> Option<NodeId> {
        self.mapping.get(&id).copied()
    }

    /// Iterates `(pattern node, host node)` pairs in pattern-node order.
    pub fn iter(&self) -> impl Iterator<Item = (PatternNodeId, NodeId)> + '_ {
        self.mapping.iter().map(|(p, n)| (*p, *n))
    }

    /// Number of mapped pattern nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    /// Returns `true` if nothing was mapped (empty pattern).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}
