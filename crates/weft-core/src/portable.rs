// SPDX-License-Identifier: Apache-2.0
//! Portable interchange forms for graphs and patterns.
//!
//! The arena types ([`GraphStore`], [`PatternGraph`]) are tuned for in-place
//! search and carry tombstones; the portable forms here are dense, index-based
//! snapshots suitable for storage and transport. Encoding is CBOR via
//! `ciborium` (JSON float formatting is not canonical and is banned here).
//!
//! Round-tripping a graph renumbers nodes densely: tombstoned slots vanish
//! and ids compact, but attributes, labels, parallel-edge counts, and edge
//! order are preserved exactly.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::{GraphStore, NodeId};
use crate::pattern::{
    Action, AttrAction, AttrSpec, LabelSpec, PatternGraph, PatternNodeId,
};
use crate::value::AttrValue;

/// Errors from portable encoding, decoding, and rehydration.
#[derive(Debug, Error)]
pub enum PortableError {
    /// CBOR serialization failed.
    #[error("cbor encode failed: {0}")]
    Encode(#[from] ciborium::ser::Error<std::io::Error>),
    /// CBOR deserialization failed.
    #[error("cbor decode failed: {0}")]
    Decode(#[from] ciborium::de::Error<std::io::Error>),
    /// A decoded edge points past the node list.
    #[error("edge target out of range: {0}")]
    DanglingEdge(u32),
}

/// One node of a [`PortableGraph`]: attributes plus outgoing adjacency keyed
/// by label. Targets are dense indices into the node list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortableNode {
    /// Attribute map in name order.
    pub attrs: BTreeMap<String, AttrValue>,
    /// Label → ordered target indices. Duplicates are parallel edges.
    pub edges: BTreeMap<String, Vec<u32>>,
}

/// Dense, serializable snapshot of a [`GraphStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortableGraph {
    /// Nodes; a node's id is its index.
    pub nodes: Vec<PortableNode>,
}

impl PortableGraph {
    /// Snapshots a graph, compacting away tombstoned slots.
    #[must_use]
    pub fn from_graph(graph: &GraphStore) -> Self {
        let dense: BTreeMap<NodeId, u32> = graph
            .node_ids()
            .enumerate()
            .map(|(i, id)| (id, i as u32))
            .collect();
        let nodes = graph
            .node_ids()
            .map(|id| PortableNode {
                attrs: graph
                    .attrs(id)
                    .map(|(name, value)| (name.to_owned(), value.clone()))
                    .collect(),
                edges: graph
                    .out_adjacency(id)
                    .map(|(label, targets)| {
                        (
                            label.to_owned(),
                            targets.iter().map(|t| dense[t]).collect(),
                        )
                    })
                    .collect(),
            })
            .collect();
        Self { nodes }
    }

    /// Rebuilds an arena graph. Fails on edges pointing past the node list.
    pub fn into_graph(self) -> Result<GraphStore, PortableError> {
        let mut graph = GraphStore::new();
        let ids: Vec<NodeId> = self.nodes.iter().map(|_| graph.add_node()).collect();
        for (i, node) in self.nodes.into_iter().enumerate() {
            for (name, value) in node.attrs {
                // Freshly added nodes always exist.
                let _ = graph.set_attr(ids[i], &name, value);
            }
            for (label, targets) in node.edges {
                for t in targets {
                    let target = ids
                        .get(t as usize)
                        .copied()
                        .ok_or(PortableError::DanglingEdge(t))?;
                    let _ = graph.add_edge(&label, ids[i], target);
                }
            }
        }
        Ok(graph)
    }

    /// Encodes to CBOR bytes.
    pub fn to_cbor(&self) -> Result<Vec<u8>, PortableError> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(self, &mut buf)?;
        Ok(buf)
    }

    /// Decodes from CBOR bytes.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, PortableError> {
        Ok(ciborium::de::from_reader(bytes)?)
    }
}

/// Serializable form of a pattern attribute constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortablePatternAttr {
    /// Attribute name.
    pub name: String,
    /// Role of the attribute.
    pub action: AttrAction,
    /// Literal or expression value.
    pub value: AttrSpec,
}

/// Serializable form of a pattern edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortablePatternEdge {
    /// Label or label expression.
    pub label: LabelSpec,
    /// Role of the edge.
    pub action: Action,
    /// Target index into the pattern's node list.
    pub target: u32,
}

/// Serializable form of a pattern node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortablePatternNode {
    /// Role of the node.
    pub action: Action,
    /// Attribute-match expression, if any.
    pub expression: Option<String>,
    /// Attribute constraints and edits.
    pub attrs: Vec<PortablePatternAttr>,
    /// Outgoing edge constraints and edits.
    pub edges: Vec<PortablePatternEdge>,
}

/// Serializable snapshot of a [`PatternGraph`].
///
/// Pattern arenas have no tombstones, so the index mapping is the identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortablePattern {
    /// Nodes in authoring order.
    pub nodes: Vec<PortablePatternNode>,
}

impl PortablePattern {
    /// Snapshots a pattern.
    #[must_use]
    pub fn from_pattern(pattern: &PatternGraph) -> Self {
        let nodes = pattern
            .iter()
            .map(|(_, node)| PortablePatternNode {
                action: node.action,
                expression: node.expression.clone(),
                attrs: node
                    .attrs
                    .iter()
                    .map(|a| PortablePatternAttr {
                        name: a.name.clone(),
                        action: a.action,
                        value: a.value.clone(),
                    })
                    .collect(),
                edges: node
                    .edges
                    .iter()
                    .map(|e| PortablePatternEdge {
                        label: e.label.clone(),
                        action: e.action,
                        target: e.target.0,
                    })
                    .collect(),
            })
            .collect();
        Self { nodes }
    }

    /// Rebuilds a pattern. Fails on edges pointing past the node list.
    pub fn into_pattern(self) -> Result<PatternGraph, PortableError> {
        let count = self.nodes.len() as u32;
        let mut pattern = PatternGraph::new();
        let ids: Vec<PatternNodeId> = self
            .nodes
            .iter()
            .map(|n| pattern.add_node_with(n.action, n.expression.as_deref()))
            .collect();
        for (i, node) in self.nodes.into_iter().enumerate() {
            for attr in node.attrs {
                pattern.add_attr(ids[i], &attr.name, attr.action, attr.value);
            }
            for edge in node.edges {
                if edge.target >= count {
                    return Err(PortableError::DanglingEdge(edge.target));
                }
                pattern.add_edge_spec(edge.label, edge.action, ids[i], PatternNodeId(edge.target));
            }
        }
        Ok(pattern)
    }

    /// Encodes to CBOR bytes.
    pub fn to_cbor(&self) -> Result<Vec<u8>, PortableError> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(self, &mut buf)?;
        Ok(buf)
    }

    /// Decodes from CBOR bytes.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, PortableError> {
        Ok(ciborium::de::from_reader(bytes)?)
    }
}
