// SPDX-License-Identifier: Apache-2.0
//! Attributed, labeled, directed multigraph store.
//!
//! Nodes live in an arena of slots addressed by [`NodeId`]; removal
//! tombstones the slot so surviving ids stay stable across the graph's
//! lifetime and across clones (clone is identity-preserving: the same
//! `NodeId` addresses the corresponding node in the copy). Edges are stored
//! as index pairs, so `Clone` needs no pointer remapping.
use std::collections::BTreeMap;
use std::fmt::Write as _;

use thiserror::Error;

use crate::expr::Bindings;
use crate::ident::Hash;
use crate::value::AttrValue;

/// Stable arena handle for a node within one [`GraphStore`] (and its clones).
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeId(pub u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Errors emitted by structural graph mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The referenced node does not exist (never added, or removed).
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),
}

/// A node's attribute map and adjacency, kept private to the store so the
/// forward/backward edge indices can never be observed inconsistent.
#[derive(Debug, Clone, Default)]
struct NodeRecord {
    attrs: BTreeMap<String, AttrValue>,
    /// Label → ordered target list. Duplicates are parallel edges.
    /// Invariant: no empty buckets — an absent label IS the empty list.
    edges_out: BTreeMap<String, Vec<NodeId>>,
    /// Reverse adjacency, maintained in lockstep with `edges_out`.
    edges_in: BTreeMap<String, Vec<NodeId>>,
}

/// In-memory multigraph storage.
///
/// Every mutation keeps the outbound and inbound adjacency in lockstep;
/// [`GraphStore::remove_node`] cascades over incident edges in both
/// directions.
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    slots: Vec<Option<NodeRecord>>,
}

impl GraphStore {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh node with no attributes or edges.
    ///
    /// The arena addresses at most `u32::MAX` slots (live plus tombstoned);
    /// ids are never reused or aliased.
    ///
    /// # Panics
    /// When the id space is exhausted.
    pub fn add_node(&mut self) -> NodeId {
        let index = u32::try_from(self.slots.len());
        assert!(index.is_ok(), "node id space exhausted");
        let id = NodeId(index.unwrap_or(u32::MAX));
        self.slots.push(Some(NodeRecord::default()));
        id
    }

    /// Returns `true` if `id` addresses a live node.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        matches!(self.slots.get(id.index()), Some(Some(_)))
    }

    /// Number of live nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Returns `true` if the graph has no live nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Iterates live node ids in insertion order.
    ///
    /// Several search algorithms rely on this order being stable while they
    /// hold positional candidate indices across backtracking steps.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|_| NodeId(i as u32)))
    }

    fn record(&self, id: NodeId) -> Option<&NodeRecord> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    fn record_mut(&mut self, id: NodeId) -> Result<&mut NodeRecord, GraphError> {
        self.slots
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(GraphError::NodeNotFound(id))
    }

    /// Removes a node, cascading over every incident edge in both directions.
    ///
    /// Returns `true` if the node existed and was removed.
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        let Some(record) = self
            .slots
            .get_mut(id.index())
            .and_then(Option::take)
        else {
            return false;
        };
        // Outgoing edges: drop our entry from each target's inbound bucket.
        for (label, targets) in &record.edges_out {
            for target in targets {
                if *target == id {
                    continue; // self-loop, record already detached
                }
                if let Some(Some(t)) = self.slots.get_mut(target.index()) {
                    remove_all(&mut t.edges_in, label, id);
                }
            }
        }
        // Inbound edges: drop every parallel edge from each source's
        // outbound bucket.
        for (label, sources) in &record.edges_in {
            for source in sources {
                if *source == id {
                    continue;
                }
                if let Some(Some(s)) = self.slots.get_mut(source.index()) {
                    remove_all(&mut s.edges_out, label, id);
                }
            }
        }
        true
    }

    /// Adds a directed edge `from --label--> to`.
    ///
    /// Parallel edges are allowed: adding the same triple twice stores two
    /// edges.
    pub fn add_edge(&mut self, label: &str, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        if !self.contains(to) {
            return Err(GraphError::NodeNotFound(to));
        }
        self.record_mut(from)?
            .edges_out
            .entry(label.to_owned())
            .or_default()
            .push(to);
        self.record_mut(to)?
            .edges_in
            .entry(label.to_owned())
            .or_default()
            .push(from);
        Ok(())
    }

    /// Removes one edge `from --label--> to` (the first parallel occurrence).
    ///
    /// Returns `true` if an edge was removed.
    pub fn remove_edge(&mut self, label: &str, from: NodeId, to: NodeId) -> bool {
        let removed = match self.record_mut(from) {
            Ok(record) => remove_one(&mut record.edges_out, label, to),
            Err(_) => false,
        };
        if !removed {
            return false;
        }
        if let Ok(record) = self.record_mut(to) {
            remove_one(&mut record.edges_in, label, from);
        }
        true
    }

    /// Returns `true` if at least one edge `from --label--> to` exists.
    #[must_use]
    pub fn has_edge(&self, label: &str, from: NodeId, to: NodeId) -> bool {
        self.record(from)
            .and_then(|r| r.edges_out.get(label))
            .is_some_and(|targets| targets.contains(&to))
    }

    /// Counts parallel edges `from --label--> to`.
    #[must_use]
    pub fn edge_multiplicity(&self, label: &str, from: NodeId, to: NodeId) -> usize {
        self.record(from)
            .and_then(|r| r.edges_out.get(label))
            .map_or(0, |targets| targets.iter().filter(|t| **t == to).count())
    }

    /// Ordered outgoing targets under `label`. Absent label ≡ empty list.
    #[must_use]
    pub fn edges_out(&self, id: NodeId, label: &str) -> &[NodeId] {
        self.record(id)
            .and_then(|r| r.edges_out.get(label))
            .map_or(&[], Vec::as_slice)
    }

    /// Ordered inbound sources under `label`. Absent label ≡ empty list.
    #[must_use]
    pub fn edges_in(&self, id: NodeId, label: &str) -> &[NodeId] {
        self.record(id)
            .and_then(|r| r.edges_in.get(label))
            .map_or(&[], Vec::as_slice)
    }

    /// Iterates the node's outbound adjacency as `(label, targets)` in label
    /// order.
    pub fn out_adjacency(&self, id: NodeId) -> impl Iterator<Item = (&str, &[NodeId])> {
        self.record(id)
            .into_iter()
            .flat_map(|r| r.edges_out.iter())
            .map(|(label, targets)| (label.as_str(), targets.as_slice()))
    }

    /// Iterates the node's inbound adjacency as `(label, sources)` in label
    /// order.
    pub fn in_adjacency(&self, id: NodeId) -> impl Iterator<Item = (&str, &[NodeId])> {
        self.record(id)
            .into_iter()
            .flat_map(|r| r.edges_in.iter())
            .map(|(label, sources)| (label.as_str(), sources.as_slice()))
    }

    /// Returns the node's attribute value, if present.
    #[must_use]
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&AttrValue> {
        self.record(id).and_then(|r| r.attrs.get(name))
    }

    /// Iterates the node's attributes in name order.
    pub fn attrs(&self, id: NodeId) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.record(id)
            .into_iter()
            .flat_map(|r| r.attrs.iter())
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Sets (or replaces) an attribute on a node.
    pub fn set_attr(
        &mut self,
        id: NodeId,
        name: &str,
        value: AttrValue,
    ) -> Result<(), GraphError> {
        self.record_mut(id)?.attrs.insert(name.to_owned(), value);
        Ok(())
    }

    /// Removes an attribute. Returns `true` if it was present.
    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> bool {
        self.record_mut(id)
            .map(|r| r.attrs.remove(name).is_some())
            .unwrap_or(false)
    }

    /// Builds expression bindings from the node's current attributes.
    ///
    /// Strings are quoted and booleans map to `1.0` / `0.0`, per the
    /// evaluator contract.
    #[must_use]
    pub fn expr_bindings(&self, id: NodeId) -> Bindings {
        self.attrs(id)
            .map(|(name, value)| (name.to_owned(), value.binding_token()))
            .collect()
    }

    /// Canonical textual dump of the graph.
    ///
    /// Deterministic for a given graph value: nodes in insertion order with
    /// attributes in name order and edge buckets in label order. Used as the
    /// state snapshot stored in reachability-graph nodes. Not isomorphism
    /// invariant — two isomorphic graphs may dump differently.
    #[must_use]
    pub fn canonical_dump(&self) -> String {
        let mut out = String::new();
        for id in self.node_ids() {
            let _ = write!(out, "n{}", id.0);
            for (name, value) in self.attrs(id) {
                let _ = write!(out, " @{name}={value}");
            }
            for (label, targets) in self.out_adjacency(id) {
                for target in targets {
                    let _ = write!(out, " --{label}-->n{}", target.0);
                }
            }
            out.push('\n');
        }
        out
    }

    /// Computes a canonical BLAKE3 hash of the graph value.
    ///
    /// The traversal is strictly deterministic:
    /// 1. Header: `b"WEFT_STATE_HASH_V1\0"`
    /// 2. Node count (u64 LE)
    /// 3. Nodes in id order: `b"N\0"` + id + attr count + sorted attrs
    /// 4. Per node: edge count + sorted `(label, target)` pairs
    ///
    /// All counts and lengths are 8-byte little-endian. Like
    /// [`canonical_dump`](Self::canonical_dump), this hashes the graph value
    /// including node identity; it is not an isomorphism invariant.
    #[must_use]
    pub fn canonical_state_hash(&self) -> Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"WEFT_STATE_HASH_V1\0");
        hasher.update(&(self.len() as u64).to_le_bytes());
        for id in self.node_ids() {
            hasher.update(b"N\0");
            hasher.update(&u64::from(id.0).to_le_bytes());
            let attrs: Vec<_> = self.attrs(id).collect();
            hasher.update(&(attrs.len() as u64).to_le_bytes());
            for (name, value) in attrs {
                hash_str(&mut hasher, name);
                hash_str(&mut hasher, &value.to_string());
            }
            let mut edges: Vec<(&str, NodeId)> = self
                .out_adjacency(id)
                .flat_map(|(label, targets)| targets.iter().map(move |t| (label, *t)))
                .collect();
            edges.sort();
            hasher.update(&(edges.len() as u64).to_le_bytes());
            for (label, target) in edges {
                hash_str(&mut hasher, label);
                hasher.update(&u64::from(target.0).to_le_bytes());
            }
        }
        *hasher.finalize().as_bytes()
    }
}

fn hash_str(hasher: &mut blake3::Hasher, s: &str) {
    hasher.update(&(s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

/// Removes the first occurrence of `needle` under `label`, dropping the
/// bucket when it empties (absent label ≡ empty list).
fn remove_one(map: &mut BTreeMap<String, Vec<NodeId>>, label: &str, needle: NodeId) -> bool {
    let Some(bucket) = map.get_mut(label) else {
        return false;
    };
    let Some(pos) = bucket.iter().position(|t| *t == needle) else {
        return false;
    };
    bucket.remove(pos);
    if bucket.is_empty() {
        map.remove(label);
    }
    true
}

/// Removes every occurrence of `needle` under `label` (cascade path).
fn remove_all(map: &mut BTreeMap<String, Vec<NodeId>>, label: &str, needle: NodeId) {
    if let Some(bucket) = map.get_mut(label) {
        bucket.retain(|t| *t != needle);
        if bucket.is_empty() {
            map.remove(label);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_node_cascades_both_directions() {
        let mut g = GraphStore::new();
        let a = g.add_node();
        let b = g.add_node();
        let c = g.add_node();
        g.add_edge("x", a, b).unwrap();
        g.add_edge("x", c, b).unwrap();
        g.add_edge("y", b, a).unwrap();
        g.add_edge("z", a, c).unwrap();

        assert!(g.remove_node(b));
        assert!(!g.contains(b));
        assert!(g.edges_out(a, "x").is_empty());
        assert!(g.edges_out(c, "x").is_empty());
        assert!(g.edges_in(a, "y").is_empty());
        assert_eq!(g.edges_out(a, "z"), &[c]);
        assert_eq!(g.edges_in(c, "z"), &[a]);
    }

    #[test]
    fn parallel_edges_are_kept_and_removed_one_at_a_time() {
        let mut g = GraphStore::new();
        let a = g.add_node();
        let b = g.add_node();
        g.add_edge("k", a, b).unwrap();
        g.add_edge("k", a, b).unwrap();
        assert_eq!(g.edge_multiplicity("k", a, b), 2);

        assert!(g.remove_edge("k", a, b));
        assert_eq!(g.edge_multiplicity("k", a, b), 1);
        assert_eq!(g.edges_in(b, "k"), &[a]);
        assert!(g.remove_edge("k", a, b));
        assert!(!g.remove_edge("k", a, b));
    }

    #[test]
    fn absent_label_behaves_as_empty_list() {
        let mut g = GraphStore::new();
        let a = g.add_node();
        let b = g.add_node();
        assert!(g.edges_out(a, "never").is_empty());
        assert_eq!(g.edge_multiplicity("never", a, b), 0);

        // A label whose last edge was removed is indistinguishable from one
        // that never existed.
        g.add_edge("once", a, b).unwrap();
        g.remove_edge("once", a, b);
        assert!(g.edges_out(a, "once").is_empty());
        assert!(g.out_adjacency(a).next().is_none());
    }

    #[test]
    fn clone_preserves_node_identity() {
        let mut g = GraphStore::new();
        let a = g.add_node();
        let b = g.add_node();
        g.set_attr(a, "name", AttrValue::Str("a".into())).unwrap();
        g.add_edge("knows", a, b).unwrap();

        let mut copy = g.clone();
        assert!(copy.has_edge("knows", a, b));
        copy.remove_node(b);
        copy.set_attr(a, "name", AttrValue::Str("mut".into())).unwrap();

        // The original is untouched.
        assert!(g.has_edge("knows", a, b));
        assert_eq!(g.attr(a, "name"), Some(&AttrValue::Str("a".into())));
    }

    #[test]
    fn self_loop_removal_does_not_double_free() {
        let mut g = GraphStore::new();
        let a = g.add_node();
        g.add_edge("me", a, a).unwrap();
        assert!(g.remove_node(a));
        assert!(g.is_empty());
    }

    #[test]
    fn state_hash_tracks_structure_and_attributes() {
        let mut g = GraphStore::new();
        let a = g.add_node();
        let b = g.add_node();
        g.add_edge("knows", a, b).unwrap();
        let before = g.canonical_state_hash();

        let mut h = g.clone();
        assert_eq!(before, h.canonical_state_hash());
        h.set_attr(a, "on", AttrValue::Bool(true)).unwrap();
        assert_ne!(before, h.canonical_state_hash());
    }
}
