// SPDX-License-Identifier: Apache-2.0
//! weft-core: attributed graph rewriting and reachability exploration.
//!
//! Host graphs are attributed, labeled, directed multigraphs. Rewrite rules
//! are pattern graphs whose elements carry match/create/delete/negative
//! actions; applying a rule clones the host graph and edits the clone, so
//! discovered states are immutable. The explorer drives rules to a fixpoint,
//! deduplicating states with one of several interchangeable isomorphism
//! strategies.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self
)]

mod explore;
mod expr;
mod graph;
mod ident;
mod matcher;
mod odometer;
mod pattern;
mod portable;
mod rewrite;
mod value;

/// Graph / subgraph isomorphism strategies.
pub mod iso;
/// JSONL progress events for exploration (feature `telemetry`).
#[cfg(feature = "telemetry")]
pub mod telemetry;

// Re-exports for stable public API
/// Reachability exploration over rule sets.
pub use explore::{
    ReachabilityExplorer, ReachabilityGraph, StateId, StateRecord, Transition,
};
/// Expression evaluation at pattern predicates and attribute edits.
pub use expr::{Bindings, EvalError, ExprEval, SimpleEvaluator};
/// Host-graph storage.
pub use graph::{GraphError, GraphStore, NodeId};
/// Deterministic identifiers.
pub use ident::{make_rule_id, Hash};
/// Pattern matching against host graphs.
pub use matcher::Matcher;
/// Rule and pattern authoring.
pub use pattern::{
    Action, AttrAction, AttrSpec, LabelSpec, Match, PatternAttr, PatternEdge, PatternGraph,
    PatternNode, PatternNodeId, Rule,
};
/// Dense serializable interchange forms (CBOR).
pub use portable::{
    PortableError, PortableGraph, PortableNode, PortablePattern, PortablePatternAttr,
    PortablePatternEdge, PortablePatternNode,
};
/// Match application.
pub use rewrite::{RewriteError, Rewriter};
/// Attribute values.
pub use value::AttrValue;
