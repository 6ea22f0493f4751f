// SPDX-License-Identifier: Apache-2.0
//! Reachability-graph construction by repeated rule application.
//!
//! The explorer drives the matcher, rewriter, and isomorphism oracle: it
//! matches a prioritized list of rule groups against each discovered state,
//! applies every match of the first group that yields any, and records
//! successor states deduplicated up to isomorphism. Discovered-state graphs
//! are never mutated once published; the rewriter clones before editing.
use std::collections::VecDeque;

use crate::expr::{ExprEval, SimpleEvaluator};
use crate::graph::GraphStore;
use crate::iso::{IsomorphismStrategy, StrategyKind};
use crate::matcher::Matcher;
use crate::pattern::Rule;
use crate::rewrite::{RewriteError, Rewriter};
#[cfg(feature = "telemetry")]
use crate::telemetry;

/// Index of a state in a [`ReachabilityGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateId(pub usize);

/// A discovered state: the graph itself plus its serialized snapshot.
#[derive(Debug, Clone)]
pub struct StateRecord {
    /// The state's graph. Immutable once published.
    pub graph: GraphStore,
    /// Canonical textual dump taken at discovery time.
    pub snapshot: String,
}

/// A state transition labeled by the rule that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Source state.
    pub from: StateId,
    /// Target state (may equal `from` for self-loop rules).
    pub to: StateId,
    /// Name of the applied rule.
    pub rule: String,
}

/// The explored state space: distinct states up to isomorphism, plus the
/// rule-labeled transitions between them.
#[derive(Debug, Clone, Default)]
pub struct ReachabilityGraph {
    states: Vec<StateRecord>,
    transitions: Vec<Transition>,
}

impl ReachabilityGraph {
    /// All discovered states in discovery order. Index 0 is the initial
    /// state.
    #[must_use]
    pub fn states(&self) -> &[StateRecord] {
        &self.states
    }

    /// All recorded transitions in discovery order.
    #[must_use]
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Number of distinct states.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns `true` when nothing was explored (never the case after
    /// [`ReachabilityExplorer::explore`], which always records the initial
    /// state).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Drives state-space construction.
///
/// The oracle strategy is explicit configuration: pass the kind in, swap it
/// per explorer instance. The default pairing is the depth-first oracle and
/// the built-in expression evaluator.
pub struct ReachabilityExplorer<'e> {
    eval: &'e dyn ExprEval,
    oracle: Box<dyn IsomorphismStrategy>,
}

impl Default for ReachabilityExplorer<'static> {
    fn default() -> Self {
        Self {
            eval: &SimpleEvaluator,
            oracle: StrategyKind::default().build(),
        }
    }
}

impl<'e> ReachabilityExplorer<'e> {
    /// Creates an explorer with an explicit evaluator and oracle strategy.
    #[must_use]
    pub fn new(eval: &'e dyn ExprEval, strategy: StrategyKind) -> Self {
        Self {
            eval,
            oracle: strategy.build(),
        }
    }

    /// Explores all states reachable from `initial` under `priority_levels`.
    ///
    /// Each level is a group of rules tried together; for a given state the
    /// first group (in order) yielding any match wins and lower-priority
    /// groups are not consulted. Every match of the winning group is applied.
    /// Successors isomorphic to a known state only add a transition edge;
    /// new states are enqueued for further exploration.
    ///
    /// Termination is the rule set's responsibility: a non-terminating rule
    /// set makes the work-list grow without bound.
    pub fn explore(
        &self,
        initial: GraphStore,
        priority_levels: &[Vec<Rule>],
    ) -> Result<ReachabilityGraph, RewriteError> {
        let matcher = Matcher::new(self.eval);
        let rewriter = Rewriter::new(self.eval);

        let mut result = ReachabilityGraph::default();
        let snapshot = initial.canonical_dump();
        #[cfg(feature = "telemetry")]
        telemetry::state_discovered(0, &initial.canonical_state_hash());
        result.states.push(StateRecord {
            graph: initial,
            snapshot,
        });
        let mut worklist: VecDeque<StateId> = VecDeque::from([StateId(0)]);

        while let Some(current) = worklist.pop_front() {
            let found = self.level_matches(&matcher, &result.states[current.0].graph, priority_levels);
            for (rule, m) in found {
                let successor = rewriter.apply(&result.states[current.0].graph, &rule.pattern, &m)?;
                let known = result
                    .states
                    .iter()
                    .position(|s| self.oracle.is_isomorphic_to(&successor, &s.graph));
                let target = match known {
                    Some(idx) => StateId(idx),
                    None => {
                        let idx = result.states.len();
                        #[cfg(feature = "telemetry")]
                        telemetry::state_discovered(idx, &successor.canonical_state_hash());
                        let snapshot = successor.canonical_dump();
                        result.states.push(StateRecord {
                            graph: successor,
                            snapshot,
                        });
                        worklist.push_back(StateId(idx));
                        StateId(idx)
                    }
                };
                #[cfg(feature = "telemetry")]
                telemetry::transition(current.0, target.0, &rule.name);
                result.transitions.push(Transition {
                    from: current,
                    to: target,
                    rule: rule.name.clone(),
                });
            }
        }
        #[cfg(feature = "telemetry")]
        telemetry::done(result.states.len(), result.transitions.len());
        Ok(result)
    }

    /// Matches priority levels in order, returning every `(rule, match)` of
    /// the first group with at least one match.
    fn level_matches<'r>(
        &self,
        matcher: &Matcher<'_>,
        graph: &GraphStore,
        priority_levels: &'r [Vec<Rule>],
    ) -> Vec<(&'r Rule, crate::pattern::Match)> {
        for level in priority_levels {
            let mut found = Vec::new();
            for rule in level {
                for m in matcher.find_matches(graph, &rule.pattern, false) {
                    found.push((rule, m));
                }
            }
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }

    /// Repeatedly applies `rules` to one evolving graph.
    ///
    /// Each candidate successor is tested for isomorphism against the full
    /// history to suppress cycles; with `single` the first successful
    /// rewrite ends the run. Returns the final graph and the names of the
    /// rules applied, in order.
    pub fn apply_patterns(
        &self,
        graph: GraphStore,
        rules: &[Rule],
        single: bool,
    ) -> Result<(GraphStore, Vec<String>), RewriteError> {
        let matcher = Matcher::new(self.eval);
        let rewriter = Rewriter::new(self.eval);

        let mut history: Vec<GraphStore> = vec![graph.clone()];
        let mut current = graph;
        let mut applied: Vec<String> = Vec::new();

        loop {
            let mut advanced = false;
            'rules: for rule in rules {
                for m in matcher.find_matches(&current, &rule.pattern, false) {
                    let candidate = rewriter.apply(&current, &rule.pattern, &m)?;
                    let revisits = history
                        .iter()
                        .any(|seen| self.oracle.is_isomorphic_to(&candidate, seen));
                    if revisits {
                        continue;
                    }
                    history.push(candidate.clone());
                    applied.push(rule.name.clone());
                    current = candidate;
                    if single {
                        return Ok((current, applied));
                    }
                    advanced = true;
                    break 'rules;
                }
            }
            if !advanced {
                return Ok((current, applied));
            }
        }
    }
}
