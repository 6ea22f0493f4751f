// SPDX-License-Identifier: Apache-2.0

#![allow(missing_docs)]

use weft_core::iso::StrategyKind;
use weft_core::{
    Action, AttrAction, AttrSpec, AttrValue, GraphStore, ReachabilityExplorer, Rule,
    SimpleEvaluator, StateId,
};

const ALL_STRATEGIES: [StrategyKind; 6] = [
    StrategyKind::Combinatorial,
    StrategyKind::DepthFirst,
    StrategyKind::CspLowHigh,
    StrategyKind::CspConflict,
    StrategyKind::Canonical,
    StrategyKind::Parallel,
];

fn flip_rule(name: &str, from: bool) -> Rule {
    let mut pattern = weft_core::PatternGraph::new();
    let n = pattern.add_node(Action::Match);
    pattern.add_attr(
        n,
        "on",
        AttrAction::Delete,
        AttrSpec::Literal(AttrValue::Bool(from)),
    );
    pattern.add_attr(
        n,
        "on",
        AttrAction::Create,
        AttrSpec::Literal(AttrValue::Bool(!from)),
    );
    Rule::new(name, pattern)
}

#[test]
fn every_strategy_discovers_the_same_toggle_state_space() {
    let eval = SimpleEvaluator;
    for kind in ALL_STRATEGIES {
        let mut g = GraphStore::new();
        let n = g.add_node();
        g.set_attr(n, "on", AttrValue::Bool(false)).unwrap();

        let rules = vec![vec![flip_rule("up", false), flip_rule("down", true)]];
        let explorer = ReachabilityExplorer::new(&eval, kind);
        let result = explorer.explore(g, &rules).unwrap();

        assert_eq!(result.len(), 2, "strategy {kind:?}");
        assert_eq!(result.transitions().len(), 2, "strategy {kind:?}");
    }
}

/// Moving a token around a symmetric two-node ring always lands in a state
/// isomorphic to the start, so exploration collapses to one state with a
/// self-loop transition.
#[test]
fn every_strategy_collapses_symmetric_token_passing() {
    let eval = SimpleEvaluator;
    for kind in ALL_STRATEGIES {
        let mut g = GraphStore::new();
        let a = g.add_node();
        let b = g.add_node();
        g.add_edge("next", a, b).unwrap();
        g.add_edge("next", b, a).unwrap();
        g.set_attr(a, "token", AttrValue::Bool(true)).unwrap();

        let mut p = weft_core::PatternGraph::new();
        let holder = p.add_node(Action::Match);
        let receiver = p.add_node(Action::Match);
        p.add_attr(
            holder,
            "token",
            AttrAction::Delete,
            AttrSpec::Literal(AttrValue::Bool(true)),
        );
        p.add_attr(
            receiver,
            "token",
            AttrAction::Forbid,
            AttrSpec::Literal(AttrValue::Bool(true)),
        );
        p.add_attr(
            receiver,
            "token",
            AttrAction::Create,
            AttrSpec::Literal(AttrValue::Bool(true)),
        );
        p.add_edge("next", Action::Match, holder, receiver);
        let rules = vec![vec![Rule::new("pass-token", p)]];

        let explorer = ReachabilityExplorer::new(&eval, kind);
        let result = explorer.explore(g, &rules).unwrap();

        assert_eq!(result.len(), 1, "strategy {kind:?}");
        assert_eq!(result.transitions().len(), 1, "strategy {kind:?}");
        assert_eq!(result.transitions()[0].from, StateId(0));
        assert_eq!(result.transitions()[0].to, StateId(0));
        assert_eq!(result.transitions()[0].rule, "pass-token");
    }
}
