// SPDX-License-Identifier: Apache-2.0

#![allow(missing_docs)]

use weft_core::{
    Action, AttrAction, AttrSpec, AttrValue, GraphStore, Matcher, PatternGraph, ReachabilityExplorer,
    Rewriter, Rule, SimpleEvaluator,
};

/// Rule: whenever `a --knows--> b` and `a --likes--> b` but no
/// `a --met--> b` yet, create the `met` edge. Saturates the graph with one
/// `met` edge per mutual knows/likes pair.
fn introduce_met() -> Rule {
    let mut p = PatternGraph::new();
    let pa = p.add_node(Action::Match);
    let pb = p.add_node(Action::Match);
    p.add_edge("knows", Action::Match, pa, pb);
    p.add_edge("likes", Action::Match, pa, pb);
    p.add_edge("met", Action::Negative, pa, pb);
    p.add_edge("met", Action::Create, pa, pb);
    Rule::new("introduce-met", p)
}

#[test]
fn met_edges_saturate_over_knows_and_likes() {
    let mut g = GraphStore::new();
    let a = g.add_node();
    let b = g.add_node();
    let c = g.add_node();
    g.set_attr(a, "name", AttrValue::Str("a".into())).unwrap();
    g.set_attr(b, "name", AttrValue::Str("b".into())).unwrap();
    g.set_attr(c, "name", AttrValue::Str("c".into())).unwrap();
    g.add_edge("knows", a, b).unwrap();
    g.add_edge("knows", b, a).unwrap();
    g.add_edge("knows", a, c).unwrap();
    g.add_edge("likes", a, b).unwrap();
    g.add_edge("likes", b, a).unwrap();

    let explorer = ReachabilityExplorer::default();
    let (last, applied) = explorer
        .apply_patterns(g, &[introduce_met()], false)
        .unwrap();

    // `a` knows `c` but does not like them: no met edge there.
    assert_eq!(applied.len(), 2);
    assert!(last.has_edge("met", a, b));
    assert!(last.has_edge("met", b, a));
    assert!(!last.has_edge("met", a, c));

    // Saturated: the negative edge condition now blocks every candidate.
    let eval = SimpleEvaluator;
    let rule = introduce_met();
    assert!(Matcher::new(&eval)
        .find_matches(&last, &rule.pattern, false)
        .is_empty());
}

#[test]
fn match_only_rules_are_no_ops() {
    let mut g = GraphStore::new();
    let a = g.add_node();
    let b = g.add_node();
    g.set_attr(a, "name", AttrValue::Str("a".into())).unwrap();
    g.add_edge("knows", a, b).unwrap();

    let mut p = PatternGraph::new();
    let pa = p.add_node(Action::Match);
    let pb = p.add_node(Action::Match);
    p.add_edge("knows", Action::Match, pa, pb);
    let rule = Rule::new("observe", p);

    let eval = SimpleEvaluator;
    let matches = Matcher::new(&eval).find_matches(&g, &rule.pattern, false);
    assert_eq!(matches.len(), 1);
    let out = Rewriter::new(&eval)
        .apply(&g, &rule.pattern, &matches[0])
        .unwrap();
    assert_eq!(g.canonical_state_hash(), out.canonical_state_hash());
}

/// Rule: flip a task's `done` flag unless some blocker node points at it.
fn finish_unblocked_task() -> Rule {
    let mut p = PatternGraph::new();
    let task = p.add_node(Action::Match);
    p.add_attr(
        task,
        "done",
        AttrAction::Delete,
        AttrSpec::Literal(AttrValue::Bool(false)),
    );
    p.add_attr(
        task,
        "done",
        AttrAction::Create,
        AttrSpec::Literal(AttrValue::Bool(true)),
    );
    let blocker = p.add_node_with(Action::Negative, Some("#{type}=='blocker'"));
    p.add_edge("blocks", Action::Match, blocker, task);
    Rule::new("finish-task", p)
}

#[test]
fn blocked_tasks_stay_open_while_free_tasks_finish() {
    let mut g = GraphStore::new();
    let blocked = g.add_node();
    let free = g.add_node();
    let k = g.add_node();
    g.set_attr(blocked, "done", AttrValue::Bool(false)).unwrap();
    g.set_attr(free, "done", AttrValue::Bool(false)).unwrap();
    g.set_attr(k, "type", AttrValue::Str("blocker".into()))
        .unwrap();
    g.add_edge("blocks", k, blocked).unwrap();

    let eval = SimpleEvaluator;
    let rule = finish_unblocked_task();
    let matches = Matcher::new(&eval).find_matches(&g, &rule.pattern, false);
    assert_eq!(matches.len(), 1);

    let done = Rewriter::new(&eval)
        .apply(&g, &rule.pattern, &matches[0])
        .unwrap();
    assert_eq!(done.attr(free, "done"), Some(&AttrValue::Bool(true)));
    assert_eq!(done.attr(blocked, "done"), Some(&AttrValue::Bool(false)));
    // The input graph is untouched.
    assert_eq!(g.attr(free, "done"), Some(&AttrValue::Bool(false)));
}

#[test]
fn removing_the_blocker_edge_frees_the_task() {
    let mut g = GraphStore::new();
    let task = g.add_node();
    let k = g.add_node();
    g.set_attr(task, "done", AttrValue::Bool(false)).unwrap();
    g.set_attr(k, "type", AttrValue::Str("blocker".into()))
        .unwrap();
    g.add_edge("blocks", k, task).unwrap();

    let eval = SimpleEvaluator;
    let rule = finish_unblocked_task();
    assert!(Matcher::new(&eval)
        .find_matches(&g, &rule.pattern, false)
        .is_empty());

    g.remove_edge("blocks", k, task);
    assert_eq!(
        Matcher::new(&eval)
            .find_matches(&g, &rule.pattern, false)
            .len(),
        1
    );
}

#[test]
fn applying_the_same_match_twice_is_deterministic() {
    let mut g = GraphStore::new();
    let a = g.add_node();
    let b = g.add_node();
    g.add_edge("knows", a, b).unwrap();

    let eval = SimpleEvaluator;
    let rule = introduce_met();
    let matches = Matcher::new(&eval).find_matches(&g, &rule.pattern, false);
    assert_eq!(matches.len(), 1);

    let rewriter = Rewriter::new(&eval);
    let first = rewriter.apply(&g, &rule.pattern, &matches[0]).unwrap();
    let second = rewriter.apply(&g, &rule.pattern, &matches[0]).unwrap();
    assert_eq!(
        first.canonical_state_hash(),
        second.canonical_state_hash()
    );
}
