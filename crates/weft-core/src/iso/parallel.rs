// SPDX-License-Identifier: Apache-2.0
//! Combinatorial strategy partitioned across a worker pool.
//!
//! The precomputed candidate space is split into fixed-size contiguous index
//! chunks; workers claim chunks via an atomic cursor. The first worker to
//! find a satisfying assignment claims the shared result slot (only if still
//! empty) and drains the remaining queue so other workers exit promptly —
//! best-effort cancellation, not preemptive interruption: in-flight
//! comparisons complete before a worker re-checks the flag.
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use rustc_hash::FxHashSet;

use crate::graph::{GraphStore, NodeId};

use super::{
    candidate_sets, embedding_consistent, CombinatorialStrategy, IsomorphismStrategy, NodeMapping,
};

/// Linear indices per work chunk.
const CHUNK: u64 = 1024;

/// Parallel combinatorial strategy.
#[derive(Debug, Clone, Copy)]
pub struct ParallelStrategy {
    workers: usize,
}

impl Default for ParallelStrategy {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

impl ParallelStrategy {
    /// Creates a strategy with an explicit pool size (minimum 1).
    #[must_use]
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }
}

impl IsomorphismStrategy for ParallelStrategy {
    fn mapping_from(&self, sub: &GraphStore, base: &GraphStore) -> Option<NodeMapping> {
        let candidates = candidate_sets(sub, base);
        if candidates.is_empty() {
            return Some(NodeMapping::new());
        }
        if candidates.iter().any(|(_, c)| c.is_empty()) {
            return None;
        }
        let Ok(total) = u64::try_from(
            candidates
                .iter()
                .map(|(_, c)| c.len() as u128)
                .product::<u128>(),
        ) else {
            // Too many tuples to address by linear index; the serial search
            // enumerates lazily and needs no such cap.
            return CombinatorialStrategy.mapping_from(sub, base);
        };
        let total_chunks = total.div_ceil(CHUNK);

        let cursor = AtomicU64::new(0);
        let found = AtomicBool::new(false);
        let result: Mutex<Option<NodeMapping>> = Mutex::new(None);

        std::thread::scope(|s| {
            let handles: Vec<_> = (0..self.workers)
                .map(|_| {
                    let candidates = &candidates;
                    let cursor = &cursor;
                    let found = &found;
                    let result = &result;
                    s.spawn(move || {
                        loop {
                            if found.load(Ordering::Acquire) {
                                break;
                            }
                            let chunk = cursor.fetch_add(1, Ordering::Relaxed);
                            if chunk >= total_chunks {
                                break;
                            }
                            let start = chunk * CHUNK;
                            let end = (start + CHUNK).min(total);
                            for idx in start..end {
                                let Some(mapping) = decode(candidates, idx) else {
                                    continue;
                                };
                                if embedding_consistent(sub, base, &mapping) {
                                    // Claim the slot only if still empty, then
                                    // drain the queue so peers exit.
                                    if let Ok(mut slot) = result.lock() {
                                        if slot.is_none() {
                                            *slot = Some(mapping);
                                        }
                                    }
                                    found.store(true, Ordering::Release);
                                    cursor.store(total_chunks, Ordering::Relaxed);
                                    break;
                                }
                            }
                        }
                    })
                })
                .collect();
            // Join every worker before returning, even if one panicked; the
            // pool must not deadlock on a failed peer.
            let mut panic: Option<Box<dyn std::any::Any + Send>> = None;
            for h in handles {
                if let Err(e) = h.join() {
                    panic.get_or_insert(e);
                }
            }
            if let Some(e) = panic {
                std::panic::resume_unwind(e);
            }
        });

        result.into_inner().ok().flatten()
    }
}

/// Decodes a linear index into a duplicate-free assignment, mixed-radix over
/// the candidate lists. `None` when the tuple reuses a base node.
fn decode(candidates: &[(NodeId, Vec<NodeId>)], mut idx: u64) -> Option<NodeMapping> {
    let mut mapping = NodeMapping::new();
    let mut seen = FxHashSet::default();
    for (sn, cands) in candidates.iter().rev() {
        let len = cands.len() as u64;
        let pick = cands[usize::try_from(idx % len).ok()?];
        if !seen.insert(pick) {
            return None;
        }
        mapping.insert(*sn, pick);
        idx /= len;
    }
    Some(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iso::CombinatorialStrategy;
    use crate::value::AttrValue;

    fn star(points: usize) -> GraphStore {
        let mut g = GraphStore::new();
        let hub = g.add_node();
        g.set_attr(hub, "hub", AttrValue::Bool(true)).unwrap();
        for _ in 0..points {
            let p = g.add_node();
            g.add_edge("ray", hub, p).unwrap();
        }
        g
    }

    #[test]
    fn agrees_with_the_serial_combinatorial_strategy() {
        let a = star(4);
        let b = star(4);
        let c = star(3);
        let parallel = ParallelStrategy::with_workers(3);
        assert_eq!(
            parallel.is_isomorphic_to(&a, &b),
            CombinatorialStrategy.is_isomorphic_to(&a, &b)
        );
        assert!(parallel.is_isomorphic_to(&a, &b));
        assert!(!parallel.is_isomorphic_to(&a, &c));
    }

    #[test]
    fn finds_embeddings_with_a_single_worker_pool() {
        let sub = star(2);
        let base = star(5);
        let mapping = ParallelStrategy::with_workers(1)
            .mapping_from(&sub, &base)
            .unwrap();
        assert_eq!(mapping.len(), 3);
    }

    #[test]
    fn oversized_candidate_spaces_fall_back_to_the_serial_search() {
        // 64 sub nodes with two base candidates each: 2^64 tuples, one more
        // than a u64 can index.
        let mut sub = GraphStore::new();
        let mut base = GraphStore::new();
        for i in 0..64i64 {
            let s = sub.add_node();
            sub.set_attr(s, "k", AttrValue::Int(i)).unwrap();
            let b = base.add_node();
            base.set_attr(b, "k", AttrValue::Int(i)).unwrap();
        }
        for i in 0..64i64 {
            let b = base.add_node();
            base.set_attr(b, "k", AttrValue::Int(i)).unwrap();
        }
        let mapping = ParallelStrategy::with_workers(2)
            .mapping_from(&sub, &base)
            .unwrap();
        assert_eq!(mapping.len(), 64);
    }

    #[test]
    fn empty_sub_graph_embeds_trivially() {
        let sub = GraphStore::new();
        let base = star(2);
        assert_eq!(
            ParallelStrategy::default().mapping_from(&sub, &base),
            Some(NodeMapping::new())
        );
    }
}
