// SPDX-License-Identifier: Apache-2.0
//! Odometer-style enumeration over per-variable candidate lists.
//!
//! A tuple of cursors walks the cross product of candidate lists without
//! materializing it: advancing increments the rightmost movable cursor and
//! resets every cursor to its right. The step functions are pure so the
//! search order is testable in isolation.

/// Cursor vector over `k` candidate lists of given lengths.
#[derive(Debug, Clone)]
pub struct Odometer {
    lengths: Vec<usize>,
    cursors: Vec<usize>,
    exhausted: bool,
}

impl Odometer {
    /// Creates an odometer positioned at the first tuple.
    ///
    /// An empty `lengths` slice yields exactly one (empty) tuple; any
    /// zero-length list makes the odometer exhausted from the start.
    #[must_use]
    pub fn new(lengths: Vec<usize>) -> Self {
        let exhausted = lengths.iter().any(|len| *len == 0);
        let cursors = vec![0; lengths.len()];
        Self {
            lengths,
            cursors,
            exhausted,
        }
    }

    /// Current tuple of candidate indices, or `None` once exhausted.
    #[must_use]
    pub fn current(&self) -> Option<&[usize]> {
        if self.exhausted {
            None
        } else {
            Some(&self.cursors)
        }
    }

    /// Advances to the next tuple: increments the rightmost movable cursor
    /// and resets all cursors to its right.
    ///
    /// Returns `false` once the space is exhausted.
    pub fn advance(&mut self) -> bool {
        if self.exhausted {
            return false;
        }
        for i in (0..self.cursors.len()).rev() {
            if self.cursors[i] + 1 < self.lengths[i] {
                self.cursors[i] += 1;
                for c in &mut self.cursors[i + 1..] {
                    *c = 0;
                }
                return true;
            }
        }
        self.exhausted = true;
        false
    }

    /// Skips the entire subtree under cursor position `i`: advances cursor
    /// `i` directly, resetting everything to its right.
    ///
    /// Used when a prefix conflict is detected, so suffix combinations that
    /// share the failing prefix are never visited.
    pub fn advance_at(&mut self, i: usize) -> bool {
        if self.exhausted {
            return false;
        }
        for j in (0..=i.min(self.cursors.len().saturating_sub(1))).rev() {
            if self.cursors[j] + 1 < self.lengths[j] {
                self.cursors[j] += 1;
                for c in &mut self.cursors[j + 1..] {
                    *c = 0;
                }
                return true;
            }
        }
        self.exhausted = true;
        false
    }
}
