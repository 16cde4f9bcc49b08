// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-caller undo ledger
//!
//! For every auto-undo request that applies, the ledger entry of the caller
//! for that semaphore moves by the negated delta. When the caller goes away
//! the entries are added back to the counters by whoever reaps it.

use crate::op::{CallerId, OperationRequest};
use std::collections::{BTreeMap, HashMap};

/// Ledger entries that would result from a batch, not yet committed
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StagedUndo {
    values: BTreeMap<u16, i32>,
}

impl StagedUndo {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Undo adjustments for every caller of one semaphore set
#[derive(Debug, Default, Clone)]
pub struct UndoLedger {
    entries: HashMap<CallerId, BTreeMap<u16, i32>>,
}

impl UndoLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current adjustment recorded for `caller` on `index`
    pub fn adjustment(&self, caller: CallerId, index: u16) -> i32 {
        self.entries
            .get(&caller)
            .and_then(|e| e.get(&index))
            .copied()
            .unwrap_or(0)
    }

    /// All non-zero entries for `caller`, ordered by index
    pub fn entries(&self, caller: CallerId) -> Vec<(u16, i32)> {
        self.entries
            .get(&caller)
            .map(|e| e.iter().map(|(i, v)| (*i, *v)).collect())
            .unwrap_or_default()
    }

    /// Callers that currently hold at least one entry
    pub fn callers(&self) -> Vec<CallerId> {
        let mut callers: Vec<_> = self.entries.keys().copied().collect();
        callers.sort();
        callers
    }

    /// Work out the entries `ops` would leave behind.
    ///
    /// Returns the index whose entry would exceed `limit` in absolute value.
    pub fn stage<'a>(
        &self,
        caller: CallerId,
        ops: impl IntoIterator<Item = &'a OperationRequest>,
        limit: u32,
    ) -> Result<StagedUndo, u16> {
        let mut staged = StagedUndo::default();
        for op in ops.into_iter().filter(|op| op.auto_undo && op.delta != 0) {
            let current = staged
                .values
                .get(&op.index)
                .copied()
                .unwrap_or_else(|| self.adjustment(caller, op.index));
            let next = current - op.delta;
            if next.unsigned_abs() > limit {
                return Err(op.index);
            }
            staged.values.insert(op.index, next);
        }
        Ok(staged)
    }

    /// Make staged entries current
    pub fn commit(&mut self, caller: CallerId, staged: StagedUndo) {
        if staged.is_empty() {
            return;
        }
        let entries = self.entries.entry(caller).or_default();
        for (index, value) in staged.values {
            if value == 0 {
                entries.remove(&index);
            } else {
                entries.insert(index, value);
            }
        }
        if entries.is_empty() {
            self.entries.remove(&caller);
        }
    }

    /// Forget every caller's entry for `index` (its value was set directly)
    pub fn clear_index(&mut self, index: u16) {
        for entries in self.entries.values_mut() {
            entries.remove(&index);
        }
        self.entries.retain(|_, e| !e.is_empty());
    }

    /// Remove and return the entries of `caller`
    pub fn take(&mut self, caller: CallerId) -> Vec<(u16, i32)> {
        self.entries
            .remove(&caller)
            .map(|e| e.into_iter().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
