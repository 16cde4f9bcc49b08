// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced semaphore set wrapper for consistent observability

use crate::error::SemError;
use crate::ipckey::IpcKey;
use crate::op::{Batch, CallerId, SetId};
use crate::semset::{Cancellation, SemaphoreSet, SetSnapshot};

/// Wrapper that adds tracing to any SemaphoreSet
#[derive(Clone)]
pub struct TracedSemaphoreSet<S> {
    inner: S,
}

impl<S> TracedSemaphoreSet<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: SemaphoreSet> SemaphoreSet for TracedSemaphoreSet<S> {
    fn id(&self) -> SetId {
        self.inner.id()
    }

    fn key(&self) -> Option<IpcKey> {
        self.inner.key()
    }

    fn nsems(&self) -> usize {
        self.inner.nsems()
    }

    fn apply_cancellable(
        &self,
        caller: CallerId,
        batch: &Batch,
        cancel: &Cancellation,
    ) -> Result<(), SemError> {
        let span = tracing::info_span!("semset.apply", set = %self.inner.id(), caller = %caller);
        let _guard = span.enter();

        tracing::debug!(ops = %batch, "applying");
        let start = std::time::Instant::now();
        let result = self.inner.apply_cancellable(caller, batch, cancel);
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(()) => tracing::debug!(elapsed_ms, "applied"),
            // Expected outcomes of a non-waiting or interrupted caller
            Err(e) if e.is_retryable() => tracing::debug!(elapsed_ms, error = %e, "not applied"),
            Err(e) => tracing::warn!(elapsed_ms, error = %e, "apply failed"),
        }

        result
    }

    fn wake(&self) {
        self.inner.wake()
    }

    fn interrupt(&self, caller: CallerId) -> usize {
        let woken = self.inner.interrupt(caller);
        if woken > 0 {
            tracing::info!(set = %self.inner.id(), caller = %caller, woken, "interrupted");
        }
        woken
    }

    fn reap(&self, caller: CallerId) -> Vec<(u16, i32)> {
        let applied = self.inner.reap(caller);
        if !applied.is_empty() {
            tracing::info!(
                set = %self.inner.id(),
                caller = %caller,
                adjustments = ?applied,
                "undo applied"
            );
        }
        applied
    }

    fn undo_entries(&self, caller: CallerId) -> Vec<(u16, i32)> {
        self.inner.undo_entries(caller)
    }

    fn set_value(&self, caller: CallerId, index: u16, value: u32) -> Result<(), SemError> {
        let result = self.inner.set_value(caller, index, value);
        match &result {
            Ok(()) => tracing::info!(set = %self.inner.id(), index, value, "value set"),
            Err(e) => tracing::warn!(set = %self.inner.id(), index, error = %e, "set value failed"),
        }
        result
    }

    fn set_all(&self, caller: CallerId, values: &[u32]) -> Result<(), SemError> {
        let result = self.inner.set_all(caller, values);
        match &result {
            Ok(()) => tracing::info!(set = %self.inner.id(), count = values.len(), "all values set"),
            Err(e) => tracing::warn!(set = %self.inner.id(), error = %e, "set all failed"),
        }
        result
    }

    fn snapshot(&self) -> SetSnapshot {
        self.inner.snapshot()
    }

    fn blocked(&self) -> usize {
        self.inner.blocked()
    }

    fn remove(&self) {
        tracing::info!(set = %self.inner.id(), blocked = self.inner.blocked(), "removing");
        self.inner.remove()
    }

    fn is_removed(&self) -> bool {
        self.inner.is_removed()
    }
}
