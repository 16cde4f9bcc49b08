// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Counting-semaphore sets with atomic multi-operation batches
//!
//! A batch is evaluated in order against a scratch view of the counters.
//! Only when every request is satisfiable at once are the counters and the
//! caller's undo ledger updated. Otherwise the caller either fails fast
//! (no-wait) or parks on the set's condition variable and re-evaluates the
//! whole batch after every change.

use crate::clock::{Clock, SystemClock};
use crate::error::{PreconditionError, SemError};
use crate::ipckey::IpcKey;
use crate::ledger::UndoLedger;
use crate::limits::SetLimits;
use crate::op::{Batch, CallerId, OpKind, SetId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

/// Abandons a batch whether it is already blocked or not yet evaluated.
///
/// A cancelled batch returns `Interrupted`. A batch that is already parked
/// only notices after [`SemaphoreSet::wake`].
#[derive(Clone, Debug, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Shared set of counting semaphores
///
/// Every method is safe to call concurrently; `apply` is the only one that
/// may block.
pub trait SemaphoreSet: Send + Sync {
    fn id(&self) -> SetId;

    fn key(&self) -> Option<IpcKey>;

    /// Number of semaphores in the set
    fn nsems(&self) -> usize;

    /// Apply `batch` atomically on behalf of `caller`
    fn apply(&self, caller: CallerId, batch: &Batch) -> Result<(), SemError> {
        self.apply_cancellable(caller, batch, &Cancellation::new())
    }

    /// Like [`apply`](Self::apply), giving up with `Interrupted` once
    /// `cancel` fires
    fn apply_cancellable(
        &self,
        caller: CallerId,
        batch: &Batch,
        cancel: &Cancellation,
    ) -> Result<(), SemError>;

    /// Make every blocked batch re-evaluate, so cancellations are seen
    fn wake(&self);

    /// Wake every blocked batch of `caller` with `Interrupted`.
    /// Returns how many batches were woken.
    fn interrupt(&self, caller: CallerId) -> usize;

    /// Apply the undo ledger of `caller` back to the counters and forget it.
    /// Returns the adjustments that were applied.
    fn reap(&self, caller: CallerId) -> Vec<(u16, i32)>;

    /// Undo entries currently recorded for `caller`
    fn undo_entries(&self, caller: CallerId) -> Vec<(u16, i32)>;

    /// Set one counter directly, discarding undo entries for it
    fn set_value(&self, caller: CallerId, index: u16, value: u32) -> Result<(), SemError>;

    /// Set every counter directly, discarding all undo entries for them
    fn set_all(&self, caller: CallerId, values: &[u32]) -> Result<(), SemError>;

    fn snapshot(&self) -> SetSnapshot;

    /// Number of batches currently blocked
    fn blocked(&self) -> usize;

    /// Mark the set removed and wake every blocked batch with `Removed`
    fn remove(&self);

    fn is_removed(&self) -> bool;
}

/// State of one semaphore as seen by a snapshot
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemaphoreInfo {
    pub value: u32,
    /// Caller that last operated on the semaphore
    pub last_pid: Option<CallerId>,
    /// Blocked batches waiting for the value to grow
    pub waiting_increase: usize,
    /// Blocked batches waiting for the value to reach zero
    pub waiting_zero: usize,
}

/// Point-in-time view of a set
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetSnapshot {
    pub id: SetId,
    pub key: Option<IpcKey>,
    pub semaphores: Vec<SemaphoreInfo>,
    pub last_op: Option<DateTime<Utc>>,
    pub changed: DateTime<Utc>,
}

impl SetSnapshot {
    pub fn values(&self) -> Vec<u32> {
        self.semaphores.iter().map(|s| s.value).collect()
    }
}

#[derive(Debug)]
struct Waiter {
    ticket: u64,
    caller: CallerId,
    index: u16,
    kind: OpKind,
    interrupted: bool,
}

#[derive(Debug)]
struct SetState {
    counters: Vec<u32>,
    last_pid: Vec<Option<CallerId>>,
    ledger: UndoLedger,
    waiters: Vec<Waiter>,
    next_ticket: u64,
    removed: bool,
    last_op: Option<DateTime<Utc>>,
    changed: DateTime<Utc>,
}

enum Attempt {
    Applied,
    Blocked { index: u16, kind: OpKind },
    Failed(SemError),
}

impl SetState {
    /// Evaluate `batch` against the current counters, committing on success
    fn attempt(
        &mut self,
        id: SetId,
        limits: &SetLimits,
        caller: CallerId,
        batch: &Batch,
    ) -> Attempt {
        let mut scratch: BTreeMap<u16, u32> = BTreeMap::new();
        // First request that cannot proceed yet
        let mut blocked = None;

        for op in batch {
            let current = scratch
                .get(&op.index)
                .copied()
                .unwrap_or(self.counters[usize::from(op.index)]);
            let satisfied = match op.kind() {
                OpKind::Release => {
                    let next = current + op.magnitude();
                    if next > limits.semvmx {
                        // Behind a blocked request the scratch view is not
                        // final; the ceiling is rechecked on wakeup
                        if blocked.is_some() {
                            continue;
                        }
                        return Attempt::Failed(SemError::Overflow {
                            set: id,
                            index: op.index,
                            max: limits.semvmx,
                        });
                    }
                    scratch.insert(op.index, next);
                    true
                }
                OpKind::Acquire => {
                    if current >= op.magnitude() {
                        scratch.insert(op.index, current - op.magnitude());
                        true
                    } else {
                        false
                    }
                }
                OpKind::WaitZero => current == 0,
            };

            if !satisfied {
                // Any unsatisfiable no-wait request fails the whole batch,
                // even behind one that would wait
                if op.no_wait {
                    return Attempt::Failed(SemError::WouldBlock);
                }
                if blocked.is_none() {
                    blocked = Some((op.index, op.kind()));
                }
            }
        }

        if let Some((index, kind)) = blocked {
            return Attempt::Blocked { index, kind };
        }

        let staged = match self.ledger.stage(caller, batch, limits.semaem) {
            Ok(staged) => staged,
            Err(index) => {
                return Attempt::Failed(SemError::Overflow {
                    set: id,
                    index,
                    max: limits.semaem,
                })
            }
        };

        for (index, value) in scratch {
            self.counters[usize::from(index)] = value;
        }
        for op in batch {
            self.last_pid[usize::from(op.index)] = Some(caller);
        }
        self.ledger.commit(caller, staged);
        Attempt::Applied
    }

    /// Register (or refresh) a parked batch
    fn park(&mut self, ticket: u64, caller: CallerId, index: u16, kind: OpKind) {
        if let Some(waiter) = self.waiters.iter_mut().find(|w| w.ticket == ticket) {
            waiter.index = index;
            waiter.kind = kind;
        } else {
            self.waiters.push(Waiter {
                ticket,
                caller,
                index,
                kind,
                interrupted: false,
            });
        }
    }

    fn forget(&mut self, ticket: u64) {
        self.waiters.retain(|w| w.ticket != ticket);
    }

    fn is_interrupted(&self, ticket: u64) -> bool {
        self.waiters
            .iter()
            .any(|w| w.ticket == ticket && w.interrupted)
    }
}

/// In-memory semaphore set guarded by one mutex and one condition variable
pub struct LocalSemaphoreSet<C: Clock = SystemClock> {
    id: SetId,
    key: Option<IpcKey>,
    limits: SetLimits,
    clock: C,
    state: Mutex<SetState>,
    changed: Condvar,
}

impl LocalSemaphoreSet<SystemClock> {
    pub fn new(id: SetId, key: Option<IpcKey>, nsems: usize) -> Self {
        Self::with_clock(id, key, nsems, SetLimits::default(), SystemClock)
    }
}

impl<C: Clock> LocalSemaphoreSet<C> {
    pub fn with_clock(
        id: SetId,
        key: Option<IpcKey>,
        nsems: usize,
        limits: SetLimits,
        clock: C,
    ) -> Self {
        let changed = clock.now().with_timezone(&Utc);
        Self {
            id,
            key,
            limits,
            clock,
            state: Mutex::new(SetState {
                counters: vec![0; nsems],
                last_pid: vec![None; nsems],
                ledger: UndoLedger::new(),
                waiters: Vec::new(),
                next_ticket: 0,
                removed: false,
                last_op: None,
                changed,
            }),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SetState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_index(&self, index: u16, nsems: usize) -> Result<(), PreconditionError> {
        if usize::from(index) >= nsems {
            return Err(PreconditionError::IndexOutOfRange {
                set: self.id,
                index,
                nsems,
            });
        }
        Ok(())
    }

    fn check_value(&self, value: u32) -> Result<(), PreconditionError> {
        if value > self.limits.semvmx {
            return Err(PreconditionError::ValueOutOfRange {
                value: i64::from(value),
                max: self.limits.semvmx,
            });
        }
        Ok(())
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now().with_timezone(&Utc)
    }
}

impl<C: Clock> SemaphoreSet for LocalSemaphoreSet<C> {
    fn id(&self) -> SetId {
        self.id
    }

    fn key(&self) -> Option<IpcKey> {
        self.key
    }

    fn nsems(&self) -> usize {
        self.lock().counters.len()
    }

    fn apply_cancellable(
        &self,
        caller: CallerId,
        batch: &Batch,
        cancel: &Cancellation,
    ) -> Result<(), SemError> {
        let mut state = self.lock();
        self.check_index(batch.max_index(), state.counters.len())?;

        let ticket = state.next_ticket;
        state.next_ticket += 1;

        loop {
            if state.removed {
                state.forget(ticket);
                return Err(SemError::Removed(self.id));
            }
            if state.is_interrupted(ticket) || cancel.is_cancelled() {
                state.forget(ticket);
                return Err(SemError::Interrupted);
            }

            match state.attempt(self.id, &self.limits, caller, batch) {
                Attempt::Applied => {
                    state.forget(ticket);
                    state.last_op = Some(self.now());
                    drop(state);
                    self.changed.notify_all();
                    return Ok(());
                }
                Attempt::Failed(e) => {
                    state.forget(ticket);
                    return Err(e);
                }
                Attempt::Blocked { index, kind } => {
                    state.park(ticket, caller, index, kind);
                    // Spurious wakeups just lead to another evaluation
                    state = self
                        .changed
                        .wait(state)
                        .unwrap_or_else(|e| e.into_inner());
                }
            }
        }
    }

    fn interrupt(&self, caller: CallerId) -> usize {
        let mut state = self.lock();
        let mut woken = 0;
        for waiter in state.waiters.iter_mut().filter(|w| w.caller == caller) {
            if !waiter.interrupted {
                waiter.interrupted = true;
                woken += 1;
            }
        }
        drop(state);
        if woken > 0 {
            self.changed.notify_all();
        }
        woken
    }

    fn wake(&self) {
        // Taking the lock orders this after any in-progress evaluation
        drop(self.lock());
        self.changed.notify_all();
    }

    fn reap(&self, caller: CallerId) -> Vec<(u16, i32)> {
        let mut state = self.lock();
        let entries = state.ledger.take(caller);
        if entries.is_empty() {
            return entries;
        }
        let max = i64::from(self.limits.semvmx);
        for (index, adjustment) in &entries {
            let slot = usize::from(*index);
            let value = (i64::from(state.counters[slot]) + i64::from(*adjustment)).clamp(0, max);
            // Clamped into 0..=semvmx
            state.counters[slot] = value as u32;
            state.last_pid[slot] = Some(caller);
        }
        drop(state);
        self.changed.notify_all();
        entries
    }

    fn undo_entries(&self, caller: CallerId) -> Vec<(u16, i32)> {
        self.lock().ledger.entries(caller)
    }

    fn set_value(&self, caller: CallerId, index: u16, value: u32) -> Result<(), SemError> {
        let mut state = self.lock();
        if state.removed {
            return Err(SemError::Removed(self.id));
        }
        self.check_index(index, state.counters.len())?;
        self.check_value(value)?;

        let slot = usize::from(index);
        state.counters[slot] = value;
        state.last_pid[slot] = Some(caller);
        state.ledger.clear_index(index);
        state.changed = self.now();
        drop(state);
        self.changed.notify_all();
        Ok(())
    }

    fn set_all(&self, caller: CallerId, values: &[u32]) -> Result<(), SemError> {
        let mut state = self.lock();
        if state.removed {
            return Err(SemError::Removed(self.id));
        }
        if values.len() != state.counters.len() {
            return Err(PreconditionError::InvalidArgument(format!(
                "expected {} values, got {}",
                state.counters.len(),
                values.len()
            ))
            .into());
        }
        for value in values {
            self.check_value(*value)?;
        }

        for (slot, value) in values.iter().enumerate() {
            state.counters[slot] = *value;
            state.last_pid[slot] = Some(caller);
        }
        for index in 0..values.len() {
            // nsems never exceeds SEMMSL, which fits in u16
            state.ledger.clear_index(index as u16);
        }
        state.changed = self.now();
        drop(state);
        self.changed.notify_all();
        Ok(())
    }

    fn snapshot(&self) -> SetSnapshot {
        let state = self.lock();
        let semaphores = state
            .counters
            .iter()
            .enumerate()
            .map(|(slot, value)| {
                let waiting = |kind: OpKind| {
                    state
                        .waiters
                        .iter()
                        .filter(|w| usize::from(w.index) == slot && w.kind == kind)
                        .count()
                };
                SemaphoreInfo {
                    value: *value,
                    last_pid: state.last_pid[slot],
                    waiting_increase: waiting(OpKind::Acquire),
                    waiting_zero: waiting(OpKind::WaitZero),
                }
            })
            .collect();

        SetSnapshot {
            id: self.id,
            key: self.key,
            semaphores,
            last_op: state.last_op,
            changed: state.changed,
        }
    }

    fn blocked(&self) -> usize {
        self.lock().waiters.len()
    }

    fn remove(&self) {
        let mut state = self.lock();
        state.removed = true;
        drop(state);
        self.changed.notify_all();
    }

    fn is_removed(&self) -> bool {
        self.lock().removed
    }
}

#[cfg(test)]
#[path = "semset_tests.rs"]
mod tests;
