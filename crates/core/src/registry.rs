// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry of live semaphore sets
//!
//! Owns id allocation, the key-to-set mapping and the name-to-set mapping of
//! named semaphores. The registry lock is never held while a batch blocks:
//! callers look up the set, release the registry, then apply.

use crate::clock::SystemClock;
use crate::error::{PreconditionError, SemError};
use crate::ipckey::{IpcKey, IPC_PRIVATE};
use crate::limits::SetLimits;
use crate::op::{Batch, CallerId, OperationRequest, SetId};
use crate::semset::{Cancellation, LocalSemaphoreSet, SemaphoreSet, SetSnapshot};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

/// Builds the set stored under a freshly allocated id
pub type SetFactory =
    Box<dyn Fn(SetId, Option<IpcKey>, usize, SetLimits) -> Arc<dyn SemaphoreSet> + Send + Sync>;

#[derive(Default)]
struct RegistryInner {
    sets: BTreeMap<SetId, Arc<dyn SemaphoreSet>>,
    keys: HashMap<IpcKey, SetId>,
    names: HashMap<String, SetId>,
    next_id: u32,
}

impl RegistryInner {
    fn allocate_id(&mut self) -> SetId {
        loop {
            self.next_id = self.next_id.wrapping_add(1).max(1);
            let id = SetId(self.next_id);
            if !self.sets.contains_key(&id) {
                return id;
            }
        }
    }

    fn detach(&mut self, id: SetId) -> Option<Arc<dyn SemaphoreSet>> {
        let set = self.sets.remove(&id)?;
        self.keys.retain(|_, v| *v != id);
        self.names.retain(|_, v| *v != id);
        Some(set)
    }
}

pub struct SetRegistry {
    limits: SetLimits,
    factory: SetFactory,
    inner: Mutex<RegistryInner>,
}

impl SetRegistry {
    /// Registry of in-memory sets using the system clock
    pub fn new(limits: SetLimits) -> Self {
        Self::with_factory(
            limits,
            Box::new(|id, key, nsems, limits| {
                Arc::new(LocalSemaphoreSet::with_clock(
                    id,
                    key,
                    nsems,
                    limits,
                    SystemClock,
                ))
            }),
        )
    }

    pub fn with_factory(limits: SetLimits, factory: SetFactory) -> Self {
        Self {
            limits: limits.clamped(),
            factory,
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    pub fn limits(&self) -> SetLimits {
        self.limits
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn insert_new(
        &self,
        inner: &mut RegistryInner,
        key: Option<IpcKey>,
        nsems: usize,
    ) -> Result<Arc<dyn SemaphoreSet>, SemError> {
        if nsems == 0 || nsems > self.limits.semmsl {
            return Err(PreconditionError::InvalidArgument(format!(
                "number of semaphores must be between 1 and {}",
                self.limits.semmsl
            ))
            .into());
        }
        if inner.sets.len() >= self.limits.semmni {
            return Err(PreconditionError::NoSpace {
                max: self.limits.semmni,
            }
            .into());
        }

        let id = inner.allocate_id();
        let set = (self.factory)(id, key, nsems, self.limits);
        inner.sets.insert(id, Arc::clone(&set));
        if let Some(key) = key {
            inner.keys.insert(key, id);
        }
        Ok(set)
    }

    /// Create a set, or find the one already registered under `key`
    pub fn create(
        &self,
        key: Option<IpcKey>,
        nsems: usize,
        exclusive: bool,
    ) -> Result<SetId, SemError> {
        let key = key.filter(|k| *k != IPC_PRIVATE);
        let mut inner = self.lock();

        if let Some(existing) = key.and_then(|k| inner.keys.get(&k).copied()) {
            if exclusive {
                return Err(PreconditionError::AlreadyExists(format!(
                    "semaphore set with key {:#x}",
                    key.unwrap_or_default()
                ))
                .into());
            }
            let set = inner
                .sets
                .get(&existing)
                .ok_or(PreconditionError::UnknownSet(existing))?;
            if set.nsems() < nsems {
                return Err(PreconditionError::InvalidArgument(format!(
                    "set {} has only {} semaphores",
                    existing,
                    set.nsems()
                ))
                .into());
            }
            return Ok(existing);
        }

        let set = self.insert_new(&mut inner, key, nsems)?;
        Ok(set.id())
    }

    pub fn get(&self, id: SetId) -> Result<Arc<dyn SemaphoreSet>, SemError> {
        self.lock()
            .sets
            .get(&id)
            .cloned()
            .ok_or_else(|| PreconditionError::UnknownSet(id).into())
    }

    /// Remove a set, waking its blocked batches with `Removed`
    pub fn remove(&self, id: SetId) -> Result<(), SemError> {
        let set = self
            .lock()
            .detach(id)
            .ok_or(PreconditionError::UnknownSet(id))?;
        set.remove();
        Ok(())
    }

    /// Look up `id` and apply `batch` to it; blocks without holding the registry
    pub fn apply(&self, caller: CallerId, id: SetId, batch: &Batch) -> Result<(), SemError> {
        self.apply_cancellable(caller, id, batch, &Cancellation::new())
    }

    /// Apply a batch that may be abandoned through `cancel`
    pub fn apply_cancellable(
        &self,
        caller: CallerId,
        id: SetId,
        batch: &Batch,
        cancel: &Cancellation,
    ) -> Result<(), SemError> {
        let set = self.get(id)?;
        set.apply_cancellable(caller, batch, cancel)
    }

    /// Re-evaluate the blocked batches of one set; unknown ids are ignored
    pub fn wake(&self, id: SetId) {
        if let Ok(set) = self.get(id) {
            set.wake();
        }
    }

    pub fn list(&self) -> Vec<SetSnapshot> {
        let sets: Vec<_> = self.lock().sets.values().cloned().collect();
        sets.iter().map(|s| s.snapshot()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn all_sets(&self) -> Vec<Arc<dyn SemaphoreSet>> {
        self.lock().sets.values().cloned().collect()
    }

    /// Wake every blocked batch of `caller` in every set
    pub fn interrupt(&self, caller: CallerId) -> usize {
        self.all_sets().iter().map(|s| s.interrupt(caller)).sum()
    }

    /// Apply the undo ledger of `caller` in every set.
    /// Returns the number of adjustments applied.
    pub fn reap(&self, caller: CallerId) -> usize {
        self.all_sets().iter().map(|s| s.reap(caller).len()).sum()
    }

    /// Number of batches blocked across all sets
    pub fn blocked(&self) -> usize {
        self.all_sets().iter().map(|s| s.blocked()).sum()
    }

    /// Create (or open) a named single-counter semaphore
    pub fn create_named(
        &self,
        caller: CallerId,
        name: &str,
        value: u32,
        exclusive: bool,
    ) -> Result<SetId, SemError> {
        if name.is_empty() {
            return Err(PreconditionError::InvalidArgument("empty semaphore name".into()).into());
        }
        if value > self.limits.semvmx {
            return Err(PreconditionError::ValueOutOfRange {
                value: i64::from(value),
                max: self.limits.semvmx,
            }
            .into());
        }

        let mut inner = self.lock();
        if let Some(existing) = inner.names.get(name).copied() {
            if exclusive {
                return Err(PreconditionError::AlreadyExists(format!(
                    "named semaphore {:?}",
                    name
                ))
                .into());
            }
            return Ok(existing);
        }

        let set = self.insert_new(&mut inner, None, 1)?;
        inner.names.insert(name.to_string(), set.id());
        drop(inner);

        set.set_value(caller, 0, value)?;
        Ok(set.id())
    }

    pub fn named(&self, name: &str) -> Result<SetId, SemError> {
        self.lock()
            .names
            .get(name)
            .copied()
            .ok_or_else(|| PreconditionError::UnknownName(name.to_string()).into())
    }

    /// Increment a named semaphore by one
    pub fn post_named(&self, caller: CallerId, name: &str) -> Result<(), SemError> {
        let id = self.named(name)?;
        let batch = Batch::new(vec![OperationRequest::release(0, 1)])?;
        self.apply(caller, id, &batch)
    }

    /// Remove a named semaphore
    pub fn unlink_named(&self, name: &str) -> Result<(), SemError> {
        let id = self.named(name)?;
        self.remove(id)
    }

    /// Names of all named semaphores with their sets
    pub fn names(&self) -> Vec<(String, SetId)> {
        let mut names: Vec<_> = self
            .lock()
            .names
            .iter()
            .map(|(n, id)| (n.clone(), *id))
            .collect();
        names.sort();
        names
    }
}

impl Default for SetRegistry {
    fn default() -> Self {
        Self::new(SetLimits::default())
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
