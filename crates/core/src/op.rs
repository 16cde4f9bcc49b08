// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operation requests and batches submitted to a semaphore set

use crate::error::PreconditionError;
use crate::limits::MAX_SEMOPS;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a semaphore set inside a registry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SetId(pub u32);

impl fmt::Display for SetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Identity of the process issuing a batch (owner of an undo ledger)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerId(pub u32);

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// What a request does to its counter, derived from the sign of its delta
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpKind {
    /// Add to the counter
    Release,
    /// Subtract from the counter, waiting until enough is available
    Acquire,
    /// Wait until the counter reads zero
    WaitZero,
}

/// One operation against one semaphore of a set
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRequest {
    pub index: u16,
    pub delta: i32,
    #[serde(default)]
    pub no_wait: bool,
    #[serde(default)]
    pub auto_undo: bool,
}

impl OperationRequest {
    pub fn new(index: u16, delta: i32) -> Self {
        Self {
            index,
            delta,
            no_wait: false,
            auto_undo: false,
        }
    }

    pub fn release(index: u16, amount: u16) -> Self {
        Self::new(index, i32::from(amount))
    }

    pub fn acquire(index: u16, amount: u16) -> Self {
        Self::new(index, -i32::from(amount))
    }

    pub fn wait_zero(index: u16) -> Self {
        Self::new(index, 0)
    }

    pub fn no_wait(mut self) -> Self {
        self.no_wait = true;
        self
    }

    pub fn auto_undo(mut self) -> Self {
        self.auto_undo = true;
        self
    }

    pub fn kind(&self) -> OpKind {
        match self.delta {
            d if d > 0 => OpKind::Release,
            d if d < 0 => OpKind::Acquire,
            _ => OpKind::WaitZero,
        }
    }

    pub fn magnitude(&self) -> u32 {
        self.delta.unsigned_abs()
    }
}

/// Formats back into the operation-string grammar (`1-2un`, `0=0`, ...)
impl fmt::Display for OperationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            OpKind::Release => write!(f, "{}+{}", self.index, self.magnitude())?,
            OpKind::Acquire => write!(f, "{}-{}", self.index, self.magnitude())?,
            OpKind::WaitZero => write!(f, "{}=0", self.index)?,
        }
        if self.no_wait {
            f.write_str("n")?;
        }
        if self.auto_undo {
            f.write_str("u")?;
        }
        Ok(())
    }
}

/// An ordered, non-empty list of requests applied all-or-nothing
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<OperationRequest>", into = "Vec<OperationRequest>")]
pub struct Batch {
    ops: Vec<OperationRequest>,
}

impl Batch {
    /// Build a batch, enforcing the size bounds
    pub fn new(ops: Vec<OperationRequest>) -> Result<Self, PreconditionError> {
        if ops.is_empty() {
            return Err(PreconditionError::EmptyBatch);
        }
        if ops.len() > MAX_SEMOPS {
            return Err(PreconditionError::TooManyOperations {
                count: ops.len(),
                max: MAX_SEMOPS,
            });
        }
        Ok(Self { ops })
    }

    pub fn ops(&self) -> &[OperationRequest] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Highest semaphore index referenced by the batch
    pub fn max_index(&self) -> u16 {
        self.ops.iter().map(|op| op.index).max().unwrap_or(0)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OperationRequest> {
        self.ops.iter()
    }
}

impl TryFrom<Vec<OperationRequest>> for Batch {
    type Error = PreconditionError;

    fn try_from(ops: Vec<OperationRequest>) -> Result<Self, Self::Error> {
        Batch::new(ops)
    }
}

impl From<Batch> for Vec<OperationRequest> {
    fn from(batch: Batch) -> Self {
        batch.ops
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a OperationRequest;
    type IntoIter = std::slice::Iter<'a, OperationRequest>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.iter()
    }
}

impl fmt::Display for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, op) in self.ops.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", op)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "op_tests.rs"]
mod tests;
