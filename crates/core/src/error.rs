// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for semaphore set operations

use crate::op::SetId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A request the engine refuses before evaluating any counter
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum PreconditionError {
    #[error("empty operation list")]
    EmptyBatch,
    #[error("too many operations ({count}, maximum={max})")]
    TooManyOperations { count: usize, max: usize },
    #[error("semaphore index {index} out of range (set {set} has {nsems} semaphores)")]
    IndexOutOfRange { set: SetId, index: u16, nsems: usize },
    #[error("no semaphore set with id {0}")]
    UnknownSet(SetId),
    #[error("no named semaphore {0:?}")]
    UnknownName(String),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("value {value} out of range (0..={max})")]
    ValueOutOfRange { value: i64, max: u32 },
    #[error("no space for another semaphore set (maximum={max})")]
    NoSpace { max: usize },
}

/// Outcome of a batch that did not apply
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum SemError {
    /// A no-wait request could not be satisfied; nothing was applied
    #[error("operation would block")]
    WouldBlock,
    /// The set disappeared while the batch was blocked
    #[error("semaphore set {0} was removed")]
    Removed(SetId),
    /// A blocked batch was woken by an interrupt; nothing was applied
    #[error("interrupted while waiting")]
    Interrupted,
    /// A counter or undo entry would leave its permitted range
    #[error("semaphore {index} of set {set} would exceed its maximum ({max})")]
    Overflow { set: SetId, index: u16, max: u32 },
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
}

impl SemError {
    /// Whether resubmitting the identical batch can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, SemError::WouldBlock | SemError::Interrupted)
    }
}
