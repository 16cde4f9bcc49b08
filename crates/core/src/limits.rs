// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Limits for semaphore sets.
//!
//! The defaults mirror the conventional System V values. Only `MAX_SEMOPS`
//! is fixed; the others can be lowered through [`SetLimits`].

use serde::{Deserialize, Serialize};

/// Maximum number of operations in one batch.
pub const MAX_SEMOPS: usize = 512;
/// Maximum counter value; also the largest accepted operand.
pub const SEMVMX: u32 = 32767;
/// Maximum absolute value of an undo ledger entry.
pub const SEMAEM: u32 = SEMVMX;
/// Maximum number of semaphores per set.
pub const SEMMSL: usize = 32000;
/// Maximum number of live semaphore sets.
pub const SEMMNI: usize = 32000;

/// Limits applied by a set registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SetLimits {
    /// Counter ceiling
    pub semvmx: u32,
    /// Undo entry ceiling
    pub semaem: u32,
    /// Semaphores per set
    pub semmsl: usize,
    /// Live sets
    pub semmni: usize,
}

impl Default for SetLimits {
    fn default() -> Self {
        Self {
            semvmx: SEMVMX,
            semaem: SEMAEM,
            semmsl: SEMMSL,
            semmni: SEMMNI,
        }
    }
}

impl SetLimits {
    /// Create limits suitable for testing (lower values).
    pub fn for_testing() -> Self {
        Self {
            semvmx: 100,
            semaem: 100,
            semmsl: 16,
            semmni: 4,
        }
    }

    /// Clamp configured values into the range the engine supports.
    pub fn clamped(self) -> Self {
        Self {
            semvmx: self.semvmx.clamp(1, SEMVMX),
            semaem: self.semaem.clamp(1, SEMAEM),
            semmsl: self.semmsl.clamp(1, SEMMSL),
            semmni: self.semmni.clamp(1, SEMMNI),
        }
    }
}
