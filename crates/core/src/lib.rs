// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic, clippy::unwrap_used, clippy::expect_used))]

//! svsem-core: counting semaphore sets with atomic multi-operation batches
//!
//! This crate provides:
//! - The operation-string parser (`0+1,1-2nu,2=0`)
//! - In-memory semaphore sets with all-or-nothing batch application
//! - Per-caller undo ledgers applied when a caller goes away
//! - A registry of sets addressed by id, key or name

pub mod append;
pub mod clock;
pub mod error;
pub mod ipckey;
pub mod ledger;
pub mod limits;
pub mod op;
pub mod parser;
pub mod registry;
pub mod semset;
pub mod traced;

pub use clock::{Clock, FakeClock, SystemClock};
pub use error::{PreconditionError, SemError};
pub use ipckey::{derive_key, IpcKey, KeyInfo, IPC_PRIVATE};
pub use limits::{SetLimits, MAX_SEMOPS, SEMAEM, SEMVMX};
pub use op::{Batch, CallerId, OpKind, OperationRequest, SetId};
pub use parser::{parse_batch, parse_ops, ParseError, ParseErrorKind};
pub use registry::SetRegistry;
pub use semset::{Cancellation, LocalSemaphoreSet, SemaphoreInfo, SemaphoreSet, SetSnapshot};
pub use traced::TracedSemaphoreSet;
