// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic, clippy::unwrap_used, clippy::expect_used))]

//! svsem-daemon: the broker process (semd) that hosts semaphore sets
//!
//! Clients talk to it over a Unix socket using [`protocol`].

pub mod lifecycle;
pub mod protocol;
mod run;
pub mod server;

pub use lifecycle::{socket_dir, state_dir, Config, LifecycleError};
pub use protocol::{ProtocolError, Request, Response, PROTOCOL_VERSION};
pub use run::{run, STARTUP_MARKER_PREFIX};
pub use server::Broker;
