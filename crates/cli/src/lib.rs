// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic, clippy::unwrap_used, clippy::expect_used))]

//! svsem: command-line clients for the semd semaphore broker
//!
//! - `semop` applies operation groups to a set
//! - `svipc` administers sets and runs the small IPC utilities
//! - `semd` is the broker itself

pub mod client;
pub mod completions;
pub mod error;
pub mod executor;
pub mod output;

pub use client::{ClientError, DaemonClient, Session};
pub use error::CliError;
pub use executor::{BatchExecutor, BatchSink, ExecError, Summary};

/// Install a stderr subscriber filtered by `SVSEM_LOG` (default `warn`)
pub fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_env("SVSEM_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
