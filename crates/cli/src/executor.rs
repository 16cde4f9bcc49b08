// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batch executor behind `semop`.
//!
//! Each operation group is parsed and submitted in order. A group that would
//! block under no-wait is reported and skipped; an interrupted group is
//! resubmitted unchanged; any other failure ends the run.

use std::io::Write;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use svsem_core::{parse_batch, Batch, Clock, ParseError, SemError, SetId, SetSnapshot};
use thiserror::Error;

use crate::client::{ClientError, Session};

/// Where batches are submitted
#[async_trait]
pub trait BatchSink: Send {
    /// Look up a set before submitting anything to it
    async fn resolve(&mut self, id: SetId) -> Result<SetSnapshot, ClientError>;

    async fn apply(&mut self, id: SetId, ops: &Batch) -> Result<(), ClientError>;
}

#[async_trait]
impl BatchSink for Session {
    async fn resolve(&mut self, id: SetId) -> Result<SetSnapshot, ClientError> {
        self.show(id).await
    }

    async fn apply(&mut self, id: SetId, ops: &Batch) -> Result<(), ClientError> {
        self.semop(id, ops).await
    }
}

/// Failure that ends a run
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("semaphore set {set}: {source}")]
    Resolve {
        set: SetId,
        #[source]
        source: ClientError,
    },

    #[error("semop (PID={pid}) failed, {source} [{group}]")]
    Engine {
        pid: u32,
        group: String,
        #[source]
        source: SemError,
    },

    #[error("semop (PID={pid}) failed, {source} [{group}]")]
    Client {
        pid: u32,
        group: String,
        #[source]
        source: ClientError,
    },

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// What a finished run did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub applied: usize,
    pub would_block: usize,
}

impl Summary {
    /// Exit status: groups that would have blocked make the run unsuccessful
    pub fn exit_code(&self) -> i32 {
        if self.would_block > 0 {
            1
        } else {
            0
        }
    }
}

/// Submits operation groups and reports each outcome
pub struct BatchExecutor<S, C, O, E> {
    sink: S,
    clock: C,
    pid: u32,
    out: O,
    err: E,
}

impl<S, C, O, E> BatchExecutor<S, C, O, E>
where
    S: BatchSink,
    C: Clock,
    O: Write,
    E: Write,
{
    pub fn new(sink: S, clock: C, pid: u32, out: O, err: E) -> Self {
        Self {
            sink,
            clock,
            pid,
            out,
            err,
        }
    }

    /// Run every group against `set`, stopping at the first fatal failure
    pub async fn run(&mut self, set: SetId, groups: &[String]) -> Result<Summary, ExecError> {
        self.sink
            .resolve(set)
            .await
            .map_err(|source| ExecError::Resolve { set, source })?;

        let mut summary = Summary::default();
        for group in groups {
            let submitted = self.clock.now();
            let batch = parse_batch(group)?;
            tracing::debug!(set = %set, ops = batch.len(), group = %group, "submitting");

            loop {
                match self.sink.apply(set, &batch).await {
                    Ok(()) => {
                        let completed = self.clock.now();
                        writeln!(
                            self.out,
                            "{:>5}, {} -> {}: semop() completed [{}]",
                            self.pid,
                            time(&submitted),
                            time(&completed),
                            group
                        )?;
                        summary.applied += 1;
                        break;
                    }
                    Err(ClientError::Engine(SemError::Interrupted)) => {
                        writeln!(
                            self.err,
                            "{:>5}, {}: semop() interrupted, retrying [{}]",
                            self.pid,
                            time(&self.clock.now()),
                            group
                        )?;
                    }
                    Err(ClientError::Engine(SemError::WouldBlock)) => {
                        let completed = self.clock.now();
                        writeln!(
                            self.err,
                            "{:>5}, {} -> {}: semop() would block [{}]",
                            self.pid,
                            time(&submitted),
                            time(&completed),
                            group
                        )?;
                        summary.would_block += 1;
                        break;
                    }
                    Err(ClientError::Engine(source)) => {
                        return Err(ExecError::Engine {
                            pid: self.pid,
                            group: group.clone(),
                            source,
                        })
                    }
                    Err(source) => {
                        return Err(ExecError::Client {
                            pid: self.pid,
                            group: group.clone(),
                            source,
                        })
                    }
                }
            }
        }

        Ok(summary)
    }
}

fn time(at: &DateTime<Local>) -> String {
    at.format("%T").to_string()
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
