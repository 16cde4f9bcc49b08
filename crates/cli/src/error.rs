// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-friendly error display with context and suggestions.
//!
//! A [`CliError`] says what went wrong, why it might have happened and how
//! to fix it.

use std::fmt;

use svsem_core::{PreconditionError, SemError, SetId};

use crate::client::ClientError;

/// Error with context and recovery suggestions for user-friendly display.
#[derive(Debug)]
pub struct CliError {
    /// What went wrong
    pub message: String,
    /// Why it might have happened
    pub context: Vec<String>,
    /// How to fix it
    pub suggestions: Vec<String>,
    /// Original error if any
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: Vec::new(),
            suggestions: Vec::new(),
            source: None,
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            for ctx in &self.context {
                writeln!(f, "  -> {}", ctx)?;
            }
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            writeln!(f, "suggestions:")?;
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Common error builders for typical failure scenarios.
impl CliError {
    pub fn daemon_not_running() -> Self {
        CliError::new("semd is not running")
            .with_suggestion("Start it with: svipc daemon start")
    }

    pub fn daemon_start_failed(reason: &str) -> Self {
        CliError::new("semd failed to start")
            .with_context(reason.to_string())
            .with_suggestion("Inspect the log: svipc daemon logs")
            .with_suggestion("Check for another daemon: svipc daemon status")
    }

    pub fn unknown_set(id: SetId) -> Self {
        CliError::new(format!("No semaphore set with id {}", id))
            .with_context("The set may have been removed, or the daemon restarted")
            .with_suggestion("List existing sets: svipc list")
            .with_suggestion("Create one: svipc create <nsems>")
    }

    pub fn unknown_name(name: &str) -> Self {
        CliError::new(format!("No named semaphore {:?}", name))
            .with_suggestion(format!("Create it: svipc named create {}", name))
    }
}

impl From<ClientError> for CliError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::DaemonNotRunning => CliError::daemon_not_running(),
            ClientError::DaemonStartFailed(ref reason) => {
                CliError::daemon_start_failed(reason).with_source(err)
            }
            ClientError::Engine(SemError::Precondition(PreconditionError::UnknownSet(id))) => {
                CliError::unknown_set(id)
            }
            ClientError::Engine(SemError::Precondition(PreconditionError::UnknownName(
                ref name,
            ))) => CliError::unknown_name(name),
            other => CliError::new(other.to_string()).with_source(other),
        }
    }
}
