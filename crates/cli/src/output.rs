// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output formatting for CLI commands

use std::fmt;

use chrono::{DateTime, Local, Utc};
use clap::ValueEnum;
use serde::Serialize;
use svsem_core::{SetSnapshot, IPC_PRIVATE};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Print output in the specified format
pub fn print<T: Serialize + fmt::Display>(value: &T, format: OutputFormat) {
    match format {
        OutputFormat::Text => print!("{}", value),
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(value) {
                println!("{}", json);
            }
        }
    }
}

/// Print a list of items, one per line, under `header` in text mode
pub fn print_list<T: Serialize + fmt::Display>(items: &[T], header: &str, format: OutputFormat) {
    match format {
        OutputFormat::Text => {
            println!("{}", header);
            for item in items {
                println!("{}", item);
            }
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(items) {
                println!("{}", json);
            }
        }
    }
}

/// Full description of one set
#[derive(Serialize)]
#[serde(transparent)]
pub struct SetDetail<'a>(pub &'a SetSnapshot);

/// One line of a set listing
#[derive(Serialize)]
#[serde(transparent)]
pub struct SetRow<'a>(pub &'a SetSnapshot);

pub const SET_ROW_HEADER: &str = "key        semid      nsems";

fn key_hex(set: &SetSnapshot) -> String {
    format!("0x{:08x}", set.key.unwrap_or(IPC_PRIVATE))
}

fn timestamp(at: Option<DateTime<Utc>>) -> String {
    match at {
        Some(at) => at.with_timezone(&Local).format("%a %b %e %T %Y").to_string(),
        None => "Not set".to_string(),
    }
}

impl fmt::Display for SetRow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<10} {:<10} {}",
            key_hex(self.0),
            self.0.id,
            self.0.semaphores.len()
        )
    }
}

impl fmt::Display for SetDetail<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set = self.0;
        writeln!(f, "Semaphore Array semid={}", set.id)?;
        writeln!(f, "key={}  nsems={}", key_hex(set), set.semaphores.len())?;
        writeln!(f, "otime = {}", timestamp(set.last_op))?;
        writeln!(f, "ctime = {}", timestamp(Some(set.changed)))?;
        writeln!(
            f,
            "{:<10} {:<10} {:<10} {:<10} pid",
            "semnum", "value", "ncount", "zcount"
        )?;
        for (index, sem) in set.semaphores.iter().enumerate() {
            let pid = sem
                .last_pid
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string());
            writeln!(
                f,
                "{:<10} {:<10} {:<10} {:<10} {}",
                index, sem.value, sem.waiting_increase, sem.waiting_zero, pid
            )?;
        }
        Ok(())
    }
}
