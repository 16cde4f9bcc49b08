// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Semaphore set administration

use anyhow::Result;
use clap::Subcommand;
use svsem::client::DaemonClient;
use svsem::error::CliError;
use svsem::output::{self, OutputFormat, SetDetail, SetRow, SET_ROW_HEADER};
use svsem_core::{IpcKey, SetId};

#[derive(Subcommand)]
pub enum SetCommand {
    /// Create a semaphore set, or open the one registered under --key
    Create {
        /// Number of semaphores in the set
        nsems: usize,
        /// Key to register the set under (decimal or 0x hex)
        #[arg(long, value_parser = parse_key)]
        key: Option<IpcKey>,
        /// Fail if a set already exists under --key
        #[arg(long)]
        exclusive: bool,
    },
    /// Remove a semaphore set, waking its blocked batches
    Rm {
        /// Set id
        id: u32,
    },
    /// Show the semaphores of a set
    Show {
        /// Set id
        id: u32,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// List semaphore sets
    List {
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Set one semaphore's value
    Set {
        /// Set id
        id: u32,
        /// Semaphore index
        index: u16,
        value: u32,
    },
    /// Set every semaphore of a set
    Setall {
        /// Set id
        id: u32,
        /// One value per semaphore
        #[arg(required = true)]
        values: Vec<u32>,
    },
    /// Interrupt every blocked batch of a process
    Interrupt {
        /// Process id owning the batches
        pid: u32,
    },
}

pub async fn handle(command: SetCommand, client: &DaemonClient) -> Result<()> {
    match command {
        SetCommand::Create {
            nsems,
            key,
            exclusive,
        } => {
            let id = client
                .create(key, nsems, exclusive)
                .await
                .map_err(CliError::from)?;
            println!("{}", id);
        }
        SetCommand::Rm { id } => {
            client.remove(SetId(id)).await.map_err(CliError::from)?;
            println!("Removed semaphore set {}", id);
        }
        SetCommand::Show { id, format } => {
            let set = client.show(SetId(id)).await.map_err(CliError::from)?;
            output::print(&SetDetail(&set), format);
        }
        SetCommand::List { format } => {
            let sets = client.list().await.map_err(CliError::from)?;
            let rows: Vec<SetRow> = sets.iter().map(SetRow).collect();
            output::print_list(&rows, SET_ROW_HEADER, format);
        }
        SetCommand::Set { id, index, value } => {
            client
                .set_value(SetId(id), index, value)
                .await
                .map_err(CliError::from)?;
        }
        SetCommand::Setall { id, values } => {
            client
                .set_all(SetId(id), values)
                .await
                .map_err(CliError::from)?;
        }
        SetCommand::Interrupt { pid } => {
            let woken = client.interrupt(pid).await.map_err(CliError::from)?;
            println!("Interrupted {} blocked batch(es) of {}", woken, pid);
        }
    }
    Ok(())
}

/// Parse a key written in decimal or `0x` hexadecimal
fn parse_key(text: &str) -> Result<IpcKey, String> {
    let parsed = match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16).map(|k| k as IpcKey),
        None => text.parse::<IpcKey>(),
    };
    parsed.map_err(|_| format!("invalid key: {:?}", text))
}
