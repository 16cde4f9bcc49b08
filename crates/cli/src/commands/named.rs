// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named semaphores hosted by the daemon

use anyhow::Result;
use clap::Subcommand;
use svsem::client::DaemonClient;
use svsem::error::CliError;

#[derive(Subcommand)]
pub enum NamedCommand {
    /// Create a named semaphore, or open an existing one
    Create {
        name: String,
        /// Initial value
        #[arg(long, default_value_t = 0)]
        value: u32,
        /// Fail if the name already exists
        #[arg(long)]
        exclusive: bool,
    },
    /// Increment a named semaphore by one
    Post { name: String },
    /// Remove a named semaphore
    Unlink { name: String },
}

pub async fn handle(command: NamedCommand, client: &DaemonClient) -> Result<()> {
    match command {
        NamedCommand::Create {
            name,
            value,
            exclusive,
        } => {
            let id = client
                .named_create(&name, value, exclusive)
                .await
                .map_err(CliError::from)?;
            println!("{} is semaphore set {}", name, id);
        }
        NamedCommand::Post { name } => {
            client.named_post(&name).await.map_err(CliError::from)?;
            println!("{} sem_post() succeeded", std::process::id());
        }
        NamedCommand::Unlink { name } => {
            client.named_unlink(&name).await.map_err(CliError::from)?;
            println!("Unlinked {}", name);
        }
    }
    Ok(())
}
