// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! svipc - semaphore set administration and IPC utilities

mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{append, daemon, key, named, sets};
use svsem::completions::{generate_completions, CompletionsArgs};
use svsem::{CliError, DaemonClient};

#[derive(Parser)]
#[command(
    name = "svipc",
    version,
    about = "Semaphore sets, named semaphores and IPC utilities"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Set(sets::SetCommand),
    /// Named semaphores
    Named {
        #[command(subcommand)]
        command: named::NamedCommand,
    },
    /// Daemon management
    Daemon {
        #[command(subcommand)]
        command: daemon::DaemonCommand,
    },
    /// Derive an IPC key from a path and a project id
    Key(key::KeyArgs),
    /// Append bytes to a file one write at a time
    Append(append::AppendArgs),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    svsem::setup_logging();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<CliError>() {
                Some(cli_error) => eprint!("{}", cli_error),
                None => eprintln!("error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Daemon { command } => daemon::handle(command).await,
        Commands::Key(args) => key::handle(args),
        Commands::Append(args) => append::handle(args),
        Commands::Completions(args) => {
            generate_completions::<Cli>(args.shell, &mut std::io::stdout());
            Ok(())
        }
        Commands::Set(command) => {
            let client = connect().await?;
            sets::handle(command, &client).await
        }
        Commands::Named { command } => {
            let client = connect().await?;
            named::handle(command, &client).await
        }
    }
}

/// Connect to the daemon, starting it when needed
async fn connect() -> Result<DaemonClient> {
    Ok(DaemonClient::connect_or_start()
        .await
        .map_err(CliError::from)?)
}
