// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! semop - apply operation groups to a semaphore set
//!
//! Each argument after the set id is one group, applied atomically.
//! `SIGUSR1` interrupts a group that is blocked; it is then resubmitted.

use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use svsem::{BatchExecutor, CliError, DaemonClient, ExecError};
use svsem_core::{SetId, SystemClock};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, warn};

const OPS_HELP: &str = "\
'op' is either: <sem#>{+|-}<value>[u][n]
            or: <sem#>=0[n]
    \"n\" means fail instead of waiting (no-wait)
    \"u\" means undo the operation when this process exits
The operations in each argument are performed as one atomic batch.

Examples:
    semop 12345 0+1,1-2un
    semop 12345 0=0n 1+1,2-1u 1=0";

#[derive(Parser)]
#[command(
    name = "semop",
    version,
    about = "Apply operation groups to a semaphore set",
    override_usage = "semop <SET_ID> op[,op...] [op[,op...]...]",
    arg_required_else_help = true,
    after_help = OPS_HELP
)]
struct Cli {
    /// Semaphore set id
    set: u32,

    /// Operation groups, each applied as one batch
    #[arg(required = true, allow_hyphen_values = true, value_name = "OPS")]
    groups: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.kind() == ErrorKind::DisplayVersion => e.exit(),
        Err(e) => {
            // Usage, including --help, goes to stderr
            eprint!("{}", e.render());
            if !matches!(
                e.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            ) {
                eprintln!("\n{}", OPS_HELP);
            }
            return ExitCode::from(2);
        }
    };

    svsem::setup_logging();

    match run(cli).await {
        Ok(code) => code,
        Err(message) => {
            eprint!("{}", message);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, String> {
    let pid = std::process::id();

    // Installed before connecting so an early SIGUSR1 cannot kill the process
    let mut interrupts = signal(SignalKind::user_defined1())
        .map_err(|e| format!("error: cannot handle SIGUSR1: {}\n", e))?;

    let client = DaemonClient::connect_or_start()
        .await
        .map_err(|e| CliError::from(e).to_string())?;
    let session = client
        .session(pid)
        .await
        .map_err(|e| CliError::from(e).to_string())?;

    tokio::spawn(async move {
        while interrupts.recv().await.is_some() {
            match client.interrupt(pid).await {
                Ok(woken) => debug!(woken, "interrupted own batches"),
                Err(e) => warn!("interrupt failed: {}", e),
            }
        }
    });

    let mut executor = BatchExecutor::new(
        session,
        SystemClock,
        pid,
        std::io::stdout(),
        std::io::stderr(),
    );
    match executor.run(SetId(cli.set), &cli.groups).await {
        Ok(summary) => Ok(ExitCode::from(summary.exit_code() as u8)),
        Err(ExecError::Resolve { source, .. }) => Err(CliError::from(source).to_string()),
        Err(e) => Err(format!("{}\n", e)),
    }
}
