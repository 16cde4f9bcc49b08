// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon management commands

use anyhow::Result;
use clap::Subcommand;
use svsem::client::{daemon_stop, read_daemon_pid, ClientError, DaemonClient};
use svsem::error::CliError;
use svsem_daemon::Config;

#[derive(Subcommand)]
pub enum DaemonCommand {
    /// Start the daemon if it is not running
    Start,
    /// Stop the daemon
    Stop,
    /// Show daemon status
    Status,
    /// Show the end of the daemon log
    Logs {
        /// Number of lines to show
        #[arg(long, short = 'n', default_value_t = 50)]
        lines: usize,
    },
}

pub async fn handle(command: DaemonCommand) -> Result<()> {
    match command {
        DaemonCommand::Start => start().await,
        DaemonCommand::Stop => stop().await,
        DaemonCommand::Status => status().await,
        DaemonCommand::Logs { lines } => logs(lines),
    }
}

async fn start() -> Result<()> {
    if DaemonClient::connect().is_ok() {
        println!("Daemon already running");
        return Ok(());
    }

    let client = DaemonClient::connect_or_start()
        .await
        .map_err(CliError::from)?;
    match read_daemon_pid(client.config()) {
        Some(pid) => println!("Daemon started (pid: {})", pid),
        None => println!("Daemon started"),
    }
    Ok(())
}

async fn stop() -> Result<()> {
    if daemon_stop().await.map_err(CliError::from)? {
        println!("Daemon stopped");
    } else {
        println!("Daemon not running");
    }
    Ok(())
}

async fn status() -> Result<()> {
    let client = match DaemonClient::connect() {
        Ok(client) => client,
        Err(ClientError::DaemonNotRunning) => {
            println!("Daemon not running");
            return Ok(());
        }
        Err(e) => return Err(CliError::from(e).into()),
    };

    let version = client.hello().await.map_err(CliError::from)?;
    let (uptime_secs, sets, blocked) = client.status().await.map_err(CliError::from)?;

    println!("Status: running");
    if let Some(pid) = read_daemon_pid(client.config()) {
        println!("  Pid: {}", pid);
    }
    println!("  Version: {}", version);
    println!("  Uptime: {}", format_uptime(uptime_secs));
    println!("  Sets: {}", sets);
    println!("  Blocked: {}", blocked);
    Ok(())
}

fn logs(lines: usize) -> Result<()> {
    let config = Config::from_env()?;
    let content = match std::fs::read_to_string(&config.log_path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            println!("No log at {}", config.log_path.display());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    for line in tail(&content, lines) {
        println!("{}", line);
    }
    Ok(())
}

fn tail(content: &str, lines: usize) -> impl Iterator<Item = &str> {
    let total = content.lines().count();
    content.lines().skip(total.saturating_sub(lines))
}

fn format_uptime(secs: u64) -> String {
    match secs {
        s if s < 60 => format!("{}s", s),
        s if s < 3600 => format!("{}m {}s", s / 60, s % 60),
        s => format!("{}h {}m", s / 3600, (s % 3600) / 60),
    }
}
