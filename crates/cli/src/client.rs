// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client for CLI commands

use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, Instant};

use svsem_core::{Batch, IpcKey, SemError, SetId, SetSnapshot};
use svsem_daemon::protocol::{self, ProtocolError};
use svsem_daemon::{Config, LifecycleError, Request, Response, PROTOCOL_VERSION, STARTUP_MARKER_PREFIX};
use thiserror::Error;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;

// Timeout configuration (env vars in milliseconds)
fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Timeout for IPC requests that never block
pub fn timeout_ipc() -> Duration {
    parse_duration_ms("SVSEM_TIMEOUT_IPC_MS").unwrap_or(Duration::from_secs(5))
}

/// Timeout for waiting for daemon to start
pub fn timeout_connect() -> Duration {
    parse_duration_ms("SVSEM_TIMEOUT_CONNECT_MS").unwrap_or(Duration::from_secs(5))
}

/// Timeout for waiting for process to exit
pub fn timeout_exit() -> Duration {
    parse_duration_ms("SVSEM_TIMEOUT_EXIT_MS").unwrap_or(Duration::from_secs(2))
}

/// Polling interval for retries
pub fn poll_interval() -> Duration {
    parse_duration_ms("SVSEM_POLL_INTERVAL_MS").unwrap_or(Duration::from_millis(50))
}

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Daemon not running")]
    DaemonNotRunning,

    #[error("Failed to start daemon: {0}")]
    DaemonStartFailed(String),

    #[error("Connection timeout waiting for daemon to start")]
    DaemonStartTimeout,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Engine(#[from] SemError),

    #[error("Unexpected response from daemon")]
    UnexpectedResponse,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not determine state directory")]
    NoStateDir,
}

impl From<LifecycleError> for ClientError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Io(e) => ClientError::Io(e),
            LifecycleError::NoStateDir => ClientError::NoStateDir,
            other => ClientError::DaemonStartFailed(other.to_string()),
        }
    }
}

/// Turn a response that does not answer the request into an error
fn unexpected(response: Response) -> ClientError {
    match response {
        Response::Failed { error } => ClientError::Engine(error),
        Response::Error { message } => ClientError::Rejected(message),
        _ => ClientError::UnexpectedResponse,
    }
}

/// Daemon client
pub struct DaemonClient {
    config: Config,
}

impl DaemonClient {
    /// Connect to daemon, auto-starting if not running
    pub async fn connect_or_start() -> Result<Self, ClientError> {
        let config = Config::from_env()?;

        // Check version file before connecting - restart daemon if version mismatch
        if let Ok(daemon_version) = std::fs::read_to_string(&config.version_path) {
            if daemon_version.trim() != PROTOCOL_VERSION {
                let _ = daemon_stop().await;
            }
        }

        match Self::connect() {
            Ok(client) => Ok(client),
            Err(ClientError::DaemonNotRunning) => {
                // Start daemon in background
                let child = start_daemon_background()?;
                // Wait for socket with retry, watching for early exit
                Self::connect_with_retry(&config, timeout_connect(), child).await
            }
            Err(e) => Err(wrap_with_startup_error(e, &config)),
        }
    }

    /// Connect to existing daemon (no auto-start)
    pub fn connect() -> Result<Self, ClientError> {
        let config = Config::from_env()?;

        if !config.socket_path.exists() {
            return Err(ClientError::DaemonNotRunning);
        }
        // A socket left behind by a killed daemon
        if let Some(pid) = read_daemon_pid(&config) {
            if !process_exists(pid) {
                return Err(ClientError::DaemonNotRunning);
            }
        }

        Ok(Self { config })
    }

    async fn connect_with_retry(
        config: &Config,
        timeout: Duration,
        mut child: std::process::Child,
    ) -> Result<Self, ClientError> {
        let start = Instant::now();
        while start.elapsed() < timeout {
            // Check if daemon process exited early (startup failure)
            if let Ok(Some(status)) = child.try_wait() {
                // Poll for startup error in log (filesystem may need to sync)
                let poll_start = Instant::now();
                while poll_start.elapsed() < timeout_exit() {
                    if let Some(err) = read_startup_error(config) {
                        return Err(ClientError::DaemonStartFailed(err));
                    }
                    tokio::time::sleep(poll_interval()).await;
                }
                return Err(ClientError::DaemonStartFailed(format!(
                    "exited with {}",
                    status
                )));
            }

            match Self::connect() {
                Ok(client) => return Ok(client),
                Err(ClientError::DaemonNotRunning) => {
                    tokio::time::sleep(poll_interval()).await;
                }
                Err(e) => return Err(wrap_with_startup_error(e, config)),
            }
        }

        // Timeout - check log for startup errors
        Err(wrap_with_startup_error(
            ClientError::DaemonStartTimeout,
            config,
        ))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Send a request on a fresh connection and receive a response
    pub async fn send(&self, request: Request) -> Result<Response, ClientError> {
        let stream = UnixStream::connect(&self.config.socket_path).await?;
        let (mut reader, mut writer) = stream.into_split();
        exchange(&mut reader, &mut writer, &request, Some(timeout_ipc())).await
    }

    /// Open a persistent session owned by `pid`
    pub async fn session(&self, pid: u32) -> Result<Session, ClientError> {
        let stream = UnixStream::connect(&self.config.socket_path).await?;
        let (reader, writer) = stream.into_split();
        let mut session = Session {
            reader,
            writer,
            pid,
        };
        match session
            .call(
                Request::Hello {
                    version: PROTOCOL_VERSION.to_string(),
                    pid: Some(pid),
                },
                Some(timeout_ipc()),
            )
            .await?
        {
            Response::Hello { .. } => Ok(session),
            other => Err(unexpected(other)),
        }
    }

    /// Get daemon version via Hello handshake
    pub async fn hello(&self) -> Result<String, ClientError> {
        match self
            .send(Request::Hello {
                version: PROTOCOL_VERSION.to_string(),
                pid: None,
            })
            .await?
        {
            Response::Hello { version } => Ok(version),
            other => Err(unexpected(other)),
        }
    }

    /// Get daemon status: uptime, sets, blocked batches
    pub async fn status(&self) -> Result<(u64, usize, usize), ClientError> {
        match self.send(Request::Status).await? {
            Response::Status {
                uptime_secs,
                sets,
                blocked,
            } => Ok((uptime_secs, sets, blocked)),
            other => Err(unexpected(other)),
        }
    }

    /// Request daemon shutdown
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        match self.send(Request::Shutdown).await? {
            Response::Ok | Response::ShuttingDown => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    pub async fn create(
        &self,
        key: Option<IpcKey>,
        nsems: usize,
        exclusive: bool,
    ) -> Result<SetId, ClientError> {
        match self
            .send(Request::Create {
                key,
                nsems,
                exclusive,
            })
            .await?
        {
            Response::Created { id } => Ok(id),
            other => Err(unexpected(other)),
        }
    }

    pub async fn remove(&self, id: SetId) -> Result<(), ClientError> {
        self.expect_ok(Request::Remove { id }).await
    }

    pub async fn show(&self, id: SetId) -> Result<SetSnapshot, ClientError> {
        match self.send(Request::Show { id }).await? {
            Response::Set { set } => Ok(set),
            other => Err(unexpected(other)),
        }
    }

    pub async fn list(&self) -> Result<Vec<SetSnapshot>, ClientError> {
        match self.send(Request::List).await? {
            Response::Sets { sets } => Ok(sets),
            other => Err(unexpected(other)),
        }
    }

    pub async fn set_value(&self, id: SetId, index: u16, value: u32) -> Result<(), ClientError> {
        self.expect_ok(Request::SetValue { id, index, value }).await
    }

    pub async fn set_all(&self, id: SetId, values: Vec<u32>) -> Result<(), ClientError> {
        self.expect_ok(Request::SetAll { id, values }).await
    }

    /// Wake every blocked batch of `pid`, returning how many were woken
    pub async fn interrupt(&self, pid: u32) -> Result<usize, ClientError> {
        match self.send(Request::Interrupt { pid }).await? {
            Response::Interrupted { woken } => Ok(woken),
            other => Err(unexpected(other)),
        }
    }

    pub async fn named_create(
        &self,
        name: &str,
        value: u32,
        exclusive: bool,
    ) -> Result<SetId, ClientError> {
        match self
            .send(Request::NamedCreate {
                name: name.to_string(),
                value,
                exclusive,
            })
            .await?
        {
            Response::Created { id } => Ok(id),
            other => Err(unexpected(other)),
        }
    }

    pub async fn named_post(&self, name: &str) -> Result<(), ClientError> {
        self.expect_ok(Request::NamedPost {
            name: name.to_string(),
        })
        .await
    }

    pub async fn named_unlink(&self, name: &str) -> Result<(), ClientError> {
        self.expect_ok(Request::NamedUnlink {
            name: name.to_string(),
        })
        .await
    }

    async fn expect_ok(&self, request: Request) -> Result<(), ClientError> {
        match self.send(request).await? {
            Response::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}

/// A persistent connection whose batches are owned by one pid.
///
/// The daemon applies the pid's undo ledger once every session of that pid
/// has closed.
pub struct Session {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    pid: u32,
}

impl Session {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    async fn call(
        &mut self,
        request: Request,
        read_timeout: Option<Duration>,
    ) -> Result<Response, ClientError> {
        exchange(&mut self.reader, &mut self.writer, &request, read_timeout).await
    }

    pub async fn show(&mut self, id: SetId) -> Result<SetSnapshot, ClientError> {
        match self.call(Request::Show { id }, Some(timeout_ipc())).await? {
            Response::Set { set } => Ok(set),
            other => Err(unexpected(other)),
        }
    }

    /// Apply a batch, waiting as long as it stays blocked
    pub async fn semop(&mut self, id: SetId, ops: &Batch) -> Result<(), ClientError> {
        match self
            .call(
                Request::Semop {
                    id,
                    ops: ops.clone(),
                },
                None,
            )
            .await?
        {
            Response::Applied => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}

/// Write one request and read its response
async fn exchange(
    reader: &mut OwnedReadHalf,
    writer: &mut OwnedWriteHalf,
    request: &Request,
    read_timeout: Option<Duration>,
) -> Result<Response, ClientError> {
    let data = protocol::encode(request)?;
    tokio::time::timeout(timeout_ipc(), protocol::write_message(writer, &data))
        .await
        .map_err(|_| ProtocolError::Timeout)??;

    let response_bytes = match read_timeout {
        Some(timeout) => tokio::time::timeout(timeout, protocol::read_message(reader))
            .await
            .map_err(|_| ProtocolError::Timeout)??,
        None => protocol::read_message(reader).await?,
    };

    Ok(protocol::decode(&response_bytes)?)
}

/// Start the daemon in the background, returning the child process handle
fn start_daemon_background() -> Result<std::process::Child, ClientError> {
    let semd_path = find_semd_binary();

    Command::new(&semd_path)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map_err(|e| {
            ClientError::DaemonStartFailed(format!("{}: {}", semd_path.display(), e))
        })
}

/// Stop the daemon (graceful first, then forceful)
/// Returns true if daemon was stopped, false if it wasn't running
pub async fn daemon_stop() -> Result<bool, ClientError> {
    let config = Config::from_env()?;
    let client = match DaemonClient::connect() {
        Ok(c) => c,
        Err(ClientError::DaemonNotRunning) => {
            cleanup_stale_files(&config);
            return Ok(false);
        }
        Err(e) => return Err(e),
    };

    // Try graceful shutdown (timeout handled by send())
    let shutdown_result = client.shutdown().await;

    if let Some(pid) = read_daemon_pid(&config) {
        if shutdown_result.is_ok() {
            wait_for_exit(pid, timeout_exit()).await;
        }

        // Force kill if still running
        if process_exists(pid) {
            force_kill_daemon(pid);
            wait_for_exit(pid, timeout_exit()).await;
        }
    }

    cleanup_stale_files(&config);

    Ok(true)
}

/// Wait for a process to exit
async fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if !process_exists(pid) {
            return true;
        }
        tokio::time::sleep(poll_interval()).await;
    }
    false
}

/// Find the semd binary
fn find_semd_binary() -> PathBuf {
    // Explicit override (used by tests to ensure correct binary)
    if let Ok(path) = std::env::var("SVSEM_DAEMON_BINARY") {
        return PathBuf::from(path);
    }

    // Installed next to the CLI
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("semd");
            if sibling.exists() {
                return sibling;
            }
        }
    }

    // Fall back to PATH lookup
    PathBuf::from("semd")
}

/// Remove files a dead daemon left behind
///
/// Never called while connecting: a daemon mid-startup holds its pid file
/// before the socket exists.
fn cleanup_stale_files(config: &Config) {
    for path in [&config.lock_path, &config.socket_path, &config.version_path] {
        if path.exists() {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Get the PID from the daemon PID file, if it exists
pub fn read_daemon_pid(config: &Config) -> Option<u32> {
    std::fs::read_to_string(&config.lock_path)
        .ok()
        .and_then(|content| content.trim().parse::<u32>().ok())
}

/// Check if a process with the given PID exists
pub fn process_exists(pid: u32) -> bool {
    // Use kill -0 to check if process exists without sending a signal
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Force kill a daemon process
pub fn force_kill_daemon(pid: u32) -> bool {
    Command::new("kill")
        .args(["-9", &pid.to_string()])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

const FAILED_TO_START: &str = "Failed to start daemon: ";

/// Read daemon log from the last startup marker, looking for errors.
/// Returns the error message if found, None otherwise.
pub fn read_startup_error(config: &Config) -> Option<String> {
    let content = std::fs::read_to_string(&config.log_path).ok()?;

    let start_pos = content.rfind(STARTUP_MARKER_PREFIX)?;
    let startup_log = &content[start_pos..];

    let mut messages: Vec<String> = Vec::new();
    for line in startup_log
        .lines()
        .filter(|line| line.contains(" ERROR ") || line.contains("Failed to start"))
    {
        // Format: "timestamp LEVEL target: message"
        let message = match line.find(FAILED_TO_START) {
            Some(pos) => line[pos + FAILED_TO_START.len()..].to_string(),
            None => line
                .split_once(": ")
                .map(|(_, msg)| msg.to_string())
                .unwrap_or_else(|| line.to_string()),
        };
        // The daemon writes the same failure synchronously and through tracing
        if !messages.contains(&message) {
            messages.push(message);
        }
    }

    if messages.is_empty() {
        None
    } else {
        Some(messages.join("\n"))
    }
}

/// Wrap an error with startup log info if available.
fn wrap_with_startup_error(err: ClientError, config: &Config) -> ClientError {
    // Don't double-wrap
    if matches!(err, ClientError::DaemonStartFailed(_)) {
        return err;
    }

    match read_startup_error(config) {
        Some(startup_error) => ClientError::DaemonStartFailed(startup_error),
        None => err,
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
