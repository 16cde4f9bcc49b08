// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: configuration, startup, shutdown.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use serde::Deserialize;
use svsem_core::SetLimits;
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{info, warn};

use crate::server::Broker;

/// Name of the socket file inside the socket directory
pub const SOCKET_NAME: &str = "semd.sock";

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding pid, version, log and config files
    pub state_dir: PathBuf,
    /// Path to Unix socket
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to version file
    pub version_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    /// Path to the optional settings file
    pub settings_path: PathBuf,
    /// Limits applied to every set
    pub limits: SetLimits,
}

/// Contents of `semd.toml`
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub limits: SetLimits,
}

impl Settings {
    pub fn parse(content: &str) -> Result<Self, LifecycleError> {
        Ok(toml::from_str(content)?)
    }
}

impl Config {
    /// Paths derived from the environment, with default limits
    pub fn from_env() -> Result<Self, LifecycleError> {
        Ok(Self::in_dirs(&state_dir()?, &socket_dir()))
    }

    /// Apply limits from `semd.toml`, if present
    pub fn with_settings(mut self) -> Result<Self, LifecycleError> {
        match std::fs::read_to_string(&self.settings_path) {
            Ok(content) => self.limits = Settings::parse(&content)?.limits.clamped(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(self)
    }

    pub fn in_dirs(state_dir: &Path, socket_dir: &Path) -> Self {
        Self {
            state_dir: state_dir.to_path_buf(),
            socket_path: socket_dir.join(SOCKET_NAME),
            lock_path: state_dir.join("semd.pid"),
            version_path: state_dir.join("semd.version"),
            log_path: state_dir.join("semd.log"),
            settings_path: state_dir.join("semd.toml"),
            limits: SetLimits::default(),
        }
    }
}

/// Daemon state during operation
pub struct DaemonState {
    /// Configuration
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    /// Unix socket listener
    pub listener: UnixListener,
    /// Semaphore sets and sessions, shared with connection tasks
    pub broker: Arc<Broker>,
}

impl DaemonState {
    /// Shutdown the daemon gracefully
    pub async fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        let blocked = self.broker.blocked();
        if blocked > 0 {
            warn!("{} batches still blocked at shutdown", blocked);
        }

        for path in [
            &self.config.socket_path,
            &self.config.lock_path,
            &self.config.version_path,
        ] {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }

        // Lock file is released automatically when self.lock_file is dropped

        info!("Daemon shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("Invalid settings: {0}")]
    Settings(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config).await {
        Ok(state) => Ok(state),
        // Another daemon owns these files
        Err(e @ LifecycleError::LockFailed(_)) => Err(e),
        Err(e) => {
            // Clean up any resources created before failure
            cleanup_on_failure(config);
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(config: &Config) -> Result<DaemonState, LifecycleError> {
    // 1. Create directories
    std::fs::create_dir_all(&config.state_dir)?;
    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // 2. Acquire lock file FIRST - prevents races.
    // Opened without truncation so a failed attempt keeps the owner's pid.
    let mut lock_file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    use std::io::Write;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    // 3. Write version file
    std::fs::write(&config.version_path, env!("CARGO_PKG_VERSION"))?;

    // 4. Remove stale socket and bind (LAST - only after all validation passes)
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    info!(
        semvmx = config.limits.semvmx,
        semmsl = config.limits.semmsl,
        semmni = config.limits.semmni,
        "Daemon started"
    );

    Ok(DaemonState {
        config: config.clone(),
        lock_file,
        listener,
        broker: Arc::new(Broker::new(config.limits)),
    })
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    for path in [
        &config.socket_path,
        &config.version_path,
        &config.lock_path,
    ] {
        if path.exists() {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Get the state directory for svsem
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    // Use XDG_STATE_HOME or default to ~/.local/state
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("svsem"));
    }

    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/svsem"))
}

/// Get the socket directory for svsem
///
/// Uses /tmp/svsem by default to keep paths short (macOS SUN_LEN = 104).
/// Can be overridden with SVSEM_SOCKET_DIR for testing.
pub fn socket_dir() -> PathBuf {
    std::env::var("SVSEM_SOCKET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp/svsem"))
}
