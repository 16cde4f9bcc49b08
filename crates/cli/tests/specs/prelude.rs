// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for black-box CLI specs.
//!
//! Every [`Project`] runs its own daemon in private state and socket
//! directories; the daemon is stopped when the project is dropped.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Child, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Upper bound for polling in specs
pub const SPEC_WAIT_MAX_MS: u64 = 5000;

/// Poll `condition` every 10ms until it holds or `max_ms` elapses
pub fn wait_for(max_ms: u64, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < Duration::from_millis(max_ms) {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}

pub fn bin(name: &str) -> PathBuf {
    assert_cmd::cargo::cargo_bin(name)
}

/// An isolated daemon environment
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn empty() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// XDG_STATE_HOME for the daemon
    pub fn state_path(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    /// Directory holding semd.pid, semd.log and semd.toml
    pub fn daemon_dir(&self) -> PathBuf {
        self.state_path().join("svsem")
    }

    pub fn socket_path(&self) -> PathBuf {
        self.dir.path().join("sock")
    }

    /// Write a file relative to the project root
    pub fn file(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    fn envs(&self) -> Vec<(&'static str, PathBuf)> {
        vec![
            ("XDG_STATE_HOME", self.state_path()),
            ("SVSEM_SOCKET_DIR", self.socket_path()),
            ("SVSEM_DAEMON_BINARY", bin("semd")),
        ]
    }

    fn command(&self, name: &str) -> CliBuilder {
        let mut cmd = Command::new(bin(name));
        cmd.current_dir(self.path())
            .env_remove("SVSEM_LOG")
            .env_remove("RUST_LOG")
            .envs(self.envs());
        CliBuilder { cmd }
    }

    pub fn svipc(&self) -> CliBuilder {
        self.command("svipc")
    }

    pub fn semop(&self) -> CliBuilder {
        self.command("semop")
    }

    /// Start `semop` in the background; stdout and stderr go to files
    pub fn spawn_semop(&self, args: &[&str]) -> Background {
        static SPAWNED: AtomicUsize = AtomicUsize::new(0);
        let n = SPAWNED.fetch_add(1, Ordering::SeqCst);
        let stdout = self.dir.path().join(format!("semop-{}.out", n));
        let stderr = stdout.with_extension("err");
        let child = std::process::Command::new(bin("semop"))
            .args(args)
            .current_dir(self.path())
            .env_remove("SVSEM_LOG")
            .env_remove("RUST_LOG")
            .envs(self.envs())
            .stdin(Stdio::null())
            .stdout(std::fs::File::create(&stdout).unwrap())
            .stderr(std::fs::File::create(&stderr).unwrap())
            .spawn()
            .unwrap();
        Background {
            child,
            stdout,
            stderr,
        }
    }

    /// Create a set of `nsems` semaphores and return its id
    pub fn create_set(&self, nsems: usize) -> String {
        let out = self
            .svipc()
            .args(&["create", &nsems.to_string()])
            .passes()
            .stdout();
        out.trim().to_string()
    }

    /// Current values of a set
    pub fn values(&self, id: &str) -> Vec<u64> {
        self.show(id)["semaphores"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["value"].as_u64().unwrap())
            .collect()
    }

    /// Number of batches blocked on a set
    pub fn blocked(&self, id: &str) -> u64 {
        self.show(id)["semaphores"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["waiting_increase"].as_u64().unwrap() + s["waiting_zero"].as_u64().unwrap())
            .sum()
    }

    fn show(&self, id: &str) -> serde_json::Value {
        let out = self
            .svipc()
            .args(&["show", id, "--format", "json"])
            .passes()
            .stdout();
        serde_json::from_str(&out).unwrap()
    }
}

impl Drop for Project {
    fn drop(&mut self) {
        let _ = std::process::Command::new(bin("svipc"))
            .args(["daemon", "stop"])
            .envs(self.envs())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }
}

/// A `semop` running in the background
pub struct Background {
    pub child: Child,
    stdout: PathBuf,
    stderr: PathBuf,
}

impl Background {
    pub fn pid(&self) -> i32 {
        self.child.id() as i32
    }

    pub fn stdout(&self) -> String {
        std::fs::read_to_string(&self.stdout).unwrap_or_default()
    }

    pub fn stderr(&self) -> String {
        std::fs::read_to_string(&self.stderr).unwrap_or_default()
    }

    /// Wait for exit, failing the test if it takes too long
    pub fn wait(&mut self) -> std::process::ExitStatus {
        let mut status = None;
        let exited = wait_for(SPEC_WAIT_MAX_MS, || {
            status = self.child.try_wait().unwrap();
            status.is_some()
        });
        assert!(exited, "semop did not exit; stderr: {}", self.stderr());
        status.unwrap()
    }
}

impl Drop for Background {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub struct CliBuilder {
    cmd: Command,
}

impl CliBuilder {
    pub fn args(mut self, args: &[&str]) -> Self {
        self.cmd.args(args);
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.cmd.env(key, value);
        self
    }

    fn run(mut self) -> RunAssert {
        let output = self.cmd.output().unwrap();
        RunAssert { output }
    }

    /// Run and require exit status 0
    pub fn passes(self) -> RunAssert {
        let run = self.run();
        assert!(
            run.output.status.success(),
            "expected success, got {:?}\nstdout: {}\nstderr: {}",
            run.output.status.code(),
            run.stdout(),
            run.stderr()
        );
        run
    }

    /// Run and require a non-zero exit status
    pub fn fails(self) -> RunAssert {
        let run = self.run();
        assert!(
            !run.output.status.success(),
            "expected failure\nstdout: {}\nstderr: {}",
            run.stdout(),
            run.stderr()
        );
        run
    }

    /// Run and require a specific exit status
    pub fn exits(self, code: i32) -> RunAssert {
        let run = self.run();
        assert_eq!(
            run.output.status.code(),
            Some(code),
            "stdout: {}\nstderr: {}",
            run.stdout(),
            run.stderr()
        );
        run
    }
}

pub struct RunAssert {
    output: std::process::Output,
}

impl RunAssert {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    pub fn stdout_has(self, expected: &str) -> Self {
        let stdout = self.stdout();
        assert!(
            predicate::str::contains(expected).eval(stdout.as_str()),
            "stdout missing {:?}\nstdout: {}",
            expected,
            stdout
        );
        self
    }

    pub fn stderr_has(self, expected: &str) -> Self {
        let stderr = self.stderr();
        assert!(
            predicate::str::contains(expected).eval(stderr.as_str()),
            "stderr missing {:?}\nstderr: {}",
            expected,
            stderr
        );
        self
    }

    pub fn stdout_eq(self, expected: &str) -> Self {
        assert_eq!(self.stdout(), expected);
        self
    }
}
