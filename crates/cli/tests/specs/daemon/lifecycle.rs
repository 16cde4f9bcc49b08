// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle specs
//!
//! Verify daemon start/stop/status/logs.

use crate::prelude::*;

#[test]
fn status_when_not_running() {
    let temp = Project::empty();

    temp.svipc()
        .args(&["daemon", "status"])
        .passes()
        .stdout_has("Daemon not running");
}

#[test]
fn start_reports_success() {
    let temp = Project::empty();

    temp.svipc()
        .args(&["daemon", "start"])
        .passes()
        .stdout_has("Daemon started");
    temp.svipc()
        .args(&["daemon", "start"])
        .passes()
        .stdout_has("Daemon already running");
}

#[test]
fn status_shows_running_daemon() {
    let temp = Project::empty();
    temp.create_set(2);

    temp.svipc()
        .args(&["daemon", "status"])
        .passes()
        .stdout_has("Status: running")
        .stdout_has("Version:")
        .stdout_has("Uptime:")
        .stdout_has("Sets: 1")
        .stdout_has("Blocked: 0");
}

#[test]
fn stop_then_status() {
    let temp = Project::empty();
    temp.svipc().args(&["daemon", "start"]).passes();

    temp.svipc()
        .args(&["daemon", "stop"])
        .passes()
        .stdout_has("Daemon stopped");
    temp.svipc()
        .args(&["daemon", "status"])
        .passes()
        .stdout_has("Daemon not running");
    assert!(!temp.daemon_dir().join("semd.pid").exists());
}

#[test]
fn stop_when_not_running() {
    let temp = Project::empty();

    temp.svipc()
        .args(&["daemon", "stop"])
        .passes()
        .stdout_has("Daemon not running");
}

#[test]
fn daemon_writes_state_files() {
    let temp = Project::empty();
    temp.svipc().args(&["daemon", "start"]).passes();

    let dir = temp.daemon_dir();
    assert!(wait_for(SPEC_WAIT_MAX_MS, || dir.join("semd.version").exists()));
    assert!(dir.join("semd.pid").exists());
    assert!(temp.socket_path().join("semd.sock").exists());
}

#[test]
fn logs_show_startup() {
    let temp = Project::empty();
    temp.svipc().args(&["daemon", "start"]).passes();

    temp.svipc()
        .args(&["daemon", "logs", "--lines", "10"])
        .passes()
        .stdout_has("semd: starting");
}

#[test]
fn bad_settings_are_reported() {
    let temp = Project::empty();
    temp.file("state/svsem/semd.toml", "[limits]\nbogus = 1\n");

    temp.svipc()
        .args(&["daemon", "start"])
        .fails()
        .stderr_has("semd failed to start")
        .stderr_has("Invalid settings");
}

#[test]
fn sets_do_not_survive_a_restart() {
    let temp = Project::empty();
    let id = temp.create_set(1);
    temp.svipc().args(&["daemon", "stop"]).passes();

    temp.svipc()
        .args(&["show", &id])
        .fails()
        .stderr_has("No semaphore set");
}
