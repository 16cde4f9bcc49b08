// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! semop blocking specs
//!
//! Verify waiting, interrupts, removal and undo after a kill.

use crate::prelude::*;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

fn wait_blocked(temp: &Project, id: &str, count: u64) {
    assert!(
        wait_for(SPEC_WAIT_MAX_MS, || temp.blocked(id) == count),
        "expected {} blocked batch(es), have {}",
        count,
        temp.blocked(id)
    );
}

#[test]
fn blocked_group_completes_when_released() {
    let temp = Project::empty();
    let id = temp.create_set(1);

    let mut waiter = temp.spawn_semop(&[&id, "0-2"]);
    wait_blocked(&temp, &id, 1);

    temp.svipc().args(&["set", &id, "0", "2"]).passes();

    assert!(waiter.wait().success(), "stderr: {}", waiter.stderr());
    assert!(waiter.stdout().contains("semop() completed [0-2]"));
    assert_eq!(temp.values(&id), vec![0]);
}

#[test]
fn whole_group_waits_for_every_operation() {
    let temp = Project::empty();
    let id = temp.create_set(2);

    let mut waiter = temp.spawn_semop(&[&id, "0+1,1-1"]);
    wait_blocked(&temp, &id, 1);

    // The increment of counter 0 is not visible while counter 1 blocks
    assert_eq!(temp.values(&id), vec![0, 0]);

    temp.svipc().args(&["set", &id, "1", "1"]).passes();
    assert!(waiter.wait().success());
    assert_eq!(temp.values(&id), vec![1, 0]);
}

#[test]
fn sigusr1_interrupts_and_the_group_is_retried() {
    let temp = Project::empty();
    let id = temp.create_set(1);

    let mut waiter = temp.spawn_semop(&[&id, "0-1"]);
    wait_blocked(&temp, &id, 1);

    kill(Pid::from_raw(waiter.pid()), Signal::SIGUSR1).unwrap();
    assert!(
        wait_for(SPEC_WAIT_MAX_MS, || waiter
            .stderr()
            .contains("semop() interrupted, retrying [0-1]")),
        "stderr: {}",
        waiter.stderr()
    );
    wait_blocked(&temp, &id, 1);

    temp.svipc().args(&["set", &id, "0", "1"]).passes();
    assert!(waiter.wait().success());
    assert!(waiter.stdout().contains("semop() completed [0-1]"));
}

#[test]
fn svipc_interrupt_targets_a_process() {
    let temp = Project::empty();
    let id = temp.create_set(1);
    temp.svipc().args(&["set", &id, "0", "3"]).passes();

    let mut waiter = temp.spawn_semop(&[&id, "0=0"]);
    wait_blocked(&temp, &id, 1);

    temp.svipc()
        .args(&["interrupt", &waiter.pid().to_string()])
        .passes()
        .stdout_has("Interrupted 1");
    assert!(wait_for(SPEC_WAIT_MAX_MS, || waiter
        .stderr()
        .contains("semop() interrupted, retrying [0=0]")));

    temp.svipc().args(&["set", &id, "0", "0"]).passes();
    assert!(waiter.wait().success());
}

#[test]
fn removing_the_set_fails_the_waiter() {
    let temp = Project::empty();
    let id = temp.create_set(1);

    let mut waiter = temp.spawn_semop(&[&id, "0-1", "0+1"]);
    wait_blocked(&temp, &id, 1);

    temp.svipc().args(&["rm", &id]).passes();

    let status = waiter.wait();
    assert_eq!(status.code(), Some(1));
    let stderr = waiter.stderr();
    assert!(stderr.contains("was removed"), "stderr: {}", stderr);
    assert!(stderr.contains("[0-1]"), "stderr: {}", stderr);
    assert!(!waiter.stdout().contains("[0+1]"));
}

#[test]
fn killed_semop_has_its_undo_applied() {
    let temp = Project::empty();
    let id = temp.create_set(1);

    let waiter = temp.spawn_semop(&[&id, "0+2u", "0-5"]);
    wait_blocked(&temp, &id, 1);
    assert_eq!(temp.values(&id), vec![2]);

    kill(Pid::from_raw(waiter.pid()), Signal::SIGKILL).unwrap();

    assert!(
        wait_for(SPEC_WAIT_MAX_MS, || temp.values(&id) == vec![0]
            && temp.blocked(&id) == 0),
        "values: {:?}",
        temp.values(&id)
    );
}
