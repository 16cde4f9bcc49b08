// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! svipc set administration specs

use crate::prelude::*;

#[test]
fn create_allocates_ids_from_one() {
    let temp = Project::empty();

    assert_eq!(temp.create_set(2), "1");
    assert_eq!(temp.create_set(1), "2");
}

#[test]
fn keyed_create_reopens_the_set() {
    let temp = Project::empty();

    let first = temp
        .svipc()
        .args(&["create", "3", "--key", "0x1234"])
        .passes()
        .stdout();
    temp.svipc()
        .args(&["create", "2", "--key", "4660"])
        .passes()
        .stdout_eq(&first);

    temp.svipc()
        .args(&["create", "3", "--key", "0x1234", "--exclusive"])
        .fails()
        .stderr_has("already exists");

    temp.svipc()
        .args(&["create", "4", "--key", "0x1234"])
        .fails()
        .stderr_has("invalid argument");
}

#[test]
fn zero_semaphores_is_invalid() {
    let temp = Project::empty();

    temp.svipc()
        .args(&["create", "0"])
        .fails()
        .stderr_has("invalid argument");
}

#[test]
fn list_shows_every_set() {
    let temp = Project::empty();
    temp.create_set(2);
    temp.svipc().args(&["create", "1", "--key", "0x2a"]).passes();

    temp.svipc()
        .args(&["list"])
        .passes()
        .stdout_has("key        semid      nsems")
        .stdout_has("0x00000000 1          2")
        .stdout_has("0x0000002a 2          1");
}

#[test]
fn set_and_setall_change_values() {
    let temp = Project::empty();
    let id = temp.create_set(3);

    temp.svipc().args(&["setall", &id, "1", "2", "3"]).passes();
    assert_eq!(temp.values(&id), vec![1, 2, 3]);

    temp.svipc().args(&["set", &id, "1", "7"]).passes();
    assert_eq!(temp.values(&id), vec![1, 7, 3]);

    temp.svipc()
        .args(&["setall", &id, "1"])
        .fails()
        .stderr_has("invalid argument");
    temp.svipc()
        .args(&["set", &id, "0", "40000"])
        .fails()
        .stderr_has("out of range");
}

#[test]
fn show_describes_each_semaphore() {
    let temp = Project::empty();
    let id = temp.create_set(2);
    temp.semop().args(&[&id, "1+4"]).passes();

    temp.svipc()
        .args(&["show", &id])
        .passes()
        .stdout_has(&format!("Semaphore Array semid={}", id))
        .stdout_has("semnum     value      ncount     zcount     pid")
        .stdout_has("1          4          0          0");
}

#[test]
fn rm_forgets_the_set() {
    let temp = Project::empty();
    let id = temp.create_set(1);

    temp.svipc()
        .args(&["rm", &id])
        .passes()
        .stdout_has("Removed semaphore set");
    temp.svipc()
        .args(&["show", &id])
        .fails()
        .stderr_has(&format!("No semaphore set with id {}", id));
}

#[test]
fn interrupt_without_waiters_wakes_nothing() {
    let temp = Project::empty();

    temp.svipc()
        .args(&["interrupt", "1"])
        .passes()
        .stdout_has("Interrupted 0");
}
