// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named semaphore specs

use crate::prelude::*;

#[test]
fn post_increments_a_named_semaphore() {
    let temp = Project::empty();

    let created = temp
        .svipc()
        .args(&["named", "create", "jobs", "--value", "2"])
        .passes()
        .stdout();
    let id = created.trim().rsplit(' ').next().unwrap().to_string();

    temp.svipc()
        .args(&["named", "post", "jobs"])
        .passes()
        .stdout_has("sem_post() succeeded");
    assert_eq!(temp.values(&id), vec![3]);
}

#[test]
fn post_requires_an_existing_name() {
    let temp = Project::empty();

    temp.svipc()
        .args(&["named", "post", "missing"])
        .fails()
        .stderr_has("No named semaphore \"missing\"");
}

#[test]
fn exclusive_create_refuses_existing_name() {
    let temp = Project::empty();
    temp.svipc().args(&["named", "create", "jobs"]).passes();

    temp.svipc()
        .args(&["named", "create", "jobs", "--exclusive"])
        .fails()
        .stderr_has("already exists");
}

#[test]
fn unlink_removes_the_name() {
    let temp = Project::empty();
    temp.svipc().args(&["named", "create", "jobs"]).passes();

    temp.svipc()
        .args(&["named", "unlink", "jobs"])
        .passes()
        .stdout_has("Unlinked jobs");
    temp.svipc().args(&["named", "post", "jobs"]).fails();
}
