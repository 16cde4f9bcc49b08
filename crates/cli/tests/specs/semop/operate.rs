// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! semop specs
//!
//! Verify group application, reporting and exit codes.

use crate::prelude::*;

#[test]
fn groups_apply_in_order() {
    let temp = Project::empty();
    let id = temp.create_set(3);

    let run = temp
        .semop()
        .args(&[&id, "0+1,1+2", "1-1", "2=0"])
        .passes();
    let stdout = run.stdout();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3, "stdout: {}", stdout);
    assert!(lines[0].ends_with(": semop() completed [0+1,1+2]"));
    assert!(lines[1].ends_with(": semop() completed [1-1]"));
    assert!(lines[2].ends_with(": semop() completed [2=0]"));

    assert_eq!(temp.values(&id), vec![1, 1, 0]);
}

#[test]
fn report_line_carries_pid_and_times() {
    let temp = Project::empty();
    let id = temp.create_set(1);

    let stdout = temp.semop().args(&[&id, "0+1"]).passes().stdout();
    let line = stdout.lines().next().unwrap();

    // "{pid:>5}, HH:MM:SS -> HH:MM:SS: semop() completed [0+1]"
    let (pid, rest) = line.split_once(", ").unwrap();
    assert!(pid.trim().parse::<u32>().is_ok(), "line: {}", line);
    let (submitted, rest) = rest.split_once(" -> ").unwrap();
    assert_eq!(submitted.len(), 8);
    assert_eq!(&rest[8..], ": semop() completed [0+1]");
}

#[test]
fn missing_arguments_print_usage() {
    let temp = Project::empty();

    temp.semop()
        .exits(2)
        .stderr_has("Usage:")
        .stderr_has("<sem#>=0[n]");
}

#[test]
fn help_goes_to_stderr() {
    let temp = Project::empty();

    temp.semop()
        .args(&["--help"])
        .exits(2)
        .stderr_has("semop 12345 0+1,1-2un")
        .stdout_eq("");
}

#[test]
fn malformed_group_is_rejected() {
    let temp = Project::empty();
    let id = temp.create_set(2);

    temp.semop()
        .args(&[&id, "0+"])
        .exits(1)
        .stderr_has("expected digit after '+'")
        .stderr_has("\"0+\"");

    temp.semop()
        .args(&[&id, "0=1"])
        .exits(1)
        .stderr_has("expected \"=0\"");

    temp.semop()
        .args(&[&id, "0+1,"])
        .exits(1)
        .stderr_has("trailing comma");

    assert_eq!(temp.values(&id), vec![0, 0]);
}

#[test]
fn groups_before_a_bad_one_stay_applied() {
    let temp = Project::empty();
    let id = temp.create_set(1);

    temp.semop()
        .args(&[&id, "0+1", "0*1", "0+1"])
        .exits(1)
        .stdout_has("completed [0+1]")
        .stderr_has("\"0*1\"");

    assert_eq!(temp.values(&id), vec![1]);
}

#[test]
fn unknown_set_is_reported() {
    let temp = Project::empty();
    temp.svipc().args(&["daemon", "start"]).passes();

    temp.semop()
        .args(&["999", "0+1"])
        .exits(1)
        .stderr_has("No semaphore set with id 999");
}

#[test]
fn index_out_of_range_is_rejected() {
    let temp = Project::empty();
    let id = temp.create_set(3);

    temp.semop()
        .args(&[&id, "5+1"])
        .exits(1)
        .stderr_has("semaphore index 5 out of range");
}

#[test]
fn oversized_group_is_rejected() {
    let temp = Project::empty();
    let id = temp.create_set(1);
    let group = vec!["0+1"; 513].join(",");

    temp.semop()
        .args(&[&id, &group])
        .exits(1)
        .stderr_has("too many operations");

    assert_eq!(temp.values(&id), vec![0]);
}

#[test]
fn no_wait_group_that_would_block_is_skipped() {
    let temp = Project::empty();
    let id = temp.create_set(2);

    temp.semop()
        .args(&[&id, "0-1n", "1+1"])
        .exits(1)
        .stderr_has("semop() would block [0-1n]")
        .stdout_has("semop() completed [1+1]");

    assert_eq!(temp.values(&id), vec![0, 1]);
}

#[test]
fn no_wait_request_after_a_waiting_one_does_not_block() {
    let temp = Project::empty();
    let id = temp.create_set(2);

    temp.semop()
        .args(&[&id, "0-1,1-1n"])
        .exits(1)
        .stderr_has("semop() would block [0-1,1-1n]");

    assert_eq!(temp.blocked(&id), 0);
}

#[test]
fn wait_for_zero_on_zero_applies() {
    let temp = Project::empty();
    let id = temp.create_set(1);

    temp.semop().args(&[&id, "0=0n", "0=0n", "0=0"]).passes();
    assert_eq!(temp.values(&id), vec![0]);
}

#[test]
fn undo_is_applied_when_semop_exits() {
    let temp = Project::empty();
    let id = temp.create_set(3);
    temp.svipc().args(&["setall", &id, "0", "0", "5"]).passes();

    temp.semop().args(&[&id, "1+1,2-1u"]).passes();

    // Counter 2 gets its unit back; counter 1 had no undo
    assert!(
        wait_for(SPEC_WAIT_MAX_MS, || temp.values(&id) == vec![0, 1, 5]),
        "values: {:?}",
        temp.values(&id)
    );
}

#[test]
fn counter_ceiling_comes_from_settings() {
    let temp = Project::empty();
    temp.file("state/svsem/semd.toml", "[limits]\nsemvmx = 10\n");
    let id = temp.create_set(1);

    temp.semop().args(&[&id, "0+10"]).passes();
    temp.semop()
        .args(&[&id, "0+1"])
        .exits(1)
        .stderr_has("would exceed its maximum (10)")
        .stderr_has("[0+1]");
}
