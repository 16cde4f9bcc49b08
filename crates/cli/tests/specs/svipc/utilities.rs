// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Key derivation, append and completion specs

use crate::prelude::*;

#[test]
fn key_reports_its_inputs() {
    let temp = Project::empty();
    let path = temp.file("keyfile", "");

    temp.svipc()
        .args(&["key", path.to_str().unwrap(), "x"])
        .passes()
        .stdout_has("Key = ")
        .stdout_has("i-node = ")
        .stdout_has("st_dev = ")
        .stdout_has("proj = 78");
}

#[test]
fn key_is_stable_for_a_path() {
    let temp = Project::empty();
    let path = temp.file("keyfile", "");
    let path = path.to_str().unwrap();

    let first = temp.svipc().args(&["key", path, "a"]).passes().stdout();
    temp.svipc().args(&["key", path, "a"]).passes().stdout_eq(&first);
}

#[test]
fn key_of_missing_path_fails() {
    let temp = Project::empty();

    temp.svipc()
        .args(&["key", "does-not-exist", "x"])
        .fails()
        .stderr_has("does-not-exist");
}

#[test]
fn append_writes_the_requested_bytes() {
    let temp = Project::empty();
    let path = temp.path().join("out.txt");
    let file = path.to_str().unwrap();

    temp.svipc()
        .args(&["append", file, "10"])
        .passes()
        .stdout_has("done.");
    temp.svipc().args(&["append", file, "0x5", "--seek"]).passes();

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content, "x".repeat(15));
}

#[test]
fn append_rejects_bad_count() {
    let temp = Project::empty();

    temp.svipc()
        .args(&["append", "out.txt", "ten"])
        .exits(2)
        .stderr_has("invalid byte count");
}

#[test]
fn completions_name_svipc() {
    let temp = Project::empty();

    temp.svipc()
        .args(&["completions", "bash"])
        .passes()
        .stdout_has("svipc");
}
