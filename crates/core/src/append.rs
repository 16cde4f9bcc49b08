// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-byte appends to a file, atomically or not
//!
//! With [`AppendMode::Atomic`] the file is opened with `O_APPEND`, so the
//! kernel positions every write at the end. [`AppendMode::SeekThenWrite`]
//! seeks to the end and then writes, which lets concurrent writers
//! overwrite each other between the two calls.

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppendError {
    #[error("open file {path} error, {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("seek error, {0}")]
    Seek(#[source] std::io::Error),
    #[error("write error, {0}")]
    Write(#[source] std::io::Error),
    #[error("invalid byte count: {0:?}")]
    InvalidCount(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendMode {
    Atomic,
    SeekThenWrite,
}

/// Write `count` bytes of `x` to the end of `path`, one write per byte
pub fn append_bytes(path: &Path, count: u64, mode: AppendMode) -> Result<(), AppendError> {
    let mut options = OpenOptions::new();
    options.read(true).write(true).create(true).mode(0o600);
    if mode == AppendMode::Atomic {
        options.append(true);
    }
    let mut file = options.open(path).map_err(|source| AppendError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    for _ in 0..count {
        if mode == AppendMode::SeekThenWrite {
            file.seek(SeekFrom::End(0)).map_err(AppendError::Seek)?;
        }
        let written = file.write(b"x").map_err(AppendError::Write)?;
        if written != 1 {
            return Err(AppendError::Write(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "short write",
            )));
        }
    }

    Ok(())
}

/// Parse a byte count written in decimal, `0x` hexadecimal or `0` octal
pub fn parse_count(text: &str) -> Result<u64, AppendError> {
    let invalid = || AppendError::InvalidCount(text.to_string());
    let trimmed = text.trim();
    let parsed = if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16)
    } else if trimmed.len() > 1 && trimmed.starts_with('0') {
        u64::from_str_radix(&trimmed[1..], 8)
    } else {
        trimmed.parse::<u64>()
    };
    parsed.map_err(|_| invalid())
}
