// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Byte-at-a-time appends

use std::path::PathBuf;

use anyhow::Result;
use svsem_core::append::{append_bytes, parse_count, AppendMode};

#[derive(clap::Args)]
pub struct AppendArgs {
    /// File to append to (created 0600 if absent)
    pub file: PathBuf,
    /// Number of bytes (decimal, 0x hex or 0 octal)
    #[arg(value_parser = parse_count)]
    pub bytes: u64,
    /// Seek to the end before each write instead of opening with O_APPEND
    #[arg(long)]
    pub seek: bool,
}

pub fn handle(args: AppendArgs) -> Result<()> {
    let mode = if args.seek {
        AppendMode::SeekThenWrite
    } else {
        AppendMode::Atomic
    };
    append_bytes(&args.file, args.bytes, mode)?;
    println!("{} done.", std::process::id());
    Ok(())
}
