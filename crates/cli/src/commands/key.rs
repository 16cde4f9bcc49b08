// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC key derivation

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use svsem_core::derive_key;

#[derive(clap::Args)]
pub struct KeyArgs {
    /// Existing file or directory
    pub path: PathBuf,
    /// Project id; only its first byte is used
    pub proj: String,
}

pub fn handle(args: KeyArgs) -> Result<()> {
    let proj = args
        .proj
        .bytes()
        .next()
        .ok_or_else(|| anyhow!("project id must not be empty"))?;
    let info = derive_key(&args.path, proj)?;
    println!(
        "Key = {:x}, i-node = {:x}, st_dev = {:x}, proj = {:x}",
        info.key, info.inode, info.device, info.proj
    );
    Ok(())
}
