// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC key derivation from a filesystem path and a project byte
//!
//! The key packs the low 8 bits of the project byte, the low 8 bits of the
//! device number and the low 16 bits of the inode number. Two paths that
//! name the same file (hard links) yield the same key.

use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Key under which a semaphore set can be found; 0 means private
pub type IpcKey = i32;

/// Key value that never names a shared set
pub const IPC_PRIVATE: IpcKey = 0;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("stat '{path}' failed: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A derived key with the inputs that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInfo {
    pub key: IpcKey,
    pub inode: u64,
    pub device: u64,
    pub proj: u8,
}

/// Pack inode, device and project byte into a key
pub fn key_from_parts(inode: u64, device: u64, proj: u8) -> IpcKey {
    let packed = (u32::from(proj) << 24)
        | (((device & 0xff) as u32) << 16)
        | ((inode & 0xffff) as u32);
    packed as IpcKey
}

/// Derive the key for an existing path
pub fn derive_key(path: &Path, proj: u8) -> Result<KeyInfo, KeyError> {
    let metadata = std::fs::metadata(path).map_err(|source| KeyError::Stat {
        path: path.to_path_buf(),
        source,
    })?;
    let inode = metadata.ino();
    let device = metadata.dev();

    Ok(KeyInfo {
        key: key_from_parts(inode, device, proj),
        inode,
        device,
        proj,
    })
}

#[cfg(test)]
#[path = "ipckey_tests.rs"]
mod tests;
