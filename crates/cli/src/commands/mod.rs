// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! svipc command implementations

pub mod append;
pub mod daemon;
pub mod key;
pub mod named;
pub mod sets;
