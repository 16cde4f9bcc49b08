// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! semd - semaphore broker daemon

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    svsem_daemon::run().await
}
