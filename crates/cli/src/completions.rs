// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell completion generation for the svipc CLI.
//!
//! Install completions using:
//!
//! ```bash
//! # Bash
//! svipc completions bash > ~/.local/share/bash-completion/completions/svipc
//!
//! # Zsh
//! svipc completions zsh > ~/.zfunc/_svipc
//!
//! # Fish
//! svipc completions fish > ~/.config/fish/completions/svipc.fish
//! ```

use clap::CommandFactory;
use clap_complete::{generate, Shell};
use std::io;

/// Generate shell completions and write to `out`.
pub fn generate_completions<C: CommandFactory>(shell: Shell, out: &mut dyn io::Write) {
    let mut cmd = C::command();
    generate(shell, &mut cmd, "svipc", out);
}

/// Arguments for the completions command.
#[derive(clap::Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
