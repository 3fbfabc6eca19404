// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use clap::{Parser, Subcommand};

/// Coordination hub for a multi-agent collaboration platform.
#[derive(Parser, Debug)]
#[command(name = "hub", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v debug, -vv trace). Respects RUST_LOG if set.
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the hub: control-plane HTTP, change-notification SSE, and the
    /// collab WebSocket channel. Runs until Ctrl+C or SIGTERM.
    Serve,

    /// Print the resolved configuration (environment variables and their
    /// effective defaults) and exit without starting the server.
    ShowConfig,
}
