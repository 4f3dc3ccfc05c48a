// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `fr` - CI runner agent for a code forge.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod commands;
mod logging;

use clap::{Parser, Subcommand};
use fr_core::Config;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fr", version, about = "Run forge CI jobs on this machine")]
struct Cli {
    /// Config file path
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register this runner with the coordinator
    Register(commands::register::RegisterArgs),
    /// Run as a runner daemon
    Daemon,
    /// Print an example config file
    GenerateConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Register(args) => commands::register::register(cfg, args).await,
        Command::Daemon => commands::daemon::daemon(cfg).await,
        Command::GenerateConfig => {
            print!("{}", fr_core::config::EXAMPLE);
            Ok(())
        }
    }
}
