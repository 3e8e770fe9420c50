// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ixion - a JMAP request engine over a relational schema.
//!
//! This is the binary entry point for the Ixion server.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod schema;
mod serve;

/// Ixion - a JMAP request engine over a relational schema.
#[derive(Parser, Debug)]
#[command(name = "ixion", version, about, long_about = None)]
struct Cli {
    /// Path to a config file (overrides the XDG hierarchy).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Ixion server with the built-in notes schema.
    Serve,
    /// Print the effective configuration and exit.
    Config,
}

fn load_config(cli: &Cli) -> ixion_config::IxionConfig {
    let loaded = match &cli.config {
        Some(path) => ixion_config::load_config_from_path(path),
        None => ixion_config::load_config(),
    };
    match loaded {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: invalid configuration: {err}");
            std::process::exit(2);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(&cli);

    match cli.command {
        Commands::Serve => {
            if let Err(err) = serve::run_serve(config).await {
                eprintln!("error: {err}");
                std::process::exit(1);
            }
        }
        Commands::Config => match toml::to_string_pretty(&config) {
            Ok(rendered) => println!("{rendered}"),
            Err(err) => {
                eprintln!("error: could not render config: {err}");
                std::process::exit(1);
            }
        },
    }
}
