//! nixipfs: mirror NixOS releases and channels into IPFS.
//!
//! # Usage
//!
//! ```text
//! nixipfs publish [--ipfsapi <host:port>] [--dir <path>] [--jobs <n>] [--timeout-secs <n>]
//! nixipfs status [--dir <path>] [--json]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{publish::PublishArgs, status::StatusArgs};

#[derive(Parser, Debug)]
#[command(
    name = "nixipfs",
    version,
    about = "Mirror NixOS releases and channels into IPFS",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload everything under the mirror root and publish the merged tree.
    Publish(PublishArgs),

    /// Show what the next publish would upload, without contacting IPFS.
    Status(StatusArgs),
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Publish(args) => args.run(),
        Commands::Status(args) => args.run(),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
