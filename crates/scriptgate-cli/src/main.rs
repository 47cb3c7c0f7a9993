//! scriptgate - operator CLI for the script execution gateway.
//!
//! Three commands cover the client side of the protocol: `keygen` creates
//! a keypair and its trust-store certificate, `sign` produces the base64
//! signature line for a script, and `submit` signs a script and sends it
//! to a running gateway.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

/// scriptgate - signed script execution client
#[derive(Parser, Debug)]
#[command(name = "scriptgate")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a signing keypair and its trust-store certificate
    Keygen {
        /// Identifier for the key; names the output files
        #[arg(long)]
        key_id: String,

        /// Directory to write `<key-id>.key` and `<key-id>.cert` into
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Print the base64 signature line for a script
    Sign {
        /// Path to the secret key file
        #[arg(long)]
        key: PathBuf,

        /// Path to the script to sign
        script: PathBuf,
    },

    /// Sign a script and submit it to a running gateway
    Submit {
        /// Gateway address
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: SocketAddr,

        /// Path to the secret key file
        #[arg(long)]
        key: PathBuf,

        /// Path to the script to submit
        script: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cli.log_level))
        .init();

    match cli.command {
        Commands::Keygen { key_id, out_dir } => commands::keygen::run(&key_id, &out_dir),
        Commands::Sign { key, script } => commands::sign::run(&key, &script),
        Commands::Submit { addr, key, script } => commands::submit::run(addr, &key, &script).await,
    }
}
