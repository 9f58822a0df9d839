//! Writes a single keypair, deterministic for an address or random without.

use clap::Parser;
use std::{path::PathBuf, process::ExitCode};
use tracing::error;

use trust_setup::keystore::{self, Keypair, Keystore};

/// Generates the P-256 keypair of a device.
#[derive(Parser)]
#[command(name = "keygen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address to derive the keypair from, random if left out.
    address: Option<String>,

    /// Directory to write the PEM files into.
    #[arg(long, default_value = ".")]
    out: PathBuf,
}

fn run(cli: Cli) -> keystore::Result<()> {
    let address = cli.address.unwrap_or_default();
    let keypair = Keypair::derive(&address)?;
    Keystore::create(cli.out)?.save(&keypair, &address)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
