//! Provisions keys, certificates and OSCORE contexts, builds the firmware
//! and deploys it.

use clap::{Parser, ValueEnum};
use std::{error::Error as _, path::PathBuf, process::ExitCode};
use tracing::{error, info};

use trust_setup::{
    build::BuildOptions,
    config::Config,
    deploy::{LocalTransport, NullTransport, SshTransport},
    pipeline::{self, RunOptions},
    Error,
};

/// How files get onto the hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TransportKind {
    /// Copy over SSH, asking for each host's password once.
    Ssh,
    /// Copy into a local directory per host.
    Local,
    /// Don't copy anything.
    None,
}

/// Sets up keys, certificates and OSCORE contexts of a WSN deployment and
/// builds and deploys its firmware.
#[derive(Parser)]
#[command(name = "setup")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Trust model the firmware switches on.
    trust_model: String,

    /// Strategy for choosing whom to trust.
    trust_choose: String,

    /// Applications to build into the firmware.
    #[arg(long, num_args = 1..)]
    applications: Vec<String>,

    /// Build with packet capture.
    #[arg(long)]
    with_pcap: bool,

    /// Also build the adversary binary, with these attacks.
    #[arg(long, num_args = 0..)]
    with_adversary: Option<Vec<String>>,

    /// Extra defines, as NAME VALUE pairs.
    #[arg(long, num_args = 2, value_names = ["NAME", "VALUE"])]
    defines: Vec<String>,

    /// The deployment configuration.
    #[arg(long, default_value = "setup/devices.toml")]
    config: PathBuf,

    /// Working directory for keys, binaries and logs.
    #[arg(long, default_value = "setup")]
    setup_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = TransportKind::Ssh)]
    transport: TransportKind,

    /// Directory the local transport copies into [default: <setup-dir>/remote].
    #[arg(long)]
    local_root: Option<PathBuf>,

    /// Stop after the key material and contexts are written.
    #[arg(long)]
    no_build: bool,
}

impl Cli {
    fn build_options(&self) -> BuildOptions {
        BuildOptions {
            trust_model: self.trust_model.clone(),
            trust_choose: self.trust_choose.clone(),
            applications: self.applications.clone(),
            with_pcap: self.with_pcap,
            adversary: self.with_adversary.clone(),
            defines: self
                .defines
                .chunks(2)
                .filter(|pair| pair.len() == 2)
                .map(|pair| (pair[0].clone(), pair[1].clone()))
                .collect(),
        }
    }
}

fn run(cli: Cli) -> trust_setup::Result<()> {
    let config = Config::load(&cli.config)?;
    let options = RunOptions {
        config_file: cli.config.clone(),
        setup_dir: cli.setup_dir.clone(),
        build: (!cli.no_build).then(|| cli.build_options()),
    };

    let outcome = match cli.transport {
        TransportKind::Ssh => pipeline::run(
            &config,
            &options,
            SshTransport::new(cli.setup_dir.join(".ssh")),
        )?,
        TransportKind::Local => {
            let root = cli
                .local_root
                .clone()
                .unwrap_or_else(|| cli.setup_dir.join("remote"));
            pipeline::run(&config, &options, LocalTransport::new(root))?
        }
        TransportKind::None => pipeline::run(&config, &options, NullTransport)?,
    };
    info!(
        build_number = outcome.build_number,
        certificates = outcome.certificates.len(),
        contexts = outcome.contexts.len(),
        "Outputs written"
    );

    Ok(())
}

fn report(e: &Error) {
    error!(kind = %e.kind(), "{}", e);
    let mut source = e.source();
    while let Some(cause) = source {
        error!("Caused by: {}", cause);
        source = cause.source();
    }
}

fn main() -> ExitCode {
    // Logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}
