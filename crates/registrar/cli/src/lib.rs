//! regsign - offline signer for registrar approvers
//!
//! Approvers download an attestation from the registrar, sign it here and
//! upload the clear-signed result. This CLI provides:
//! - key generation (`keygen`)
//! - attestation signing (`sign`)
//! - pre-upload signature checks (`verify`)
//! - key fingerprints (`fingerprint`)

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

use clap::{Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod commands;
mod config;
mod error;

pub use config::RegsignConfig;
pub use error::{CliError, CliResult};

/// regsign CLI application
#[derive(Parser)]
#[command(name = "regsign")]
#[command(about = "Sign registrar approval attestations", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "REGSIGN_CONFIG")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, env = "REGSIGN_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "REGSIGN_LOG_JSON")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Generate a signing key
    Keygen {
        /// Where to store the secret key (defaults to the configured key file)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Replace an existing key
        #[arg(long)]
        force: bool,
    },

    /// Clear-sign an attestation
    Sign {
        /// Attestation file, `-` for stdin
        input: Option<PathBuf>,

        /// Signed output file, `-` for stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Secret key file
        #[arg(short, long)]
        key: Option<PathBuf>,

        /// Expected attestation username (defaults to the configured one)
        #[arg(short, long)]
        username: Option<String>,
    },

    /// Verify a clear-signed attestation
    Verify {
        /// Signed file, `-` for stdin
        input: Option<PathBuf>,

        /// Hex public key to trust; may be repeated
        #[arg(long = "trust")]
        trusted: Vec<String>,
    },

    /// Print the fingerprint of a public key
    Fingerprint {
        /// Hex public key (defaults to the key of the configured key file)
        public_key: Option<String>,

        /// Secret key file
        #[arg(short, long)]
        key: Option<PathBuf>,
    },
}

/// Run using the current process arguments.
pub fn run() -> CliResult<()> {
    run_with_args(std::env::args_os())
}

/// Run using the provided argument iterator.
pub fn run_with_args<I, T>(args: I) -> CliResult<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_tracing(&cli.log_level, cli.json);

    let config = RegsignConfig::load(cli.config.as_deref())?;
    let mut stdout = std::io::stdout();

    match cli.command {
        Commands::Keygen { out, force } => {
            let path = key_path(out, &config)?;
            commands::keygen(&path, force, &mut stdout)?;
            Ok(())
        }
        Commands::Sign {
            input,
            output,
            key,
            username,
        } => {
            let key = commands::load_key(&key_path(key, &config)?)?;
            let username = username.or(config.username);
            let attestation = commands::read_input(input.as_deref())?;
            let signed = commands::sign(&key, username.as_deref(), &attestation)?;
            commands::write_output(output.as_deref(), &signed)
        }
        Commands::Verify { input, trusted } => {
            let signed = commands::read_input(input.as_deref())?;
            commands::verify(&signed, &trusted, &mut stdout)?;
            Ok(())
        }
        Commands::Fingerprint { public_key, key } => {
            let fingerprint = match public_key {
                Some(hex) => commands::fingerprint_of(&hex)?,
                None => commands::load_key(&key_path(key, &config)?)?.fingerprint(),
            };
            println!("{}", fingerprint);
            Ok(())
        }
    }
}

fn key_path(explicit: Option<PathBuf>, config: &RegsignConfig) -> CliResult<PathBuf> {
    match explicit.or_else(|| config.key_file.clone()) {
        Some(path) => Ok(path),
        None => RegsignConfig::default_key_file(),
    }
}

fn init_tracing(level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    // Diagnostics go to stderr; stdout carries signed output.
    let result = if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .without_time()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    if let Err(e) = result {
        eprintln!("tracing already initialised: {}", e);
    }
}
