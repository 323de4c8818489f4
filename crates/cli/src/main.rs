//! Hyperwallet CLI for payload encryption and configuration checks.
//!
//! This tool provides commands for:
//! - Signing and encrypting a payload for Hyperwallet
//! - Decrypting and verifying a payload from Hyperwallet
//! - Inspecting JWS/JWE headers and their expiration
//! - Validating configuration files

use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use std::path::PathBuf;

mod config;
mod error;
mod inspect;
mod jose;
#[cfg(test)]
mod test_fixtures;

use error::CliError;

#[derive(Parser)]
#[command(name = "hwcli")]
#[command(about = "Hyperwallet CLI for encrypted payloads and configuration")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign and encrypt a payload (file or stdin) and print the JWE
    Encrypt {
        /// Path to the TOML configuration file
        #[arg(long, short, env = "HYPERWALLET_CONFIG")]
        config: PathBuf,

        /// Plaintext input file; stdin when omitted
        #[arg(long, short)]
        input: Option<PathBuf>,
    },

    /// Decrypt and verify a JWE (file or stdin) and print the plaintext
    Decrypt {
        /// Path to the TOML configuration file
        #[arg(long, short, env = "HYPERWALLET_CONFIG")]
        config: PathBuf,

        /// JWE input file; stdin when omitted
        #[arg(long, short)]
        input: Option<PathBuf>,
    },

    /// Print the protected header of a JWS or JWE without verifying it
    Inspect {
        /// Compact JWS/JWE input file; stdin when omitted
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate config against settings validation
    Validate {
        /// Path to the TOML configuration file
        #[arg(long, short)]
        file: PathBuf,
    },
}

#[derive(Clone, ValueEnum, Debug)]
pub enum OutputFormat {
    Text,
    Json,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    if let Err(e) = hyperwallet_common::logging::init_logging(level) {
        eprintln!("Warning: {}", e.current_context());
    }

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Encrypt { config, input } => jose::encrypt(&config, input.as_deref()),
        Commands::Decrypt { config, input } => jose::decrypt(&config, input.as_deref()),
        Commands::Inspect { input, format } => inspect::inspect(input.as_deref(), &format),
        Commands::Config { action } => match action {
            ConfigAction::Validate { file } => config::validate(&file, cli.verbose),
        },
    }
}
