//! Configuration commands.
//!
//! Configuration is loaded from TOML files and merged with environment variables
//! prefixed with `HYPERWALLET__`. For example, `HYPERWALLET__API__PASSWORD`
//! will override `api.password` in the TOML file.

use std::path::Path;

use hyperwallet_common::settings::Settings;

use crate::error::CliError;

/// Load, merge and validate configuration from a TOML file.
pub(crate) fn load_settings(file: &Path) -> Result<Settings, CliError> {
    log::info!("Loading config from: {}", file.display());
    log::debug!("Environment variables with HYPERWALLET__ prefix will be merged");

    if !file.is_file() {
        return Err(CliError::Config(format!(
            "Config file {} does not exist",
            file.display()
        )));
    }

    Ok(Settings::from_file(file)?)
}

/// Validate configuration file.
///
/// Validates TOML syntax, required fields, and merges with environment variables.
pub fn validate(file: &Path, verbose: bool) -> Result<(), CliError> {
    let settings = load_settings(file)?;

    println!("Configuration is valid");
    println!("  File: {}", file.display());
    println!("  Server: {}", settings.api.server);
    println!("  Minimum TLS: {}", settings.api.min_tls_version);
    match &settings.encryption {
        Some(encryption) => {
            println!(
                "  Encryption: {} / {} / {}",
                encryption.sign_algorithm,
                encryption.encryption_algorithm,
                encryption.encryption_method
            );
        }
        None => println!("  Encryption: disabled"),
    }

    if verbose {
        let merged = settings.to_redacted_toml()?;
        println!("\nMerged configuration:");
        println!("---");
        print!("{merged}");
        println!("---");
    }

    Ok(())
}
