//! `encrypt` and `decrypt` commands.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use hyperwallet_common::encryption::Encryption;
use hyperwallet_common::settings::Settings;

use crate::config::load_settings;
use crate::error::CliError;

/// Reads the whole input file, or stdin when no file is given.
pub(crate) fn read_input(input: Option<&Path>) -> Result<String, CliError> {
    match input {
        Some(path) => Ok(fs::read_to_string(path)?),
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}

fn encryption_for(settings: &Settings) -> Result<Encryption, CliError> {
    settings
        .encryption
        .as_ref()
        .map(Encryption::from_settings)
        .ok_or_else(|| CliError::Config("no [encryption] table in config".into()))
}

pub(crate) fn encrypt_text(settings: &Settings, plaintext: &str) -> Result<String, CliError> {
    let encrypted = encryption_for(settings)?.encrypt(plaintext)?;
    Ok(encrypted.into_string())
}

pub(crate) fn decrypt_text(settings: &Settings, ciphertext: &str) -> Result<String, CliError> {
    Ok(encryption_for(settings)?.decrypt(ciphertext.trim())?)
}

/// Sign and encrypt plaintext for Hyperwallet.
pub fn encrypt(config: &Path, input: Option<&Path>) -> Result<(), CliError> {
    let settings = load_settings(config)?;
    let plaintext = read_input(input)?;

    println!("{}", encrypt_text(&settings, &plaintext)?);
    Ok(())
}

/// Decrypt and verify a payload from Hyperwallet.
pub fn decrypt(config: &Path, input: Option<&Path>) -> Result<(), CliError> {
    let settings = load_settings(config)?;
    let ciphertext = read_input(input)?;

    println!("{}", decrypt_text(&settings, &ciphertext)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{create_test_config, key_set_path, write_file};
    use tempfile::TempDir;

    #[test]
    fn test_encrypt_then_decrypt() {
        let dir = TempDir::new().unwrap();
        let settings = load_settings(&create_test_config(&dir)).unwrap();

        let encrypted = encrypt_text(&settings, "{\"amount\":\"10.00\"}").unwrap();
        assert_eq!(encrypted.split('.').count(), 5);

        // Trailing newline as left by shell redirection.
        let decrypted = decrypt_text(&settings, &format!("{encrypted}\n")).unwrap();
        assert_eq!(decrypted, "{\"amount\":\"10.00\"}");
    }

    #[test]
    fn test_decrypt_with_other_key_pair_fails() {
        let dir = TempDir::new().unwrap();
        let settings = load_settings(&create_test_config(&dir)).unwrap();
        let encrypted = encrypt_text(&settings, "hello").unwrap();

        let mut other = settings.clone();
        if let Some(encryption) = other.encryption.as_mut() {
            encryption.client_private_key_set_location = key_set_path("private-jwkset2");
            encryption.hyperwallet_key_set_location = key_set_path("public-jwkset2");
        }

        let err = decrypt_text(&other, &encrypted).unwrap_err();
        match err {
            CliError::Transport(report) => {
                assert_eq!(report.current_context().code(), "RECIPIENT_KEY_MISMATCH");
            }
            other => panic!("Expected Transport error, got {other:?}"),
        }
    }

    #[test]
    fn test_encrypt_without_encryption_table() {
        let dir = TempDir::new().unwrap();
        let config_path = write_file(
            &dir,
            "plain.toml",
            r#"
[api]
server = "https://api.sandbox.hyperwallet.com"
username = "test-user"
password = "test-pass"
"#,
        );
        let settings = load_settings(&config_path).unwrap();

        assert!(matches!(
            encrypt_text(&settings, "hello"),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn test_read_input_from_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "payload.json", "{\"a\":1}");

        assert_eq!(read_input(Some(&path)).unwrap(), "{\"a\":1}");
        assert!(matches!(
            read_input(Some(&dir.path().join("missing"))),
            Err(CliError::Io(_))
        ));
    }
}
