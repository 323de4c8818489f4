//! Client configuration.
//!
//! Settings are read from TOML and merged with environment variables prefixed
//! with `HYPERWALLET__`. For example `HYPERWALLET__API__PASSWORD` overrides
//! `api.password`.

use std::fmt;
use std::fs;
use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use error_stack::{Report, ResultExt};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::constants::{
    DEFAULT_ENCRYPTION_ALGORITHM, DEFAULT_ENCRYPTION_METHOD, DEFAULT_JWS_EXPIRATION_MINUTES,
    DEFAULT_SIGN_ALGORITHM, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT, ENV_PREFIX,
};
use crate::error::TransportError;

/// Minimum TLS protocol version the transport is allowed to negotiate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TlsVersion {
    #[serde(rename = "1.0")]
    Tls1_0,
    #[serde(rename = "1.1")]
    Tls1_1,
    #[default]
    #[serde(rename = "1.2")]
    Tls1_2,
    #[serde(rename = "1.3")]
    Tls1_3,
}

impl TlsVersion {
    /// Oldest version the transport can be configured with.
    pub const FLOOR: TlsVersion = TlsVersion::Tls1_2;

    #[must_use]
    pub fn is_supported(self) -> bool {
        self >= Self::FLOOR
    }
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TlsVersion::Tls1_0 => write!(f, "TLSv1.0"),
            TlsVersion::Tls1_1 => write!(f, "TLSv1.1"),
            TlsVersion::Tls1_2 => write!(f, "TLSv1.2"),
            TlsVersion::Tls1_3 => write!(f, "TLSv1.3"),
        }
    }
}

fn validate_tls_version(version: &TlsVersion) -> Result<(), ValidationError> {
    if version.is_supported() {
        Ok(())
    } else {
        let mut err = ValidationError::new("tls_version");
        err.message = Some(
            format!(
                "{version} is not supported, {} or newer is required",
                TlsVersion::FLOOR
            )
            .into(),
        );
        Err(err)
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_sign_algorithm() -> String {
    DEFAULT_SIGN_ALGORITHM.to_string()
}

fn default_encryption_algorithm() -> String {
    DEFAULT_ENCRYPTION_ALGORITHM.to_string()
}

fn default_encryption_method() -> String {
    DEFAULT_ENCRYPTION_METHOD.to_string()
}

fn default_jws_expiration_minutes() -> u64 {
    DEFAULT_JWS_EXPIRATION_MINUTES
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ApiSettings {
    #[validate(url)]
    pub server: String,
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
    #[serde(default = "default_timeout_secs")]
    #[validate(range(min = 1))]
    pub timeout_secs: u64,
    #[serde(default)]
    #[validate(custom(function = "validate_tls_version"))]
    pub min_tls_version: TlsVersion,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Key set locations and algorithms for the encrypted transport.
///
/// The client set holds the caller's private signing and decryption keys,
/// the Hyperwallet set holds the counterparty's public verification and
/// encryption keys. Each location is a filesystem path or an `http(s)` URL.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct EncryptionSettings {
    #[validate(length(min = 1))]
    pub client_private_key_set_location: String,
    #[validate(length(min = 1))]
    pub hyperwallet_key_set_location: String,
    #[serde(default = "default_sign_algorithm")]
    #[validate(length(min = 1))]
    pub sign_algorithm: String,
    #[serde(default = "default_encryption_algorithm")]
    #[validate(length(min = 1))]
    pub encryption_algorithm: String,
    #[serde(default = "default_encryption_method")]
    #[validate(length(min = 1))]
    pub encryption_method: String,
    #[serde(default = "default_jws_expiration_minutes")]
    #[validate(range(min = 1))]
    pub jws_expiration_minutes: u64,
}

impl EncryptionSettings {
    /// Settings for the two locations with every algorithm at its default.
    #[must_use]
    pub fn new(
        client_private_key_set_location: impl Into<String>,
        hyperwallet_key_set_location: impl Into<String>,
    ) -> Self {
        Self {
            client_private_key_set_location: client_private_key_set_location.into(),
            hyperwallet_key_set_location: hyperwallet_key_set_location.into(),
            sign_algorithm: default_sign_algorithm(),
            encryption_algorithm: default_encryption_algorithm(),
            encryption_method: default_encryption_method(),
            jws_expiration_minutes: default_jws_expiration_minutes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct Settings {
    #[validate(nested)]
    pub api: ApiSettings,
    #[serde(default)]
    #[validate(nested)]
    pub encryption: Option<EncryptionSettings>,
}

impl Settings {
    /// Parses settings from a TOML string, merges environment overrides and
    /// validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Configuration`] if the TOML is malformed,
    /// required fields are missing or validation fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, Report<TransportError>> {
        Self::from_toml_with_env_prefix(toml_str, ENV_PREFIX)
    }

    fn from_toml_with_env_prefix(
        toml_str: &str,
        env_prefix: &str,
    ) -> Result<Self, Report<TransportError>> {
        let environment = Environment::default()
            .prefix(env_prefix)
            .separator("__");

        let toml = File::from_str(toml_str, FileFormat::Toml);
        let config = Config::builder()
            .add_source(toml)
            .add_source(environment)
            .build()
            .change_context(TransportError::Configuration {
                message: "Failed to build configuration".to_string(),
            })?;

        let settings: Settings =
            config
                .try_deserialize()
                .change_context(TransportError::Configuration {
                    message: "Failed to deserialize configuration".to_string(),
                })?;

        settings.validate().map_err(|e| {
            Report::new(TransportError::Configuration {
                message: format!("Settings validation failed: {e}"),
            })
        })?;

        Ok(settings)
    }

    /// Reads and parses a TOML settings file.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Configuration`] if the file cannot be read or
    /// its content is rejected by [`Settings::from_toml`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Report<TransportError>> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .change_context(TransportError::Configuration {
                message: format!("Failed to read settings file {}", path.display()),
            })?;

        Self::from_toml(&content).attach(format!("while loading {}", path.display()))
    }

    /// Serializes the merged settings back to TOML with the password redacted.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Configuration`] if serialization fails.
    pub fn to_redacted_toml(&self) -> Result<String, Report<TransportError>> {
        let mut redacted = self.clone();
        redacted.api.password = "********".to_string();
        toml::to_string_pretty(&redacted).change_context(TransportError::Configuration {
            message: "Failed to serialize settings".to_string(),
        })
    }
}
