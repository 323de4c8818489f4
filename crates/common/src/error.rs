//! Error types for the encrypted transport.
//!
//! Every failure the pipeline can produce is a variant of [`TransportError`].
//! Functions return `Result<T, Report<TransportError>>` so lower-level causes
//! (I/O, JSON, JOSE, HTTP) stay attached to the report instead of being
//! flattened into strings.

use core::error::Error;

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// One entry of the `errors` array returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_resources: Vec<String>,
}

impl ApiErrorDetail {
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            field_name: None,
            related_resources: Vec::new(),
        }
    }
}

#[derive(Debug, Display)]
pub enum TransportError {
    /// The key set location resolved to neither a URL nor a readable file.
    #[display("{message}")]
    KeyLocation { message: String },

    /// The key set content is not a JSON document with a `keys` array.
    #[display("{message}")]
    MalformedKeySet { message: String },

    /// No key in the set carries the requested algorithm, or the algorithm
    /// cannot be driven by this crate.
    #[display("{message}")]
    UnsupportedAlgorithm { message: String },

    #[display("While trying to verify JWS signature no [exp] header is found")]
    MissingExpiration,

    #[display("Wrong value in [exp] header of JWS signature, must be integer")]
    InvalidExpirationType,

    #[display("JWS signature has expired, checked by [exp] JWS header")]
    SignatureExpired,

    #[display("Signature verification failed.")]
    SignatureVerification,

    /// JWE decryption failed with the private key held by the caller.
    #[display("{message}")]
    RecipientKeyMismatch { message: String },

    #[display("Invalid Content-Type specified in Response Header")]
    InvalidContentType,

    #[display("{message}")]
    GarbageResponse { message: String },

    /// Transport failure before any response was received.
    #[display("{message}")]
    Communication { message: String },

    /// Well-formed response body carrying an `errors` array.
    #[display("API error: {}", format_api_errors(errors))]
    Api { errors: Vec<ApiErrorDetail> },

    #[display("Configuration error: {message}")]
    Configuration { message: String },

    /// Sender-side JOSE failure (a key unusable for its algorithm and so on).
    #[display("Encryption error: {message}")]
    Encryption { message: String },
}

impl Error for TransportError {}

impl TransportError {
    /// Stable machine-readable code for the variant.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::KeyLocation { .. } => "KEY_LOCATION_ERROR",
            Self::MalformedKeySet { .. } => "MALFORMED_KEY_SET",
            Self::UnsupportedAlgorithm { .. } => "UNSUPPORTED_ALGORITHM",
            Self::MissingExpiration => "MISSING_EXPIRATION",
            Self::InvalidExpirationType => "INVALID_EXPIRATION_TYPE",
            Self::SignatureExpired => "SIGNATURE_EXPIRED",
            Self::SignatureVerification => "SIGNATURE_VERIFICATION_FAILED",
            Self::RecipientKeyMismatch { .. } => "RECIPIENT_KEY_MISMATCH",
            Self::InvalidContentType => "INVALID_CONTENT_TYPE",
            Self::GarbageResponse { .. } => "GARBAGE_RESPONSE",
            Self::Communication { .. } => "COMMUNICATION_ERROR",
            Self::Api { .. } => "API_ERROR",
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::Encryption { .. } => "ENCRYPTION_ERROR",
        }
    }

    /// Returns the error in the API's `errors` array shape.
    ///
    /// For [`TransportError::Api`] this is the list the server sent; every
    /// other variant yields a single entry built from [`Self::code`] and the
    /// display message.
    #[must_use]
    pub fn api_errors(&self) -> Vec<ApiErrorDetail> {
        match self {
            Self::Api { errors } => errors.clone(),
            other => vec![ApiErrorDetail::new(other.code(), other.to_string())],
        }
    }
}

fn format_api_errors(errors: &[ApiErrorDetail]) -> String {
    errors
        .iter()
        .map(|e| format!("{} ({})", e.message, e.code))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_messages() {
        assert_eq!(
            TransportError::MissingExpiration.to_string(),
            "While trying to verify JWS signature no [exp] header is found"
        );
        assert_eq!(
            TransportError::InvalidExpirationType.to_string(),
            "Wrong value in [exp] header of JWS signature, must be integer"
        );
        assert_eq!(
            TransportError::SignatureExpired.to_string(),
            "JWS signature has expired, checked by [exp] JWS header"
        );
        assert_eq!(
            TransportError::SignatureVerification.to_string(),
            "Signature verification failed."
        );
        assert_eq!(
            TransportError::InvalidContentType.to_string(),
            "Invalid Content-Type specified in Response Header"
        );
    }

    #[test]
    fn test_message_variants_display_message_verbatim() {
        let err = TransportError::KeyLocation {
            message: "Wrong JWK key set location path = somewhere".into(),
        };
        assert_eq!(
            err.to_string(),
            "Wrong JWK key set location path = somewhere"
        );

        let err = TransportError::Configuration {
            message: "missing server".into(),
        };
        assert_eq!(err.to_string(), "Configuration error: missing server");
    }

    #[test]
    fn test_api_errors_for_transport_failure() {
        let err = TransportError::Communication {
            message: "Connection to https://api.example.com failed".into(),
        };
        let errors = err.api_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, "COMMUNICATION_ERROR");
        assert_eq!(
            errors[0].message,
            "Connection to https://api.example.com failed"
        );
    }

    #[test]
    fn test_api_errors_passthrough() {
        let detail: ApiErrorDetail = serde_json::from_str(
            r#"{"code":"FORBIDDEN","message":"Houston, we have a problem","relatedResources":["trm-1","trm-2"]}"#,
        )
        .expect("should parse error detail");
        let err = TransportError::Api {
            errors: vec![detail.clone()],
        };

        assert_eq!(err.code(), "API_ERROR");
        assert_eq!(err.api_errors(), vec![detail]);
        assert_eq!(
            err.to_string(),
            "API error: Houston, we have a problem (FORBIDDEN)"
        );
    }

    #[test]
    fn test_api_error_detail_optional_fields() {
        let detail: ApiErrorDetail =
            serde_json::from_str(r#"{"code":"CONSTRAINT_VIOLATIONS","fieldName":"email"}"#)
                .expect("should parse error detail");
        assert_eq!(detail.field_name.as_deref(), Some("email"));
        assert!(detail.message.is_empty());
        assert!(detail.related_resources.is_empty());
    }
}
