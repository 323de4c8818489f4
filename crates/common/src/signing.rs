//! JWS signing and verification with an `exp` header claim.
//!
//! Signed payloads carry `alg`, `kid` and `exp` (Unix seconds) in the
//! protected header. Verification checks `exp` first and the signature
//! second; both must pass.

use std::fmt;
use std::time::Duration;

use base64::{engine::general_purpose, Engine};
use chrono::Utc;
use error_stack::{Report, ResultExt};
use josekit::jws::{self, JwsHeader};
use serde_json::{Map, Value};

use crate::algorithms;
use crate::error::TransportError;
use crate::key_set::Key;

/// A JWS in compact serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayload(String);

impl SignedPayload {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for SignedPayload {
    fn from(compact: String) -> Self {
        Self(compact)
    }
}

impl AsRef<str> for SignedPayload {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SignedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decodes the protected header of a JWS or JWE compact serialization
/// without verifying anything.
///
/// # Errors
///
/// Returns [`TransportError::SignatureVerification`] if the first segment is
/// not base64url-encoded JSON object.
pub fn protected_header(compact: &str) -> Result<Map<String, Value>, Report<TransportError>> {
    let segment = compact
        .split('.')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            Report::new(TransportError::SignatureVerification)
                .attach("compact serialization has no header segment")
        })?;

    let bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .change_context(TransportError::SignatureVerification)
        .attach("protected header is not base64url")?;

    serde_json::from_slice(&bytes)
        .change_context(TransportError::SignatureVerification)
        .attach("protected header is not a JSON object")
}

/// Checks the `exp` header claim of a signed payload against the current
/// time.
///
/// # Errors
///
/// Returns [`TransportError::MissingExpiration`] when `exp` is absent,
/// [`TransportError::InvalidExpirationType`] when it is not an integer and
/// [`TransportError::SignatureExpired`] when it lies in the past.
pub fn check_expiration(signed: &str) -> Result<(), Report<TransportError>> {
    let header = protected_header(signed)?;
    let exp = header
        .get("exp")
        .ok_or_else(|| Report::new(TransportError::MissingExpiration))?;
    let exp = exp.as_i64().ok_or_else(|| {
        Report::new(TransportError::InvalidExpirationType).attach(format!("exp = {exp}"))
    })?;

    let now = Utc::now().timestamp();
    if exp < now {
        return Err(Report::new(TransportError::SignatureExpired)
            .attach(format!("exp = {exp}, now = {now}")));
    }
    Ok(())
}

/// Signs `plaintext` with a private key, embedding `exp = now + expires_in`.
///
/// # Errors
///
/// Returns [`TransportError::UnsupportedAlgorithm`] or
/// [`TransportError::Encryption`] if the key cannot sign.
pub fn sign(
    plaintext: &[u8],
    signing_key: &Key,
    expires_in: Duration,
) -> Result<SignedPayload, Report<TransportError>> {
    let signer = algorithms::signer(signing_key)?;

    let expires_in = i64::try_from(expires_in.as_secs()).unwrap_or(i64::MAX);
    let exp = Utc::now().timestamp().saturating_add(expires_in);

    let mut header = JwsHeader::new();
    if let Some(kid) = signing_key.kid() {
        header.set_key_id(kid);
    }
    header
        .set_claim("exp", Some(Value::from(exp)))
        .change_context(TransportError::Encryption {
            message: "Failed to set JWS exp header".to_string(),
        })?;

    let compact = jws::serialize_compact(plaintext, &header, &*signer).change_context(
        TransportError::Encryption {
            message: "Failed to sign payload".to_string(),
        },
    )?;

    log::debug!(
        "signed payload with {} kid={}",
        signing_key.alg(),
        signing_key.kid().unwrap_or("<none>")
    );
    Ok(SignedPayload(compact))
}

/// Verifies a signed payload and returns the embedded bytes.
///
/// # Errors
///
/// Any of the [`check_expiration`] errors, or
/// [`TransportError::SignatureVerification`] if the signature does not
/// verify against `verifying_key`.
pub fn verify(signed: &str, verifying_key: &Key) -> Result<Vec<u8>, Report<TransportError>> {
    check_expiration(signed)?;

    let verifier = algorithms::verifier(verifying_key)?;
    let (payload, _header) = jws::deserialize_compact(signed, &*verifier)
        .change_context(TransportError::SignatureVerification)
        .attach(format!(
            "verifying key kid={}",
            verifying_key.kid().unwrap_or("<none>")
        ))?;

    Ok(payload)
}
