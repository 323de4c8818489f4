//! Sign-then-encrypt pipeline.
//!
//! Outgoing plaintext is signed with the caller's private key (JWS) and the
//! compact JWS is encrypted for the counterparty's public key (JWE). Incoming
//! payloads go the other way: decrypt with the caller's private key, check
//! `exp`, verify the signature with the counterparty's public key.

use std::fmt;
use std::time::Duration;

use error_stack::{Report, ResultExt};
use josekit::jwe::{self, JweHeader};

use crate::algorithms;
use crate::constants::{
    DEFAULT_ENCRYPTION_ALGORITHM, DEFAULT_ENCRYPTION_METHOD, DEFAULT_JWS_EXPIRATION_MINUTES,
    DEFAULT_SIGN_ALGORITHM,
};
use crate::error::TransportError;
use crate::key_set::{Key, KeySetSource};
use crate::settings::EncryptionSettings;
use crate::signing::{self, SignedPayload};

/// A JWE in compact serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload(String);

impl EncryptedPayload {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for EncryptedPayload {
    fn from(compact: String) -> Self {
        Self(compact)
    }
}

impl AsRef<str> for EncryptedPayload {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EncryptedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Signs `plaintext` and encrypts the resulting JWS for the recipient.
///
/// # Errors
///
/// Returns [`TransportError::UnsupportedAlgorithm`] for an unknown algorithm
/// or content encryption method, and [`TransportError::Encryption`] if a key
/// cannot be used or the JOSE operation fails.
pub fn encrypt(
    plaintext: &str,
    sender_signing_key: &Key,
    recipient_encryption_key: &Key,
    method: &str,
    expires_in: Duration,
) -> Result<EncryptedPayload, Report<TransportError>> {
    algorithms::ensure_content_encryption(method)?;

    let signed = signing::sign(plaintext.as_bytes(), sender_signing_key, expires_in)?;
    encrypt_signed(&signed, recipient_encryption_key, method)
}

fn encrypt_signed(
    signed: &SignedPayload,
    recipient_encryption_key: &Key,
    method: &str,
) -> Result<EncryptedPayload, Report<TransportError>> {
    let encrypter = algorithms::encrypter(recipient_encryption_key)?;

    let mut header = JweHeader::new();
    header.set_content_encryption(method);
    header.set_content_type("JWT");
    if let Some(kid) = recipient_encryption_key.kid() {
        header.set_key_id(kid);
    }

    let compact = jwe::serialize_compact(signed.as_str().as_bytes(), &header, &*encrypter)
        .change_context(TransportError::Encryption {
            message: "Failed to encrypt signed payload".to_string(),
        })?;

    log::debug!(
        "encrypted payload with {}/{method} for kid={}",
        recipient_encryption_key.alg(),
        recipient_encryption_key.kid().unwrap_or("<none>")
    );
    Ok(EncryptedPayload(compact))
}

/// Decrypts a JWE and verifies the JWS inside it.
///
/// # Errors
///
/// Returns [`TransportError::RecipientKeyMismatch`] if decryption fails with
/// `receiver_decryption_key`, then any error from [`signing::verify`].
pub fn decrypt(
    ciphertext: &str,
    receiver_decryption_key: &Key,
    sender_verifying_key: &Key,
) -> Result<Vec<u8>, Report<TransportError>> {
    let decrypter = algorithms::decrypter(receiver_decryption_key)?;

    let (inner, _header) = jwe::deserialize_compact(ciphertext, &*decrypter).map_err(|e| {
        Report::new(TransportError::RecipientKeyMismatch {
            message: format!("No recipient matched the provided key[{e}]"),
        })
    })?;

    let signed = String::from_utf8(inner)
        .change_context(TransportError::SignatureVerification)
        .attach("decrypted content is not a compact JWS")?;

    signing::verify(&signed, sender_verifying_key)
}

/// Algorithms and lifetimes used by [`Encryption`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionOptions {
    pub sign_algorithm: String,
    pub encryption_algorithm: String,
    pub encryption_method: String,
    pub jws_expiration: Duration,
}

impl Default for EncryptionOptions {
    fn default() -> Self {
        Self {
            sign_algorithm: DEFAULT_SIGN_ALGORITHM.to_string(),
            encryption_algorithm: DEFAULT_ENCRYPTION_ALGORITHM.to_string(),
            encryption_method: DEFAULT_ENCRYPTION_METHOD.to_string(),
            jws_expiration: Duration::from_secs(DEFAULT_JWS_EXPIRATION_MINUTES * 60),
        }
    }
}

impl From<&EncryptionSettings> for EncryptionOptions {
    fn from(settings: &EncryptionSettings) -> Self {
        Self {
            sign_algorithm: settings.sign_algorithm.clone(),
            encryption_algorithm: settings.encryption_algorithm.clone(),
            encryption_method: settings.encryption_method.clone(),
            jws_expiration: Duration::from_secs(settings.jws_expiration_minutes.saturating_mul(60)),
        }
    }
}

/// Encrypts requests for, and decrypts responses from, the counterparty.
///
/// Key sets are loaded lazily on first use and cached; construction does no
/// I/O, so a wrong location surfaces from the first [`Encryption::encrypt`]
/// or [`Encryption::decrypt`] call.
#[derive(Debug)]
pub struct Encryption {
    client_key_set: KeySetSource,
    hyperwallet_key_set: KeySetSource,
    options: EncryptionOptions,
}

impl Encryption {
    /// Creates an encryption pipeline with default algorithms.
    #[must_use]
    pub fn new(
        client_private_key_set_location: impl Into<String>,
        hyperwallet_key_set_location: impl Into<String>,
    ) -> Self {
        Self::with_options(
            client_private_key_set_location,
            hyperwallet_key_set_location,
            EncryptionOptions::default(),
        )
    }

    #[must_use]
    pub fn with_options(
        client_private_key_set_location: impl Into<String>,
        hyperwallet_key_set_location: impl Into<String>,
        options: EncryptionOptions,
    ) -> Self {
        Self {
            client_key_set: KeySetSource::new(client_private_key_set_location),
            hyperwallet_key_set: KeySetSource::new(hyperwallet_key_set_location),
            options,
        }
    }

    #[must_use]
    pub fn from_settings(settings: &EncryptionSettings) -> Self {
        Self::with_options(
            settings.client_private_key_set_location.clone(),
            settings.hyperwallet_key_set_location.clone(),
            EncryptionOptions::from(settings),
        )
    }

    #[must_use]
    pub fn options(&self) -> &EncryptionOptions {
        &self.options
    }

    /// Signs with the client's private key and encrypts for Hyperwallet.
    ///
    /// # Errors
    ///
    /// Key set loading and selection errors from
    /// [`crate::key_set`], then any error from [`encrypt`].
    pub fn encrypt(&self, plaintext: &str) -> Result<EncryptedPayload, Report<TransportError>> {
        let signing_key = self.client_key_set.select(&self.options.sign_algorithm)?;
        let encryption_key = self
            .hyperwallet_key_set
            .select(&self.options.encryption_algorithm)?;

        encrypt(
            plaintext,
            signing_key,
            encryption_key,
            &self.options.encryption_method,
            self.options.jws_expiration,
        )
    }

    /// Decrypts with the client's private key and verifies Hyperwallet's
    /// signature.
    ///
    /// # Errors
    ///
    /// Key set loading and selection errors from [`crate::key_set`], any
    /// error from [`decrypt`], or [`TransportError::GarbageResponse`] if the
    /// verified payload is not UTF-8.
    pub fn decrypt(&self, ciphertext: &str) -> Result<String, Report<TransportError>> {
        let decryption_key = self
            .client_key_set
            .select(&self.options.encryption_algorithm)?;
        let verifying_key = self
            .hyperwallet_key_set
            .select(&self.options.sign_algorithm)?;

        let plaintext = decrypt(ciphertext, decryption_key, verifying_key)?;
        String::from_utf8(plaintext).change_context(TransportError::GarbageResponse {
            message: "Decrypted payload is not valid UTF-8".to_string(),
        })
    }

    /// Checks the `exp` claim of a compact JWS.
    ///
    /// # Errors
    ///
    /// See [`signing::check_expiration`].
    pub fn check_jws_expiration(&self, signed: &str) -> Result<(), Report<TransportError>> {
        signing::check_expiration(signed)
    }

    /// Drops both cached key sets so rotated keys are picked up on next use.
    pub fn reload(&mut self) {
        self.client_key_set.reload();
        self.hyperwallet_key_set.reload();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::tests::{fixture_key, resource_path};

    const MESSAGE: &str = "Message for test";

    fn encryption(client: &str, hyperwallet: &str) -> Encryption {
        Encryption::new(resource_path(client), resource_path(hyperwallet))
    }

    #[test]
    fn test_should_successfully_encrypt_and_decrypt_text_message() {
        let encryption = encryption("private-jwkset1", "public-jwkset1");

        let encrypted = encryption.encrypt(MESSAGE).unwrap();
        let decrypted = encryption.decrypt(encrypted.as_str()).unwrap();
        assert_eq!(decrypted, MESSAGE);
    }

    #[test]
    fn test_round_trip_with_explicit_keys() {
        let sign_a = fixture_key("private-jwkset1", "RS256");
        let verify_a = fixture_key("public-jwkset1", "RS256");
        let enc_b = fixture_key("public-jwkset2", "RSA-OAEP-256");
        let dec_b = fixture_key("private-jwkset2", "RSA-OAEP-256");

        for plaintext in ["", MESSAGE, "{\"key\":\"value\"}", "zażółć gęślą jaźń"] {
            let encrypted = encrypt(
                plaintext,
                &sign_a,
                &enc_b,
                DEFAULT_ENCRYPTION_METHOD,
                Duration::from_secs(300),
            )
            .unwrap();
            let decrypted = decrypt(encrypted.as_str(), &dec_b, &verify_a).unwrap();
            assert_eq!(decrypted, plaintext.as_bytes());
        }
    }

    #[test]
    fn test_encrypted_payload_is_five_segment_jwe() {
        let encryption = encryption("private-jwkset1", "public-jwkset1");
        let encrypted = encryption.encrypt(MESSAGE).unwrap();

        assert_eq!(encrypted.as_str().split('.').count(), 5);
        assert!(!encrypted.as_str().contains(MESSAGE));

        let header = signing::protected_header(encrypted.as_str()).unwrap();
        assert_eq!(header["alg"], "RSA-OAEP-256");
        assert_eq!(header["enc"], "A256CBC-HS512");
        assert_eq!(header["cty"], "JWT");
        assert_eq!(header["kid"], "2018_enc_rsa_RSA-OAEP-256_1");
    }

    #[test]
    fn test_should_fail_decryption_when_wrong_private_key_is_used() {
        let encryption1 = encryption("private-jwkset1", "public-jwkset1");
        let encryption2 = encryption("private-jwkset2", "public-jwkset2");

        let encrypted = encryption1.encrypt(MESSAGE).unwrap();
        let err = encryption2.decrypt(encrypted.as_str()).unwrap_err();

        assert!(matches!(
            err.current_context(),
            TransportError::RecipientKeyMismatch { .. }
        ));
        assert!(err
            .current_context()
            .to_string()
            .starts_with("No recipient matched the provided key"));
    }

    #[test]
    fn test_should_fail_signature_verification_when_wrong_public_key_is_used() {
        let encryption1 = encryption("private-jwkset1", "public-jwkset1");
        let encryption2 = encryption("private-jwkset1", "public-jwkset2");

        let encrypted = encryption1.encrypt(MESSAGE).unwrap();
        let err = encryption2.decrypt(encrypted.as_str()).unwrap_err();

        assert_eq!(
            err.current_context().to_string(),
            "Signature verification failed."
        );
    }

    #[test]
    fn test_should_throw_exception_when_wrong_jwk_key_set_location_is_given() {
        let encryption = Encryption::new("wrong_keyset_path", resource_path("public-jwkset1"));

        let err = encryption.encrypt(MESSAGE).unwrap_err();
        assert!(matches!(
            err.current_context(),
            TransportError::KeyLocation { .. }
        ));
        assert_eq!(
            err.current_context().to_string(),
            "Wrong JWK key set location path = wrong_keyset_path"
        );
    }

    #[test]
    fn test_should_throw_exception_when_not_supported_encryption_algorithm_is_given() {
        let options = EncryptionOptions {
            encryption_algorithm: "unsupported_encryption_algorithm".to_string(),
            ..EncryptionOptions::default()
        };
        let encryption = Encryption::with_options(
            resource_path("private-jwkset1"),
            resource_path("public-jwkset1"),
            options,
        );

        let err = encryption.encrypt(MESSAGE).unwrap_err();
        assert_eq!(
            err.current_context().to_string(),
            "JWK set doesn't contain key with algorithm = unsupported_encryption_algorithm"
        );
    }

    #[test]
    fn test_unsupported_content_encryption_method() {
        let options = EncryptionOptions {
            encryption_method: "A512GCM".to_string(),
            ..EncryptionOptions::default()
        };
        let encryption = Encryption::with_options(
            resource_path("private-jwkset1"),
            resource_path("public-jwkset1"),
            options,
        );

        let err = encryption.encrypt(MESSAGE).unwrap_err();
        assert!(matches!(
            err.current_context(),
            TransportError::UnsupportedAlgorithm { .. }
        ));
    }

    #[test]
    fn test_gcm_content_encryption_round_trip() {
        let options = EncryptionOptions {
            encryption_method: "A256GCM".to_string(),
            ..EncryptionOptions::default()
        };
        let encryption = Encryption::with_options(
            resource_path("private-jwkset1"),
            resource_path("public-jwkset1"),
            options,
        );

        let encrypted = encryption.encrypt(MESSAGE).unwrap();
        assert_eq!(encryption.decrypt(encrypted.as_str()).unwrap(), MESSAGE);
    }

    #[test]
    fn test_check_jws_expiration_does_not_load_key_sets() {
        let signing_key = fixture_key("private-jwkset1", "RS256");
        let encryption = Encryption::new(resource_path("private-jwkset1"), "/public-jwkset1");

        let signed = signing::sign(b"Test message", &signing_key, Duration::from_secs(60)).unwrap();
        assert!(encryption.check_jws_expiration(signed.as_str()).is_ok());
    }

    #[test]
    fn test_decrypt_garbage_ciphertext() {
        let encryption = encryption("private-jwkset1", "public-jwkset1");
        let err = encryption.decrypt("not.a.jwe").unwrap_err();
        assert!(matches!(
            err.current_context(),
            TransportError::RecipientKeyMismatch { .. }
        ));
    }

    #[test]
    fn test_options_from_settings() {
        let mut settings = EncryptionSettings::new("/keys/private", "/keys/public");
        settings.jws_expiration_minutes = 2;

        let encryption = Encryption::from_settings(&settings);
        assert_eq!(encryption.options().jws_expiration, Duration::from_secs(120));
        assert_eq!(encryption.options().sign_algorithm, "RS256");
    }

    #[test]
    fn test_reload_keeps_working() {
        let mut encryption = encryption("private-jwkset1", "public-jwkset1");
        let encrypted = encryption.encrypt(MESSAGE).unwrap();

        encryption.reload();
        assert_eq!(encryption.decrypt(encrypted.as_str()).unwrap(), MESSAGE);
    }
}
