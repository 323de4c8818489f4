//! Maps JOSE algorithm names to `josekit` signers, verifiers, encrypters and
//! decrypters built from a selected [`Key`].

use error_stack::{Report, ResultExt};
use josekit::jwe::{self, JweDecrypter, JweEncrypter};
use josekit::jws::{self, JwsSigner, JwsVerifier};
use josekit::JoseError;

use crate::error::TransportError;
use crate::key_set::Key;

pub const CONTENT_ENCRYPTION_METHODS: &[&str] = &[
    "A128CBC-HS256",
    "A192CBC-HS384",
    "A256CBC-HS512",
    "A128GCM",
    "A192GCM",
    "A256GCM",
];

fn unsupported(kind: &str, algorithm: &str) -> Report<TransportError> {
    Report::new(TransportError::UnsupportedAlgorithm {
        message: format!("Unsupported {kind} algorithm = {algorithm}"),
    })
}

fn unusable_key(key: &Key, purpose: &str) -> TransportError {
    TransportError::Encryption {
        message: format!(
            "JWK kid={} cannot be used to {purpose} with {}",
            key.kid().unwrap_or("<none>"),
            key.alg()
        ),
    }
}

fn boxed<T: JwsSigner + 'static>(
    signer: Result<T, JoseError>,
) -> Result<Box<dyn JwsSigner>, JoseError> {
    signer.map(|s| Box::new(s) as Box<dyn JwsSigner>)
}

fn boxed_verifier<T: JwsVerifier + 'static>(
    verifier: Result<T, JoseError>,
) -> Result<Box<dyn JwsVerifier>, JoseError> {
    verifier.map(|v| Box::new(v) as Box<dyn JwsVerifier>)
}

fn boxed_encrypter<T: JweEncrypter + 'static>(
    encrypter: Result<T, JoseError>,
) -> Result<Box<dyn JweEncrypter>, JoseError> {
    encrypter.map(|e| Box::new(e) as Box<dyn JweEncrypter>)
}

fn boxed_decrypter<T: JweDecrypter + 'static>(
    decrypter: Result<T, JoseError>,
) -> Result<Box<dyn JweDecrypter>, JoseError> {
    decrypter.map(|d| Box::new(d) as Box<dyn JweDecrypter>)
}

/// Builds a JWS signer from a private key.
///
/// # Errors
///
/// Returns [`TransportError::UnsupportedAlgorithm`] for an unknown `alg` and
/// [`TransportError::Encryption`] if the key does not fit the algorithm.
pub fn signer(key: &Key) -> Result<Box<dyn JwsSigner>, Report<TransportError>> {
    let jwk = key.jwk();
    let signer = match key.alg() {
        "RS256" => boxed(jws::RS256.signer_from_jwk(jwk)),
        "RS384" => boxed(jws::RS384.signer_from_jwk(jwk)),
        "RS512" => boxed(jws::RS512.signer_from_jwk(jwk)),
        "PS256" => boxed(jws::PS256.signer_from_jwk(jwk)),
        "PS384" => boxed(jws::PS384.signer_from_jwk(jwk)),
        "PS512" => boxed(jws::PS512.signer_from_jwk(jwk)),
        "ES256" => boxed(jws::ES256.signer_from_jwk(jwk)),
        "ES384" => boxed(jws::ES384.signer_from_jwk(jwk)),
        "ES512" => boxed(jws::ES512.signer_from_jwk(jwk)),
        "EdDSA" => boxed(jws::EdDSA.signer_from_jwk(jwk)),
        other => return Err(unsupported("signing", other)),
    };
    signer.change_context(unusable_key(key, "sign"))
}

/// Builds a JWS verifier from a public key.
///
/// # Errors
///
/// Same as [`signer`].
pub fn verifier(key: &Key) -> Result<Box<dyn JwsVerifier>, Report<TransportError>> {
    let jwk = key.jwk();
    let verifier = match key.alg() {
        "RS256" => boxed_verifier(jws::RS256.verifier_from_jwk(jwk)),
        "RS384" => boxed_verifier(jws::RS384.verifier_from_jwk(jwk)),
        "RS512" => boxed_verifier(jws::RS512.verifier_from_jwk(jwk)),
        "PS256" => boxed_verifier(jws::PS256.verifier_from_jwk(jwk)),
        "PS384" => boxed_verifier(jws::PS384.verifier_from_jwk(jwk)),
        "PS512" => boxed_verifier(jws::PS512.verifier_from_jwk(jwk)),
        "ES256" => boxed_verifier(jws::ES256.verifier_from_jwk(jwk)),
        "ES384" => boxed_verifier(jws::ES384.verifier_from_jwk(jwk)),
        "ES512" => boxed_verifier(jws::ES512.verifier_from_jwk(jwk)),
        "EdDSA" => boxed_verifier(jws::EdDSA.verifier_from_jwk(jwk)),
        other => return Err(unsupported("signing", other)),
    };
    verifier.change_context(unusable_key(key, "verify"))
}

/// Builds a JWE encrypter from the recipient's public key.
///
/// # Errors
///
/// Same as [`signer`].
pub fn encrypter(key: &Key) -> Result<Box<dyn JweEncrypter>, Report<TransportError>> {
    let jwk = key.jwk();
    let encrypter = match key.alg() {
        "RSA-OAEP" => boxed_encrypter(jwe::RSA_OAEP.encrypter_from_jwk(jwk)),
        "RSA-OAEP-256" => boxed_encrypter(jwe::RSA_OAEP_256.encrypter_from_jwk(jwk)),
        "ECDH-ES" => boxed_encrypter(jwe::ECDH_ES.encrypter_from_jwk(jwk)),
        "ECDH-ES+A128KW" => boxed_encrypter(jwe::ECDH_ES_A128KW.encrypter_from_jwk(jwk)),
        "ECDH-ES+A192KW" => boxed_encrypter(jwe::ECDH_ES_A192KW.encrypter_from_jwk(jwk)),
        "ECDH-ES+A256KW" => boxed_encrypter(jwe::ECDH_ES_A256KW.encrypter_from_jwk(jwk)),
        other => return Err(unsupported("key management", other)),
    };
    encrypter.change_context(unusable_key(key, "encrypt"))
}

/// Builds a JWE decrypter from the caller's private key.
///
/// # Errors
///
/// Same as [`signer`].
pub fn decrypter(key: &Key) -> Result<Box<dyn JweDecrypter>, Report<TransportError>> {
    let jwk = key.jwk();
    let decrypter = match key.alg() {
        "RSA-OAEP" => boxed_decrypter(jwe::RSA_OAEP.decrypter_from_jwk(jwk)),
        "RSA-OAEP-256" => boxed_decrypter(jwe::RSA_OAEP_256.decrypter_from_jwk(jwk)),
        "ECDH-ES" => boxed_decrypter(jwe::ECDH_ES.decrypter_from_jwk(jwk)),
        "ECDH-ES+A128KW" => boxed_decrypter(jwe::ECDH_ES_A128KW.decrypter_from_jwk(jwk)),
        "ECDH-ES+A192KW" => boxed_decrypter(jwe::ECDH_ES_A192KW.decrypter_from_jwk(jwk)),
        "ECDH-ES+A256KW" => boxed_decrypter(jwe::ECDH_ES_A256KW.decrypter_from_jwk(jwk)),
        other => return Err(unsupported("key management", other)),
    };
    decrypter.change_context(unusable_key(key, "decrypt"))
}

/// Checks a JWE `enc` value against the content encryption methods the
/// pipeline supports.
///
/// # Errors
///
/// Returns [`TransportError::UnsupportedAlgorithm`] for an unknown method.
pub fn ensure_content_encryption(method: &str) -> Result<(), Report<TransportError>> {
    if CONTENT_ENCRYPTION_METHODS.contains(&method) {
        Ok(())
    } else {
        Err(unsupported("content encryption", method))
    }
}
