//! Encrypted transport for the Hyperwallet REST API.
//!
//! Request bodies can be signed (JWS) and then encrypted (JWE) with keys
//! loaded from JWK sets, and responses are negotiated by `Content-Type`,
//! decrypted and verified on the way back.
//!
//! # Modules
//!
//! - [`algorithms`]: JOSE algorithm names mapped to signers, verifiers, encrypters and decrypters
//! - [`constants`]: Media types and default algorithms
//! - [`content_type`]: Content-Type parsing and body protocols
//! - [`encryption`]: Sign-then-encrypt pipeline and the [`encryption::Encryption`] facade
//! - [`error`]: Error taxonomy
//! - [`http_client`]: API client, transport trait and the `ureq` transport
//! - [`key_set`]: JWK set loading, key selection and caching
//! - [`logging`]: Logger initialisation
//! - [`settings`]: Configuration management and validation
//! - [`signing`]: JWS signing and verification with `exp` enforcement
//! - [`test_support`]: Testing utilities and mocks

pub mod algorithms;
pub mod constants;
pub mod content_type;
pub mod encryption;
pub mod error;
pub mod http_client;
pub mod key_set;
pub mod logging;
pub mod settings;
pub mod signing;
