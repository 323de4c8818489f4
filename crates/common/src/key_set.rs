//! JSON Web Key set loading and key selection.
//!
//! A key set location is either an absolute `http(s)` URL or a filesystem
//! path. [`load`] resolves a location to the raw JSON text, [`KeySet::parse`]
//! turns that text into typed [`Key`] entries and [`KeySet::select`] picks the
//! first key carrying a requested algorithm.
//!
//! [`KeySetSource`] caches the parsed set for one location so the pipeline
//! does not re-fetch keys on every request. Call [`KeySetSource::reload`] to
//! pick up rotated keys.

use std::fs;
use std::path::Path;

use error_stack::{Report, ResultExt};
use josekit::jwk::Jwk;
use once_cell::sync::OnceCell;
use serde_json::Value;
use url::Url;

use crate::error::TransportError;

/// Where a key set is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySetLocation<'a> {
    Url(Url),
    Path(&'a Path),
}

impl<'a> KeySetLocation<'a> {
    /// Classifies a location string.
    ///
    /// Only absolute `http`/`https` URLs with a host count as URLs. Anything
    /// else, including relative paths like `/public-jwkset1`, is a path.
    #[must_use]
    pub fn parse(location: &'a str) -> Self {
        match Url::parse(location) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {
                KeySetLocation::Url(url)
            }
            _ => KeySetLocation::Path(Path::new(location)),
        }
    }
}

/// Resolves a key set location to its raw JSON text.
///
/// # Errors
///
/// Returns [`TransportError::KeyLocation`] if the path does not name an
/// existing file, or the file or URL cannot be read.
pub fn load(location: &str) -> Result<String, Report<TransportError>> {
    match KeySetLocation::parse(location) {
        KeySetLocation::Url(url) => fetch_url(&url),
        KeySetLocation::Path(path) if path.is_file() => {
            fs::read_to_string(path).change_context(TransportError::KeyLocation {
                message: format!("Failed to read JWK key set from {location}"),
            })
        }
        KeySetLocation::Path(_) => Err(Report::new(TransportError::KeyLocation {
            message: format!("Wrong JWK key set location path = {location}"),
        })),
    }
}

fn fetch_url(url: &Url) -> Result<String, Report<TransportError>> {
    let message = format!("Failed to fetch JWK key set from {url}");

    let mut response = ureq::get(url.as_str())
        .call()
        .change_context(TransportError::KeyLocation {
            message: message.clone(),
        })?;
    response
        .body_mut()
        .read_to_string()
        .change_context(TransportError::KeyLocation { message })
}

/// One entry of a key set.
#[derive(Debug, Clone)]
pub struct Key {
    kid: Option<String>,
    alg: String,
    key_use: Option<String>,
    jwk: Jwk,
}

impl Key {
    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    #[must_use]
    pub fn alg(&self) -> &str {
        &self.alg
    }

    #[must_use]
    pub fn key_use(&self) -> Option<&str> {
        self.key_use.as_deref()
    }

    #[must_use]
    pub fn jwk(&self) -> &Jwk {
        &self.jwk
    }
}

/// A parsed key set, in document order.
#[derive(Debug, Clone)]
pub struct KeySet {
    keys: Vec<Key>,
}

impl KeySet {
    /// Parses key set JSON of the form `{"keys": [...]}`.
    ///
    /// Entries without an `alg` member can never be selected and are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::MalformedKeySet`] if the text is not JSON,
    /// has no `keys` array, or contains an entry that is not a valid JWK.
    pub fn parse(text: &str) -> Result<Self, Report<TransportError>> {
        let document: Value =
            serde_json::from_str(text).change_context(TransportError::MalformedKeySet {
                message: format!("Wrong JWK key set{text}"),
            })?;

        let entries = document
            .get("keys")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                Report::new(TransportError::MalformedKeySet {
                    message: "Wrong JWK key set: missing `keys` array".to_string(),
                })
            })?;

        let mut keys = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let Some(map) = entry.as_object() else {
                return Err(Report::new(TransportError::MalformedKeySet {
                    message: format!("Wrong JWK key set: entry {index} is not an object"),
                }));
            };

            let Some(alg) = map.get("alg").and_then(Value::as_str) else {
                log::debug!("skipping JWK entry {index} without `alg`");
                continue;
            };

            let jwk = Jwk::from_map(map.clone()).change_context(TransportError::MalformedKeySet {
                message: format!("Wrong JWK key set: entry {index} is not a valid JWK"),
            })?;

            keys.push(Key {
                kid: jwk.key_id().map(str::to_string),
                alg: alg.to_string(),
                key_use: jwk.key_use().map(str::to_string),
                jwk,
            });
        }

        Ok(Self { keys })
    }

    /// Returns the first key whose `alg` equals `algorithm`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::UnsupportedAlgorithm`] if no key matches.
    pub fn select(&self, algorithm: &str) -> Result<&Key, Report<TransportError>> {
        self.keys
            .iter()
            .find(|key| key.alg == algorithm)
            .inspect(|key| {
                log::debug!(
                    "selected JWK kid={} for algorithm {algorithm}",
                    key.kid().unwrap_or("<none>")
                );
            })
            .ok_or_else(|| {
                Report::new(TransportError::UnsupportedAlgorithm {
                    message: format!("JWK set doesn't contain key with algorithm = {algorithm}"),
                })
            })
    }

    #[must_use]
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Parses `text` and returns an owned copy of the key for `algorithm`.
///
/// # Errors
///
/// See [`KeySet::parse`] and [`KeySet::select`].
pub fn select_key(text: &str, algorithm: &str) -> Result<Key, Report<TransportError>> {
    KeySet::parse(text)?.select(algorithm).cloned()
}

/// A key set location whose parsed content is loaded once and then reused.
#[derive(Debug)]
pub struct KeySetSource {
    location: String,
    cache: OnceCell<KeySet>,
}

impl KeySetSource {
    #[must_use]
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            cache: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Returns the cached key set, loading it on first use.
    ///
    /// A failed load is not cached; the next call tries again.
    ///
    /// # Errors
    ///
    /// See [`load`] and [`KeySet::parse`].
    pub fn get(&self) -> Result<&KeySet, Report<TransportError>> {
        self.cache.get_or_try_init(|| {
            let text = load(&self.location)?;
            let key_set = KeySet::parse(&text)
                .attach(format!("key set location: {}", self.location))?;
            log::info!(
                "loaded {} JWK(s) from {}",
                key_set.len(),
                self.location
            );
            Ok(key_set)
        })
    }

    /// Selects the key for `algorithm` from the cached set.
    ///
    /// # Errors
    ///
    /// See [`KeySetSource::get`] and [`KeySet::select`].
    pub fn select(&self, algorithm: &str) -> Result<&Key, Report<TransportError>> {
        self.get()?.select(algorithm)
    }

    /// Drops the cached set so the next use re-resolves the location.
    pub fn reload(&mut self) {
        if self.cache.take().is_some() {
            log::info!("discarded cached JWK set for {}", self.location);
        }
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.cache.get().is_some()
    }
}
