//! Content-Type negotiation between plain JSON and JOSE bodies.

use std::collections::BTreeMap;
use std::fmt;

use error_stack::Report;
use http::HeaderValue;

use crate::constants::{
    CONTENT_TYPE_JOSE_JSON, CONTENT_TYPE_JSON, MEDIA_TYPE_JOSE_JSON, MEDIA_TYPE_JSON,
};
use crate::error::TransportError;

/// A Content-Type header split into its media type and parameters.
///
/// Segments are split on `;` and trimmed. A segment containing `=` is a
/// parameter, anything else is the media type, so `charset=utf-8;application/json`
/// and `application/json;charset=utf-8` parse identically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    media_type: String,
    params: BTreeMap<String, String>,
}

impl ContentType {
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidContentType`] if the header has no
    /// media type or more than one.
    pub fn parse(header: &str) -> Result<Self, Report<TransportError>> {
        let mut media_type = None;
        let mut params = BTreeMap::new();

        for segment in header.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            if let Some((name, value)) = segment.split_once('=') {
                params.insert(
                    name.trim().to_ascii_lowercase(),
                    value.trim().trim_matches('"').to_string(),
                );
            } else if media_type.replace(segment.to_string()).is_some() {
                return Err(Report::new(TransportError::InvalidContentType)
                    .attach(format!("more than one media type in `{header}`")));
            }
        }

        let media_type = media_type.ok_or_else(|| {
            Report::new(TransportError::InvalidContentType)
                .attach(format!("no media type in `{header}`"))
        })?;

        Ok(Self { media_type, params })
    }

    #[must_use]
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.param("charset")
    }

    /// Maps the media type onto a body protocol. Matching is case-sensitive.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidContentType`] for any media type other
    /// than `application/json` or `application/jose+json`.
    pub fn protocol(&self) -> Result<PayloadProtocol, Report<TransportError>> {
        match self.media_type.as_str() {
            MEDIA_TYPE_JSON => Ok(PayloadProtocol::Json),
            MEDIA_TYPE_JOSE_JSON => Ok(PayloadProtocol::JoseJson),
            other => Err(Report::new(TransportError::InvalidContentType)
                .attach(format!("unsupported media type `{other}`"))),
        }
    }
}

/// How a body is encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadProtocol {
    /// `application/json`
    Json,
    /// `application/jose+json`, a compact JWE wrapping a compact JWS.
    JoseJson,
}

impl PayloadProtocol {
    #[must_use]
    pub const fn media_type(self) -> &'static str {
        match self {
            PayloadProtocol::Json => MEDIA_TYPE_JSON,
            PayloadProtocol::JoseJson => MEDIA_TYPE_JOSE_JSON,
        }
    }

    #[must_use]
    pub fn header_value(self) -> HeaderValue {
        match self {
            PayloadProtocol::Json => CONTENT_TYPE_JSON,
            PayloadProtocol::JoseJson => CONTENT_TYPE_JOSE_JSON,
        }
    }

    /// Resolves a raw header value to a protocol.
    ///
    /// # Errors
    ///
    /// See [`ContentType::parse`] and [`ContentType::protocol`].
    pub fn from_header(header: &str) -> Result<Self, Report<TransportError>> {
        ContentType::parse(header)?.protocol()
    }
}

impl fmt::Display for PayloadProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.media_type())
    }
}

/// An HTTP body paired with the protocol its Content-Type announces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEnvelope {
    pub body: String,
    pub protocol: PayloadProtocol,
}

impl TransportEnvelope {
    #[must_use]
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            protocol: PayloadProtocol::Json,
        }
    }

    #[must_use]
    pub fn jose(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            protocol: PayloadProtocol::JoseJson,
        }
    }

    #[must_use]
    pub fn content_type(&self) -> HeaderValue {
        self.protocol.header_value()
    }
}
