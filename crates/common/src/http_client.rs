//! Blocking API client with optional JOSE payload protection.
//!
//! [`ApiClient`] picks the outgoing `Content-Type` from whether encryption is
//! configured, and on the way back uses the response `Content-Type` to decide
//! between decrypting a JOSE body and parsing plain JSON. Sending goes through
//! the [`HttpTransport`] trait; [`UreqTransport`] is the production
//! implementation.

use std::time::Duration;

use base64::{engine::general_purpose, Engine};
use error_stack::{Report, ResultExt};
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use http::{Method, Request, Response, StatusCode};
use serde_json::Value;
use url::Url;

use crate::content_type::{PayloadProtocol, TransportEnvelope};
use crate::encryption::Encryption;
use crate::error::{ApiErrorDetail, TransportError};
use crate::settings::{ApiSettings, Settings, TlsVersion};

/// Sends one HTTP request and returns the full response.
///
/// Implementations must report failures that happen before a response is
/// obtained as [`TransportError::Communication`]. Any HTTP status, including
/// 4xx and 5xx, is a response.
pub trait HttpTransport: Send + Sync {
    /// # Errors
    ///
    /// Returns [`TransportError::Communication`] if no response was received.
    fn execute(&self, request: Request<Vec<u8>>)
        -> Result<Response<Vec<u8>>, Report<TransportError>>;
}

/// [`HttpTransport`] backed by a shared `ureq` agent.
///
/// `ureq` negotiates TLS through rustls, which never offers anything older
/// than TLS 1.2.
#[derive(Debug)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    /// # Errors
    ///
    /// Returns [`TransportError::Configuration`] if `min_tls_version` is below
    /// TLS 1.2 or asks for a TLS 1.3 floor, which rustls cannot be pinned to
    /// through `ureq`.
    pub fn new(settings: &ApiSettings) -> Result<Self, Report<TransportError>> {
        match settings.min_tls_version {
            TlsVersion::Tls1_2 => {}
            TlsVersion::Tls1_3 => {
                return Err(Report::new(TransportError::Configuration {
                    message: "TLSv1.3 as a minimum cannot be enforced by the ureq transport; \
                              use a custom HttpTransport"
                        .to_string(),
                }));
            }
            other => {
                return Err(Report::new(TransportError::Configuration {
                    message: format!(
                        "{other} is not supported, {} or newer is required",
                        TlsVersion::FLOOR
                    ),
                }));
            }
        }

        let config = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(settings.timeout_secs)))
            .http_status_as_error(false)
            .build();

        Ok(Self {
            agent: ureq::Agent::new_with_config(config),
        })
    }
}

impl HttpTransport for UreqTransport {
    fn execute(
        &self,
        request: Request<Vec<u8>>,
    ) -> Result<Response<Vec<u8>>, Report<TransportError>> {
        let uri = request.uri().clone();
        let failed = || TransportError::Communication {
            message: format!("Connection to {uri} failed"),
        };

        let response = self.agent.run(request).change_context(failed())?;
        let (parts, mut body) = response.into_parts();
        let bytes = body.read_to_vec().change_context(failed())?;

        Ok(Response::from_parts(parts, bytes))
    }
}

/// What the negotiator made of a response before JSON parsing.
#[derive(Debug, PartialEq, Eq)]
enum ResponseBody {
    /// 204, no body to interpret.
    NoContent,
    Plain(String),
    Jose(String),
}

/// Client for the Hyperwallet REST API.
pub struct ApiClient {
    server: Url,
    username: String,
    password: String,
    user_agent: String,
    transport: Box<dyn HttpTransport>,
    encryption: Option<Encryption>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("server", &self.server.as_str())
            .field("username", &self.username)
            .field("encryption", &self.encryption)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Builds a client with a [`UreqTransport`] from the `[api]` settings and,
    /// when present, an [`Encryption`] from the `[encryption]` settings.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Configuration`] if the server URL is invalid
    /// or the transport cannot be built.
    pub fn new(settings: &Settings) -> Result<Self, Report<TransportError>> {
        let transport = UreqTransport::new(&settings.api)?;
        Self::with_transport(settings, Box::new(transport))
    }

    /// Builds a client that sends through `transport`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Configuration`] if the server URL is invalid.
    pub fn with_transport(
        settings: &Settings,
        transport: Box<dyn HttpTransport>,
    ) -> Result<Self, Report<TransportError>> {
        let mut server =
            Url::parse(&settings.api.server).change_context(TransportError::Configuration {
                message: format!("Invalid server URL {}", settings.api.server),
            })?;
        // Url::join drops the last path segment unless it ends in a slash.
        if !server.path().ends_with('/') {
            let path = format!("{}/", server.path());
            server.set_path(&path);
        }

        Ok(Self {
            server,
            username: settings.api.username.clone(),
            password: settings.api.password.clone(),
            user_agent: settings.api.user_agent.clone(),
            transport,
            encryption: settings.encryption.as_ref().map(Encryption::from_settings),
        })
    }

    #[must_use]
    pub fn encryption(&self) -> Option<&Encryption> {
        self.encryption.as_ref()
    }

    fn protocol(&self) -> PayloadProtocol {
        if self.encryption.is_some() {
            PayloadProtocol::JoseJson
        } else {
            PayloadProtocol::Json
        }
    }

    /// Wraps an outgoing body for the wire: encrypted with
    /// `application/jose+json` when encryption is configured, unchanged with
    /// `application/json` otherwise.
    ///
    /// # Errors
    ///
    /// Any error from [`Encryption::encrypt`].
    pub fn maybe_encrypt_outgoing(
        &self,
        plaintext: &str,
    ) -> Result<TransportEnvelope, Report<TransportError>> {
        match &self.encryption {
            Some(encryption) => {
                let encrypted = encryption.encrypt(plaintext)?;
                Ok(TransportEnvelope::jose(encrypted.into_string()))
            }
            None => Ok(TransportEnvelope::json(plaintext)),
        }
    }

    /// Unwraps an incoming body according to its `Content-Type`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidContentType`] if the header is missing
    /// or names another media type, [`TransportError::Configuration`] for a
    /// JOSE body when encryption is not configured, and any error from
    /// [`Encryption::decrypt`].
    pub fn maybe_decrypt_incoming(
        &self,
        body: &str,
        content_type: Option<&str>,
    ) -> Result<String, Report<TransportError>> {
        let header = content_type.ok_or_else(|| {
            Report::new(TransportError::InvalidContentType).attach("no Content-Type header")
        })?;

        match PayloadProtocol::from_header(header)? {
            PayloadProtocol::Json => Ok(body.to_string()),
            PayloadProtocol::JoseJson => {
                let encryption = self.encryption.as_ref().ok_or_else(|| {
                    Report::new(TransportError::Configuration {
                        message: "Received an encrypted response but encryption is not configured"
                            .to_string(),
                    })
                })?;
                encryption.decrypt(body.trim())
            }
        }
    }

    /// Sends a request and returns the parsed JSON response.
    ///
    /// A 204 response yields `{}`. A body with an `errors` array yields
    /// [`TransportError::Api`] whatever the status code.
    ///
    /// # Errors
    ///
    /// Any [`TransportError`] from building, sending or interpreting the
    /// exchange.
    pub fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: &[(&str, &str)],
    ) -> Result<Value, Report<TransportError>> {
        let url = self.endpoint(path, query)?;
        let request = self.build_request(method, &url, body)?;

        log::debug!("{} {}", request.method(), url);
        let response = self.transport.execute(request).inspect_err(|e| {
            log::warn!("request to {url} failed: {}", e.current_context());
        })?;

        self.interpret(response).inspect_err(|e| {
            log::warn!(
                "response from {url} rejected: {} ({})",
                e.current_context(),
                e.current_context().code()
            );
        })
    }

    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, Report<TransportError>> {
        self.request(Method::GET, path, None, query)
    }

    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub fn post(&self, path: &str, body: &Value) -> Result<Value, Report<TransportError>> {
        self.request(Method::POST, path, Some(body), &[])
    }

    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub fn put(&self, path: &str, body: &Value) -> Result<Value, Report<TransportError>> {
        self.request(Method::PUT, path, Some(body), &[])
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, Report<TransportError>> {
        let mut url = self
            .server
            .join(path.trim_start_matches('/'))
            .change_context(TransportError::Configuration {
                message: format!("Invalid request path {path}"),
            })?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn build_request(
        &self,
        method: Method,
        url: &Url,
        body: Option<&Value>,
    ) -> Result<Request<Vec<u8>>, Report<TransportError>> {
        let envelope = match body {
            Some(value) => {
                let plaintext =
                    serde_json::to_string(value).change_context(TransportError::Encryption {
                        message: "Failed to serialize request body".to_string(),
                    })?;
                Some(self.maybe_encrypt_outgoing(&plaintext)?)
            }
            None => None,
        };

        let protocol = self.protocol();
        let credentials = general_purpose::STANDARD
            .encode(format!("{}:{}", self.username, self.password).as_bytes());

        Request::builder()
            .method(method)
            .uri(url.as_str())
            .header(AUTHORIZATION, format!("Basic {credentials}"))
            .header(USER_AGENT, self.user_agent.as_str())
            .header(ACCEPT, protocol.header_value())
            .header(CONTENT_TYPE, protocol.header_value())
            .body(envelope.map(|e| e.body.into_bytes()).unwrap_or_default())
            .change_context(TransportError::Configuration {
                message: format!("Failed to build request for {url}"),
            })
    }

    fn classify(response: &Response<Vec<u8>>) -> Result<ResponseBody, Report<TransportError>> {
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(ResponseBody::NoContent);
        }

        let Some(header) = response.headers().get(CONTENT_TYPE) else {
            if response.body().iter().all(u8::is_ascii_whitespace) {
                return Err(Report::new(TransportError::GarbageResponse {
                    message: "Invalid response".to_string(),
                })
                .attach(format!("empty body with status {}", response.status())));
            }
            return Err(
                Report::new(TransportError::InvalidContentType).attach("no Content-Type header")
            );
        };

        let header = header
            .to_str()
            .change_context(TransportError::InvalidContentType)?;
        let protocol = PayloadProtocol::from_header(header)?;
        log::debug!(
            "response status {} negotiated as {protocol}",
            response.status()
        );

        // Only a body with an accepted media type is decoded.
        let body = String::from_utf8(response.body().clone()).change_context(
            TransportError::GarbageResponse {
                message: "Invalid response".to_string(),
            },
        )?;

        Ok(match protocol {
            PayloadProtocol::Json => ResponseBody::Plain(body),
            PayloadProtocol::JoseJson => ResponseBody::Jose(body),
        })
    }

    fn interpret(&self, response: Response<Vec<u8>>) -> Result<Value, Report<TransportError>> {
        let text = match Self::classify(&response)? {
            ResponseBody::NoContent => return Ok(Value::Object(serde_json::Map::new())),
            ResponseBody::Plain(body) => body,
            ResponseBody::Jose(body) => self.maybe_decrypt_incoming(
                &body,
                Some(PayloadProtocol::JoseJson.media_type()),
            )?,
        };

        let value: Value =
            serde_json::from_str(&text).change_context(TransportError::GarbageResponse {
                message: "Invalid response".to_string(),
            })?;

        if let Some(entries) = value.get("errors").and_then(Value::as_array) {
            let errors: Vec<ApiErrorDetail> = entries.iter().map(api_error_detail).collect();
            return Err(Report::new(TransportError::Api { errors })
                .attach(format!("status {}", response.status())));
        }

        Ok(value)
    }
}

/// Reads one `errors` entry. Entries that are not error objects keep their
/// JSON text as the message so the array still surfaces as an API error.
fn api_error_detail(entry: &Value) -> ApiErrorDetail {
    serde_json::from_value(entry.clone()).unwrap_or_else(|_| {
        let message = entry
            .as_str()
            .map_or_else(|| entry.to_string(), str::to_string);
        ApiErrorDetail::new("", message)
    })
}
