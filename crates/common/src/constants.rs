use http::header::HeaderValue;

pub const MEDIA_TYPE_JSON: &str = "application/json";
pub const MEDIA_TYPE_JOSE_JSON: &str = "application/jose+json";

pub const CONTENT_TYPE_JSON: HeaderValue = HeaderValue::from_static(MEDIA_TYPE_JSON);
pub const CONTENT_TYPE_JOSE_JSON: HeaderValue = HeaderValue::from_static(MEDIA_TYPE_JOSE_JSON);

pub const DEFAULT_SIGN_ALGORITHM: &str = "RS256";
pub const DEFAULT_ENCRYPTION_ALGORITHM: &str = "RSA-OAEP-256";
pub const DEFAULT_ENCRYPTION_METHOD: &str = "A256CBC-HS512";
pub const DEFAULT_JWS_EXPIRATION_MINUTES: u64 = 5;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_USER_AGENT: &str = concat!("hyperwallet-rust/", env!("CARGO_PKG_VERSION"));

pub const ENV_PREFIX: &str = "HYPERWALLET";
