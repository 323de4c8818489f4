//! `inspect` command: decode a JOSE header without verifying anything.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use hyperwallet_common::error::TransportError;
use hyperwallet_common::signing;
use serde_json::{json, Map, Value};

use crate::error::CliError;
use crate::jose::read_input;
use crate::OutputFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    Jws,
    Jwe,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Jws => write!(f, "JWS"),
            Kind::Jwe => write!(f, "JWE"),
        }
    }
}

/// State of the `exp` header claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Expiration {
    Missing,
    NotInteger,
    Expired(DateTime<Utc>),
    ValidUntil(DateTime<Utc>),
    /// JWE headers carry no `exp`; it lives in the encrypted JWS.
    Encrypted,
}

impl fmt::Display for Expiration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expiration::Missing => write!(f, "missing"),
            Expiration::NotInteger => write!(f, "not an integer"),
            Expiration::Expired(at) => write!(f, "expired at {}", at.to_rfc3339()),
            Expiration::ValidUntil(at) => write!(f, "valid until {}", at.to_rfc3339()),
            Expiration::Encrypted => write!(f, "not visible, payload is encrypted"),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Inspection {
    pub kind: Kind,
    pub header: Map<String, Value>,
    pub expiration: Expiration,
}

impl Inspection {
    fn to_json(&self) -> Value {
        json!({
            "kind": self.kind.to_string(),
            "header": self.header,
            "exp": self.expiration.to_string(),
        })
    }
}

fn exp_time(header: &Map<String, Value>) -> Option<DateTime<Utc>> {
    header
        .get("exp")
        .and_then(Value::as_i64)
        .and_then(|exp| DateTime::from_timestamp(exp, 0))
}

pub(crate) fn inspect_compact(compact: &str) -> Result<Inspection, CliError> {
    let compact = compact.trim();
    let kind = match compact.split('.').count() {
        3 => Kind::Jws,
        5 => Kind::Jwe,
        n => {
            return Err(CliError::Input(format!(
                "expected 3 (JWS) or 5 (JWE) segments, found {n}"
            )))
        }
    };

    let header = signing::protected_header(compact)
        .map_err(|_| CliError::Input("protected header is not base64url JSON".into()))?;

    let expiration = match kind {
        Kind::Jwe => Expiration::Encrypted,
        Kind::Jws => match signing::check_expiration(compact) {
            Ok(()) => exp_time(&header).map_or(Expiration::NotInteger, Expiration::ValidUntil),
            Err(report) => match report.current_context() {
                TransportError::MissingExpiration => Expiration::Missing,
                TransportError::SignatureExpired => {
                    exp_time(&header).map_or(Expiration::NotInteger, Expiration::Expired)
                }
                _ => Expiration::NotInteger,
            },
        },
    };

    Ok(Inspection {
        kind,
        header,
        expiration,
    })
}

/// Print the decoded protected header of a JWS or JWE.
pub fn inspect(input: Option<&Path>, format: &OutputFormat) -> Result<(), CliError> {
    let inspection = inspect_compact(&read_input(input)?)?;

    match format {
        OutputFormat::Text => {
            println!("Type: {}", inspection.kind);
            for (name, value) in &inspection.header {
                println!("  {name}: {value}");
            }
            println!("Expiration: {}", inspection.expiration);
        }
        OutputFormat::Json => {
            let output = serde_json::to_string_pretty(&inspection.to_json())
                .map_err(|e| CliError::Input(format!("Failed to render header: {e}")))?;
            println!("{output}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::test_fixtures::{create_test_config, fixture_key};
    use crate::config::load_settings;
    use crate::jose::encrypt_text;
    use tempfile::TempDir;

    #[test]
    fn test_inspect_signed_payload() {
        let key = fixture_key("private-jwkset1", "RS256");
        let signed = signing::sign(b"payload", &key, Duration::from_secs(300)).unwrap();

        let inspection = inspect_compact(signed.as_str()).unwrap();
        assert_eq!(inspection.kind, Kind::Jws);
        assert_eq!(inspection.header["alg"], "RS256");
        assert_eq!(inspection.header["kid"], "2018_sig_rsa_RS256_2048_1");
        assert!(matches!(inspection.expiration, Expiration::ValidUntil(_)));
    }

    #[test]
    fn test_inspect_encrypted_payload() {
        let dir = TempDir::new().unwrap();
        let settings = load_settings(&create_test_config(&dir)).unwrap();
        let encrypted = encrypt_text(&settings, "hello").unwrap();

        let inspection = inspect_compact(&encrypted).unwrap();
        assert_eq!(inspection.kind, Kind::Jwe);
        assert_eq!(inspection.header["enc"], "A256CBC-HS512");
        assert_eq!(inspection.expiration, Expiration::Encrypted);
        assert_eq!(
            inspection.to_json()["exp"],
            "not visible, payload is encrypted"
        );
    }

    #[test]
    fn test_inspect_header_without_exp() {
        // {"alg":"none"}.payload.sig
        let inspection = inspect_compact("eyJhbGciOiJub25lIn0.cGF5bG9hZA.c2ln").unwrap();
        assert_eq!(inspection.expiration, Expiration::Missing);
    }

    #[test]
    fn test_inspect_expired_and_string_exp() {
        // {"alg":"RS256","exp":1}
        let expired = inspect_compact("eyJhbGciOiJSUzI1NiIsImV4cCI6MX0.e30.c2ln").unwrap();
        assert!(matches!(expired.expiration, Expiration::Expired(_)));

        // {"alg":"RS256","exp":"soon"}
        let string_exp =
            inspect_compact("eyJhbGciOiJSUzI1NiIsImV4cCI6InNvb24ifQ.e30.c2ln").unwrap();
        assert_eq!(string_exp.expiration, Expiration::NotInteger);
    }

    #[test]
    fn test_inspect_rejects_wrong_segment_count() {
        assert!(matches!(
            inspect_compact("just-one-segment"),
            Err(CliError::Input(_))
        ));
    }
}
