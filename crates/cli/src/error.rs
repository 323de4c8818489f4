//! CLI error types.

use std::fmt;

use error_stack::Report;
use hyperwallet_common::error::TransportError;

#[derive(Debug)]
pub enum CliError {
    /// Configuration file error
    Config(String),
    /// IO error
    Io(std::io::Error),
    /// Input that is not a JOSE compact serialization
    Input(String),
    /// Failure inside the encryption pipeline
    Transport(Report<TransportError>),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Io(err) => write!(f, "IO error: {}", err),
            CliError::Input(msg) => write!(f, "Invalid input: {}", msg),
            CliError::Transport(report) => {
                let context = report.current_context();
                write!(f, "{} [{}]", context, context.code())
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io(err)
    }
}

impl From<Report<TransportError>> for CliError {
    fn from(report: Report<TransportError>) -> Self {
        match report.current_context() {
            TransportError::Configuration { message } => CliError::Config(message.clone()),
            _ => CliError::Transport(report),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_cli_error_display() {
        assert_eq!(
            format!("{}", CliError::Config("test".into())),
            "Configuration error: test"
        );
        assert_eq!(
            format!("{}", CliError::Input("test".into())),
            "Invalid input: test"
        );
        assert_eq!(
            format!(
                "{}",
                CliError::Transport(Report::new(TransportError::SignatureExpired))
            ),
            "JWS signature has expired, checked by [exp] JWS header [SIGNATURE_EXPIRED]"
        );
    }

    #[test]
    fn test_cli_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let cli_err: CliError = io_err.into();
        match cli_err {
            CliError::Io(_) => {}
            _ => panic!("Expected Io variant"),
        }
    }

    #[test]
    fn test_cli_error_from_configuration_report() {
        let report = Report::new(TransportError::Configuration {
            message: "bad server".into(),
        });
        match CliError::from(report) {
            CliError::Config(msg) => assert_eq!(msg, "bad server"),
            other => panic!("Expected Config variant, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_error_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let cli_err: CliError = io_err.into();
        assert!(cli_err.source().is_some());

        let config_err = CliError::Config("test".into());
        assert!(config_err.source().is_none());
    }
}
