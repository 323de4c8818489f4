use error_stack::{Report, ResultExt};
use log::LevelFilter;

use crate::error::TransportError;

/// Installs a `fern` logger writing to stderr.
///
/// Should be called once at start-up. Lines look like
/// `2024-01-01T00:00:00.000Z  INFO loaded 2 JWK(s) from ...`.
///
/// # Errors
///
/// Returns [`TransportError::Configuration`] if a global logger is already set.
pub fn init_logging(level: LevelFilter) -> Result<(), Report<TransportError>> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}  {} {}",
                chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                record.level(),
                message
            ));
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
        .change_context(TransportError::Configuration {
            message: "Failed to initialize logger".to_string(),
        })
}
