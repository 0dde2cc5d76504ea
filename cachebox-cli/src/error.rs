//! CLI error types.

use std::fmt;

use cachebox::config::ConfigError;
use cachebox::crypto::CryptoError;
use cachebox::logging::LoggingError;
use cachebox::store::CatalogError;
use cachebox::CacheBoxError;

/// Errors surfaced by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Failed to load the configuration file.
    Config(ConfigError),

    /// Failed to install logging.
    Logging(LoggingError),

    /// Failed to load the asset catalog.
    Catalog(CatalogError),

    /// The session could not reach its cache box.
    Session(CacheBoxError),

    /// A class named on the command line is not in the catalog.
    UnknownClass(String),

    /// Encryption or decryption failed.
    Crypto(CryptoError),

    /// Failed to create the Tokio runtime.
    RuntimeCreation(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Logging(e) => write!(f, "Failed to initialise logging: {}", e),
            CliError::Catalog(e) => write!(f, "Failed to load catalog: {}", e),
            CliError::Session(e) => write!(f, "Session error: {}", e),
            CliError::UnknownClass(name) => write!(f, "Unknown class: {}", name),
            CliError::Crypto(e) => write!(f, "Crypto error: {}", e),
            CliError::RuntimeCreation(msg) => {
                write!(f, "Failed to create Tokio runtime: {}", msg)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Logging(e) => Some(e),
            CliError::Catalog(e) => Some(e),
            CliError::Session(e) => Some(e),
            CliError::Crypto(e) => Some(e),
            CliError::UnknownClass(_) | CliError::RuntimeCreation(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<CatalogError> for CliError {
    fn from(e: CatalogError) -> Self {
        CliError::Catalog(e)
    }
}

impl From<CacheBoxError> for CliError {
    fn from(e: CacheBoxError) -> Self {
        CliError::Session(e)
    }
}

impl From<CryptoError> for CliError {
    fn from(e: CryptoError) -> Self {
        CliError::Crypto(e)
    }
}
