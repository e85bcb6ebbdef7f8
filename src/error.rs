// src/error.rs

//! Error types for productid

use thiserror::Error;

/// Errors raised while reconciling product certificates
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Certificate error: {0}")]
    CertificateError(String),

    #[error("Product database error: {0}")]
    DatabaseError(String),

    #[error("Package backend error: {0}")]
    BackendError(String),

    #[error("Repository metadata error: {0}")]
    MetadataError(String),

    #[error("Plugin hook error: {0}")]
    HookError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Certificate for product {0} has no backing file")]
    NotPersisted(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::DatabaseError(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::ConfigError(e.to_string())
    }
}

impl From<crate::compression::CompressionError> for Error {
    fn from(e: crate::compression::CompressionError) -> Self {
        Error::MetadataError(e.to_string())
    }
}

/// Result type alias for productid operations
pub type Result<T> = std::result::Result<T, Error>;
