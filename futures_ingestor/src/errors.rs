use thiserror::Error;

use crate::{io::sink::SinkError, providers::ProviderError};

/// The unified error type for the `futures_ingestor` crate.
#[derive(Debug, Error)]
pub enum Error {
    /// An error originating from a price source (connection, API error, validation).
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// An error originating from a price sink (file I/O, encoding).
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// An error related to configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A generic I/O error.
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}
