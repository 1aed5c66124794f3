use snafu::{Backtrace, Snafu};

use crate::models::price_series::PriceSeries;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SinkError {
    /// An error occurred while trying to write the data.
    #[snafu(display("Failed to write {path}: {source}"))]
    Write {
        path: String,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// A stored file exists but could not be decoded.
    #[snafu(display("Corrupt stored series {path}: {source}"))]
    Decode {
        path: String,
        source: serde_json::Error,
        backtrace: Backtrace,
    },

    /// A series does not belong in this sink (e.g. malformed contract code).
    #[snafu(display("Rejected series: {message}"))]
    Rejected {
        message: String,
        backtrace: Backtrace,
    },

    /// A generic I/O error.
    #[snafu(display("I/O error: {source}"))]
    Io {
        source: std::io::Error,
        backtrace: Backtrace,
    },
}

pub trait PriceSink {
    /// The type of output returned after a successful write operation.
    ///
    /// A file sink returns the paths it touched; a counting sink might return
    /// the number of new points.
    type Output;

    /// Merges the given series into the destination. Existing dates are kept.
    fn write(&self, data: &[PriceSeries]) -> Result<Self::Output, SinkError>;
}
