//! Price source abstraction for market-data terminals.
//!
//! This module defines the [`PriceSource`] trait, the single interface the
//! rest of the workspace uses to obtain daily futures prices, whatever the
//! vendor behind it. Each concrete source handles its own wire format,
//! batching and throttling.
//!
//! Calls are blocking. The trait is object safe so the runtime can pick a
//! source from configuration (`Box<dyn PriceSource>`).
//!
//! # Example
//!
//! ```rust
//! use futures_ingestor::models::{price_series::PriceBatch, request_params::PriceRequest};
//! use futures_ingestor::providers::{PriceSource, ProviderError};
//!
//! struct MySource;
//!
//! impl PriceSource for MySource {
//!     fn name(&self) -> &str {
//!         "mine"
//!     }
//!
//!     fn fetch_prices(&self, _request: &PriceRequest) -> Result<PriceBatch, ProviderError> {
//!         Ok(PriceBatch::default())
//!     }
//! }
//! ```

pub mod offline;
pub mod rates;
pub mod terminal_rest;

use serde::{Deserialize, Serialize};
use shared_utils::env::MissingEnvVarError;
use snafu::{Backtrace, Snafu};

use crate::models::{
    contract::ContractCode,
    price_series::PriceBatch,
    reference::ContractDetails,
    request_params::PriceRequest,
};
use crate::providers::{
    offline::OfflineSource,
    terminal_rest::{TerminalRestSource, TerminalSettings},
};

/// Trait for fetching daily prices from a market-data source.
pub trait PriceSource {
    /// Short name used in logs (e.g. "terminal", "offline").
    fn name(&self) -> &str;

    /// Fetches daily prices for the given request.
    ///
    /// # Returns
    ///
    /// * `Ok(PriceBatch)` - one series per requested contract that the source
    ///   knows. Days without a quote are absent, never zero-filled, and a
    ///   contract without any quote in range may be missing or empty. Contracts
    ///   the source refused are listed in [`PriceBatch::rejected`] with its
    ///   message, so one bad contract does not sink the rest.
    /// * `Err(ProviderError)` - nothing usable came back. Check
    ///   [`ProviderError::is_unavailable`] to tell connection failures apart.
    fn fetch_prices(&self, request: &PriceRequest) -> Result<PriceBatch, ProviderError>;

    /// Fetches reference data (name, units, last tradeable date).
    ///
    /// Sources without reference data return nothing.
    fn fetch_details(
        &self,
        _contracts: &[ContractCode],
        _yellow_key: &str,
    ) -> Result<Vec<ContractDetails>, ProviderError> {
        Ok(Vec::new())
    }
}

impl<T: PriceSource + ?Sized> PriceSource for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch_prices(&self, request: &PriceRequest) -> Result<PriceBatch, ProviderError> {
        (**self).fetch_prices(request)
    }

    fn fetch_details(
        &self,
        contracts: &[ContractCode],
        yellow_key: &str,
    ) -> Result<Vec<ContractDetails>, ProviderError> {
        (**self).fetch_details(contracts, yellow_key)
    }
}

/// The `[source]` table: which price source a run talks to.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceSettings {
    Terminal(TerminalSettings),
    #[default]
    Offline,
}

impl SourceSettings {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            SourceSettings::Terminal(settings) => settings.validate(),
            SourceSettings::Offline => Ok(()),
        }
    }
}

/// Builds the configured source.
pub fn build_source(settings: &SourceSettings) -> Result<Box<dyn PriceSource>, ProviderInitError> {
    Ok(match settings {
        SourceSettings::Terminal(settings) => Box::new(TerminalRestSource::new(settings.clone())?),
        SourceSettings::Offline => Box::new(OfflineSource),
    })
}

/// Errors that can occur during the creation of a source instance
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// missed environment variable.
    #[snafu(display("Missing environment variable: {source}"))]
    MissingEnvVar {
        source: MissingEnvVarError,
        backtrace: Backtrace,
    },

    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// API key contains invalid characters.
    #[snafu(display("Invalid API key format: {source}"))]
    InvalidApiKey {
        source: reqwest::header::InvalidHeaderValue,
        backtrace: Backtrace,
    },

    /// Source settings are unusable (bad URL, zero batch size, ...).
    #[snafu(display("Invalid source settings: {message}"))]
    Settings {
        message: String,
        backtrace: Backtrace,
    },
}

/// Errors that can occur within a `PriceSource` implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// The source could not be reached at all (connect failure, timeout).
    #[snafu(display("Price source unavailable: {source}"))]
    Unavailable {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The gateway is up but its terminal session is not (HTTP 502/503).
    #[snafu(display("Price source disconnected: {message}"))]
    Disconnected {
        message: String,
        backtrace: Backtrace,
    },

    /// The request reached the source but failed in transport or decoding.
    #[snafu(display("API request failed: {source}"))]
    Reqwest {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The source answered with an error status or message.
    #[snafu(display("API error: {message}"))]
    Api {
        message: String,
        backtrace: Backtrace,
    },

    /// The request parameters were invalid for this specific source.
    #[snafu(display("Invalid parameters for provider: {message}"))]
    Validation {
        message: String,
        backtrace: Backtrace,
    },

    /// An error during source configuration or initialization.
    #[snafu(display("Provider initialization error: {source}"))]
    Init {
        #[snafu(backtrace)]
        source: ProviderInitError,
    },
}

impl ProviderError {
    /// True when the source could not be reached; such failures abort a whole run.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            ProviderError::Unavailable { .. } | ProviderError::Disconnected { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::models::price_series::{PricePoint, PriceSeries};

    use super::*;

    struct SnapshotSource;
    struct EmptySource;

    impl PriceSource for SnapshotSource {
        fn name(&self) -> &str {
            "snapshot"
        }

        fn fetch_prices(&self, request: &PriceRequest) -> Result<PriceBatch, ProviderError> {
            let series: Vec<_> = request
                .contracts
                .iter()
                .map(|c| {
                    PriceSeries::from_points(
                        c.to_string(),
                        [PricePoint {
                            date: request.start,
                            price: 1.0,
                        }],
                    )
                })
                .collect();
            Ok(series.into())
        }
    }

    impl PriceSource for EmptySource {
        fn name(&self) -> &str {
            "empty"
        }

        fn fetch_prices(&self, _request: &PriceRequest) -> Result<PriceBatch, ProviderError> {
            Ok(PriceBatch::default())
        }
    }

    // Decided at runtime, hence the trait object.
    fn get_source(name: &str) -> Box<dyn PriceSource> {
        if name == "snapshot" {
            Box::new(SnapshotSource)
        } else {
            Box::new(EmptySource)
        }
    }

    #[test]
    fn test_dynamic_source() {
        let day = NaiveDate::from_ymd_opt(2023, 1, 10).unwrap();
        let request = PriceRequest::new(vec!["CLG23".parse::<ContractCode>().unwrap()], day, day);

        let source = get_source("snapshot");
        let series = source.fetch_prices(&request).unwrap().series;
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].contract, "CLG23");
        assert_eq!(series[0].get(day), Some(1.0));

        let boxed: Box<dyn PriceSource> = get_source("other");
        assert_eq!(boxed.name(), "empty");
        assert_eq!(boxed.fetch_prices(&request).unwrap(), PriceBatch::default());
        assert!(boxed.fetch_details(&request.contracts, "Comdty").unwrap().is_empty());
    }

    #[test]
    fn source_kind_selects_implementation() {
        let settings: SourceSettings = toml::from_str(
            r#"
kind = "terminal"
base_url = "http://localhost:8194"
batch_size = 25
"#,
        )
        .unwrap();
        match &settings {
            SourceSettings::Terminal(t) => assert_eq!(t.batch_size, 25),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(build_source(&settings).unwrap().name(), "terminal");

        let offline: SourceSettings = toml::from_str(r#"kind = "offline""#).unwrap();
        assert_eq!(build_source(&offline).unwrap().name(), "offline");
    }

    #[test]
    fn disconnected_session_counts_as_unavailable() {
        let err = DisconnectedSnafu {
            message: "session lost",
        }
        .build();
        assert!(err.is_unavailable());
    }

    #[test]
    fn api_errors_are_not_connection_failures() {
        let err = ApiSnafu {
            message: "bad security",
        }
        .build();
        assert!(!err.is_unavailable());
        assert!(err.to_string().contains("bad security"));
    }
}
