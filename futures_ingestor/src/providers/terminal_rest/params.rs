use serde::{Deserialize, Serialize};

use crate::models::{
    reference::DETAIL_FIELDS,
    request_params::{DEFAULT_PRICE_FIELD, DEFAULT_VOLUME_FIELD, PriceRequest},
};
use crate::providers::{ProviderError, ValidationSnafu};

/// Securities per request; the terminal's historical request handles 50 comfortably.
pub const DEFAULT_BATCH_SIZE: usize = 50;
const DEFAULT_REQUESTS_PER_SECOND: u32 = 5;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Upper bound on securities per request accepted by the gateway.
pub const MAX_BATCH_SIZE: usize = 500;

/// Connection settings for the terminal gateway (the `[source]` table).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TerminalSettings {
    /// Gateway root, e.g. `http://localhost:8194`.
    pub base_url: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Name of the environment variable holding the API key, if the gateway wants one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Price field requested for every contract.
    #[serde(default = "default_field")]
    pub field: String,
    /// Volume field requested next to the price; empty disables volumes.
    #[serde(default = "default_volume_field")]
    pub volume_field: String,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_requests_per_second() -> u32 {
    DEFAULT_REQUESTS_PER_SECOND
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_field() -> String {
    DEFAULT_PRICE_FIELD.to_string()
}

fn default_volume_field() -> String {
    DEFAULT_VOLUME_FIELD.to_string()
}

impl TerminalSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            api_key_env: None,
            field: default_field(),
            volume_field: default_volume_field(),
        }
    }

    /// The volume field, unless volumes are switched off.
    pub fn volume_field(&self) -> Option<&str> {
        Some(self.volume_field.trim()).filter(|v| !v.is_empty())
    }

    /// Checks the settings without touching the network.
    pub fn validate(&self) -> Result<(), String> {
        let url = self.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(format!("base_url must be an http(s) URL, got '{url}'"));
        }
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(format!(
                "batch_size must be within 1..={MAX_BATCH_SIZE}, got {}",
                self.batch_size
            ));
        }
        if self.requests_per_second == 0 {
            return Err("requests_per_second must be > 0".into());
        }
        if self.timeout_secs == 0 {
            return Err("timeout_secs must be > 0".into());
        }
        if self.field.trim().is_empty() {
            return Err("field cannot be empty".into());
        }
        if self.volume_field() == Some(self.field.trim()) {
            return Err(format!("volume_field repeats the price field '{}'", self.field));
        }
        Ok(())
    }

    pub fn history_url(&self) -> String {
        format!("{}/v1/history", self.root())
    }

    pub fn reference_url(&self) -> String {
        format!("{}/v1/reference", self.root())
    }

    fn root(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }
}

/// Query pairs for one batch of tickers.
pub fn construct_query(request: &PriceRequest, tickers: &[String]) -> Vec<(String, String)> {
    vec![
        ("securities".to_string(), tickers.join(",")),
        ("fields".to_string(), request.fields().join(",")),
        (
            "start_date".to_string(),
            request.start.format("%Y%m%d").to_string(),
        ),
        (
            "end_date".to_string(),
            request.end.format("%Y%m%d").to_string(),
        ),
    ]
}

/// Query pairs for one batch of reference-data tickers.
pub fn construct_reference_query(tickers: &[String]) -> Vec<(String, String)> {
    vec![
        ("securities".to_string(), tickers.join(",")),
        ("fields".to_string(), DETAIL_FIELDS.join(",")),
    ]
}

pub fn validate_request(request: &PriceRequest) -> Result<(), ProviderError> {
    request
        .validate()
        .map_err(|message| ValidationSnafu { message }.build())
}
