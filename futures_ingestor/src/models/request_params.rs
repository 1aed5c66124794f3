use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::contract::ContractCode;

/// Default terminal field for daily settlement prices.
pub const DEFAULT_PRICE_FIELD: &str = "PX_LAST";

/// Default terminal field for daily traded volume.
pub const DEFAULT_VOLUME_FIELD: &str = "PX_VOLUME";

/// Default market-sector suffix for commodity futures tickers.
pub const DEFAULT_YELLOW_KEY: &str = "Comdty";

/// Vendor-agnostic parameters for requesting daily prices.
///
/// It is the standard input for all [`PriceSource`](crate::providers::PriceSource)
/// implementations. Batching and request limits are the provider's business.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceRequest {
    /// Contracts to request (e.g. `CLG23`, `CLH23`).
    pub contracts: Vec<ContractCode>,

    /// First trading day of the range (inclusive).
    pub start: NaiveDate,

    /// Last trading day of the range (inclusive).
    pub end: NaiveDate,

    /// Price field to read, e.g. `PX_LAST` for the settlement.
    #[serde(default = "default_field")]
    pub field: String,

    /// Market-sector suffix appended to each contract code to form the ticker.
    #[serde(default = "default_yellow_key")]
    pub yellow_key: String,

    /// Volume field read alongside the price; `None` skips volumes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_field: Option<String>,
}

fn default_field() -> String {
    DEFAULT_PRICE_FIELD.to_string()
}

fn default_yellow_key() -> String {
    DEFAULT_YELLOW_KEY.to_string()
}

impl PriceRequest {
    pub fn new(contracts: Vec<ContractCode>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            contracts,
            start,
            end,
            field: default_field(),
            yellow_key: default_yellow_key(),
            volume_field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    pub fn with_yellow_key(mut self, yellow_key: impl Into<String>) -> Self {
        self.yellow_key = yellow_key.into();
        self
    }

    pub fn with_volume_field(mut self, field: Option<&str>) -> Self {
        self.volume_field = field.map(str::to_string);
        self
    }

    /// Fields to request: the price field, then the volume field if any.
    pub fn fields(&self) -> Vec<&str> {
        std::iter::once(self.field.as_str())
            .chain(self.volume_field.as_deref())
            .collect()
    }

    /// Terminal tickers for every requested contract, in request order.
    pub fn tickers(&self) -> Vec<String> {
        self.contracts
            .iter()
            .map(|c| c.ticker(&self.yellow_key))
            .collect()
    }

    /// Rejects empty contract lists and inverted ranges.
    pub fn validate(&self) -> Result<(), String> {
        if self.contracts.is_empty() {
            return Err("price request names no contracts".into());
        }
        if self.start > self.end {
            return Err(format!(
                "price request start {} is after end {}",
                self.start, self.end
            ));
        }
        if self.field.trim().is_empty() {
            return Err("price request field is empty".into());
        }
        match self.volume_field.as_deref().map(str::trim) {
            Some("") => return Err("price request volume field is empty".into()),
            Some(v) if v == self.field => {
                return Err(format!("price request reads {v} as both price and volume"));
            }
            _ => {}
        }
        Ok(())
    }
}
