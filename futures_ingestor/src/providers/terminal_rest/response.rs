use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::models::{
    contract::ContractCode,
    reference::{ContractDetails, LAST_TRADE_FIELD, NAME_FIELD, UNITS_FIELD},
};

/// One day of field values for one security.
#[derive(Deserialize, Debug)]
pub struct HistoryRow {
    pub date: NaiveDate,
    /// Requested fields by name; values may be null or non-numeric.
    #[serde(flatten)]
    pub fields: IndexMap<String, Value>,
}

impl HistoryRow {
    pub fn value(&self, field: &str) -> Option<f64> {
        self.fields.get(field).and_then(Value::as_f64)
    }
}

#[derive(Deserialize, Debug)]
pub struct HistoryResponse {
    /// Rows keyed by ticker, in the order the gateway returned them.
    #[serde(default)]
    pub data: IndexMap<String, Vec<HistoryRow>>,
    /// Per-security errors (unknown ticker, no entitlement, ...).
    #[serde(default)]
    pub errors: IndexMap<String, String>,
}

/// Reference-data answer: one field map per ticker.
#[derive(Deserialize, Debug)]
pub struct ReferenceResponse {
    #[serde(default)]
    pub data: IndexMap<String, IndexMap<String, Value>>,
    #[serde(default)]
    pub errors: IndexMap<String, String>,
}

impl ReferenceResponse {
    /// Details for `contract`, if the gateway answered for `ticker`.
    pub fn details(&self, contract: &ContractCode, ticker: &str) -> Option<ContractDetails> {
        let fields = self.data.get(ticker)?;
        let text = |name: &str| {
            fields
                .get(name)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Some(ContractDetails {
            contract: contract.clone(),
            name: text(NAME_FIELD),
            units: text(UNITS_FIELD),
            last_trade: text(LAST_TRADE_FIELD).as_deref().and_then(parse_terminal_date),
        })
    }
}

// The gateway passes dates through as ISO or compact YYYYMMDD.
fn parse_terminal_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y%m%d"))
        .ok()
}
