use std::{fs, io::Read};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{
    contract::{ContractCode, ContractCodeError},
    request_params::PriceRequest,
};

#[derive(Debug, Error)]
pub enum ParamError {
    #[error("invalid contract '{input}': {source}")]
    Contract {
        input: String,
        #[source]
        source: ContractCodeError,
    },

    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    Date(String),

    #[error("invalid request: {0}")]
    Request(String),

    #[error("failed to parse batch JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read batch input: {0}")]
    Io(#[from] std::io::Error),
}

/// One entry of a batch file.
#[derive(Debug, Serialize, Deserialize)]
pub struct BatchParamItem {
    /// Comma-separated contract codes.
    pub contracts: String,
    pub start: String,
    pub end: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

pub fn parse_contracts(list: &str) -> Result<Vec<ContractCode>, ParamError> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse().map_err(|source| ParamError::Contract {
                input: s.to_string(),
                source,
            })
        })
        .collect()
}

pub fn parse_date(s: &str) -> Result<NaiveDate, ParamError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| ParamError::Date(s.to_string()))
}

/// Builds a validated request. `field` falls back to `default_field`.
pub fn build_request(
    contracts: &str,
    start: &str,
    end: &str,
    field: Option<&str>,
    default_field: &str,
) -> Result<PriceRequest, ParamError> {
    let request = PriceRequest::new(parse_contracts(contracts)?, parse_date(start)?, parse_date(end)?)
        .with_field(field.unwrap_or(default_field));
    request.validate().map_err(ParamError::Request)?;
    Ok(request)
}

pub fn parse_batch_params_from_json_string(
    json_str: &str,
    default_field: &str,
) -> Result<Vec<PriceRequest>, ParamError> {
    let items: Vec<BatchParamItem> = serde_json::from_str(json_str)?;
    items
        .iter()
        .map(|item| {
            build_request(
                &item.contracts,
                &item.start,
                &item.end,
                item.field.as_deref(),
                default_field,
            )
        })
        .collect()
}

pub fn parse_batch_params_from_file(
    file_path: &str,
    default_field: &str,
) -> Result<Vec<PriceRequest>, ParamError> {
    let content = fs::read_to_string(file_path)?;
    parse_batch_params_from_json_string(&content, default_field)
}

pub fn parse_batch_params_from_stdin(default_field: &str) -> Result<Vec<PriceRequest>, ParamError> {
    let mut buffer = String::new();
    std::io::stdin().read_to_string(&mut buffer)?;
    parse_batch_params_from_json_string(&buffer, default_field)
}
