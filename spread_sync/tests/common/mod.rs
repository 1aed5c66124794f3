#![allow(dead_code)]

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use chrono::NaiveDate;
use futures_ingestor::{
    models::{
        contract::ContractCode,
        price_series::{PriceBatch, PricePoint, PriceSeries},
        reference::ContractDetails,
        request_params::PriceRequest,
    },
    providers::{ApiSnafu, DisconnectedSnafu, PriceSource, ProviderError},
};

pub fn d(m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, m, day).unwrap()
}

/// CL with a 30-day gap between the G and H expiries, one (1, 2) spread and a
/// file rate source at `rates/usd.json`.
pub const CL_CONFIG: &str = r#"
[settings]
data_root = "."
days_per_year = 365

[source]
kind = "offline"

[rates.usd]
kind = "file"
path = "rates/usd.json"

[commodities.CL]
name = "WTI Crude Oil"
rate_source = "usd"
spreads = [{ near = 1, far = 2 }]

[[commodities.CL.contracts]]
month = "G"
year = 2023
last_trade = "2023-01-20"
roll = "2023-01-17"

[[commodities.CL.contracts]]
month = "H"
year = 2023
last_trade = "2023-02-19"
roll = "2023-02-14"

[[commodities.CL.contracts]]
month = "J"
year = 2023
last_trade = "2023-03-21"
roll = "2023-03-14"

[[commodities.CL.contracts]]
month = "K"
year = 2023
last_trade = "2023-04-20"
roll = "2023-04-14"
"#;

/// Writes `CL_CONFIG` and a rate file into `dir`; returns the config path.
pub fn write_fixture(dir: &Path, rates: &[(NaiveDate, f64)]) -> PathBuf {
    let path = dir.join("spreads.toml");
    fs::write(&path, CL_CONFIG).unwrap();
    write_rates(dir, rates);
    path
}

pub fn write_rates(dir: &Path, rates: &[(NaiveDate, f64)]) {
    let map: BTreeMap<NaiveDate, f64> = rates.iter().copied().collect();
    fs::create_dir_all(dir.join("rates")).unwrap();
    fs::write(dir.join("rates/usd.json"), serde_json::to_string(&map).unwrap()).unwrap();
}

/// Serves fixed prices and last trade dates, and remembers every request.
#[derive(Default)]
pub struct ScriptedSource {
    prices: BTreeMap<String, Vec<(NaiveDate, f64)>>,
    last_trades: BTreeMap<String, NaiveDate>,
    rejected: BTreeMap<String, String>,
    pub calls: Mutex<Vec<PriceRequest>>,
    pub detail_calls: Mutex<Vec<Vec<ContractCode>>>,
}

impl ScriptedSource {
    pub fn with(mut self, code: &str, quotes: &[(NaiveDate, f64)]) -> Self {
        self.prices.insert(code.to_string(), quotes.to_vec());
        self
    }

    /// Refuses `code` inside otherwise successful requests.
    pub fn with_rejection(mut self, code: &str, message: &str) -> Self {
        self.rejected.insert(code.to_string(), message.to_string());
        self
    }

    pub fn with_last_trade(mut self, code: &str, last_trade: NaiveDate) -> Self {
        self.last_trades.insert(code.to_string(), last_trade);
        self
    }

    pub fn detail_calls(&self) -> Vec<Vec<ContractCode>> {
        self.detail_calls.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<PriceRequest> {
        self.calls.lock().unwrap().clone()
    }
}

impl PriceSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn fetch_prices(&self, request: &PriceRequest) -> Result<PriceBatch, ProviderError> {
        self.calls.lock().unwrap().push(request.clone());
        let rejected = request
            .contracts
            .iter()
            .filter_map(|c| Some((c.clone(), self.rejected.get(&c.to_string())?.clone())))
            .collect();
        let series = request
            .contracts
            .iter()
            .filter(|c| !self.rejected.contains_key(&c.to_string()))
            .filter_map(|c| {
                let quotes = self.prices.get(&c.to_string())?;
                let points = quotes
                    .iter()
                    .filter(|(day, _)| *day >= request.start && *day <= request.end)
                    .map(|(date, price)| PricePoint {
                        date: *date,
                        price: *price,
                    });
                Some(PriceSeries::from_points(c.to_string(), points))
            })
            .collect();
        Ok(PriceBatch { series, rejected })
    }

    fn fetch_details(
        &self,
        contracts: &[ContractCode],
        _yellow_key: &str,
    ) -> Result<Vec<ContractDetails>, ProviderError> {
        self.detail_calls.lock().unwrap().push(contracts.to_vec());
        Ok(contracts
            .iter()
            .filter_map(|c| {
                let lt = self.last_trades.get(&c.to_string())?;
                Some(ContractDetails::new(c.clone()).with_last_trade(*lt))
            })
            .collect())
    }
}

/// Answers like `inner`, except that any request naming `refused` fails
/// with an API error.
pub struct RejectingSource {
    pub inner: ScriptedSource,
    pub refused: &'static str,
    pub message: &'static str,
}

impl PriceSource for RejectingSource {
    fn name(&self) -> &str {
        "rejecting"
    }

    fn fetch_prices(&self, request: &PriceRequest) -> Result<PriceBatch, ProviderError> {
        if request.contracts.iter().any(|c| c.to_string() == self.refused) {
            self.inner.calls.lock().unwrap().push(request.clone());
            return ApiSnafu {
                message: self.message,
            }
            .fail();
        }
        self.inner.fetch_prices(request)
    }
}

/// Always reports a lost terminal session.
pub struct DownSource;

impl PriceSource for DownSource {
    fn name(&self) -> &str {
        "down"
    }

    fn fetch_prices(&self, _request: &PriceRequest) -> Result<PriceBatch, ProviderError> {
        DisconnectedSnafu {
            message: "terminal session lost",
        }
        .fail()
    }
}
