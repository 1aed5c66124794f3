use std::{
    collections::{BTreeMap, HashMap},
    num::NonZeroU32,
    time::Duration,
};

use governor::{
    DefaultDirectRateLimiter, Quota, RateLimiter,
    clock::{Clock, DefaultClock},
};
use indexmap::IndexMap;
use nonzero_ext::nonzero;
use reqwest::{
    StatusCode,
    blocking::Client,
    header::{self, HeaderMap},
};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use shared_utils::env::get_env_var;
use snafu::{IntoError, ResultExt};
use tracing::{debug, warn};

use crate::{
    models::{
        contract::ContractCode,
        price_series::{PriceBatch, PriceSeries},
        reference::ContractDetails,
        request_params::PriceRequest,
    },
    providers::{
        ApiSnafu, ClientBuildSnafu, DisconnectedSnafu, InvalidApiKeySnafu, MissingEnvVarSnafu,
        PriceSource, ProviderError, ProviderInitError, ReqwestSnafu, SettingsSnafu,
        UnavailableSnafu,
        terminal_rest::{
            params::{
                TerminalSettings, construct_query, construct_reference_query, validate_request,
            },
            response::{HistoryResponse, ReferenceResponse},
        },
    },
};

const API_KEY_HEADER: &str = "X-Api-Key";

pub struct TerminalRestSource {
    client: Client,
    settings: TerminalSettings,
    limiter: DefaultDirectRateLimiter,
    _api_key: Option<SecretString>,
}

impl TerminalRestSource {
    /// Creates a new terminal source.
    ///
    /// When `api_key_env` is set, the key is read from that environment
    /// variable and sent as the `X-Api-Key` header on every request.
    pub fn new(settings: TerminalSettings) -> Result<Self, ProviderInitError> {
        settings
            .validate()
            .map_err(|message| SettingsSnafu { message }.build())?;

        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let api_key = match settings.api_key_env.as_deref() {
            Some(var) => {
                let key = SecretString::new(get_env_var(var).context(MissingEnvVarSnafu)?.into());
                headers.insert(
                    API_KEY_HEADER,
                    header::HeaderValue::from_str(key.expose_secret())
                        .context(InvalidApiKeySnafu)?,
                );
                Some(key)
            }
            None => None,
        };

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context(ClientBuildSnafu)?;

        let per_second = NonZeroU32::new(settings.requests_per_second).unwrap_or(nonzero!(1u32));
        let limiter = RateLimiter::direct(Quota::per_second(per_second));

        Ok(Self {
            client,
            settings,
            limiter,
            _api_key: api_key,
        })
    }

    pub fn settings(&self) -> &TerminalSettings {
        &self.settings
    }

    // Blocks until the quota allows another request.
    fn throttle(&self) {
        let clock = DefaultClock::default();
        while let Err(not_until) = self.limiter.check() {
            std::thread::sleep(not_until.wait_time_from(clock.now()));
        }
    }

    fn fetch_batch(
        &self,
        request: &PriceRequest,
        tickers: &[String],
    ) -> Result<HistoryResponse, ProviderError> {
        debug!(securities = tickers.len(), start = %request.start, end = %request.end, "terminal history request");
        self.get_json(
            &self.settings.history_url(),
            &construct_query(request, tickers),
        )
    }

    fn fetch_reference(&self, tickers: &[String]) -> Result<ReferenceResponse, ProviderError> {
        debug!(securities = tickers.len(), "terminal reference request");
        self.get_json(
            &self.settings.reference_url(),
            &construct_reference_query(tickers),
        )
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<T, ProviderError> {
        self.throttle();
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .map_err(classify_transport)?;

        let status = response.status();
        if status == StatusCode::SERVICE_UNAVAILABLE || status == StatusCode::BAD_GATEWAY {
            let message = response
                .text()
                .unwrap_or_else(|_| "terminal session unavailable".to_string());
            return DisconnectedSnafu { message }.fail();
        }
        if !status.is_success() {
            let error_msg = response
                .text()
                .unwrap_or_else(|_| "Unknown API error".to_string());
            return ApiSnafu {
                message: format!("{status}: {error_msg}"),
            }
            .fail();
        }

        response.json::<T>().context(ReqwestSnafu)
    }
}

fn classify_transport(err: reqwest::Error) -> ProviderError {
    if err.is_connect() || err.is_timeout() {
        UnavailableSnafu.into_error(err)
    } else {
        ReqwestSnafu.into_error(err)
    }
}

impl PriceSource for TerminalRestSource {
    fn name(&self) -> &str {
        "terminal"
    }

    fn fetch_prices(&self, request: &PriceRequest) -> Result<PriceBatch, ProviderError> {
        validate_request(request)?;

        // ticker -> contract, so response keys map back to codes
        let by_ticker: HashMap<String, &ContractCode> = request
            .contracts
            .iter()
            .map(|c| (c.ticker(&request.yellow_key), c))
            .collect();

        let mut all: IndexMap<String, PriceSeries> = request
            .contracts
            .iter()
            .map(|c| (c.to_string(), PriceSeries::new(c.to_string())))
            .collect();
        let mut rejected = BTreeMap::new();
        let mut first_error = None;
        let mut answered = 0;

        let size = self.settings.batch_size;
        let tickers = request.tickers();
        for (batch, contracts) in tickers.chunks(size).zip(request.contracts.chunks(size)) {
            let response = match self.fetch_batch(request, batch) {
                Ok(response) => response,
                Err(e) if e.is_unavailable() => return Err(e),
                Err(e) => {
                    warn!(securities = batch.len(), error = %e, "terminal batch failed");
                    for code in contracts {
                        rejected.insert(code.clone(), e.to_string());
                    }
                    first_error.get_or_insert(e);
                    continue;
                }
            };
            answered += 1;

            for (ticker, message) in response.errors {
                warn!(%ticker, %message, "terminal rejected security");
                match lookup(&by_ticker, &ticker) {
                    Some(code) => {
                        rejected.insert(code, message);
                    }
                    None => warn!(%ticker, "error for unrequested security"),
                }
            }

            for (ticker, rows) in response.data {
                let Some(code) = lookup(&by_ticker, &ticker) else {
                    warn!(%ticker, "ignoring rows for unrequested security");
                    continue;
                };
                let key = code.to_string();
                let series = all
                    .entry(key.clone())
                    .or_insert_with(|| PriceSeries::new(key));

                for row in rows {
                    match row.value(&request.field) {
                        Some(price) if price.is_finite() => {
                            series.append(row.date, price);
                        }
                        _ => debug!(%ticker, date = %row.date, "no usable quote"),
                    }
                    if let Some(volume) = request
                        .volume_field
                        .as_deref()
                        .and_then(|f| row.value(f))
                        .filter(|v| v.is_finite())
                    {
                        series.append_volume(row.date, volume);
                    }
                }
            }
        }

        if answered == 0 {
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        let series = all
            .into_values()
            .filter(|s| {
                !s.is_empty()
                    || !s
                        .contract
                        .parse::<ContractCode>()
                        .is_ok_and(|c| rejected.contains_key(&c))
            })
            .map(|s| s.range(request.start, request.end))
            .collect();
        Ok(PriceBatch { series, rejected })
    }

    fn fetch_details(
        &self,
        contracts: &[ContractCode],
        yellow_key: &str,
    ) -> Result<Vec<ContractDetails>, ProviderError> {
        let mut out = Vec::with_capacity(contracts.len());
        for chunk in contracts.chunks(self.settings.batch_size) {
            let tickers: Vec<String> = chunk.iter().map(|c| c.ticker(yellow_key)).collect();
            let response = self.fetch_reference(&tickers)?;
            for (ticker, message) in &response.errors {
                warn!(%ticker, %message, "terminal has no reference data");
            }
            out.extend(
                chunk
                    .iter()
                    .zip(&tickers)
                    .filter_map(|(code, ticker)| response.details(code, ticker)),
            );
        }
        Ok(out)
    }
}

fn lookup(by_ticker: &HashMap<String, &ContractCode>, ticker: &str) -> Option<ContractCode> {
    match by_ticker.get(ticker) {
        Some(code) => Some((*code).clone()),
        None => ticker.parse().ok(),
    }
}
