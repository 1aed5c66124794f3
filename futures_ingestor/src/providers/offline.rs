use tracing::debug;

use crate::{
    models::{
        price_series::{PriceBatch, PriceSeries},
        request_params::PriceRequest,
    },
    providers::{PriceSource, ProviderError},
};

/// Source used when no terminal is reachable: every request comes back empty,
/// so a run works purely from prices already in the raw store.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineSource;

impl PriceSource for OfflineSource {
    fn name(&self) -> &str {
        "offline"
    }

    fn fetch_prices(&self, request: &PriceRequest) -> Result<PriceBatch, ProviderError> {
        debug!(
            contracts = request.contracts.len(),
            "offline source, nothing fetched"
        );
        let series: Vec<_> = request
            .contracts
            .iter()
            .map(|c| PriceSeries::new(c.to_string()))
            .collect();
        Ok(series.into())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn returns_one_empty_series_per_contract() {
        let day = NaiveDate::from_ymd_opt(2023, 1, 10).unwrap();
        let req = PriceRequest::new(
            vec!["CLG23".parse().unwrap(), "CLH23".parse().unwrap()],
            day,
            day,
        );
        let out = OfflineSource.fetch_prices(&req).unwrap();
        assert!(out.rejected.is_empty());
        let out = out.series;
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(PriceSeries::is_empty));
        assert_eq!(out[1].contract, "CLH23");
    }
}
