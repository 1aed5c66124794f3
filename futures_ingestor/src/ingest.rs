//! Fetch-then-store helpers shared by the CLI and the spread backfill.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::{
    errors::Error,
    io::{price_store::PriceStore, sink::PriceSink},
    models::{contract::ContractCode, request_params::PriceRequest},
    providers::PriceSource,
};

/// What one fetch-and-store pass produced.
#[derive(Debug)]
pub struct Ingested<T> {
    /// Whatever the sink returned for the series that came back.
    pub stored: T,
    /// Contracts the source refused, with its message.
    pub rejected: BTreeMap<ContractCode, String>,
}

/// Fetches one request and merges the result into `sink`.
pub fn fetch_and_store<S, K>(
    source: &S,
    sink: &K,
    request: &PriceRequest,
) -> Result<Ingested<K::Output>, Error>
where
    S: PriceSource + ?Sized,
    K: PriceSink + ?Sized,
{
    let batch = source.fetch_prices(request)?;
    info!(
        source = source.name(),
        contracts = request.contracts.len(),
        points = batch.points(),
        rejected = batch.rejected.len(),
        start = %request.start,
        end = %request.end,
        "fetched prices"
    );
    Ok(Ingested {
        stored: sink.write(&batch.series)?,
        rejected: batch.rejected,
    })
}

/// Fetches reference data for `contracts` and merges it into `store`.
/// Returns how many stored records changed.
pub fn fetch_and_store_details<S>(
    source: &S,
    store: &PriceStore,
    contracts: &[ContractCode],
    yellow_key: &str,
) -> Result<usize, Error>
where
    S: PriceSource + ?Sized,
{
    if contracts.is_empty() {
        return Ok(0);
    }
    let details = source.fetch_details(contracts, yellow_key)?;
    let dated = details.iter().filter(|d| d.last_trade.is_some()).count();
    info!(
        source = source.name(),
        requested = contracts.len(),
        answered = details.len(),
        dated,
        "fetched reference data"
    );
    Ok(store.merge_details(&details)?)
}

/// Runs every request, keeping per-request failures in the result list.
///
/// A source that cannot be reached aborts the whole batch, since every later
/// request would fail the same way.
pub fn fetch_batch_partial<S, K>(
    source: &S,
    sink: &K,
    requests: &[PriceRequest],
) -> Result<Vec<Result<Ingested<K::Output>, Error>>, Error>
where
    S: PriceSource + ?Sized,
    K: PriceSink + ?Sized,
{
    let mut results = Vec::with_capacity(requests.len());
    for (i, request) in requests.iter().enumerate() {
        match fetch_and_store(source, sink, request) {
            Err(Error::Provider(e)) if e.is_unavailable() => return Err(Error::Provider(e)),
            Err(e) => {
                warn!(request = i, error = %e, "request failed");
                results.push(Err(e));
            }
            Ok(out) => results.push(Ok(out)),
        }
    }
    Ok(results)
}
