//! Fills in contract reference data from the price source.
//!
//! A roll table may list contracts without a `last_trade`. `sync-contracts`
//! asks the source for the reference fields of exactly those contracts that
//! neither the config nor `raw_data/<ROOT>/metadata.json` date yet, and merges
//! the answer into the metadata file. Known values are never overwritten.

use std::fmt;

use futures_ingestor::{
    errors::Error as IngestError,
    ingest::fetch_and_store_details,
    io::price_store::PriceStore,
    models::contract::ContractCode,
    providers::PriceSource,
};
use tracing::{info, warn};

use crate::{
    config::{CommodityCfg, PipelineConfig},
    error::{ConfigError, SpreadError},
};

/// Outcome of one commodity's sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractSync {
    /// Commodity root.
    pub commodity: String,
    /// Contracts asked for.
    pub requested: Vec<ContractCode>,
    /// Stored records added or completed.
    pub updated: usize,
    /// Requested contracts still without a last trade date.
    pub still_missing: Vec<ContractCode>,
}

impl fmt::Display for ContractSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.requested.is_empty() {
            return write!(f, "{}: every contract has a last trade date", self.commodity);
        }
        write!(
            f,
            "{}: {} requested, {} records updated",
            self.commodity,
            self.requested.len(),
            self.updated
        )?;
        for code in &self.still_missing {
            write!(f, "\n! {code} still has no last trade date")?;
        }
        Ok(())
    }
}

/// Contracts of `cfg` that lack a last trade date in both the config and
/// the stored reference data.
pub fn undated_contracts(
    root: &str,
    cfg: &CommodityCfg,
    store: &PriceStore,
) -> Result<Vec<ContractCode>, ConfigError> {
    if cfg.contracts.iter().all(|k| k.last_trade.is_some()) {
        return Ok(Vec::new());
    }
    let details = store.load_details(root).map_err(ConfigError::Details)?;
    Ok(cfg
        .contracts
        .iter()
        .filter(|k| k.last_trade.is_none())
        .filter_map(|k| k.code(root))
        .filter(|code| details.get(code).and_then(|d| d.last_trade).is_none())
        .collect())
}

/// Syncs the commodities named in `roots`, or all of them.
///
/// An unreachable source or a source error aborts the sync.
pub fn sync_contracts(
    cfg: &PipelineConfig,
    roots: &[String],
    source: &dyn PriceSource,
    store: &PriceStore,
) -> Result<Vec<ContractSync>, SpreadError> {
    let selected: Vec<(&String, &CommodityCfg)> = if roots.is_empty() {
        cfg.commodities.iter().collect()
    } else {
        roots
            .iter()
            .map(|r| {
                let key = r.trim().to_uppercase();
                cfg.commodities
                    .get_key_value(&key)
                    .ok_or(ConfigError::UnknownCommodity(key))
            })
            .collect::<Result<_, _>>()?
    };

    let mut out = Vec::with_capacity(selected.len());
    for (root, commodity) in selected {
        let requested = undated_contracts(root, commodity, store)?;
        if requested.is_empty() {
            info!(commodity = %root, "reference data complete");
            out.push(ContractSync {
                commodity: root.clone(),
                ..Default::default()
            });
            continue;
        }

        let updated = fetch_and_store_details(source, store, &requested, &commodity.yellow_key)
            .map_err(|e| match e {
                IngestError::Provider(e) if e.is_unavailable() => SpreadError::SourceUnavailable(e),
                IngestError::Provider(e) => SpreadError::Source(e),
                IngestError::Sink(e) => SpreadError::PriceStore(e),
                other => ConfigError::InvalidSource(other.to_string()).into(),
            })?;

        let still_missing = undated_contracts(root, commodity, store)?;
        for code in &still_missing {
            warn!(contract = %code, "source gave no last trade date");
        }
        info!(
            commodity = %root,
            requested = requested.len(),
            updated,
            missing = still_missing.len(),
            "reference data synced"
        );
        out.push(ContractSync {
            commodity: root.clone(),
            requested,
            updated,
            still_missing,
        });
    }
    Ok(out)
}
