//! On-disk store of raw settlement prices, one JSON file per contract under
//! `raw_data/<ROOT>/<CODE>.json`, plus the root's reference data in
//! `raw_data/<ROOT>/metadata.json`.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use snafu::{IntoError, ResultExt};
use tracing::debug;

use crate::{
    io::{
        atomic::write_json_atomic,
        sink::{DecodeSnafu, IoSnafu, PriceSink, RejectedSnafu, SinkError, WriteSnafu},
    },
    models::{contract::ContractCode, price_series::PriceSeries, reference::ContractDetails},
};

pub const RAW_DATA_DIR: &str = "raw_data";

/// Reference data file inside each root's directory.
pub const DETAILS_FILE: &str = "metadata.json";

/// Result of merging one series into the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSeries {
    pub contract: String,
    pub path: PathBuf,
    /// Dates that were not stored before.
    pub added: usize,
    /// Volumes that were not stored before.
    pub volumes_added: usize,
}

#[derive(Debug, Clone)]
pub struct PriceStore {
    root: PathBuf,
}

impl PriceStore {
    /// Store rooted at `<data_root>/raw_data`.
    pub fn new(data_root: impl AsRef<Path>) -> Self {
        Self {
            root: data_root.as_ref().join(RAW_DATA_DIR),
        }
    }

    pub fn path_for(&self, code: &ContractCode) -> PathBuf {
        self.root.join(&code.root).join(format!("{code}.json"))
    }

    pub fn details_path(&self, root: &str) -> PathBuf {
        self.root.join(root).join(DETAILS_FILE)
    }

    /// Contracts of `root` with a stored price file, in contract order.
    pub fn contracts(&self, root: &str) -> Result<Vec<ContractCode>, SinkError> {
        let dir = self.root.join(root);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(IoSnafu.into_error(e)),
        };
        let mut codes = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| IoSnafu.into_error(e))?.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            // metadata.json and strays do not parse as codes
            if let Ok(code) = stem.parse::<ContractCode>() {
                if code.root == root {
                    codes.push(code);
                }
            }
        }
        codes.sort();
        Ok(codes)
    }

    /// Stored series for `code`; empty when nothing has been stored yet.
    pub fn load(&self, code: &ContractCode) -> Result<PriceSeries, SinkError> {
        let path = self.path_for(code);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PriceSeries::new(code.to_string()));
            }
            Err(e) => return Err(IoSnafu.into_error(e)),
        };
        let mut series: PriceSeries = serde_json::from_str(&text).context(DecodeSnafu {
            path: path.display().to_string(),
        })?;
        // the file name is authoritative
        series.contract = code.to_string();
        Ok(series)
    }

    /// Appends the dates of `series` that are not stored yet. The file is only
    /// rewritten when something new arrived.
    pub fn merge(&self, series: &PriceSeries) -> Result<StoredSeries, SinkError> {
        let code: ContractCode = series.contract.parse().map_err(|e| {
            RejectedSnafu {
                message: format!("'{}': {e}", series.contract),
            }
            .build()
        })?;
        let path = self.path_for(&code);
        let mut stored = self.load(&code)?;
        let added = stored.merge_append(series);
        let volumes_added = stored.merge_volumes(series);

        if added > 0 || volumes_added > 0 {
            write_json_atomic(&path, &stored).context(WriteSnafu {
                path: path.display().to_string(),
            })?;
            debug!(contract = %code, added, volumes_added, total = stored.len(), "raw prices merged");
        }

        Ok(StoredSeries {
            contract: code.to_string(),
            path,
            added,
            volumes_added,
        })
    }

    /// Stored reference data of `root`, by contract.
    pub fn load_details(&self, root: &str) -> Result<BTreeMap<ContractCode, ContractDetails>, SinkError> {
        let path = self.details_path(root);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(IoSnafu.into_error(e)),
        };
        let rows: Vec<ContractDetails> = serde_json::from_str(&text).context(DecodeSnafu {
            path: path.display().to_string(),
        })?;
        Ok(rows.into_iter().map(|d| (d.contract.clone(), d)).collect())
    }

    /// Adds new contracts and fills empty fields of known ones; known values
    /// are kept. Returns how many records changed.
    pub fn merge_details(&self, details: &[ContractDetails]) -> Result<usize, SinkError> {
        let mut by_root: BTreeMap<&str, Vec<&ContractDetails>> = BTreeMap::new();
        for d in details {
            by_root.entry(d.contract.root.as_str()).or_default().push(d);
        }

        let mut changed = 0;
        for (root, fetched) in by_root {
            let mut stored = self.load_details(root)?;
            let before = changed;
            for d in fetched {
                match stored.get_mut(&d.contract) {
                    Some(known) => changed += usize::from(known.fill_from(d)),
                    None => {
                        stored.insert(d.contract.clone(), d.clone());
                        changed += 1;
                    }
                }
            }
            if changed > before {
                let path = self.details_path(root);
                let rows: Vec<_> = stored.into_values().collect();
                write_json_atomic(&path, &rows).context(WriteSnafu {
                    path: path.display().to_string(),
                })?;
                debug!(root, changed = changed - before, "reference data merged");
            }
        }
        Ok(changed)
    }
}

impl PriceSink for PriceStore {
    type Output = Vec<StoredSeries>;

    fn write(&self, data: &[PriceSeries]) -> Result<Self::Output, SinkError> {
        data.iter().map(|s| self.merge(s)).collect()
    }
}
