//! Flat JSON export for static hosting.
//!
//! ```text
//! data/index.json
//! data/<ROOT>/<ROOT>_<variant>_spreads.json   [{"date": "...", "<label>": v, ...}]
//! data/<ROOT>/<ROOT>_metadata.json
//! ```

use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

use chrono::{DateTime, NaiveDate, Utc};
use futures_ingestor::io::atomic::write_json_atomic;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::{
    error::StoreError,
    models::Commodity,
    store::{DateRange, SpreadTable, SpreadTables, Variant},
};

/// Directory under the data root holding the export.
pub const EXPORT_DIR: &str = "data";

/// `<ROOT>_metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMetadata {
    /// Commodity root.
    pub commodity: String,
    /// Span of exported dates.
    pub date_range: Option<DateRange>,
    /// Variants that had data.
    pub available_spreads: Vec<Variant>,
    /// Variant -> file name inside the commodity directory.
    pub files: BTreeMap<Variant, String>,
    /// Export time.
    pub last_updated: DateTime<Utc>,
}

/// `index.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportIndex {
    /// Every configured commodity.
    pub commodities: Vec<String>,
    /// Export time.
    pub last_updated: DateTime<Utc>,
    /// Variants the pipeline produces.
    pub spread_types: Vec<Variant>,
    /// Commodity -> exported successfully.
    pub status: IndexMap<String, bool>,
}

/// One row per date; labels without a value that day are `null`.
pub fn records(table: &SpreadTable, labels: &[String]) -> Vec<IndexMap<String, Value>> {
    let dates: BTreeSet<NaiveDate> = table.values().flat_map(|col| col.keys().copied()).collect();
    dates
        .into_iter()
        .map(|date| {
            let mut row = IndexMap::with_capacity(labels.len() + 1);
            row.insert("date".to_string(), Value::String(date.to_string()));
            for label in labels {
                let v = table
                    .get(label)
                    .and_then(|col| col.get(&date))
                    .and_then(|v| serde_json::Number::from_f64(*v))
                    .map_or(Value::Null, Value::Number);
                row.insert(label.clone(), v);
            }
            row
        })
        .collect()
}

/// Writes the per-variant record files and the metadata file for one
/// commodity.
pub fn export_commodity(
    data_root: &Path,
    commodity: &Commodity,
    tables: &SpreadTables,
) -> Result<ExportMetadata, StoreError> {
    let root = &commodity.root;
    let dir = data_root.join(EXPORT_DIR).join(root);

    let mut labels: Vec<String> = commodity.spreads.iter().map(|s| s.label()).collect();
    for extra in tables.labels() {
        if !labels.contains(&extra) {
            labels.push(extra);
        }
    }

    let mut files = BTreeMap::new();
    for variant in Variant::ALL {
        let Some(table) = tables.table(variant).filter(|t| t.values().any(|c| !c.is_empty())) else {
            continue;
        };
        let name = format!("{root}_{}_spreads.json", variant.name());
        let path = dir.join(&name);
        write(&path, &records(table, &labels))?;
        files.insert(variant, name);
    }

    let meta = ExportMetadata {
        commodity: root.clone(),
        date_range: tables.date_span().map(|(start, end)| DateRange { start, end }),
        available_spreads: files.keys().copied().collect(),
        files,
        last_updated: Utc::now(),
    };
    write(&dir.join(format!("{root}_metadata.json")), &meta)?;
    info!(commodity = %root, files = meta.files.len(), "exported");
    Ok(meta)
}

/// Writes `data/index.json`.
pub fn write_index(data_root: &Path, status: IndexMap<String, bool>) -> Result<PathBuf, StoreError> {
    let index = ExportIndex {
        commodities: status.keys().cloned().collect(),
        last_updated: Utc::now(),
        spread_types: Variant::ALL.to_vec(),
        status,
    };
    let path = data_root.join(EXPORT_DIR).join("index.json");
    write(&path, &index)?;
    Ok(path)
}

fn write<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    write_json_atomic(path, value).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use futures_ingestor::models::contract::ContractMonth;
    use insta::assert_json_snapshot;

    use super::*;
    use crate::models::SpreadDef;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, day).unwrap()
    }

    fn commodity() -> Commodity {
        Commodity {
            root: "NG".into(),
            name: "Natural Gas".into(),
            months: ContractMonth::ALL.to_vec(),
            yellow_key: "Comdty".into(),
            rate_source: None,
            contracts: Vec::new(),
            spreads: vec![SpreadDef::new(1, 2), SpreadDef::new(1, 3)],
        }
    }

    #[test]
    fn records_are_one_row_per_date() {
        let mut t = SpreadTables::default();
        t.insert(Variant::Dollar, "spread_1_2m", d(3), 0.25);
        t.insert(Variant::Dollar, "spread_1_2m", d(4), 0.5);
        t.insert(Variant::Dollar, "spread_1_3m", d(4), 0.75);

        let labels = vec!["spread_1_2m".to_string(), "spread_1_3m".to_string()];
        let rows = records(t.table(Variant::Dollar).unwrap(), &labels);
        assert_json_snapshot!(rows, @r#"
        [
          {
            "date": "2023-01-03",
            "spread_1_2m": 0.25,
            "spread_1_3m": null
          },
          {
            "date": "2023-01-04",
            "spread_1_2m": 0.5,
            "spread_1_3m": 0.75
          }
        ]
        "#);
    }

    #[test]
    fn export_writes_metadata_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = SpreadTables::default();
        t.insert(Variant::Annual, "spread_1_2m", d(3), 0.1);

        let meta = export_commodity(dir.path(), &commodity(), &t).unwrap();
        assert_eq!(meta.available_spreads, vec![Variant::Annual]);
        assert_eq!(meta.files[&Variant::Annual], "NG_annual_spreads.json");
        assert_eq!(meta.date_range, Some(DateRange { start: d(3), end: d(3) }));
        assert!(dir.path().join("data/NG/NG_annual_spreads.json").exists());
        assert!(dir.path().join("data/NG/NG_metadata.json").exists());

        let path = write_index(dir.path(), IndexMap::from([("NG".to_string(), true)])).unwrap();
        let back: ExportIndex =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(back.commodities, vec!["NG"]);
        assert_eq!(back.spread_types.len(), 4);
    }
}
