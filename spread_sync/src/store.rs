//! Processed spread output under `processed_data/<ROOT>/`.
//!
//! Four tables (`spreads_dollar.json`, `spreads_percent.json`,
//! `spreads_annual.json`, `spreads_rate_adjusted.json`), each mapping
//! spread label -> date -> value, plus `spread_info.json` describing the last
//! run. Tables are append-only: an existing (label, date) value is never
//! replaced.
//!
//! The curve each date resolved to lives next to them: `monthly_futures.json`
//! (contract and settlement per month slot) and `days_to_expiry.json`.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt, fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, NaiveDate, Utc};
use futures_ingestor::{io::atomic::write_json_atomic, models::contract::ContractCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{coverage::Coverage, error::StoreError};

/// Directory under the data root holding per-commodity output.
pub const PROCESSED_DATA_DIR: &str = "processed_data";
const INFO_FILE: &str = "spread_info.json";
const MONTHLY_FILE: &str = "monthly_futures.json";
const EXPIRY_FILE: &str = "days_to_expiry.json";

/// The four spread variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// far − near.
    Dollar,
    /// dollar / near.
    Percent,
    /// Annualized percentage.
    Annual,
    /// Annualized percentage minus the interest rate.
    RateAdjusted,
}

impl Variant {
    /// Every variant, in storage order.
    pub const ALL: [Variant; 4] = [
        Variant::Dollar,
        Variant::Percent,
        Variant::Annual,
        Variant::RateAdjusted,
    ];

    /// Short name used in file names.
    pub fn name(self) -> &'static str {
        match self {
            Variant::Dollar => "dollar",
            Variant::Percent => "percent",
            Variant::Annual => "annual",
            Variant::RateAdjusted => "rate_adjusted",
        }
    }

    /// `spreads_<name>.json`.
    pub fn file_name(self) -> String {
        format!("spreads_{}.json", self.name())
    }

    /// Human-readable title.
    pub fn title(self) -> &'static str {
        match self {
            Variant::Dollar => "Dollar Spreads",
            Variant::Percent => "Percentage Spreads",
            Variant::Annual => "Annualized Percentage Spreads",
            Variant::RateAdjusted => "Rate-Adjusted Annualized Spreads",
        }
    }

    /// True for the ratio variants.
    pub fn is_percent(self) -> bool {
        !matches!(self, Variant::Dollar)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Spread label -> date -> value.
pub type SpreadTable = BTreeMap<String, BTreeMap<NaiveDate, f64>>;

/// What is already stored for one (spread, date).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// All four variants present.
    Complete,
    /// Dollar, percent and annual present; rate-adjusted absent.
    MissingRateAdjusted,
    /// Anything else.
    Absent,
}

/// Bitmap form of [`Presence`] for one spread label.
#[derive(Debug, Clone, Default)]
pub struct PresenceIndex {
    complete: Coverage,
    rate_missing: Coverage,
}

impl PresenceIndex {
    /// State of one date.
    pub fn state(&self, date: NaiveDate) -> Presence {
        if self.complete.contains(date) {
            Presence::Complete
        } else if self.rate_missing.contains(date) {
            Presence::MissingRateAdjusted
        } else {
            Presence::Absent
        }
    }
}

/// The four tables of one commodity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpreadTables {
    tables: BTreeMap<Variant, SpreadTable>,
}

impl SpreadTables {
    /// One variant's table (empty if never written).
    pub fn table(&self, variant: Variant) -> Option<&SpreadTable> {
        self.tables.get(&variant)
    }

    /// Stored value.
    pub fn get(&self, variant: Variant, label: &str, date: NaiveDate) -> Option<f64> {
        self.tables.get(&variant)?.get(label)?.get(&date).copied()
    }

    /// Append-only insert; returns false and keeps the old value if one exists.
    pub fn insert(&mut self, variant: Variant, label: &str, date: NaiveDate, value: f64) -> bool {
        let column = self
            .tables
            .entry(variant)
            .or_default()
            .entry(label.to_string())
            .or_default();
        if column.contains_key(&date) {
            return false;
        }
        column.insert(date, value);
        true
    }

    /// Dates stored for one label in one variant.
    pub fn coverage(&self, variant: Variant, label: &str) -> Coverage {
        self.tables
            .get(&variant)
            .and_then(|t| t.get(label))
            .map(|col| col.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Presence predicate for one (label, date).
    pub fn presence(&self, label: &str, date: NaiveDate) -> Presence {
        let has = |v| self.get(v, label, date).is_some();
        match (
            has(Variant::Dollar) && has(Variant::Percent) && has(Variant::Annual),
            has(Variant::RateAdjusted),
        ) {
            (true, true) => Presence::Complete,
            (true, false) => Presence::MissingRateAdjusted,
            _ => Presence::Absent,
        }
    }

    /// [`SpreadTables::presence`] for every date of one label at once.
    pub fn presence_index(&self, label: &str) -> PresenceIndex {
        let three = self
            .coverage(Variant::Dollar, label)
            .intersection(&self.coverage(Variant::Percent, label))
            .intersection(&self.coverage(Variant::Annual, label));
        let adjusted = self.coverage(Variant::RateAdjusted, label);
        PresenceIndex {
            complete: three.intersection(&adjusted),
            rate_missing: three.difference(&adjusted),
        }
    }

    /// Labels present in any variant.
    pub fn labels(&self) -> BTreeSet<String> {
        self.tables
            .values()
            .flat_map(|t| t.keys().cloned())
            .collect()
    }

    /// Earliest and latest date across every table.
    pub fn date_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let dates = self
            .tables
            .values()
            .flat_map(|t| t.values())
            .flat_map(|col| col.keys().copied());
        dates.fold(None, |acc, d| match acc {
            None => Some((d, d)),
            Some((a, b)) => Some((a.min(d), b.max(d))),
        })
    }

    /// Number of labels with data in a variant.
    pub fn label_count(&self, variant: Variant) -> usize {
        self.table(variant)
            .map(|t| t.values().filter(|c| !c.is_empty()).count())
            .unwrap_or(0)
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.tables.values().all(|t| t.values().all(BTreeMap::is_empty))
    }
}

/// One month slot of the resolved curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveSlot {
    /// Contract in the slot.
    pub contract: ContractCode,
    /// Its settlement that day, if stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

/// Per-date curve: the contract in each month slot, near first, and the
/// calendar days from the date to each slot's last trade.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurveTable {
    monthly: BTreeMap<NaiveDate, Vec<CurveSlot>>,
    days_to_expiry: BTreeMap<NaiveDate, Vec<i64>>,
}

impl CurveTable {
    /// Adds a date. A stored date keeps its contracts; only prices it lacked
    /// are filled in. Returns whether anything changed.
    pub fn insert(&mut self, date: NaiveDate, slots: Vec<CurveSlot>, days_to_expiry: Vec<i64>) -> bool {
        self.days_to_expiry.entry(date).or_insert(days_to_expiry);
        let Some(stored) = self.monthly.get_mut(&date) else {
            self.monthly.insert(date, slots);
            return true;
        };
        let mut changed = false;
        for (old, new) in stored.iter_mut().zip(slots) {
            if old.contract == new.contract && old.price.is_none() && new.price.is_some() {
                old.price = new.price;
                changed = true;
            }
        }
        changed
    }

    /// Month slots of one date.
    pub fn slots(&self, date: NaiveDate) -> Option<&[CurveSlot]> {
        self.monthly.get(&date).map(Vec::as_slice)
    }

    /// Days to expiry of one date, slot by slot.
    pub fn days_to_expiry(&self, date: NaiveDate) -> Option<&[i64]> {
        self.days_to_expiry.get(&date).map(Vec::as_slice)
    }

    /// Number of dates.
    pub fn len(&self) -> usize {
        self.monthly.len()
    }

    /// True when no date is stored.
    pub fn is_empty(&self) -> bool {
        self.monthly.is_empty()
    }

    /// Dates on which the front-month contract differs from the previous
    /// stored date's, i.e. the first day after each roll.
    pub fn front_changes(&self) -> Vec<NaiveDate> {
        let mut out = Vec::new();
        let mut previous: Option<&ContractCode> = None;
        for (date, slots) in &self.monthly {
            let Some(front) = slots.first().map(|s| &s.contract) else {
                continue;
            };
            if previous.is_some_and(|p| p != front) {
                out.push(*date);
            }
            previous = Some(front);
        }
        out
    }
}

/// Why a (spread, date) has no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    /// A leg had no usable quote; nothing was stored.
    NoData,
    /// Only the rate-adjusted variant is missing.
    MissingRate,
}

/// One gap of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    /// Spread label.
    pub label: String,
    /// Date.
    pub date: NaiveDate,
    /// Kind.
    pub kind: GapKind,
    /// Detail for the operator.
    pub detail: String,
}

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// First date.
    pub start: NaiveDate,
    /// Last date.
    pub end: NaiveDate,
}

/// Contents of `spread_info.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadInfo {
    /// Commodity root.
    pub commodity: String,
    /// When the last run finished.
    pub last_updated: DateTime<Utc>,
    /// Span of all stored dates.
    pub date_range: Option<DateRange>,
    /// Range the last run covered.
    pub run_range: DateRange,
    /// Annualization basis used.
    pub days_per_year: f64,
    /// Labels per variant.
    pub spread_counts: BTreeMap<Variant, usize>,
    /// Contract code -> roll date, for every contract the run resolved.
    pub roll_dates: BTreeMap<String, NaiveDate>,
    /// Gaps of the last run.
    pub gaps: Vec<Gap>,
}

/// Reads and writes `processed_data/`.
#[derive(Debug, Clone)]
pub struct SpreadStore {
    root: PathBuf,
}

impl SpreadStore {
    /// Store rooted at `<data_root>/processed_data`.
    pub fn new(data_root: impl AsRef<Path>) -> Self {
        Self {
            root: data_root.as_ref().join(PROCESSED_DATA_DIR),
        }
    }

    /// `processed_data/<ROOT>`.
    pub fn commodity_dir(&self, commodity: &str) -> PathBuf {
        self.root.join(commodity)
    }

    /// Path of one variant's table.
    pub fn table_path(&self, commodity: &str, variant: Variant) -> PathBuf {
        self.commodity_dir(commodity).join(variant.file_name())
    }

    /// Path of `spread_info.json`.
    pub fn info_path(&self, commodity: &str) -> PathBuf {
        self.commodity_dir(commodity).join(INFO_FILE)
    }

    /// Paths of `monthly_futures.json` and `days_to_expiry.json`.
    pub fn curve_paths(&self, commodity: &str) -> (PathBuf, PathBuf) {
        let dir = self.commodity_dir(commodity);
        (dir.join(MONTHLY_FILE), dir.join(EXPIRY_FILE))
    }

    /// The stored curve; missing files load as empty.
    pub fn load_curve(&self, commodity: &str) -> Result<CurveTable, StoreError> {
        let (monthly, expiry) = self.curve_paths(commodity);
        Ok(CurveTable {
            monthly: read_json(&monthly)?.unwrap_or_default(),
            days_to_expiry: read_json(&expiry)?.unwrap_or_default(),
        })
    }

    /// Writes both curve files.
    pub fn save_curve(&self, commodity: &str, curve: &CurveTable) -> Result<(), StoreError> {
        let (monthly, expiry) = self.curve_paths(commodity);
        write_json_atomic(&monthly, &curve.monthly)
            .map_err(|source| StoreError::Io { path: monthly, source })?;
        write_json_atomic(&expiry, &curve.days_to_expiry)
            .map_err(|source| StoreError::Io { path: expiry, source })
    }

    /// All four tables; missing files load as empty.
    pub fn load_tables(&self, commodity: &str) -> Result<SpreadTables, StoreError> {
        let mut tables = SpreadTables::default();
        for v in Variant::ALL {
            if let Some(t) = read_json::<SpreadTable>(&self.table_path(commodity, v))? {
                tables.tables.insert(v, t);
            }
        }
        Ok(tables)
    }

    /// Writes all four tables, each through a temp file.
    pub fn save_tables(&self, commodity: &str, tables: &SpreadTables) -> Result<(), StoreError> {
        let empty = SpreadTable::new();
        for v in Variant::ALL {
            let path = self.table_path(commodity, v);
            let table = tables.table(v).unwrap_or(&empty);
            write_json_atomic(&path, table).map_err(|source| StoreError::Io { path, source })?;
        }
        Ok(())
    }

    /// `spread_info.json`, if a run has completed before.
    pub fn load_info(&self, commodity: &str) -> Result<Option<SpreadInfo>, StoreError> {
        read_json(&self.info_path(commodity))
    }

    /// Writes `spread_info.json`.
    pub fn save_info(&self, commodity: &str, info: &SpreadInfo) -> Result<(), StoreError> {
        let path = self.info_path(commodity);
        write_json_atomic(&path, info).map_err(|source| StoreError::Io { path, source })
    }
}

/// Reads a JSON file; `Ok(None)` when it does not exist.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|source| StoreError::Decode {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, day).unwrap()
    }

    #[test]
    fn presence_states() {
        let mut t = SpreadTables::default();
        for v in [Variant::Dollar, Variant::Percent, Variant::Annual] {
            t.insert(v, "spread_1_2m", d(9), 1.0);
            t.insert(v, "spread_1_2m", d(10), 1.0);
        }
        t.insert(Variant::RateAdjusted, "spread_1_2m", d(9), 1.0);
        // dollar only
        t.insert(Variant::Dollar, "spread_1_2m", d(11), 1.0);

        let idx = t.presence_index("spread_1_2m");
        for (day, want) in [
            (9, Presence::Complete),
            (10, Presence::MissingRateAdjusted),
            (11, Presence::Absent),
            (12, Presence::Absent),
        ] {
            assert_eq!(t.presence("spread_1_2m", d(day)), want);
            assert_eq!(idx.state(d(day)), want);
        }
    }

    #[test]
    fn insert_never_overwrites() {
        let mut t = SpreadTables::default();
        assert!(t.insert(Variant::Dollar, "spread_1_2m", d(9), 1.5));
        assert!(!t.insert(Variant::Dollar, "spread_1_2m", d(9), 9.9));
        assert_eq!(t.get(Variant::Dollar, "spread_1_2m", d(9)), Some(1.5));
    }

    fn slot(code: &str, price: Option<f64>) -> CurveSlot {
        CurveSlot {
            contract: code.parse().unwrap(),
            price,
        }
    }

    #[test]
    fn curve_keeps_contracts_and_fills_prices() {
        let mut curve = CurveTable::default();
        assert!(curve.insert(d(9), vec![slot("CLG23", None), slot("CLH23", Some(71.0))], vec![11, 43]));
        // later run quotes the near leg and disagrees about nothing else
        assert!(curve.insert(d(9), vec![slot("CLG23", Some(70.0)), slot("CLH23", Some(99.0))], vec![0, 0]));
        assert!(!curve.insert(d(9), vec![slot("CLG23", Some(1.0))], vec![]));

        let slots = curve.slots(d(9)).unwrap();
        assert_eq!(slots[0].price, Some(70.0));
        assert_eq!(slots[1].price, Some(71.0));
        assert_eq!(curve.days_to_expiry(d(9)), Some(&[11, 43][..]));
    }

    #[test]
    fn front_changes_mark_the_first_day_after_a_roll() {
        let mut curve = CurveTable::default();
        for (day, front) in [(16, "CLG23"), (17, "CLG23"), (18, "CLH23"), (19, "CLH23")] {
            curve.insert(d(day), vec![slot(front, None)], vec![0]);
        }
        assert_eq!(curve.front_changes(), vec![d(18)]);
    }

    #[test]
    fn curve_roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = SpreadStore::new(dir.path());
        assert!(store.load_curve("CL").unwrap().is_empty());

        let mut curve = CurveTable::default();
        curve.insert(d(9), vec![slot("CLG23", Some(70.0))], vec![11]);
        store.save_curve("CL", &curve).unwrap();

        assert!(dir.path().join("processed_data/CL/monthly_futures.json").exists());
        assert!(dir.path().join("processed_data/CL/days_to_expiry.json").exists());
        assert_eq!(store.load_curve("CL").unwrap(), curve);
    }

    #[test]
    fn tables_roundtrip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = SpreadStore::new(dir.path());
        assert!(store.load_tables("CL").unwrap().is_empty());
        assert!(store.load_info("CL").unwrap().is_none());

        let mut t = SpreadTables::default();
        t.insert(Variant::Annual, "spread_1_3m", d(10), 0.26);
        store.save_tables("CL", &t).unwrap();

        assert!(dir.path().join("processed_data/CL/spreads_rate_adjusted.json").exists());
        let back = store.load_tables("CL").unwrap();
        assert_eq!(back.get(Variant::Annual, "spread_1_3m", d(10)), Some(0.26));
        assert_eq!(back.date_span(), Some((d(10), d(10))));
    }
}
