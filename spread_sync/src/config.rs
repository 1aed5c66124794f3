//! Pipeline configuration: parsing, normalization, validation and loading.
//!
//! The TOML file describes:
//! - `[settings]`: data root, annualization basis, trading calendar, exchange zone
//! - `[source]`: which price source to use and how to reach it
//! - `[rates.<name>]`: interest-rate sources referenced by commodities
//! - `[commodities.<ROOT>]`: month cycle, roll table and spreads per commodity
//!
//! Key behaviors:
//! - Normalization upper-cases and trims roots, de-duplicates and orders month
//!   cycles, drops duplicate spread pairs and sorts contracts by expiry. What it
//!   changed is returned as a [`NormalizationReport`].
//! - Validation is eager: a malformed roll table fails the whole load with a
//!   [`ConfigError`] before any data is touched.
//! - A contract may leave out `last_trade`; loading from a file fills it from
//!   the stored reference data (`raw_data/<ROOT>/metadata.json`, written by
//!   `sync-contracts`). A value in the file always wins.
//!
//! Entrypoints:
//! - Parse + normalize + validate from a TOML string: [`load_config_str`]
//! - Same from a file path, with stored last trade dates: [`load_config_path`]
//! - Parse + normalize only, for commands that run before validation can
//!   succeed: [`read_config_path`]

use std::{
    collections::HashSet,
    mem,
    path::{Path, PathBuf},
};

use chrono::{Days, NaiveDate};
use chrono_tz::Tz;
use futures_ingestor::{
    io::price_store::PriceStore,
    models::{
        contract::{ContractCode, ContractMonth, MONTH_CODES, validate_code_year},
        request_params::DEFAULT_YELLOW_KEY,
    },
    providers::{
        SourceSettings,
        rates::{NoRateSource, RateError, RateSettings, RateSource},
    },
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    calendar::CalendarKind,
    error::ConfigError,
    models::{Commodity, Contract, SpreadDef},
    tz::parse_tz,
};

/// Default annualization basis in calendar days.
pub const DEFAULT_DAYS_PER_YEAR: f64 = 365.0;
/// Default depth for generated `(1, k)` spreads.
pub const DEFAULT_MAX_MONTHS_FORWARD: usize = 13;
const DEFAULT_EXCHANGE_TZ: &str = "America/New_York";

/// The config file as written.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Global settings.
    #[serde(default)]
    pub settings: Settings,
    /// Price source.
    #[serde(default)]
    pub source: SourceSettings,
    /// Interest-rate sources by name.
    #[serde(default)]
    pub rates: IndexMap<String, RateSettings>,
    /// Commodity root -> configuration, in file order.
    #[serde(default)]
    pub commodities: IndexMap<String, CommodityCfg>,
}

/// The `[settings]` table.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Parent of `raw_data/`, `processed_data/`, `visualizations/` and `data/`.
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,
    /// Annualization basis.
    #[serde(default = "default_days_per_year")]
    pub days_per_year: f64,
    /// Trading calendar the backfill walks.
    #[serde(default)]
    pub calendar: CalendarKind,
    /// IANA zone used for "today".
    #[serde(default = "default_exchange_tz")]
    pub exchange_tz: String,
    /// Depth of generated spreads when a commodity lists none.
    #[serde(default = "default_max_months_forward")]
    pub max_months_forward: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            days_per_year: DEFAULT_DAYS_PER_YEAR,
            calendar: CalendarKind::default(),
            exchange_tz: default_exchange_tz(),
            max_months_forward: DEFAULT_MAX_MONTHS_FORWARD,
        }
    }
}

fn default_data_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_days_per_year() -> f64 {
    DEFAULT_DAYS_PER_YEAR
}

fn default_exchange_tz() -> String {
    DEFAULT_EXCHANGE_TZ.to_string()
}

fn default_max_months_forward() -> usize {
    DEFAULT_MAX_MONTHS_FORWARD
}

fn default_months() -> String {
    MONTH_CODES.to_string()
}

fn default_yellow_key() -> String {
    DEFAULT_YELLOW_KEY.to_string()
}

/// One `[commodities.<ROOT>]` table.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CommodityCfg {
    /// Display name.
    pub name: String,
    /// Listed month letters, e.g. `"FGHJKMNQUVXZ"` or `"HKNUZ"`.
    #[serde(default = "default_months")]
    pub months: String,
    /// Terminal market sector.
    #[serde(default = "default_yellow_key")]
    pub yellow_key: String,
    /// Key into `[rates]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_source: Option<String>,
    /// Roll this many calendar days before last trade when a contract has no explicit roll.
    #[serde(default)]
    pub roll_offset_days: u32,
    /// Spreads to compute; empty means `(1, k)` for `k in 2..=max_months_forward`.
    #[serde(default)]
    pub spreads: Vec<SpreadDef>,
    /// Roll table.
    #[serde(default)]
    pub contracts: Vec<ContractCfg>,
}

/// One `[[commodities.<ROOT>.contracts]]` entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ContractCfg {
    /// Month letter.
    pub month: String,
    /// Four-digit year.
    pub year: i32,
    /// Last trade date; when absent, taken from stored reference data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_trade: Option<NaiveDate>,
    /// Explicit roll date; defaults to `last_trade - roll_offset_days`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roll: Option<NaiveDate>,
}

impl ContractCfg {
    /// Contract code under `root`, if the month letter is valid.
    pub fn code(&self, root: &str) -> Option<ContractCode> {
        let mut chars = self.month.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => ContractMonth::from_code(c)
                .ok()
                .map(|m| ContractCode::new(root, m, self.year)),
            _ => None,
        }
    }
}

/// Summary of changes performed during normalization.
///
/// All counters are additive over the processed config.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizationReport {
    /// Commodity keys that changed when upper-casing/trimming.
    pub roots_renamed: usize,
    /// Month letters removed as duplicates.
    pub months_deduped: usize,
    /// Duplicate spread pairs removed.
    pub spreads_deduped: usize,
    /// Commodities whose contract list had to be sorted.
    pub contracts_reordered: usize,
}

fn month_sort_key(letter: &str) -> u32 {
    let mut chars = letter.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => ContractMonth::from_code(c).map(ContractMonth::number).unwrap_or(13),
        _ => 13,
    }
}

/// Normalize a config in place.
///
/// What normalization does:
/// - Upper-case + trim commodity keys; reject empty or duplicate roots
/// - Upper-case month cycles, drop separators and duplicates, order by calendar month
/// - Upper-case + trim contract month letters; sort contracts by (year, month)
/// - Drop duplicate spread pairs, keeping the first occurrence
/// - Trim `rate_source`; a blank one means "no rate source"
///
/// Errors:
/// - Empty or duplicate roots after normalization
/// - Unknown month letters in a cycle
pub fn normalize_config(cfg: &mut PipelineConfig) -> Result<NormalizationReport, ConfigError> {
    let mut report = NormalizationReport::default();

    let mut rebuilt: IndexMap<String, CommodityCfg> = IndexMap::new();
    let old = mem::take(&mut cfg.commodities);

    for (raw_root, mut c) in old {
        let root = raw_root.trim().to_uppercase();
        if root.is_empty() {
            return Err(ConfigError::EmptyRoot);
        }
        if root != raw_root {
            report.roots_renamed += 1;
        }
        if rebuilt.contains_key(&root) {
            return Err(ConfigError::DuplicateRoot(root));
        }

        // --- month cycle
        let mut seen = HashSet::new();
        let mut cycle = Vec::new();
        for ch in c.months.chars().filter(|ch| !ch.is_whitespace() && *ch != ',') {
            let month = ContractMonth::from_code(ch.to_ascii_uppercase()).map_err(|_| {
                ConfigError::UnknownMonth {
                    root: root.clone(),
                    letter: ch.to_string(),
                }
            })?;
            if seen.insert(month) {
                cycle.push(month);
            } else {
                report.months_deduped += 1;
            }
        }
        cycle.sort();
        c.months = cycle.iter().map(|m| m.code()).collect();

        // --- spreads (dedupe, preserve order)
        let before = c.spreads.len();
        let mut seen_pairs = HashSet::new();
        c.spreads.retain(|s| seen_pairs.insert(*s));
        report.spreads_deduped += before - c.spreads.len();

        // --- contracts
        for k in &mut c.contracts {
            k.month = k.month.trim().to_uppercase();
        }
        let sorted = c
            .contracts
            .windows(2)
            .all(|w| (w[0].year, month_sort_key(&w[0].month)) <= (w[1].year, month_sort_key(&w[1].month)));
        if !sorted {
            c.contracts
                .sort_by_key(|k| (k.year, month_sort_key(&k.month)));
            report.contracts_reordered += 1;
        }

        c.name = c.name.trim().to_string();
        c.yellow_key = c.yellow_key.trim().to_string();
        c.rate_source = c
            .rate_source
            .take()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        rebuilt.insert(root, c);
    }

    cfg.commodities = rebuilt;
    Ok(report)
}

/// A normalized and validated configuration, ready to drive a run.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Settings with `data_root` already anchored.
    pub settings: Settings,
    /// Parsed exchange zone.
    pub exchange_tz: Tz,
    /// Price source.
    pub source: SourceSettings,
    /// Interest-rate sources by name.
    pub rates: IndexMap<String, RateSettings>,
    /// Immutable commodity metadata, in file order.
    pub commodities: IndexMap<String, Commodity>,
    /// What normalization changed.
    pub report: NormalizationReport,
}

impl LoadedConfig {
    /// Metadata for `root` (case-insensitive).
    pub fn commodity(&self, root: &str) -> Result<&Commodity, ConfigError> {
        let key = root.trim().to_uppercase();
        self.commodities
            .get(&key)
            .ok_or(ConfigError::UnknownCommodity(key))
    }

    /// Commodities named on the command line, or all of them.
    pub fn select(&self, roots: &[String]) -> Result<Vec<&Commodity>, ConfigError> {
        if roots.is_empty() {
            return Ok(self.commodities.values().collect());
        }
        roots.iter().map(|r| self.commodity(r)).collect()
    }

    /// Builds the rate source for a commodity. Relative file paths resolve
    /// against `data_root`.
    pub fn rate_source_for(&self, commodity: &Commodity) -> Result<Box<dyn RateSource>, RateError> {
        match commodity
            .rate_source
            .as_deref()
            .and_then(|name| self.rates.get(name))
        {
            Some(settings) => settings.build(&self.settings.data_root),
            None => Ok(Box::new(NoRateSource)),
        }
    }
}

impl PipelineConfig {
    /// Fills contracts without a `last_trade` from the reference data in
    /// `store`. Returns how many were filled.
    pub fn fill_last_trades(&mut self, store: &PriceStore) -> Result<usize, ConfigError> {
        let mut filled = 0;
        for (root, cfg) in &mut self.commodities {
            if cfg.contracts.iter().all(|k| k.last_trade.is_some()) {
                continue;
            }
            let details = store.load_details(root).map_err(ConfigError::Details)?;
            for k in cfg.contracts.iter_mut().filter(|k| k.last_trade.is_none()) {
                let stored = k
                    .code(root)
                    .and_then(|code| details.get(&code))
                    .and_then(|d| d.last_trade);
                if stored.is_some() {
                    k.last_trade = stored;
                    filled += 1;
                }
            }
        }
        if filled > 0 {
            debug!(filled, "last trade dates taken from reference data");
        }
        Ok(filled)
    }

    /// Validates a normalized config and builds the immutable metadata.
    pub fn validate(self, report: NormalizationReport) -> Result<LoadedConfig, ConfigError> {
        let s = &self.settings;
        if !(s.days_per_year.is_finite() && s.days_per_year > 0.0) {
            return Err(ConfigError::InvalidSetting(format!(
                "days_per_year must be > 0, got {}",
                s.days_per_year
            )));
        }
        if s.max_months_forward < 2 {
            return Err(ConfigError::InvalidSetting(format!(
                "max_months_forward must be >= 2, got {}",
                s.max_months_forward
            )));
        }
        let exchange_tz = parse_tz(&s.exchange_tz)?;
        self.source.validate().map_err(ConfigError::InvalidSource)?;

        for (name, rate) in &self.rates {
            rate.validate().map_err(|message| ConfigError::InvalidRate {
                name: name.clone(),
                message,
            })?;
        }

        let mut commodities = IndexMap::with_capacity(self.commodities.len());
        for (root, cfg) in &self.commodities {
            let commodity = build_commodity(root, cfg, s.max_months_forward, &self.rates)?;
            debug!(
                commodity = %root,
                contracts = commodity.contracts.len(),
                spreads = commodity.spreads.len(),
                "commodity validated"
            );
            commodities.insert(root.clone(), commodity);
        }

        Ok(LoadedConfig {
            settings: self.settings,
            exchange_tz,
            source: self.source,
            rates: self.rates,
            commodities,
            report,
        })
    }
}

fn build_commodity(
    root: &str,
    cfg: &CommodityCfg,
    max_months_forward: usize,
    rates: &IndexMap<String, RateSettings>,
) -> Result<Commodity, ConfigError> {
    let months: Vec<ContractMonth> = cfg
        .months
        .chars()
        .map(ContractMonth::from_code)
        .collect::<Result<_, _>>()
        .map_err(|_| ConfigError::UnknownMonth {
            root: root.to_string(),
            letter: cfg.months.clone(),
        })?;
    if months.is_empty() {
        return Err(ConfigError::InvalidSetting(format!(
            "{root}: months cannot be empty"
        )));
    }
    if cfg.contracts.is_empty() {
        return Err(ConfigError::NoContracts(root.to_string()));
    }

    let mut contracts: Vec<Contract> = Vec::with_capacity(cfg.contracts.len());
    for k in &cfg.contracts {
        let code = k.code(root).ok_or_else(|| ConfigError::UnknownMonth {
            root: root.to_string(),
            letter: k.month.clone(),
        })?;
        validate_code_year(k.year).map_err(|source| ConfigError::ContractCode {
            root: root.to_string(),
            source,
        })?;
        let last_trade = k.last_trade.ok_or_else(|| ConfigError::MissingLastTrade {
            code: code.to_string(),
        })?;

        if !months.contains(&code.month) {
            return Err(ConfigError::MonthOutsideCycle {
                root: root.to_string(),
                code: code.to_string(),
            });
        }

        let roll = match k.roll {
            Some(r) => r,
            None => last_trade
                .checked_sub_days(Days::new(u64::from(cfg.roll_offset_days)))
                .ok_or_else(|| {
                    ConfigError::InvalidSetting(format!("{code}: roll_offset_days out of range"))
                })?,
        };
        if roll > last_trade {
            return Err(ConfigError::RollAfterLastTrade {
                code: code.to_string(),
                roll,
                last_trade,
            });
        }

        if let Some(prev) = contracts.last() {
            if prev.code == code {
                return Err(ConfigError::DuplicateContract(code.to_string()));
            }
            let expected = next_in_cycle(&prev.code, &months);
            if expected != code {
                return Err(ConfigError::MissingMonth {
                    root: root.to_string(),
                    after: prev.code.to_string(),
                    expected: expected.to_string(),
                    found: code.to_string(),
                });
            }
            if last_trade <= prev.last_trade {
                return Err(ConfigError::LastTradeNotIncreasing {
                    code: code.to_string(),
                    last_trade,
                    previous: prev.code.to_string(),
                });
            }
            if roll <= prev.roll {
                return Err(ConfigError::AmbiguousRoll {
                    code: code.to_string(),
                    roll,
                    previous: prev.code.to_string(),
                });
            }
        }

        contracts.push(Contract {
            code,
            last_trade,
            roll,
        });
    }

    let spreads = if cfg.spreads.is_empty() {
        SpreadDef::defaults(max_months_forward)
    } else {
        cfg.spreads.clone()
    };
    for s in &spreads {
        if s.near < 1 || s.near >= s.far {
            return Err(ConfigError::InvalidSpread {
                root: root.to_string(),
                near: s.near,
                far: s.far,
            });
        }
    }

    if let Some(name) = &cfg.rate_source {
        if !rates.contains_key(name) {
            return Err(ConfigError::UnknownRateSource {
                root: root.to_string(),
                name: name.clone(),
            });
        }
    }

    Ok(Commodity {
        root: root.to_string(),
        name: cfg.name.clone(),
        months,
        yellow_key: cfg.yellow_key.clone(),
        rate_source: cfg.rate_source.clone(),
        contracts,
        spreads,
    })
}

/// The contract the cycle lists right after `code`.
fn next_in_cycle(code: &ContractCode, cycle: &[ContractMonth]) -> ContractCode {
    match cycle.iter().position(|m| *m > code.month) {
        Some(i) => ContractCode::new(code.root.clone(), cycle[i], code.year),
        None => ContractCode::new(code.root.clone(), cycle[0], code.year + 1),
    }
}

/// Parse, normalize and validate a config from a TOML string.
///
/// Errors:
/// - TOML parse failures
/// - Normalization and validation errors (see [`normalize_config`])
pub fn load_config_str(toml_str: &str) -> Result<LoadedConfig, ConfigError> {
    let mut cfg: PipelineConfig = toml::from_str(toml_str)?;
    let report = normalize_config(&mut cfg)?;
    debug!(?report, "config normalized");
    cfg.validate(report)
}

/// Read and normalize a config file without validating it.
///
/// A relative `data_root` is anchored at the config file's directory.
pub fn read_config_path(
    path: impl AsRef<Path>,
) -> Result<(PipelineConfig, NormalizationReport), ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut cfg: PipelineConfig = toml::from_str(&text)?;
    let report = normalize_config(&mut cfg)?;
    if cfg.settings.data_root.is_relative() {
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        cfg.settings.data_root = base.join(&cfg.settings.data_root);
    }
    Ok((cfg, report))
}

/// Read a config file from disk, fill missing last trade dates from the
/// stored reference data, then validate as [`load_config_str`] does.
pub fn load_config_path(path: impl AsRef<Path>) -> Result<LoadedConfig, ConfigError> {
    let (mut cfg, report) = read_config_path(path)?;
    debug!(?report, "config normalized");
    cfg.fill_last_trades(&PriceStore::new(&cfg.settings.data_root))?;
    cfg.validate(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSY: &str = r#"
        [settings]
        days_per_year = 251

        [rates.usd]
        kind = "fixed"
        rate = 0.05

        [commodities." cl "]
        name = " WTI Crude "
        months = "z, f g f"
        rate_source = "usd"
        spreads = [{ near = 1, far = 2 }, { near = 1, far = 2 }, { near = 1, far = 3 }]

        [[commodities." cl ".contracts]]
        month = "g"
        year = 2023
        last_trade = "2023-01-20"

        [[commodities." cl ".contracts]]
        month = "F"
        year = 2023
        last_trade = "2022-12-19"
        roll = "2022-12-15"

        [[commodities." cl ".contracts]]
        month = "Z"
        year = 2022
        last_trade = "2022-11-18"
    "#;

    #[test]
    fn normalizes_roots_cycles_and_contract_order() {
        let loaded = load_config_str(MESSY).unwrap();

        let (root, cl) = loaded.commodities.first().unwrap();
        assert_eq!(root, "CL");
        assert_eq!(cl.name, "WTI Crude");
        assert_eq!(
            cl.months,
            vec![ContractMonth::F, ContractMonth::G, ContractMonth::Z]
        );
        let codes: Vec<String> = cl.contracts.iter().map(|c| c.code.to_string()).collect();
        assert_eq!(codes, vec!["CLZ22", "CLF23", "CLG23"]);
        // explicit roll kept, missing roll defaults to last trade
        assert_eq!(cl.contracts[1].roll.to_string(), "2022-12-15");
        assert_eq!(cl.contracts[2].roll, cl.contracts[2].last_trade);
        assert_eq!(cl.spreads, vec![SpreadDef::new(1, 2), SpreadDef::new(1, 3)]);
        assert_eq!(loaded.settings.days_per_year, 251.0);
    }

    #[test]
    fn snapshot_normalization_report() {
        let loaded = load_config_str(MESSY).unwrap();
        insta::assert_json_snapshot!(loaded.report, @r#"
        {
          "roots_renamed": 1,
          "months_deduped": 1,
          "spreads_deduped": 1,
          "contracts_reordered": 1
        }
        "#);
    }

    #[test]
    fn duplicate_root_collision_errors() {
        let toml_str = r#"
            [commodities.cl]
            name = "a"
            [commodities.CL]
            name = "b"
        "#;
        let mut cfg: PipelineConfig = toml::from_str(toml_str).unwrap();
        let err = normalize_config(&mut cfg).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRoot(ref r) if r == "CL"));
    }

    #[test]
    fn empty_spreads_expand_to_defaults() {
        let toml_str = r#"
            [settings]
            max_months_forward = 4

            [commodities.NG]
            name = "Natural Gas"
            [[commodities.NG.contracts]]
            month = "F"
            year = 2024
            last_trade = "2023-12-27"
        "#;
        let loaded = load_config_str(toml_str).unwrap();
        let labels: Vec<String> = loaded.commodity("ng").unwrap().spreads.iter().map(SpreadDef::label).collect();
        assert_eq!(labels, vec!["spread_1_2m", "spread_1_3m", "spread_1_4m"]);
    }

    const UNDATED: &str = r#"
        [settings]
        data_root = "store"

        [commodities.CL]
        name = "WTI"

        [[commodities.CL.contracts]]
        month = "G"
        year = 2023
        last_trade = "2023-01-20"

        [[commodities.CL.contracts]]
        month = "H"
        year = 2023
    "#;

    #[test]
    fn missing_last_trade_without_reference_data_is_an_error() {
        let err = load_config_str(UNDATED).unwrap_err();
        assert!(matches!(err, ConfigError::MissingLastTrade { ref code } if code == "CLH23"));
    }

    #[test]
    fn stored_reference_data_fills_missing_last_trade() {
        use futures_ingestor::models::reference::ContractDetails;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spreads.toml");
        std::fs::write(&path, UNDATED).unwrap();
        let store = PriceStore::new(dir.path().join("store"));
        let lt = |m, d| NaiveDate::from_ymd_opt(2023, m, d).unwrap();
        store
            .merge_details(&[
                // the configured date wins over this one
                ContractDetails::new("CLG23".parse().unwrap()).with_last_trade(lt(1, 19)),
                ContractDetails::new("CLH23".parse().unwrap()).with_last_trade(lt(2, 21)),
            ])
            .unwrap();

        let loaded = load_config_path(&path).unwrap();
        let cl = loaded.commodity("CL").unwrap();
        assert_eq!(cl.contracts[0].last_trade, lt(1, 20));
        assert_eq!(cl.contracts[1].last_trade, lt(2, 21));

        let (unvalidated, _) = read_config_path(&path).unwrap();
        assert_eq!(unvalidated.settings.data_root, dir.path().join("store"));
        assert_eq!(unvalidated.commodities["CL"].contracts[1].last_trade, None);
    }

    #[test]
    fn next_in_cycle_wraps_year() {
        let cycle = [ContractMonth::H, ContractMonth::Z];
        let z: ContractCode = "SIZ23".parse().unwrap();
        assert_eq!(next_in_cycle(&z, &cycle).to_string(), "SIH24");
        let h: ContractCode = "SIH24".parse().unwrap();
        assert_eq!(next_in_cycle(&h, &cycle).to_string(), "SIZ24");
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn roots_uppercased_and_unique(
            names in proptest::collection::vec("[a-zA-Z]{1,3}", 1..5),
        ) {
            let mut cfg: PipelineConfig = toml::from_str("").unwrap();
            for (i, n) in names.iter().enumerate() {
                let key = if i % 2 == 0 { n.to_lowercase() } else { format!("  {n} ") };
                cfg.commodities.insert(key, CommodityCfg {
                    name: "X".into(),
                    months: "FG".into(),
                    yellow_key: "Comdty".into(),
                    rate_source: None,
                    roll_offset_days: 0,
                    spreads: vec![],
                    contracts: vec![],
                });
            }

            if normalize_config(&mut cfg).is_ok() {
                prop_assert!(cfg.commodities.keys().all(|k| k.chars().all(|c| !c.is_lowercase())));
                prop_assert!(cfg.commodities.keys().all(|k| k.trim() == k));
            }
        }
    }
}
