mod common;

use std::fs;

use chrono::NaiveDate;
use common::{CL_CONFIG, DownSource, RejectingSource, ScriptedSource, d, write_fixture, write_rates};
use futures_ingestor::io::price_store::PriceStore;
use spread_sync::{
    backfill::{BackfillOptions, run_backfill},
    config::{load_config_path, read_config_path},
    contracts::sync_contracts,
    error::{ConfigError, SpreadError},
    store::{GapKind, SpreadStore, Variant},
};

const LABEL: &str = "spread_1_2m";

fn week() -> BackfillOptions {
    // Mon 9th .. Fri 13th
    BackfillOptions {
        start: d(1, 9),
        end: d(1, 13),
        dry_run: false,
    }
}

/// G23 quotes every day; H23 has no quote on the 12th.
fn source() -> ScriptedSource {
    ScriptedSource::default()
        .with("CLG23", &[9, 10, 11, 12, 13].map(|day| (d(1, day), 70.0)))
        .with("CLH23", &[9, 10, 11, 13].map(|day| (d(1, day), 71.5)))
}

fn all_rates_but_11th() -> Vec<(chrono::NaiveDate, f64)> {
    [9, 10, 12, 13].map(|day| (d(1, day), 0.05)).to_vec()
}

fn read_tables(dir: &std::path::Path) -> Vec<String> {
    Variant::ALL
        .iter()
        .map(|v| fs::read_to_string(dir.join("processed_data/CL").join(v.file_name())).unwrap())
        .collect()
}

#[test]
fn computes_the_worked_example() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config_path(write_fixture(dir.path(), &all_rates_but_11th())).unwrap();
    let cl = config.commodity("CL").unwrap();
    let src = source();

    let report = run_backfill(&config, &src, cl, &week()).unwrap();
    assert!(!report.is_noop());

    let tables = SpreadStore::new(dir.path()).load_tables("CL").unwrap();
    let get = |v| tables.get(v, LABEL, d(1, 10)).unwrap();
    assert!((get(Variant::Dollar) - 1.5).abs() < 1e-9);
    assert!((get(Variant::Percent) - 0.021_428_571).abs() < 1e-6);
    assert!((get(Variant::Annual) - 0.260_714_286).abs() < 1e-6);
    assert!((get(Variant::RateAdjusted) - 0.210_714_286).abs() < 1e-6);

    // both legs miss the same span, so they share one request
    let calls = src.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].contracts.len(), 2);
    assert_eq!((calls[0].start, calls[0].end), (d(1, 9), d(1, 13)));
    assert_eq!(report.new_prices, 9);
}

#[test]
fn missing_rate_only_drops_the_adjusted_variant() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config_path(write_fixture(dir.path(), &all_rates_but_11th())).unwrap();
    let report = run_backfill(&config, &source(), config.commodity("CL").unwrap(), &week()).unwrap();

    let tables = SpreadStore::new(dir.path()).load_tables("CL").unwrap();
    for v in [Variant::Dollar, Variant::Percent, Variant::Annual] {
        assert!(tables.get(v, LABEL, d(1, 11)).is_some(), "{v} on the 11th");
    }
    assert!(tables.get(Variant::RateAdjusted, LABEL, d(1, 11)).is_none());

    // the 12th has no far quote: nothing stored at all
    for v in Variant::ALL {
        assert!(tables.get(v, LABEL, d(1, 12)).is_none());
    }

    let kinds: Vec<_> = report.gaps.iter().map(|g| (g.date, g.kind)).collect();
    assert_eq!(
        kinds,
        vec![(d(1, 11), GapKind::MissingRate), (d(1, 12), GapKind::NoData)]
    );
    assert!(report.gaps[1].detail.contains("CLH23"));
    // 4 dates x 3 variants + 3 rate-adjusted
    assert_eq!(report.values_written(), 15);

    let info = SpreadStore::new(dir.path()).load_info("CL").unwrap().unwrap();
    assert_eq!(info.gaps.len(), 2);
    assert_eq!(info.roll_dates["CLG23"], d(1, 17));
    assert_eq!(info.spread_counts[&Variant::RateAdjusted], 1);
}

#[test]
fn rerun_is_idempotent_and_only_retries_gaps() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config_path(write_fixture(dir.path(), &all_rates_but_11th())).unwrap();
    let cl = config.commodity("CL").unwrap();

    run_backfill(&config, &source(), cl, &week()).unwrap();
    let first = read_tables(dir.path());

    let src = source();
    let second = run_backfill(&config, &src, cl, &week()).unwrap();
    assert_eq!(read_tables(dir.path()), first);
    assert_eq!(second.values_written(), 0);
    assert_eq!(second.already_complete, 3);
    assert_eq!(second.planned_rate[LABEL], 1);
    assert_eq!(second.planned_compute[LABEL], 1);
    // only the far leg still lacks the 12th
    let calls = src.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].contracts.len(), 1);
    assert_eq!(calls[0].contracts[0].to_string(), "CLH23");
    assert_eq!((calls[0].start, calls[0].end), (d(1, 12), d(1, 12)));

    // the rate for the 11th arrives later
    write_rates(dir.path(), &[(d(1, 11), 0.04)]);
    let third = run_backfill(&config, &source(), cl, &week()).unwrap();
    assert_eq!(third.written[LABEL], 1);
    let tables = SpreadStore::new(dir.path()).load_tables("CL").unwrap();
    let annual = tables.get(Variant::Annual, LABEL, d(1, 11)).unwrap();
    let adjusted = tables.get(Variant::RateAdjusted, LABEL, d(1, 11)).unwrap();
    assert!((annual - 0.04 - adjusted).abs() < 1e-12);
    // earlier values untouched
    assert_eq!(read_tables(dir.path())[0], first[0]);
}

#[test]
fn dry_run_fetches_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config_path(write_fixture(dir.path(), &[])).unwrap();
    let src = source();
    let opts = BackfillOptions {
        dry_run: true,
        ..week()
    };

    let report = run_backfill(&config, &src, config.commodity("CL").unwrap(), &opts).unwrap();
    assert!(report.dry_run);
    assert_eq!(report.fetches.len(), 1);
    assert_eq!(report.planned_compute[LABEL], 5);
    assert!(report.to_string().contains("(dry run)"));
    assert!(src.calls().is_empty());
    assert!(!dir.path().join("processed_data").exists());
    assert!(!dir.path().join("raw_data").exists());
}

#[test]
fn unavailable_source_aborts_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config_path(write_fixture(dir.path(), &[])).unwrap();
    let err = run_backfill(&config, &DownSource, config.commodity("CL").unwrap(), &week()).unwrap_err();
    assert!(matches!(err, SpreadError::SourceUnavailable(_)));
    assert!(!err.is_per_date());
    assert!(!dir.path().join("processed_data").exists());
}

#[test]
fn range_past_the_roll_table_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config_path(write_fixture(dir.path(), &[])).unwrap();
    let src = source();
    let opts = BackfillOptions {
        start: d(1, 9),
        end: d(3, 20),
        dry_run: false,
    };
    let err = run_backfill(&config, &src, config.commodity("CL").unwrap(), &opts).unwrap_err();
    assert!(matches!(
        err,
        SpreadError::Config(ConfigError::InsufficientDepth { .. })
    ));
    assert!(src.calls().is_empty());
}

#[test]
fn default_range_is_one_year_back_from_today() {
    let opts = BackfillOptions::new(None, None, d(6, 30), false);
    assert_eq!(opts.end, d(6, 30));
    assert_eq!(opts.start, chrono::NaiveDate::from_ymd_opt(2022, 6, 30).unwrap());
    let opts = BackfillOptions::new(Some(d(1, 2)), Some(d(1, 5)), d(6, 30), true);
    assert_eq!((opts.start, opts.end, opts.dry_run), (d(1, 2), d(1, 5), true));
}

#[test]
fn refused_request_becomes_a_gap_and_the_rest_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config_path(write_fixture(dir.path(), &[])).unwrap();
    // across the G roll: G/H on the 16th and 17th, H/J on the 18th, so each
    // leg misses a different span and gets its own request
    let src = RejectingSource {
        inner: ScriptedSource::default()
            .with("CLG23", &[(d(1, 16), 70.0), (d(1, 17), 70.2)])
            .with("CLH23", &[16, 17, 18].map(|day| (d(1, day), 71.5)))
            .with("CLJ23", &[(d(1, 18), 72.0)]),
        refused: "CLJ23",
        message: "Unknown security",
    };
    let opts = BackfillOptions {
        start: d(1, 16),
        end: d(1, 18),
        dry_run: false,
    };

    let report = run_backfill(&config, &src, config.commodity("CL").unwrap(), &opts).unwrap();
    assert_eq!(src.inner.calls().len(), 3);

    let tables = SpreadStore::new(dir.path()).load_tables("CL").unwrap();
    assert!(tables.get(Variant::Dollar, LABEL, d(1, 16)).is_some());
    assert!(tables.get(Variant::Dollar, LABEL, d(1, 17)).is_some());
    assert!(tables.get(Variant::Dollar, LABEL, d(1, 18)).is_none());

    let no_data: Vec<_> = report.gaps.iter().filter(|g| g.kind == GapKind::NoData).collect();
    assert_eq!(no_data.len(), 1);
    assert_eq!(no_data[0].date, d(1, 18));
    assert!(no_data[0].detail.contains("CLJ23"), "{}", no_data[0].detail);
    assert!(no_data[0].detail.contains("Unknown security"), "{}", no_data[0].detail);

    let info = SpreadStore::new(dir.path()).load_info("CL").unwrap().unwrap();
    assert!(info.gaps.iter().any(|g| g.detail.contains("Unknown security")));
}

#[test]
fn contract_refused_inside_a_request_keeps_its_message() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config_path(write_fixture(dir.path(), &all_rates_but_11th())).unwrap();
    let src = ScriptedSource::default()
        .with("CLG23", &[9, 10, 11, 12, 13].map(|day| (d(1, day), 70.0)))
        .with_rejection("CLH23", "No entitlement");

    let report = run_backfill(&config, &src, config.commodity("CL").unwrap(), &week()).unwrap();
    assert_eq!(report.values_written(), 0);
    // the near leg still landed in the raw store
    assert_eq!(report.new_prices, 5);
    assert_eq!(report.gaps.len(), 5);
    assert!(report.gaps.iter().all(|g| g.detail == "CLH23: No entitlement"));
}

#[test]
fn curve_is_stored_for_every_trading_day() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config_path(write_fixture(dir.path(), &all_rates_but_11th())).unwrap();
    let report = run_backfill(&config, &source(), config.commodity("CL").unwrap(), &week()).unwrap();
    assert_eq!(report.curve_updates, 5);

    let curve = SpreadStore::new(dir.path()).load_curve("CL").unwrap();
    assert_eq!(curve.len(), 5);
    let slots = curve.slots(d(1, 9)).unwrap();
    assert_eq!(slots[0].contract.to_string(), "CLG23");
    assert_eq!(slots[0].price, Some(70.0));
    assert_eq!(slots[1].contract.to_string(), "CLH23");
    // 20 Jan and 19 Feb last trades
    assert_eq!(curve.days_to_expiry(d(1, 9)), Some(&[11, 41][..]));
    assert_eq!(curve.slots(d(1, 12)).unwrap()[1].price, None);
}

const CL_1970: &str = r#"
[settings]
data_root = "."

[commodities.CL]
name = "WTI Crude Oil"
spreads = [{ near = 1, far = 2 }]

[[commodities.CL.contracts]]
month = "G"
year = 1970
last_trade = "1970-01-20"
roll = "1970-01-17"

[[commodities.CL.contracts]]
month = "H"
year = 1970
last_trade = "1970-02-19"
roll = "1970-02-14"
"#;

fn ymd(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[test]
fn dates_before_1970_are_computed_like_any_other() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("spreads.toml");
    fs::write(&path, CL_1970).unwrap();
    let config = load_config_path(&path).unwrap();

    let quoted = [ymd(1969, 12, 30), ymd(1969, 12, 31), ymd(1970, 1, 2)];
    let src = ScriptedSource::default()
        .with("CLG70", &quoted.map(|day| (day, 3.35)))
        .with("CLH70", &quoted.map(|day| (day, 3.40)));
    let opts = BackfillOptions {
        start: ymd(1969, 12, 30),
        end: ymd(1970, 1, 2),
        dry_run: false,
    };

    let report = run_backfill(&config, &src, config.commodity("CL").unwrap(), &opts).unwrap();
    assert_eq!(report.planned_compute[LABEL], 4);
    let calls = src.calls();
    assert_eq!((calls[0].start, calls[0].end), (ymd(1969, 12, 30), ymd(1970, 1, 2)));

    let tables = SpreadStore::new(dir.path()).load_tables("CL").unwrap();
    for day in quoted {
        assert!(tables.get(Variant::Dollar, LABEL, day).is_some(), "{day}");
    }
    let no_data: Vec<_> = report
        .gaps
        .iter()
        .filter(|g| g.kind == GapKind::NoData)
        .map(|g| g.date)
        .collect();
    assert_eq!(no_data, vec![ymd(1970, 1, 1)]);
}

#[test]
fn start_before_the_storable_range_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config_path(write_fixture(dir.path(), &[])).unwrap();
    let src = source();
    let opts = BackfillOptions {
        start: ymd(1899, 12, 29),
        end: d(1, 13),
        dry_run: true,
    };
    let err = run_backfill(&config, &src, config.commodity("CL").unwrap(), &opts).unwrap_err();
    assert!(matches!(err, SpreadError::Config(ConfigError::InvalidSetting(ref m)) if m.contains("1900-01-01")));
    assert!(src.calls().is_empty());
}

#[test]
fn synced_last_trade_dates_complete_the_roll_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path(), &all_rates_but_11th());
    fs::write(&path, CL_CONFIG.replace("last_trade = \"2023-04-20\"\n", "")).unwrap();
    assert!(matches!(
        load_config_path(&path),
        Err(ConfigError::MissingLastTrade { ref code }) if code == "CLK23"
    ));

    let (cfg, _) = read_config_path(&path).unwrap();
    let src = source().with_last_trade("CLK23", d(4, 20));
    let synced = sync_contracts(&cfg, &[], &src, &PriceStore::new(dir.path())).unwrap();
    assert_eq!(synced[0].updated, 1);
    assert!(synced[0].still_missing.is_empty());
    assert_eq!(src.detail_calls(), vec![vec!["CLK23".parse().unwrap()]]);

    let config = load_config_path(&path).unwrap();
    let cl = config.commodity("CL").unwrap();
    assert_eq!(cl.contracts[3].last_trade, d(4, 20));
    let report = run_backfill(&config, &src, cl, &week()).unwrap();
    assert_eq!(report.values_written(), 15);
}
