//! Incremental, idempotent spread backfill.
//!
//! ## What this does
//! - Walks the trading days of a range and decides, for every configured
//!   spread, whether the stored tables already hold all four variants
//!   ([`Step::Skip`]), only lack the rate-adjusted value ([`Step::RetryRate`]),
//!   or need computing ([`Step::Compute`]).
//! - Fetches the raw prices the compute cursors need and the raw store lacks,
//!   one request per group of contracts sharing a missing span.
//! - Appends results to `processed_data/<ROOT>/`, keeps the resolved curve
//!   (`monthly_futures.json`, `days_to_expiry.json`) and records the run's gaps
//!   in `spread_info.json`.
//!
//! ## Failure model
//! Planning resolves every date first, so a roll table that does not cover the
//! range is a [`ConfigError`](crate::error::ConfigError) before anything is
//! fetched or written, and so is a range starting before the day-id
//! [`EPOCH`]. An unreachable source aborts the run. A contract the source
//! refuses, dates without a quote and dates without a rate become gaps;
//! re-running the same range retries exactly those.
//!
//! ## Dry-run
//! With [`BackfillOptions::dry_run`] the report describes the plan and nothing
//! is fetched or written.

mod driver;
mod plan;
mod report;

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate, Utc};
use futures_ingestor::{
    io::price_store::PriceStore,
    models::{contract::ContractCode, price_series::PriceSeries, request_params::DEFAULT_PRICE_FIELD},
    providers::{PriceSource, SourceSettings},
};
use tracing::info;

pub use plan::{Cursor, CursorPlan, CurvePoint, FetchSpan, Step, plan_cursors, plan_fetches};
pub use report::BackfillReport;

use crate::{
    calendar::EPOCH,
    config::LoadedConfig,
    coverage::Coverage,
    error::{ConfigError, SpreadError},
    models::Commodity,
    store::{CurveSlot, CurveTable, DateRange, SpreadInfo, SpreadStore, Variant},
};

/// Lookback used when no start date is given.
pub const DEFAULT_LOOKBACK_DAYS: u64 = 365;

/// Range and mode of one backfill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillOptions {
    /// First date (inclusive).
    pub start: NaiveDate,
    /// Last date (inclusive).
    pub end: NaiveDate,
    /// Report the plan only.
    pub dry_run: bool,
}

impl BackfillOptions {
    /// Fills in defaults: `end` is `today`, `start` is
    /// [`DEFAULT_LOOKBACK_DAYS`] before `end`.
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>, today: NaiveDate, dry_run: bool) -> Self {
        let end = end.unwrap_or(today);
        let start = start.unwrap_or_else(|| {
            end.checked_sub_days(Days::new(DEFAULT_LOOKBACK_DAYS))
                .unwrap_or(end)
        });
        Self { start, end, dry_run }
    }
}

/// Runs backfills against one configuration and price source.
pub struct Backfill<'a> {
    config: &'a LoadedConfig,
    source: &'a dyn PriceSource,
    prices: PriceStore,
    spreads: SpreadStore,
}

impl<'a> Backfill<'a> {
    /// Stores live under the config's `data_root`.
    pub fn new(config: &'a LoadedConfig, source: &'a dyn PriceSource) -> Self {
        Self {
            config,
            source,
            prices: PriceStore::new(&config.settings.data_root),
            spreads: SpreadStore::new(&config.settings.data_root),
        }
    }

    /// Backfills one commodity over `opts`.
    pub fn run(&self, commodity: &Commodity, opts: &BackfillOptions) -> Result<BackfillReport, SpreadError> {
        if opts.start > opts.end {
            return Err(ConfigError::InvalidSetting(format!(
                "backfill start {} is after end {}",
                opts.start, opts.end
            ))
            .into());
        }
        if opts.start < EPOCH {
            return Err(ConfigError::InvalidSetting(format!(
                "backfill start {} is before {EPOCH}, the earliest storable date",
                opts.start
            ))
            .into());
        }
        let root = commodity.root.as_str();
        let settings = &self.config.settings;

        let mut tables = self.spreads.load_tables(root)?;
        let plan = plan_cursors(commodity, &tables, settings.calendar, opts.start, opts.end)?;

        let mut stored = BTreeMap::new();
        for code in plan.needed.keys() {
            let series = self.prices.load(code)?;
            stored.insert(code.clone(), series.dates().collect::<Coverage>());
        }
        let fetches = plan_fetches(&plan.needed, &stored);

        let mut report = BackfillReport {
            commodity: root.to_string(),
            range: Some((opts.start, opts.end)),
            dry_run: opts.dry_run,
            already_complete: plan.count(Step::Skip),
            fetches,
            ..Default::default()
        };
        for c in &plan.cursors {
            let counter = match c.step {
                Step::Skip => continue,
                Step::Compute => &mut report.planned_compute,
                Step::RetryRate => &mut report.planned_rate,
            };
            *counter.entry(c.spread.label()).or_default() += 1;
        }

        info!(
            commodity = root,
            start = %opts.start,
            end = %opts.end,
            compute = plan.count(Step::Compute),
            rate_retry = plan.count(Step::RetryRate),
            skip = report.already_complete,
            fetches = report.fetches.len(),
            dry_run = opts.dry_run,
            "backfill planned"
        );
        if opts.dry_run {
            return Ok(report);
        }

        let rates = self.config.rate_source_for(commodity)?;
        let (price, volume) = fetch_fields(&self.config.source);
        let fetched = driver::fetch_missing(
            self.source,
            &self.prices,
            &report.fetches,
            driver::FetchFields {
                price,
                volume,
                yellow_key: &commodity.yellow_key,
            },
        )?;

        let mut prices: BTreeMap<ContractCode, PriceSeries> = BTreeMap::new();
        let curve_codes = plan.curve.iter().flat_map(|p| p.contracts.iter());
        for code in plan.needed.keys().chain(curve_codes) {
            if !prices.contains_key(code) {
                prices.insert(code.clone(), self.prices.load(code)?);
            }
        }
        let applied = driver::apply(
            root,
            &plan,
            &prices,
            &fetched.failures,
            &*rates,
            settings.days_per_year,
            &mut tables,
        );

        self.spreads.save_tables(root, &tables)?;
        let mut curve = self.spreads.load_curve(root)?;
        let curve_updates = extend_curve(&mut curve, &plan.curve, &prices);
        self.spreads.save_curve(root, &curve)?;

        let info = SpreadInfo {
            commodity: root.to_string(),
            last_updated: Utc::now(),
            date_range: tables
                .date_span()
                .map(|(start, end)| DateRange { start, end }),
            run_range: DateRange {
                start: opts.start,
                end: opts.end,
            },
            days_per_year: settings.days_per_year,
            spread_counts: Variant::ALL
                .into_iter()
                .map(|v| (v, tables.label_count(v)))
                .collect(),
            roll_dates: plan.rolls.clone(),
            gaps: applied.gaps.clone(),
        };
        self.spreads.save_info(root, &info)?;

        report.new_prices = fetched.new_prices;
        report.new_volumes = fetched.new_volumes;
        report.curve_updates = curve_updates;
        report.written = applied.written;
        report.gaps = applied.gaps;
        info!(
            commodity = root,
            new_prices = report.new_prices,
            values = report.values_written(),
            gaps = report.gaps.len(),
            "backfill finished"
        );
        Ok(report)
    }
}

/// Convenience wrapper for a single commodity.
pub fn run_backfill(
    config: &LoadedConfig,
    source: &dyn PriceSource,
    commodity: &Commodity,
    opts: &BackfillOptions,
) -> Result<BackfillReport, SpreadError> {
    Backfill::new(config, source).run(commodity, opts)
}

fn fetch_fields(source: &SourceSettings) -> (&str, Option<&str>) {
    match source {
        SourceSettings::Terminal(t) => (&t.field, t.volume_field()),
        SourceSettings::Offline => (DEFAULT_PRICE_FIELD, None),
    }
}

// Returns how many dates were added or gained a price.
fn extend_curve(
    curve: &mut CurveTable,
    points: &[CurvePoint],
    prices: &BTreeMap<ContractCode, PriceSeries>,
) -> usize {
    let mut changed = 0;
    for p in points {
        let slots = p
            .contracts
            .iter()
            .map(|code| CurveSlot {
                contract: code.clone(),
                price: prices.get(code).and_then(|s| s.get(p.date)),
            })
            .collect();
        if curve.insert(p.date, slots, p.days_to_expiry.clone()) {
            changed += 1;
        }
    }
    changed
}
