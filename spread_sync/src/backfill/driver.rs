//! Execution half of the backfill: fetch what the plan says is missing, then
//! walk the cursors and append results.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use futures_ingestor::{
    Error as IngestError,
    ingest::fetch_and_store,
    io::price_store::PriceStore,
    models::{contract::ContractCode, price_series::PriceSeries, request_params::PriceRequest},
    providers::{PriceSource, rates::RateSource},
};
use tracing::{debug, info, warn};

use crate::{
    backfill::plan::{CursorPlan, FetchSpan, Step},
    calculator::{compute_series, rate_adjusted},
    coverage::Coverage,
    error::SpreadError,
    models::SpreadDef,
    store::{Gap, GapKind, SpreadTables, Variant},
};

/// Result of the fetch phase.
#[derive(Debug, Default)]
pub(crate) struct Fetched {
    /// New raw prices merged.
    pub new_prices: usize,
    /// New volumes merged.
    pub new_volumes: usize,
    /// Contract -> error text for contracts or requests the source rejected.
    pub failures: BTreeMap<ContractCode, String>,
}

/// Fields and ticker suffix of every fetch in one run.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FetchFields<'a> {
    pub price: &'a str,
    pub volume: Option<&'a str>,
    pub yellow_key: &'a str,
}

/// Runs one request per span. An unreachable source aborts; any other source
/// error is remembered per contract and surfaces later as gaps.
pub(crate) fn fetch_missing(
    source: &dyn PriceSource,
    store: &PriceStore,
    spans: &[FetchSpan],
    fields: FetchFields<'_>,
) -> Result<Fetched, SpreadError> {
    let mut out = Fetched::default();
    for span in spans {
        let request = PriceRequest::new(span.contracts.clone(), span.start, span.end)
            .with_field(fields.price)
            .with_volume_field(fields.volume)
            .with_yellow_key(fields.yellow_key);
        match fetch_and_store(source, store, &request) {
            Ok(ingested) => {
                out.new_prices += ingested.stored.iter().map(|s| s.added).sum::<usize>();
                out.new_volumes += ingested.stored.iter().map(|s| s.volumes_added).sum::<usize>();
                for (code, message) in ingested.rejected {
                    warn!(contract = %code, %message, "source rejected contract; dates stay missing");
                    out.failures.insert(code, message);
                }
            }
            Err(IngestError::Provider(e)) if e.is_unavailable() => {
                return Err(SpreadError::SourceUnavailable(e));
            }
            Err(IngestError::Sink(e)) => return Err(SpreadError::PriceStore(e)),
            Err(e) => {
                warn!(
                    contracts = span.contracts.len(),
                    start = %span.start,
                    end = %span.end,
                    error = %e,
                    "fetch failed; dates stay missing"
                );
                for code in &span.contracts {
                    out.failures.insert(code.clone(), e.to_string());
                }
            }
        }
    }
    Ok(out)
}

/// Result of the apply phase.
#[derive(Debug, Default)]
pub(crate) struct Applied {
    /// Spread label -> values appended.
    pub written: BTreeMap<String, usize>,
    /// Gaps, ordered by date then label.
    pub gaps: Vec<Gap>,
}

impl Applied {
    fn bump(&mut self, label: &str, inserted: bool) {
        if inserted {
            *self.written.entry(label.to_string()).or_default() += 1;
        }
    }
}

/// Walks every cursor of `plan` against the raw `prices` and appends to
/// `tables`.
pub(crate) fn apply(
    root: &str,
    plan: &CursorPlan,
    prices: &BTreeMap<ContractCode, PriceSeries>,
    failures: &BTreeMap<ContractCode, String>,
    rates: &dyn RateSource,
    days_per_year: f64,
    tables: &mut SpreadTables,
) -> Applied {
    let mut out = Applied::default();

    // Compute cursors sharing legs go through the calculator together.
    let mut groups: BTreeMap<(SpreadDef, ContractCode, ContractCode), (i64, Coverage)> =
        BTreeMap::new();
    for c in &plan.cursors {
        match c.step {
            Step::Skip => {}
            Step::Compute => {
                groups
                    .entry((c.spread, c.near.clone(), c.far.clone()))
                    .or_insert_with(|| (c.days_between, Coverage::new()))
                    .1
                    .insert(c.date);
            }
            Step::RetryRate => retry_rate(&c.spread.label(), c.date, rates, tables, &mut out),
        }
    }

    for ((spread, near_code, far_code), (days_between, dates)) in &groups {
        let label = spread.label();
        let empty_near = PriceSeries::new(near_code.to_string());
        let empty_far = PriceSeries::new(far_code.to_string());
        let near = prices.get(near_code).unwrap_or(&empty_near);
        let far = prices.get(far_code).unwrap_or(&empty_far);
        let near_wanted = PriceSeries::from_points(
            near.contract.clone(),
            near.points().filter(|p| dates.contains(p.date)),
        );

        let computed = compute_series(&label, &near_wanted, far, *days_between, days_per_year, rates);
        let skipped: BTreeMap<NaiveDate, SpreadError> = computed.skipped.into_iter().collect();
        let s = &computed.series;

        for date in dates.dates() {
            if let Some(&dollar) = s.dollar.get(&date) {
                let values = [
                    (Variant::Dollar, Some(dollar)),
                    (Variant::Percent, s.percent.get(&date).copied()),
                    (Variant::Annual, s.annual.get(&date).copied()),
                    (Variant::RateAdjusted, s.rate_adjusted.get(&date).copied()),
                ];
                for (variant, value) in values {
                    if let Some(v) = value {
                        let inserted = tables.insert(variant, &label, date, v);
                        out.bump(&label, inserted);
                    }
                }
                if let Some(e) = skipped.get(&date) {
                    out.gaps.push(gap(&label, date, GapKind::MissingRate, e.to_string()));
                }
                continue;
            }

            let detail = match skipped.get(&date) {
                Some(e) => e.to_string(),
                None => missing_leg_detail(date, near, far, near_code, far_code, failures),
            };
            out.gaps.push(gap(&label, date, GapKind::NoData, detail));
        }

        debug!(commodity = root, spread = %label, near = %near_code, far = %far_code, dates = dates.len(), "group applied");
    }

    out.gaps.sort_by(|a, b| (a.date, &a.label).cmp(&(b.date, &b.label)));
    for g in &out.gaps {
        match g.kind {
            GapKind::NoData => {
                warn!(commodity = root, spread = %g.label, date = %g.date, detail = %g.detail, "no spread value");
            }
            GapKind::MissingRate => {
                info!(commodity = root, spread = %g.label, date = %g.date, detail = %g.detail, "no rate-adjusted value");
            }
        }
    }
    info!(
        commodity = root,
        written = out.written.values().sum::<usize>(),
        gaps = out.gaps.len(),
        "spreads applied"
    );
    out
}

fn retry_rate(
    label: &str,
    date: NaiveDate,
    rates: &dyn RateSource,
    tables: &mut SpreadTables,
    out: &mut Applied,
) {
    let Some(annual) = tables.get(Variant::Annual, label, date) else {
        return;
    };
    match rates.rate_on(date) {
        Ok(rate) => {
            let inserted = tables.insert(Variant::RateAdjusted, label, date, rate_adjusted(annual, rate));
            out.bump(label, inserted);
        }
        Err(e) => {
            debug!(date = %date, error = %e, "rate still unavailable");
            let e = if e.is_missing() {
                SpreadError::MissingRate { date }
            } else {
                SpreadError::Rate(e)
            };
            out.gaps.push(gap(label, date, GapKind::MissingRate, e.to_string()));
        }
    }
}

fn missing_leg_detail(
    date: NaiveDate,
    near: &PriceSeries,
    far: &PriceSeries,
    near_code: &ContractCode,
    far_code: &ContractCode,
    failures: &BTreeMap<ContractCode, String>,
) -> String {
    let missing: Vec<&ContractCode> = [(near, near_code), (far, far_code)]
        .into_iter()
        .filter(|(s, _)| !s.contains(date))
        .map(|(_, c)| c)
        .collect();
    let reasons: Vec<String> = missing
        .iter()
        .map(|c| match failures.get(*c) {
            Some(err) => format!("{c}: {err}"),
            None => format!("{c}: no quote"),
        })
        .collect();
    reasons.join("; ")
}

fn gap(label: &str, date: NaiveDate, kind: GapKind, detail: String) -> Gap {
    Gap {
        label: label.to_string(),
        date,
        kind,
        detail,
    }
}
