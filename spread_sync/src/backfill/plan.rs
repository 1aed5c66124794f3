//! Planning half of the backfill: decide, per (spread, date), what must happen,
//! and which raw prices are missing. Nothing here touches the disk or the
//! price source.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use futures_ingestor::models::contract::ContractCode;

use crate::{
    calendar::CalendarKind,
    coverage::Coverage,
    error::ConfigError,
    models::{Commodity, SpreadDef},
    resolver::resolve,
    store::{Presence, SpreadTables},
};

/// What the driver does with one (spread, date).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// All four variants are stored.
    Skip,
    /// Only the rate-adjusted value is missing; derive it from the stored
    /// annualized value.
    RetryRate,
    /// Nothing usable is stored; fetch prices and compute.
    Compute,
}

impl From<Presence> for Step {
    fn from(p: Presence) -> Self {
        match p {
            Presence::Complete => Step::Skip,
            Presence::MissingRateAdjusted => Step::RetryRate,
            Presence::Absent => Step::Compute,
        }
    }
}

/// One (spread, date) cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    /// Spread being filled.
    pub spread: SpreadDef,
    /// Trading day.
    pub date: NaiveDate,
    /// Near leg on that date.
    pub near: ContractCode,
    /// Far leg on that date.
    pub far: ContractCode,
    /// Calendar days between the legs' last trade dates.
    pub days_between: i64,
    /// Decided step.
    pub step: Step,
}

/// One fetch request: contracts sharing the same missing span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSpan {
    /// Contracts to request.
    pub contracts: Vec<ContractCode>,
    /// First missing date.
    pub start: NaiveDate,
    /// Last missing date.
    pub end: NaiveDate,
}

/// Contracts resolved on one date, near first, with the calendar days from
/// the date to each one's last trade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurvePoint {
    /// Trading day.
    pub date: NaiveDate,
    /// Resolved contracts.
    pub contracts: Vec<ContractCode>,
    /// Days to expiry, slot by slot.
    pub days_to_expiry: Vec<i64>,
}

/// Output of [`plan_cursors`].
#[derive(Debug, Clone, Default)]
pub struct CursorPlan {
    /// Cursors in date order, spreads in configured order within a date.
    pub cursors: Vec<Cursor>,
    /// Dates each contract must have a price for.
    pub needed: BTreeMap<ContractCode, Coverage>,
    /// Roll dates of every contract resolved over the range.
    pub rolls: BTreeMap<String, NaiveDate>,
    /// The resolved curve of every trading day.
    pub curve: Vec<CurvePoint>,
}

impl CursorPlan {
    /// Number of cursors in a given step.
    pub fn count(&self, step: Step) -> usize {
        self.cursors.iter().filter(|c| c.step == step).count()
    }
}

/// Walk the trading days of `[start, end]` and decide each (spread, date).
///
/// Every date is resolved before anything else happens, so a roll table that
/// does not cover the whole range fails here, before any fetch or write.
pub fn plan_cursors(
    commodity: &Commodity,
    tables: &SpreadTables,
    calendar: CalendarKind,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<CursorPlan, ConfigError> {
    let presence: Vec<_> = commodity
        .spreads
        .iter()
        .map(|s| tables.presence_index(&s.label()))
        .collect();

    let mut plan = CursorPlan::default();
    for date in calendar.trading_days(start, end) {
        let resolved = resolve(commodity, date)?;
        for c in resolved.contracts {
            plan.rolls.insert(c.code.to_string(), c.roll);
        }
        plan.curve.push(CurvePoint {
            date,
            contracts: resolved.contracts.iter().map(|c| c.code.clone()).collect(),
            days_to_expiry: resolved
                .contracts
                .iter()
                .map(|c| (c.last_trade - date).num_days())
                .collect(),
        });

        for (spread, index) in commodity.spreads.iter().zip(&presence) {
            // resolve() guarantees depth for every configured spread
            let Some((near, far)) = resolved.legs(*spread) else {
                continue;
            };
            let step = Step::from(index.state(date));
            if step == Step::Compute {
                for code in [&near.code, &far.code] {
                    plan.needed.entry(code.clone()).or_default().insert(date);
                }
            }
            plan.cursors.push(Cursor {
                spread: *spread,
                date,
                near: near.code.clone(),
                far: far.code.clone(),
                days_between: near.days_until(far),
                step,
            });
        }
    }
    Ok(plan)
}

/// Raw prices still missing, grouped into one request per distinct span.
///
/// A contract's span runs from its first to its last missing date; contracts
/// whose spans coincide share a request.
pub fn plan_fetches(
    needed: &BTreeMap<ContractCode, Coverage>,
    stored: &BTreeMap<ContractCode, Coverage>,
) -> Vec<FetchSpan> {
    let mut by_span: BTreeMap<(NaiveDate, NaiveDate), Vec<ContractCode>> = BTreeMap::new();
    for (code, dates) in needed {
        let missing = match stored.get(code) {
            Some(have) => dates.difference(have),
            None => dates.clone(),
        };
        if let Some(span) = missing.span() {
            by_span.entry(span).or_default().push(code.clone());
        }
    }
    by_span
        .into_iter()
        .map(|((start, end), contracts)| FetchSpan {
            contracts,
            start,
            end,
        })
        .collect()
}
