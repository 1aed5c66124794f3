//! Spread arithmetic.
//!
//! Every value is a pure function of one date's two prices, the day count
//! between the legs' expiries and, for the rate-adjusted variant, that date's
//! interest rate. There is no cross-date state.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use futures_ingestor::{models::price_series::PriceSeries, providers::rates::RateSource};
use thiserror::Error;

use crate::error::SpreadError;

/// Why a single date cannot produce a spread.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum PointError {
    /// A price is NaN or infinite.
    #[error("non-finite price")]
    NonFinite,
    /// The near price is zero, so the percentage variants are undefined.
    #[error("near price is zero")]
    ZeroNear,
    /// The far leg does not expire after the near leg.
    #[error("non-positive days between expiries ({0})")]
    NonPositiveDays(i64),
}

/// The three rate-independent variants for one date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpreadValues {
    /// far − near.
    pub dollar: f64,
    /// dollar / near.
    pub percent: f64,
    /// percent × days_per_year / days_between.
    pub annual: f64,
}

/// Compute one date's spread values.
pub fn spread_point(
    near: f64,
    far: f64,
    days_between: i64,
    days_per_year: f64,
) -> Result<SpreadValues, PointError> {
    if !near.is_finite() || !far.is_finite() {
        return Err(PointError::NonFinite);
    }
    if near == 0.0 {
        return Err(PointError::ZeroNear);
    }
    if days_between <= 0 {
        return Err(PointError::NonPositiveDays(days_between));
    }
    let dollar = far - near;
    let percent = dollar / near;
    let annual = percent * (days_per_year / days_between as f64);
    Ok(SpreadValues {
        dollar,
        percent,
        annual,
    })
}

/// Annualized spread net of the short-term rate.
pub fn rate_adjusted(annual: f64, rate: f64) -> f64 {
    annual - rate
}

/// All four variants for one contract pair, keyed by date.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SpreadSeries {
    /// Dollar spread.
    pub dollar: BTreeMap<NaiveDate, f64>,
    /// Percentage spread.
    pub percent: BTreeMap<NaiveDate, f64>,
    /// Annualized percentage spread.
    pub annual: BTreeMap<NaiveDate, f64>,
    /// Annualized spread minus the interest rate.
    pub rate_adjusted: BTreeMap<NaiveDate, f64>,
}

/// Result of [`compute_series`]: the series plus the dates it had to skip.
#[derive(Debug, Default)]
pub struct Computed {
    /// Computed values.
    pub series: SpreadSeries,
    /// Per-date failures (no data, missing rate).
    pub skipped: Vec<(NaiveDate, SpreadError)>,
}

/// Combine two price series over the dates both contain.
///
/// Dates where the point fails are skipped in every variant. Dates without a
/// usable rate are skipped in the rate-adjusted variant only; a rate source
/// that fails for other reasons is reported as [`SpreadError::Rate`].
pub fn compute_series(
    label: &str,
    near: &PriceSeries,
    far: &PriceSeries,
    days_between: i64,
    days_per_year: f64,
    rates: &dyn RateSource,
) -> Computed {
    let mut out = Computed::default();

    for p in near.points() {
        let Some(far_price) = far.get(p.date) else {
            continue;
        };
        let v = match spread_point(p.price, far_price, days_between, days_per_year) {
            Ok(v) => v,
            Err(e) => {
                out.skipped.push((
                    p.date,
                    SpreadError::NoData {
                        label: label.to_string(),
                        date: p.date,
                        reason: e.to_string(),
                    },
                ));
                continue;
            }
        };
        out.series.dollar.insert(p.date, v.dollar);
        out.series.percent.insert(p.date, v.percent);
        out.series.annual.insert(p.date, v.annual);

        match rates.rate_on(p.date) {
            Ok(rate) => {
                out.series
                    .rate_adjusted
                    .insert(p.date, rate_adjusted(v.annual, rate));
            }
            Err(e) if e.is_missing() => out
                .skipped
                .push((p.date, SpreadError::MissingRate { date: p.date })),
            Err(e) => out.skipped.push((p.date, SpreadError::Rate(e))),
        }
    }
    out
}
