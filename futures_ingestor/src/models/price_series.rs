//! Canonical in-memory representation of one contract's daily prices.
//!
//! This struct is the standard output of every
//! [`PriceSource`](crate::providers::PriceSource) implementation and the unit
//! persisted by the raw [`PriceStore`](crate::io::price_store::PriceStore).

use std::collections::{BTreeMap, btree_map::Entry};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::contract::ContractCode;

/// A single settlement quote.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// Daily prices for one contract, unique per date and kept in chronological order.
///
/// The series is append-only: merging never replaces a price that is already
/// present for a date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    /// Contract code the prices belong to (e.g. "CLG23").
    pub contract: String,
    prices: BTreeMap<NaiveDate, f64>,
    /// Traded volume per date, when the source reports it.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    volumes: BTreeMap<NaiveDate, f64>,
}

impl PriceSeries {
    pub fn new(contract: impl Into<String>) -> Self {
        Self {
            contract: contract.into(),
            prices: BTreeMap::new(),
            volumes: BTreeMap::new(),
        }
    }

    /// Builds a series from raw points. For repeated dates the first point wins.
    pub fn from_points(contract: impl Into<String>, points: impl IntoIterator<Item = PricePoint>) -> Self {
        let mut series = Self::new(contract);
        for p in points {
            series.prices.entry(p.date).or_insert(p.price);
        }
        series
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.prices.get(&date).copied()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.prices.contains_key(&date)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.prices.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.prices.keys().next_back().copied()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.prices.keys().copied()
    }

    pub fn points(&self) -> impl Iterator<Item = PricePoint> + '_ {
        self.prices
            .iter()
            .map(|(&date, &price)| PricePoint { date, price })
    }

    /// Inserts a quote unless the date already has one. Returns whether it was added.
    pub fn append(&mut self, date: NaiveDate, price: f64) -> bool {
        append_once(&mut self.prices, date, price)
    }

    /// Appends every date of `other` that is missing here; returns how many were added.
    pub fn merge_append(&mut self, other: &PriceSeries) -> usize {
        other
            .points()
            .filter(|p| self.append(p.date, p.price))
            .count()
    }

    pub fn volume(&self, date: NaiveDate) -> Option<f64> {
        self.volumes.get(&date).copied()
    }

    /// Dates with a volume, in order.
    pub fn volumes(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.volumes.iter().map(|(d, v)| (*d, *v))
    }

    pub fn volume_len(&self) -> usize {
        self.volumes.len()
    }

    /// Same contract as [`PriceSeries::append`], for volumes.
    pub fn append_volume(&mut self, date: NaiveDate, volume: f64) -> bool {
        append_once(&mut self.volumes, date, volume)
    }

    /// Appends every volume of `other` that is missing here.
    pub fn merge_volumes(&mut self, other: &PriceSeries) -> usize {
        other
            .volumes()
            .filter(|(d, v)| self.append_volume(*d, *v))
            .count()
    }

    /// Points and volumes with `start <= date <= end`.
    pub fn range(&self, start: NaiveDate, end: NaiveDate) -> PriceSeries {
        let mut out = Self::new(self.contract.clone());
        if start <= end {
            out.prices
                .extend(self.prices.range(start..=end).map(|(d, p)| (*d, *p)));
            out.volumes
                .extend(self.volumes.range(start..=end).map(|(d, v)| (*d, *v)));
        }
        out
    }
}

fn append_once(map: &mut BTreeMap<NaiveDate, f64>, date: NaiveDate, value: f64) -> bool {
    match map.entry(date) {
        Entry::Vacant(slot) => {
            slot.insert(value);
            true
        }
        Entry::Occupied(_) => false,
    }
}

/// What a source returned for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceBatch {
    /// One series per requested contract the source knows.
    pub series: Vec<PriceSeries>,
    /// Contracts the source refused, with its message.
    pub rejected: BTreeMap<ContractCode, String>,
}

impl PriceBatch {
    /// Quotes across every series.
    pub fn points(&self) -> usize {
        self.series.iter().map(PriceSeries::len).sum()
    }
}

impl From<Vec<PriceSeries>> for PriceBatch {
    fn from(series: Vec<PriceSeries>) -> Self {
        Self {
            series,
            rejected: BTreeMap::new(),
        }
    }
}
