//! Date coverage sets backed by roaring bitmaps over day ids.
//!
//! Used for the backfill's "already present" predicate and for working out
//! which raw prices are missing. Dates before [`EPOCH`](crate::calendar::EPOCH)
//! cannot be represented and are ignored on insert; the backfill refuses such
//! ranges up front.

use chrono::NaiveDate;
use roaring::RoaringBitmap;

use crate::calendar::{date_from_day_id, day_id};

/// A set of dates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Coverage(RoaringBitmap);

impl Coverage {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a date; returns false if it was already present.
    pub fn insert(&mut self, date: NaiveDate) -> bool {
        day_id(date).is_some_and(|id| self.0.insert(id))
    }

    /// Membership test.
    pub fn contains(&self, date: NaiveDate) -> bool {
        day_id(date).is_some_and(|id| self.0.contains(id))
    }

    /// Number of dates.
    pub fn len(&self) -> u64 {
        self.0.len()
    }

    /// True when empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Dates in `self` but not in `other`.
    pub fn difference(&self, other: &Coverage) -> Coverage {
        Coverage(&self.0 - &other.0)
    }

    /// Dates in both.
    pub fn intersection(&self, other: &Coverage) -> Coverage {
        Coverage(&self.0 & &other.0)
    }

    /// Earliest and latest date, if any.
    pub fn span(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((date_from_day_id(self.0.min()?), date_from_day_id(self.0.max()?)))
    }

    /// Dates in ascending order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.0.iter().map(date_from_day_id)
    }
}

impl FromIterator<NaiveDate> for Coverage {
    fn from_iter<I: IntoIterator<Item = NaiveDate>>(iter: I) -> Self {
        let mut c = Coverage::new();
        for d in iter {
            c.insert(d);
        }
        c
    }
}

impl Extend<NaiveDate> for Coverage {
    fn extend<I: IntoIterator<Item = NaiveDate>>(&mut self, iter: I) {
        for d in iter {
            self.insert(d);
        }
    }
}
