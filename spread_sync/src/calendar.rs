//! calendar.rs — day-id mapping and trading-day iteration
//!
//! - One stable epoch: 1900-01-01 is day 0. It predates every year a
//!   two-digit contract code can name (1970..=2069).
//! - Day ids are `u32` so they fit a roaring bitmap; dates before the epoch
//!   have no id, and a backfill starting before it is refused.
//! - The trading calendar is either every weekday or every calendar day.
//!   Exchange holidays are not modelled; a weekday without a quote is simply
//!   a no-data gap.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Day 0.
pub const EPOCH: NaiveDate = match NaiveDate::from_ymd_opt(1900, 1, 1) {
    Some(d) => d,
    None => unreachable!(),
};

/// Which dates a backfill walks over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarKind {
    /// Monday through Friday.
    #[default]
    Weekdays,
    /// Every calendar day.
    All,
}

impl CalendarKind {
    /// True when `date` is part of this calendar.
    pub fn is_trading_day(self, date: NaiveDate) -> bool {
        match self {
            CalendarKind::All => true,
            CalendarKind::Weekdays => !matches!(date.weekday(), Weekday::Sat | Weekday::Sun),
        }
    }

    /// Calendar dates in `[start, end]`, chronological. Empty when `start > end`.
    pub fn trading_days(self, start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
        start
            .iter_days()
            .take_while(move |d| *d <= end)
            .filter(move |d| self.is_trading_day(*d))
    }
}

/// Day id for a date; `None` before [`EPOCH`].
pub fn day_id(date: NaiveDate) -> Option<u32> {
    u32::try_from(date.signed_duration_since(EPOCH).num_days()).ok()
}

/// Inverse of [`day_id`].
pub fn date_from_day_id(id: u32) -> NaiveDate {
    EPOCH
        .checked_add_days(Days::new(u64::from(id)))
        .unwrap_or(NaiveDate::MAX)
}
