//! Exchange time zone helpers.
//!
//! All stored dates are exchange-local calendar dates. "Today" therefore
//! depends on the exchange zone, not on the machine running the job: at
//! 22:00 in New York it is already tomorrow in UTC.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::error::ConfigError;

/// Parse an IANA zone name such as `America/New_York`.
pub fn parse_tz(name: &str) -> Result<Tz, ConfigError> {
    name.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidTimeZone(name.to_string()))
}

/// The exchange-local date of a UTC instant.
pub fn session_date(ts_utc: DateTime<Utc>, tz: Tz) -> NaiveDate {
    ts_utc.with_timezone(&tz).date_naive()
}

/// Today's date at the exchange.
pub fn exchange_today(tz: Tz) -> NaiveDate {
    session_date(Utc::now(), tz)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn late_evening_in_new_york_is_still_the_same_session() {
        let tz = parse_tz("America/New_York").unwrap();
        // 2024-01-16 02:30Z is 2024-01-15 21:30 EST
        let ts = Utc.with_ymd_and_hms(2024, 1, 16, 2, 30, 0).unwrap();
        assert_eq!(session_date(ts, tz), NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn london_after_midnight_utc_in_summer() {
        let tz = parse_tz("Europe/London").unwrap();
        // 23:30Z in BST is 00:30 local next day
        let ts = Utc.with_ymd_and_hms(2024, 7, 1, 23, 30, 0).unwrap();
        assert_eq!(session_date(ts, tz), NaiveDate::from_ymd_opt(2024, 7, 2).unwrap());
    }

    #[test]
    fn bad_zone_is_config_error() {
        assert!(matches!(
            parse_tz("Mars/Olympus"),
            Err(ConfigError::InvalidTimeZone(_))
        ));
    }
}
