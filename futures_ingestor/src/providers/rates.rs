//! Short-term interest rates used by the rate-adjusted spread.
//!
//! Rates are decimal fractions (`0.05` is 5%). A source may have no rate for
//! a given date; callers treat that as a per-date gap, not a failure of the run.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RateError {
    #[error("no interest rate for {0}")]
    Missing(NaiveDate),

    #[error("failed to read rate file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse rate file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid rate {rate} for {date}")]
    Invalid { date: NaiveDate, rate: f64 },
}

impl RateError {
    /// Per-date misses; everything else means the source itself is broken.
    pub fn is_missing(&self) -> bool {
        matches!(self, RateError::Missing(_))
    }
}

pub trait RateSource {
    fn rate_on(&self, date: NaiveDate) -> Result<f64, RateError>;
}

impl<T: RateSource + ?Sized> RateSource for Box<T> {
    fn rate_on(&self, date: NaiveDate) -> Result<f64, RateError> {
        (**self).rate_on(date)
    }
}

/// Rates read from a JSON object `{"YYYY-MM-DD": rate}`.
#[derive(Debug, Clone, Default)]
pub struct FileRateSource {
    rates: BTreeMap<NaiveDate, f64>,
}

impl FileRateSource {
    pub fn load(path: &Path) -> Result<Self, RateError> {
        let text = fs::read_to_string(path).map_err(|source| RateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let rates: BTreeMap<NaiveDate, f64> =
            serde_json::from_str(&text).map_err(|source| RateError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_map(rates)
    }

    pub fn from_map(rates: BTreeMap<NaiveDate, f64>) -> Result<Self, RateError> {
        if let Some((date, rate)) = rates.iter().find(|(_, r)| !r.is_finite()) {
            return Err(RateError::Invalid {
                date: *date,
                rate: *rate,
            });
        }
        Ok(Self { rates })
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

impl RateSource for FileRateSource {
    fn rate_on(&self, date: NaiveDate) -> Result<f64, RateError> {
        self.rates
            .get(&date)
            .copied()
            .ok_or(RateError::Missing(date))
    }
}

/// Same rate every day.
#[derive(Debug, Clone, Copy)]
pub struct FixedRateSource(pub f64);

impl RateSource for FixedRateSource {
    fn rate_on(&self, _date: NaiveDate) -> Result<f64, RateError> {
        Ok(self.0)
    }
}

/// No rate data at all; the rate-adjusted variant stays empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRateSource;

impl RateSource for NoRateSource {
    fn rate_on(&self, date: NaiveDate) -> Result<f64, RateError> {
        Err(RateError::Missing(date))
    }
}

/// One `[rates.<name>]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RateSettings {
    File { path: PathBuf },
    Fixed { rate: f64 },
    None,
}

impl RateSettings {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            RateSettings::File { path } if path.as_os_str().is_empty() => {
                Err("rate file path cannot be empty".into())
            }
            RateSettings::Fixed { rate } if !rate.is_finite() => {
                Err(format!("fixed rate must be finite, got {rate}"))
            }
            _ => Ok(()),
        }
    }

    /// Builds the source; relative file paths resolve against `base`.
    pub fn build(&self, base: &Path) -> Result<Box<dyn RateSource>, RateError> {
        Ok(match self {
            RateSettings::File { path } => {
                let path = if path.is_absolute() {
                    path.clone()
                } else {
                    base.join(path)
                };
                Box::new(FileRateSource::load(&path)?)
            }
            RateSettings::Fixed { rate } => Box::new(FixedRateSource(*rate)),
            RateSettings::None => Box::new(NoRateSource),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, day).unwrap()
    }

    #[test]
    fn file_source_reports_missing_dates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"2023-01-10": 0.05, "2023-01-11": 0.051}}"#).unwrap();

        let src = FileRateSource::load(file.path()).unwrap();
        assert_eq!(src.len(), 2);
        assert_eq!(src.rate_on(d(10)).unwrap(), 0.05);
        let err = src.rate_on(d(12)).unwrap_err();
        assert!(err.is_missing());
        assert_eq!(err.to_string(), "no interest rate for 2023-01-12");
    }

    #[test]
    fn unreadable_file_is_not_a_per_date_miss() {
        let err = FileRateSource::load(Path::new("/nonexistent/rates.json")).unwrap_err();
        assert!(!err.is_missing());
    }

    #[test]
    fn settings_parse_by_kind() {
        let fixed: RateSettings = toml::from_str("kind = \"fixed\"\nrate = 0.05").unwrap();
        assert_eq!(fixed, RateSettings::Fixed { rate: 0.05 });
        let none: RateSettings = toml::from_str("kind = \"none\"").unwrap();
        assert!(none.build(Path::new(".")).unwrap().rate_on(d(3)).is_err());
        let src = fixed.build(Path::new(".")).unwrap();
        assert_eq!(src.rate_on(d(3)).unwrap(), 0.05);
    }
}
