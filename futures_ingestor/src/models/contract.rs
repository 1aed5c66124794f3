//! Futures contract identifiers.
//!
//! A contract code is `root + month letter + two-digit year`, e.g. `CLG23` for
//! the February 2023 WTI contract. Terminal tickers append the market-sector
//! ("yellow key") suffix: `CLG23 Comdty`.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Standard futures month letters, January through December.
pub const MONTH_CODES: &str = "FGHJKMNQUVXZ";

/// Two-digit years below this pivot are read as 20xx, the rest as 19xx.
const TWO_DIGIT_YEAR_PIVOT: i32 = 70;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContractCodeError {
    #[error("unknown futures month code '{0}'")]
    UnknownMonth(char),

    #[error("contract code '{0}' is not <root><month><yy>")]
    Malformed(String),

    #[error("contract year {0} cannot be written as a two-digit code")]
    YearOutOfRange(i32),
}

/// Delivery month of a futures contract, named by its exchange letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ContractMonth {
    F,
    G,
    H,
    J,
    K,
    M,
    N,
    Q,
    U,
    V,
    X,
    Z,
}

impl ContractMonth {
    pub const ALL: [ContractMonth; 12] = [
        Self::F,
        Self::G,
        Self::H,
        Self::J,
        Self::K,
        Self::M,
        Self::N,
        Self::Q,
        Self::U,
        Self::V,
        Self::X,
        Self::Z,
    ];

    pub fn from_code(c: char) -> Result<Self, ContractCodeError> {
        MONTH_CODES
            .find(c.to_ascii_uppercase())
            .map(|idx| Self::ALL[idx])
            .ok_or(ContractCodeError::UnknownMonth(c))
    }

    pub fn code(self) -> char {
        // ALL and MONTH_CODES share ordering
        MONTH_CODES.as_bytes()[self.index()] as char
    }

    /// Calendar month number, 1..=12.
    pub fn number(self) -> u32 {
        self.index() as u32 + 1
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ContractMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Identifies one listed contract of a commodity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContractCode {
    /// Commodity root, e.g. "CL".
    pub root: String,
    /// Four-digit delivery year. Ordering is by (root, year, month).
    pub year: i32,
    pub month: ContractMonth,
}

impl ContractCode {
    pub fn new(root: impl Into<String>, month: ContractMonth, year: i32) -> Self {
        Self {
            root: root.into(),
            year,
            month,
        }
    }

    /// Terminal ticker, e.g. `CLG23 Comdty`.
    pub fn ticker(&self, yellow_key: &str) -> String {
        format!("{self} {yellow_key}")
    }
}

impl fmt::Display for ContractCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{:02}",
            self.root,
            self.month.code(),
            self.year.rem_euclid(100)
        )
    }
}

impl FromStr for ContractCode {
    type Err = ContractCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        // strip an optional yellow key ("CLG23 Comdty")
        let code = s.split_whitespace().next().unwrap_or_default();
        let malformed = || ContractCodeError::Malformed(s.to_string());

        if code.len() < 4 || !code.is_ascii() {
            return Err(malformed());
        }
        let (head, yy) = code.split_at(code.len() - 2);
        let yy: i32 = yy.parse().map_err(|_| malformed())?;
        let (root, month) = head.split_at(head.len() - 1);
        if root.is_empty() {
            return Err(malformed());
        }
        let month = month.chars().next().ok_or_else(malformed)?;
        let month = ContractMonth::from_code(month)?;
        let year = if yy < TWO_DIGIT_YEAR_PIVOT {
            2000 + yy
        } else {
            1900 + yy
        };
        Ok(Self::new(root.to_ascii_uppercase(), month, year))
    }
}

impl Serialize for ContractCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContractCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Checks that a year survives the two-digit round trip of [`ContractCode`]'s text form.
pub fn validate_code_year(year: i32) -> Result<(), ContractCodeError> {
    let yy = year.rem_euclid(100);
    let back = if yy < TWO_DIGIT_YEAR_PIVOT {
        2000 + yy
    } else {
        1900 + yy
    };
    if back == year {
        Ok(())
    } else {
        Err(ContractCodeError::YearOutOfRange(year))
    }
}
