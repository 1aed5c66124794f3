//! Immutable commodity metadata built from validated configuration.

use std::fmt;

use chrono::NaiveDate;
use futures_ingestor::models::contract::{ContractCode, ContractMonth};
use serde::{Deserialize, Serialize};

/// One listed contract with its trading calendar anchors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contract {
    /// Contract code, e.g. `CLG23`.
    pub code: ContractCode,
    /// Last trade date of the contract.
    pub last_trade: NaiveDate,
    /// Date from which the next contract becomes the near one.
    pub roll: NaiveDate,
}

impl Contract {
    /// Calendar days from this contract's last trade to `later`'s.
    pub fn days_until(&self, later: &Contract) -> i64 {
        (later.last_trade - self.last_trade).num_days()
    }
}

/// A pair of 1-based offsets into the resolved contract list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpreadDef {
    /// Offset of the near leg (1 = near contract).
    pub near: usize,
    /// Offset of the far leg.
    pub far: usize,
}

impl SpreadDef {
    /// Creates a spread definition; validation happens at config load.
    pub const fn new(near: usize, far: usize) -> Self {
        Self { near, far }
    }

    /// Column label used in stored tables, e.g. `spread_1_2m`.
    pub fn label(&self) -> String {
        format!("spread_{}_{}m", self.near, self.far)
    }

    /// `(1, k)` for every `k` in `2..=max_months_forward`.
    pub fn defaults(max_months_forward: usize) -> Vec<SpreadDef> {
        (2..=max_months_forward).map(|k| SpreadDef::new(1, k)).collect()
    }
}

impl fmt::Display for SpreadDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Validated per-commodity metadata: roll table, spreads and rate source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Commodity {
    /// Root symbol, e.g. `CL`.
    pub root: String,
    /// Display name.
    pub name: String,
    /// Listed months in calendar order.
    pub months: Vec<ContractMonth>,
    /// Terminal market sector suffix.
    pub yellow_key: String,
    /// Key into the `[rates]` table, if the commodity has a rate-adjusted variant.
    pub rate_source: Option<String>,
    /// Contracts ordered by expiry; roll dates strictly increasing.
    pub contracts: Vec<Contract>,
    /// Spreads to compute.
    pub spreads: Vec<SpreadDef>,
}

impl Commodity {
    /// Deepest far offset over all configured spreads.
    pub fn max_depth(&self) -> usize {
        self.spreads.iter().map(|s| s.far).max().unwrap_or(1)
    }
}
