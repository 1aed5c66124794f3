//! Static reference data for listed contracts.
//!
//! The terminal reports a contract's descriptive name, its quote units and
//! its last tradeable date. The last tradeable date is what the spread side
//! uses for expiries when a contract's configuration leaves it out.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::contract::ContractCode;

/// Terminal field holding the security's descriptive name.
pub const NAME_FIELD: &str = "name";

/// Terminal field holding the quote units, e.g. `USD/bbl.`.
pub const UNITS_FIELD: &str = "QUOTE_UNITS";

/// Terminal field holding the last tradeable date.
pub const LAST_TRADE_FIELD: &str = "LAST_TRADEABLE_DT";

/// Reference fields requested for every contract, in request order.
pub const DETAIL_FIELDS: [&str; 3] = [NAME_FIELD, UNITS_FIELD, LAST_TRADE_FIELD];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDetails {
    pub contract: ContractCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_trade: Option<NaiveDate>,
}

impl ContractDetails {
    pub fn new(contract: ContractCode) -> Self {
        Self {
            contract,
            name: None,
            units: None,
            last_trade: None,
        }
    }

    pub fn with_last_trade(mut self, last_trade: NaiveDate) -> Self {
        self.last_trade = Some(last_trade);
        self
    }

    /// Fills fields that are still empty from `other`. Known values are
    /// never replaced. Returns whether anything changed.
    pub fn fill_from(&mut self, other: &ContractDetails) -> bool {
        let mut changed = false;
        if self.name.is_none() && other.name.is_some() {
            self.name.clone_from(&other.name);
            changed = true;
        }
        if self.units.is_none() && other.units.is_some() {
            self.units.clone_from(&other.units);
            changed = true;
        }
        if self.last_trade.is_none() && other.last_trade.is_some() {
            self.last_trade = other.last_trade;
            changed = true;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_keeps_known_values() {
        let lt = NaiveDate::from_ymd_opt(2023, 1, 20).unwrap();
        let mut stored = ContractDetails::new("CLG23".parse().unwrap());
        stored.name = Some("WTI CRUDE FUTR Feb23".into());

        let mut fetched = ContractDetails::new("CLG23".parse().unwrap()).with_last_trade(lt);
        fetched.name = Some("renamed".into());

        assert!(stored.fill_from(&fetched));
        assert_eq!(stored.name.as_deref(), Some("WTI CRUDE FUTR Feb23"));
        assert_eq!(stored.last_trade, Some(lt));
        assert!(!stored.fill_from(&fetched));
    }
}
