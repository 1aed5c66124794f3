//! Contract resolution: which contracts are near, next, ... on a date.
//!
//! The near contract on `as_of` is the first contract whose roll date is on or
//! after `as_of`. Rolls are strictly increasing (checked at load), so the answer
//! is unique.

use chrono::NaiveDate;

use crate::{
    error::ConfigError,
    models::{Commodity, Contract, SpreadDef},
};

/// Contracts valid on one date, near first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolved<'a> {
    /// The reference date.
    pub as_of: NaiveDate,
    /// `contracts[0]` is near; length is the commodity's deepest far offset.
    pub contracts: &'a [Contract],
}

impl<'a> Resolved<'a> {
    /// The near contract.
    pub fn near(&self) -> &'a Contract {
        &self.contracts[0]
    }

    /// Legs of a spread as (near, far).
    pub fn legs(&self, spread: SpreadDef) -> Option<(&'a Contract, &'a Contract)> {
        let near = self.contracts.get(spread.near.checked_sub(1)?)?;
        let far = self.contracts.get(spread.far.checked_sub(1)?)?;
        Some((near, far))
    }
}

/// Resolve the ordered contract list for `as_of`, deep enough for every
/// configured spread.
///
/// Errors with [`ConfigError`] when the roll table does not cover `as_of`:
/// the date is after the last roll, or too few contracts follow the near one.
pub fn resolve(commodity: &Commodity, as_of: NaiveDate) -> Result<Resolved<'_>, ConfigError> {
    resolve_depth(commodity, as_of, commodity.max_depth())
}

/// Same as [`resolve`] with an explicit depth.
pub fn resolve_depth(
    commodity: &Commodity,
    as_of: NaiveDate,
    depth: usize,
) -> Result<Resolved<'_>, ConfigError> {
    let contracts = &commodity.contracts;
    let near = contracts.partition_point(|c| c.roll < as_of);
    if near == contracts.len() {
        return Err(match contracts.last() {
            Some(last) => ConfigError::RollTableExhausted {
                root: commodity.root.clone(),
                as_of,
                last_roll: last.roll,
            },
            None => ConfigError::NoContracts(commodity.root.clone()),
        });
    }

    let available = contracts.len() - near;
    let depth = depth.max(1);
    if available < depth {
        return Err(ConfigError::InsufficientDepth {
            root: commodity.root.clone(),
            as_of,
            near: contracts[near].code.to_string(),
            needed: depth,
            available,
        });
    }

    Ok(Resolved {
        as_of,
        contracts: &contracts[near..near + depth],
    })
}

/// Look up a commodity by root and resolve it.
pub fn resolve_root<'a>(
    commodities: &'a indexmap::IndexMap<String, Commodity>,
    root: &str,
    as_of: NaiveDate,
) -> Result<Resolved<'a>, ConfigError> {
    let key = root.trim().to_uppercase();
    let commodity = commodities
        .get(&key)
        .ok_or(ConfigError::UnknownCommodity(key))?;
    resolve(commodity, as_of)
}
