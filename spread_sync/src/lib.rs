//! Calendar-spread pipeline for listed futures.
//!
//! Configuration ([`config`]) describes each commodity's roll table and the
//! spreads to track. The [`backfill`] walks a date range, resolves the
//! contracts active on each day ([`resolver`]), fetches missing settlement
//! prices through `futures_ingestor`, computes the four spread variants
//! ([`calculator`]) and appends them to the [`store`]. [`visualize`] and
//! [`export`] turn the stored tables into charts and flat JSON.
//! [`contracts`] fills missing last trade dates from the price source and
//! [`audit`] reports what the raw price store covers.

#![warn(missing_docs)]

pub mod audit;
pub mod backfill;
pub mod calculator;
pub mod calendar;
pub mod config;
pub mod contracts;
pub mod coverage;
pub mod error;
pub mod export;
pub mod models;
pub mod resolver;
pub mod store;
pub mod tz;
pub mod visualize;
