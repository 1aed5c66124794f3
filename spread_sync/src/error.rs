//! Error taxonomy for the spread pipeline.
//!
//! - [`ConfigError`]: missing or invalid metadata. Fatal, aborts the run.
//! - [`SpreadError::SourceUnavailable`]: the price source cannot be reached.
//!   Fatal for the run; re-invoking later is the retry.
//! - [`SpreadError::NoData`] / [`SpreadError::MissingRate`]: per-date problems the
//!   backfill records as gaps and moves past.

use std::path::PathBuf;

use chrono::NaiveDate;
use futures_ingestor::{
    io::sink::SinkError,
    models::contract::ContractCodeError,
    providers::{ProviderError, ProviderInitError, rates::RateError},
};
use thiserror::Error;

/// Invalid or incomplete configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Config path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for the expected shape.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A commodity root is empty after trimming.
    #[error("commodity root cannot be empty")]
    EmptyRoot,

    /// Two commodity roots normalize to the same symbol.
    #[error("duplicate commodity root after normalization: {0}")]
    DuplicateRoot(String),

    /// A month letter outside `FGHJKMNQUVXZ`.
    #[error("{root}: unknown month code '{letter}'")]
    UnknownMonth {
        /// Commodity root.
        root: String,
        /// Offending text.
        letter: String,
    },

    /// A contract month that is not in the commodity's cycle.
    #[error("{code}: month is not in the {root} cycle")]
    MonthOutsideCycle {
        /// Commodity root.
        root: String,
        /// Contract code.
        code: String,
    },

    /// A contract year that cannot be written as a two-digit code.
    #[error("{root}: {source}")]
    ContractCode {
        /// Commodity root.
        root: String,
        /// Underlying error.
        #[source]
        source: ContractCodeError,
    },

    /// The same contract is listed twice.
    #[error("duplicate contract {0}")]
    DuplicateContract(String),

    /// A commodity lists no contracts.
    #[error("{0}: no contracts configured")]
    NoContracts(String),

    /// Roll date later than the last trade date.
    #[error("{code}: roll {roll} is after last trade {last_trade}")]
    RollAfterLastTrade {
        /// Contract code.
        code: String,
        /// Roll date.
        roll: NaiveDate,
        /// Last trade date.
        last_trade: NaiveDate,
    },

    /// Last trade dates must strictly increase with expiry.
    #[error("{code}: last trade {last_trade} is not after {previous}'s")]
    LastTradeNotIncreasing {
        /// Contract code.
        code: String,
        /// Its last trade date.
        last_trade: NaiveDate,
        /// The preceding contract.
        previous: String,
    },

    /// Consecutive contracts skip a month of the cycle.
    #[error("{root}: roll table gap, expected {expected} after {after} but found {found}")]
    MissingMonth {
        /// Commodity root.
        root: String,
        /// Contract before the gap.
        after: String,
        /// Contract the cycle calls for.
        expected: String,
        /// Contract actually listed.
        found: String,
    },

    /// Two contracts would be active on the same date.
    #[error("{code}: roll {roll} does not follow {previous}'s roll; active contract is ambiguous")]
    AmbiguousRoll {
        /// Contract code.
        code: String,
        /// Its roll date.
        roll: NaiveDate,
        /// The preceding contract.
        previous: String,
    },

    /// Spread offsets must satisfy `1 <= near < far`.
    #[error("{root}: invalid spread near={near} far={far}")]
    InvalidSpread {
        /// Commodity root.
        root: String,
        /// Near offset.
        near: usize,
        /// Far offset.
        far: usize,
    },

    /// A commodity names a rate source that is not configured.
    #[error("{root}: unknown rate_source '{name}'")]
    UnknownRateSource {
        /// Commodity root.
        root: String,
        /// Missing key.
        name: String,
    },

    /// A `[rates.*]` table is unusable.
    #[error("rates.{name}: {message}")]
    InvalidRate {
        /// Rate source name.
        name: String,
        /// What is wrong.
        message: String,
    },

    /// `exchange_tz` is not an IANA zone.
    #[error("invalid time zone '{0}'")]
    InvalidTimeZone(String),

    /// A `[settings]` value is out of range.
    #[error("invalid setting: {0}")]
    InvalidSetting(String),

    /// Neither the config nor the stored reference data give a last trade date.
    #[error("{code}: no last_trade configured or stored; run sync-contracts or set it")]
    MissingLastTrade {
        /// Contract code.
        code: String,
    },

    /// Stored reference data could not be read.
    #[error("stored reference data: {0}")]
    Details(#[source] SinkError),

    /// The `[source]` table is unusable.
    #[error("invalid [source]: {0}")]
    InvalidSource(String),

    /// No metadata for the requested commodity.
    #[error("unknown commodity '{0}'")]
    UnknownCommodity(String),

    /// The roll table does not cover the date.
    #[error("{root}: roll table ends at {last_roll}, cannot resolve {as_of}")]
    RollTableExhausted {
        /// Commodity root.
        root: String,
        /// Requested date.
        as_of: NaiveDate,
        /// Last configured roll date.
        last_roll: NaiveDate,
    },

    /// Too few contracts follow the near contract for the deepest spread.
    #[error("{root}: {as_of} needs {needed} contracts from {near} but only {available} are listed")]
    InsufficientDepth {
        /// Commodity root.
        root: String,
        /// Requested date.
        as_of: NaiveDate,
        /// Near contract on that date.
        near: String,
        /// Contracts required.
        needed: usize,
        /// Contracts available.
        available: usize,
    },
}

/// Errors raised while computing and persisting spreads.
#[derive(Debug, Error)]
pub enum SpreadError {
    /// Invalid metadata.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The price source could not be reached.
    #[error("price source unavailable: {0}")]
    SourceUnavailable(#[source] ProviderError),

    /// The price source answered with an error.
    #[error("price source: {0}")]
    Source(#[source] ProviderError),

    /// The price source could not be constructed.
    #[error("price source init failed: {0}")]
    SourceInit(#[from] ProviderInitError),

    /// No usable quote for a spread on a date.
    #[error("{label} on {date}: no data ({reason})")]
    NoData {
        /// Spread label.
        label: String,
        /// Date without data.
        date: NaiveDate,
        /// What was missing.
        reason: String,
    },

    /// The rate-adjusted value could not be computed for a date.
    #[error("no interest rate for {date}")]
    MissingRate {
        /// Date without a rate.
        date: NaiveDate,
    },

    /// A rate source could not be loaded or gave an unusable rate.
    #[error(transparent)]
    Rate(#[from] RateError),

    /// Reading or writing the raw price store failed.
    #[error("raw price store: {0}")]
    PriceStore(#[from] SinkError),

    /// Reading or writing processed output failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SpreadError {
    /// Per-date failures do not abort a run.
    pub fn is_per_date(&self) -> bool {
        matches!(self, SpreadError::NoData { .. } | SpreadError::MissingRate { .. })
    }
}

/// Failures of the processed-data files (tables, info, charts, exports).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A stored file exists but does not decode.
    #[error("corrupt file {path}: {source}")]
    Decode {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}
