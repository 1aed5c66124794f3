//! Blocking REST client for a market-data terminal gateway.
//!
//! The gateway exposes the terminal's historical-data request over HTTP:
//! `GET {base_url}/v1/history?securities=..&fields=..&start_date=YYYYMMDD&end_date=YYYYMMDD`.

pub mod params;
pub mod provider;
pub mod response;

pub use params::TerminalSettings;
pub use provider::TerminalRestSource;
