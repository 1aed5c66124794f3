#[cfg(feature = "cli")]
pub mod cli;
pub mod errors;
pub mod ingest;
pub mod io;
pub mod models;
pub mod providers;

pub use errors::Error;
