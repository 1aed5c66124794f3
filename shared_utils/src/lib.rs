//! Small helpers shared by the ingest and spread binaries.

pub mod config;
pub mod env;
