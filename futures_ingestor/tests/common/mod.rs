#![allow(dead_code)]

use std::{fs, path::Path};

use chrono::NaiveDate;
use futures_ingestor::{models::request_params::PriceRequest, providers::terminal_rest::TerminalSettings};

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

pub fn request(codes: &[&str], start: NaiveDate, end: NaiveDate) -> PriceRequest {
    PriceRequest::new(codes.iter().map(|c| c.parse().unwrap()).collect(), start, end)
}

pub fn settings(base_url: &str) -> TerminalSettings {
    let mut s = TerminalSettings::new(base_url);
    s.requests_per_second = 50;
    s.timeout_secs = 2;
    s
}

/// Writes a pipeline config into `dir` and returns its path.
pub fn write_config(dir: &Path, source_table: &str) -> std::path::PathBuf {
    let path = dir.join("pipeline.toml");
    fs::write(
        &path,
        format!("[settings]\ndata_root = \"data\"\n\n[source]\n{source_table}\n"),
    )
    .unwrap();
    path
}
