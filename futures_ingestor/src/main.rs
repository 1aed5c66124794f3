use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use futures_ingestor::{
    cli::{
        commands::{Cli, Commands},
        config::IngestorConfig,
        params::{
            build_request, parse_batch_params_from_file, parse_batch_params_from_json_string,
            parse_batch_params_from_stdin, parse_contracts,
        },
    },
    ingest::{Ingested, fetch_and_store, fetch_and_store_details, fetch_batch_partial},
    io::price_store::{PriceStore, StoredSeries},
    providers::build_source,
};
use shared_utils::config::resolve_config_path;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// Paths go to stdout, one per line, for machine parsing.
fn print_stored(ingested: &Ingested<Vec<StoredSeries>>) -> usize {
    let mut added = 0;
    for s in &ingested.stored {
        if s.path.exists() {
            println!("{}", s.path.display());
        }
        added += s.added;
    }
    for (code, message) in &ingested.rejected {
        eprintln!("REJECTED: {code} - {message}");
    }
    added
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config.as_deref())?;
    let mut config = IngestorConfig::load(&config_path)?;
    if let Some(root) = &cli.data_root {
        config.settings.data_root = PathBuf::from(root);
    }

    let source = build_source(&config.source).context("initializing price source")?;
    let store = PriceStore::new(&config.settings.data_root);

    match &cli.command {
        Commands::Single {
            contracts,
            start,
            end,
            field,
        } => {
            let request = build_request(
                contracts,
                start,
                end,
                field.as_deref(),
                config.default_field(),
            )?
            .with_volume_field(config.volume_field());
            let stored = fetch_and_store(&source, &store, &request)
                .with_context(|| format!("fetching {contracts}"))?;
            let added = print_stored(&stored);
            eprintln!("SUMMARY: 1 succeeded, 0 failed, {added} new prices");
        }

        Commands::Details {
            contracts,
            yellow_key,
        } => {
            let codes = parse_contracts(contracts)?;
            let changed = fetch_and_store_details(&source, &store, &codes, yellow_key)
                .with_context(|| format!("fetching reference data for {contracts}"))?;
            eprintln!("SUMMARY: {} requested, {changed} records updated", codes.len());
        }

        Commands::Batch { source: input_kind, input } => {
            let default_field = config.default_field();
            let requests = match input_kind.as_str() {
                "file" => {
                    let file_path = input
                        .as_deref()
                        .context("File path required for source=file")?;
                    parse_batch_params_from_file(file_path, default_field)?
                }
                "stdin" => parse_batch_params_from_stdin(default_field)?,
                "json" => {
                    let json_str = input
                        .as_deref()
                        .context("JSON string required for source=json")?;
                    parse_batch_params_from_json_string(json_str, default_field)?
                }
                other => bail!("Invalid source '{other}'. Use 'file', 'stdin', or 'json'"),
            };

            let requests: Vec<_> = requests
                .into_iter()
                .map(|r| r.with_volume_field(config.volume_field()))
                .collect();
            let results = fetch_batch_partial(&source, &store, &requests)?;

            let mut success_count = 0;
            let mut error_count = 0;
            let mut added = 0;
            for (request, result) in requests.iter().zip(results) {
                match result {
                    Ok(stored) => {
                        added += print_stored(&stored);
                        success_count += 1;
                    }
                    Err(e) => {
                        let codes: Vec<String> =
                            request.contracts.iter().map(ToString::to_string).collect();
                        eprintln!("ERROR: {} - {e}", codes.join(","));
                        error_count += 1;
                    }
                }
            }

            // stderr, so it doesn't interfere with machine parsing of paths
            eprintln!("SUMMARY: {success_count} succeeded, {error_count} failed, {added} new prices");
        }
    }
    Ok(())
}
