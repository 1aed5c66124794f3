use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use futures_ingestor::{io::price_store::PriceStore, providers::build_source};
use indexmap::IndexMap;
use shared_utils::config::resolve_config_path;
use spread_sync::{
    audit::audit_commodity,
    backfill::{Backfill, BackfillOptions},
    config::{LoadedConfig, NormalizationReport, PipelineConfig, read_config_path},
    contracts::sync_contracts,
    export::{export_commodity, write_index},
    resolver::resolve_root,
    store::SpreadStore,
    tz::exchange_today,
    visualize::{SvgRenderer, write_charts},
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Futures calendar-spread pipeline")]
struct Cli {
    /// Pipeline config file (falls back to $SPREADS_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Override `settings.data_root` from the config
    #[arg(long, global = true)]
    data_root: Option<String>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Load, normalize and validate the config; print what normalization changed
    CheckConfig,
    /// Print the contracts active for a commodity on a date
    Resolve {
        #[arg(long)]
        commodity: String,
        /// YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,
    },
    /// Fetch missing prices and append missing spreads
    Backfill(BackfillCmd),
    /// Render one SVG chart per spread variant
    Visualize(Selection),
    /// Write flat JSON under data/
    Export(Selection),
    /// Fetch last trade dates for contracts that have none
    SyncContracts(Selection),
    /// Report raw price coverage and check its integrity
    Audit(Selection),
}

#[derive(Args)]
struct Selection {
    /// Commodity roots; all configured commodities when omitted
    #[arg(long = "commodity")]
    commodities: Vec<String>,
}

#[derive(Args)]
struct BackfillCmd {
    #[command(flatten)]
    selection: Selection,
    /// First date (default: one year before --end)
    #[arg(long)]
    start: Option<NaiveDate>,
    /// Last date (default: today on the exchange)
    #[arg(long)]
    end: Option<NaiveDate>,
    /// Report the plan without fetching or writing
    #[arg(long)]
    dry_run: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read(cli: &Cli) -> Result<(PipelineConfig, NormalizationReport)> {
    let path = resolve_config_path(cli.config.as_deref())?;
    let (mut cfg, report) =
        read_config_path(&path).with_context(|| format!("loading {}", path.display()))?;
    if let Some(root) = &cli.data_root {
        cfg.settings.data_root = PathBuf::from(root);
    }
    Ok((cfg, report))
}

fn load(cli: &Cli) -> Result<LoadedConfig> {
    let (mut cfg, report) = read(cli)?;
    cfg.fill_last_trades(&PriceStore::new(&cfg.settings.data_root))?;
    cfg.validate(report).context("validating config")
}

fn sync(cli: &Cli, roots: &[String]) -> Result<()> {
    let (cfg, _) = read(cli)?;
    cfg.source
        .validate()
        .map_err(|message| anyhow::anyhow!("invalid [source]: {message}"))?;
    let source = build_source(&cfg.source).context("initializing price source")?;
    let store = PriceStore::new(&cfg.settings.data_root);
    let synced = sync_contracts(&cfg, roots, &*source, &store)?;
    for s in &synced {
        println!("{s}");
    }
    let missing: usize = synced.iter().map(|s| s.still_missing.len()).sum();
    eprintln!("SUMMARY: {missing} contracts still without a last trade date");
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    // sync-contracts runs on the unvalidated config
    let config = match &cli.cmd {
        Cmd::SyncContracts(sel) => return sync(&cli, &sel.commodities),
        _ => load(&cli)?,
    };

    match &cli.cmd {
        Cmd::CheckConfig => {
            println!("{}", serde_json::to_string_pretty(&config.report)?);
            for c in config.commodities.values() {
                eprintln!(
                    "{}: {} contracts, {} spreads",
                    c.root,
                    c.contracts.len(),
                    c.spreads.len()
                );
            }
        }

        Cmd::Resolve { commodity, date } => {
            let resolved = resolve_root(&config.commodities, commodity, *date)?;
            for (i, c) in resolved.contracts.iter().enumerate() {
                println!("{}\t{}\t{}\t{}", i + 1, c.code, c.last_trade, c.roll);
            }
        }

        Cmd::Backfill(cmd) => {
            let commodities = config.select(&cmd.selection.commodities)?;
            let source = build_source(&config.source).context("initializing price source")?;
            let today = exchange_today(config.exchange_tz);
            let opts = BackfillOptions::new(cmd.start, cmd.end, today, cmd.dry_run);
            let backfill = Backfill::new(&config, &*source);

            let (mut values, mut gaps) = (0, 0);
            for commodity in commodities {
                let report = backfill
                    .run(commodity, &opts)
                    .with_context(|| format!("backfilling {}", commodity.root))?;
                println!("{report}");
                values += report.values_written();
                gaps += report.gaps.len();
            }
            eprintln!("SUMMARY: {values} values written, {gaps} gaps");
        }

        Cmd::Visualize(sel) => {
            let store = SpreadStore::new(&config.settings.data_root);
            for commodity in config.select(&sel.commodities)? {
                let tables = store.load_tables(&commodity.root)?;
                let curve = store.load_curve(&commodity.root)?;
                let paths = write_charts(
                    &SvgRenderer,
                    &config.settings.data_root,
                    commodity,
                    &tables,
                    &curve,
                )?;
                for p in paths {
                    println!("{}", p.display());
                }
            }
        }

        Cmd::Export(sel) => {
            let store = SpreadStore::new(&config.settings.data_root);
            let mut status = IndexMap::new();
            for commodity in config.select(&sel.commodities)? {
                let result = store
                    .load_tables(&commodity.root)
                    .and_then(|t| export_commodity(&config.settings.data_root, commodity, &t));
                match result {
                    Ok(meta) => {
                        for file in meta.files.values() {
                            println!("{}/{file}", commodity.root);
                        }
                        status.insert(commodity.root.clone(), true);
                    }
                    Err(e) => {
                        warn!(commodity = %commodity.root, error = %e, "export failed");
                        status.insert(commodity.root.clone(), false);
                    }
                }
            }
            let index = write_index(&config.settings.data_root, status)?;
            println!("{}", index.display());
        }

        Cmd::SyncContracts(_) => {}

        Cmd::Audit(sel) => {
            let store = PriceStore::new(&config.settings.data_root);
            let mut failed = Vec::new();
            for commodity in config.select(&sel.commodities)? {
                let report = audit_commodity(&store, &commodity.root)?;
                println!("{report}\n");
                if !report.passed() {
                    failed.push(commodity.root.clone());
                }
            }
            if !failed.is_empty() {
                anyhow::bail!("integrity check failed for {}", failed.join(", "));
            }
        }
    }
    Ok(())
}
