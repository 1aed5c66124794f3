use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the pipeline config file (falls back to $SPREADS_CONFIG)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Override `settings.data_root` from the config
    #[arg(long)]
    pub data_root: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch prices for an explicit list of contracts
    Single {
        /// Comma-separated contract codes (e.g. "CLG23,CLH23")
        #[arg(long)]
        contracts: String,

        /// First date, YYYY-MM-DD (inclusive)
        #[arg(long)]
        start: String,

        /// Last date, YYYY-MM-DD (inclusive)
        #[arg(short, long)]
        end: String,

        /// Price field to request (defaults to the configured field)
        #[arg(long)]
        field: Option<String>,
    },

    /// Fetch reference data (name, units, last tradeable date)
    Details {
        /// Comma-separated contract codes (e.g. "CLG23,CLH23")
        #[arg(long)]
        contracts: String,

        /// Market-sector suffix of the tickers
        #[arg(long, default_value = "Comdty")]
        yellow_key: String,
    },

    /// Execute batch fetch requests
    Batch {
        /// Source of batch parameters: file, stdin, or json
        #[arg(long, default_value = "stdin")]
        source: String,

        /// Path to JSON file (when source=file) or inline JSON string (when source=json)
        #[arg(long)]
        input: Option<String>,
    },
}
