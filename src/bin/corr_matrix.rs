//! Correlation matrix of the watch-list, printed with a diversification verdict
use asset_correlation::report::{format_matrix, CorrelationStats};
use asset_correlation::{
    Config, CorrelationPipeline, DataQuality, IdentifierStore, SymbolResolver, YahooProvider,
};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (JSON); defaults to $ASSET_CORRELATION_CONFIG
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage the watch-list
    Watch {
        #[command(subcommand)]
        action: WatchAction,
    },
    /// Compute the correlation matrix of the watch-list
    Correlate {
        /// First day (YYYY-MM-DD); defaults to today minus the configured lookback
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last day (YYYY-MM-DD); defaults to today
        #[arg(long)]
        end: Option<NaiveDate>,
    },
}

#[derive(Subcommand, Debug)]
enum WatchAction {
    List,
    Add { identifier: String },
    Remove { identifier: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env()?,
    };

    let mut store = IdentifierStore::open(&config.store_path);

    match args.command {
        Command::Watch { action } => match action {
            WatchAction::List => {
                for identifier in store.watchlist() {
                    let symbol = store.get_symbol(identifier).unwrap_or("-");
                    let name = store.get_name(identifier).unwrap_or("");
                    println!("{}  {:<12} {}", identifier, symbol, name);
                }
            }
            WatchAction::Add { identifier } => {
                if store.add(&identifier)? {
                    println!("Added {}", identifier);
                } else {
                    println!("{} already on the watch-list", identifier);
                }
            }
            WatchAction::Remove { identifier } => {
                if store.remove(&identifier)? {
                    println!("Removed {}", identifier);
                } else {
                    println!("{} not on the watch-list", identifier);
                }
            }
        },
        Command::Correlate { start, end } => {
            let end = end.unwrap_or_else(|| chrono::Utc::now().date_naive());
            let start =
                start.unwrap_or_else(|| end - chrono::Duration::days(config.lookback_days));

            let provider = YahooProvider::new(&config.provider)?;
            let resolver = SymbolResolver::new(provider, config.overrides());
            let mut pipeline = CorrelationPipeline::new(resolver, store);

            println!("Calculating correlation matrix...");
            let report = pipeline.correlate_watchlist(start, end).await?;

            if report.quality == DataQuality::NoData {
                println!("No data available to calculate correlations.");
                return Ok(());
            }

            if !report.resolution.unresolved.is_empty() {
                println!("Unresolved: {}", report.resolution.unresolved.join(", "));
            }
            if !report.missing_prices.is_empty() {
                println!("No prices: {}", report.missing_prices.join(", "));
            }
            if report.quality == DataQuality::Partial {
                println!("Warning: partial data ({:?} alignment)", report.alignment);
            }
            if let Some((first, last)) = report.window {
                println!("Window: {} to {}", first, last);
            }

            println!("\nCorrelation Matrix:");
            print!("{}", format_matrix(&report.matrix));

            match CorrelationStats::from_matrix(&report.matrix) {
                Some(stats) => {
                    println!("\nCorrelation statistics:");
                    println!("  Mean: {:.4}", stats.mean);
                    println!("  Minimum: {:.4}", stats.min);
                    println!("  Maximum: {:.4}", stats.max);
                    println!("\n{}", stats.diversification().message());
                }
                None => println!("\nNot enough instruments for correlation statistics."),
            }
        }
    }

    Ok(())
}
