// External crates
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

// Internal modules
use stocklens::dashboard::html::write_dashboard;
use stocklens::dashboard::report::Dashboard;
use stocklens::dashboard::summary::terminal_summary;
use stocklens::market_data::csv_source::CsvDirectory;
use stocklens::market_data::history::PriceSource;
use stocklens::market_data::yahoo::YahooFinance;
use stocklens::util::config::DashboardConfig;

#[derive(Parser, Debug)]
#[command(name = "stocklens", version, about = "Stock price dashboard with moving averages and LSTM forecasts")]
struct Cli {
    /// Ticker to analyse in addition to the default one
    ticker: Option<String>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Rows shown in each chart
    #[arg(short, long)]
    days_to_show: Option<usize>,

    /// Number of trading days to forecast
    #[arg(short, long)]
    forecast_days: Option<usize>,

    #[arg(long)]
    no_forecast: bool,

    #[arg(long)]
    no_watchlist: bool,

    /// Read `{SYMBOL}.csv` files from DIR instead of Yahoo Finance
    #[arg(long, value_name = "DIR")]
    offline: Option<PathBuf>,

    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    /// Directory for index.html
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also save fetched histories as CSV into DIR
    #[arg(long, value_name = "DIR")]
    save_csv: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, config: &mut DashboardConfig) {
        if let Some(days) = self.days_to_show {
            config.days_to_show = days;
        }
        if let Some(days) = self.forecast_days {
            config.forecast_days = days;
        }
        if self.no_forecast {
            config.forecast_enabled = false;
        }
        if self.no_watchlist {
            config.watchlist_enabled = false;
        }
        if let Some(dir) = &self.offline {
            config.data_dir = Some(dir.clone());
        }
        if let Some(dir) = &self.model_dir {
            config.model_dir = dir.clone();
        }
        if let Some(dir) = &self.output {
            config.output_dir = dir.clone();
        }
    }
}

fn price_source(config: &DashboardConfig) -> Result<Box<dyn PriceSource>> {
    match &config.data_dir {
        Some(dir) => {
            info!("Offline mode: reading prices from {}", dir.display());
            Ok(Box::new(CsvDirectory::new(dir)))
        }
        None => {
            let client = YahooFinance::with_settings(config.http_timeout_secs, &config.user_agent)
                .context("Failed to create HTTP client")?;
            Ok(Box::new(client))
        }
    }
}

fn main() -> Result<()> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = DashboardConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;

    info!(
        "Starting stocklens v{} (ticker: {})",
        env!("CARGO_PKG_VERSION"),
        cli.ticker.as_deref().unwrap_or(&config.default_ticker)
    );

    let source = price_source(&config)?;
    let today = chrono::Local::now().date_naive();
    let ma_windows = config.ma_windows();
    let output_dir = config.output_dir.clone();

    let dashboard = Dashboard::new(config, source, today).with_history_export(cli.save_csv.clone());
    let page = dashboard.build(cli.ticker.as_deref());

    let path = write_dashboard(&page, &output_dir)?;
    print!("{}", terminal_summary(&page, ma_windows));
    println!("Dashboard: {}", path.display());
    Ok(())
}
