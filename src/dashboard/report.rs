//! Per-ticker analysis and page assembly.
//!
//! Each ticker becomes an independent section: a failure while loading or
//! analysing one ticker replaces that section with a short message and
//! leaves the rest of the page intact.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::{error, info, warn};
use polars::prelude::*;
use std::path::PathBuf;

use super::watchlist::{build_watchlist, PriceSnapshot, WatchlistRow};
use crate::charts::price_charts::{forecast_chart, price_charts};
use crate::charts::vega::Chart;
use crate::constants::PRICE_DECIMALS;
use crate::forecast::step_1_window_preparation::closing_window;
use crate::forecast::step_4_model_serialization::{read_metadata, ModelArtifacts};
use crate::forecast::step_5_prediction::{forecast_with_artifacts, ForecastPoint};
use crate::forecast::ForecastError;
use crate::market_data::history::{date_values, lookback_window, save_history_csv, PriceSource};
use crate::util::config::DashboardConfig;
use crate::util::feature_engineering::{prepare_price_frame, tail_rows};

/// Message shown in place of the forecast when it cannot be produced
pub const FORECAST_UNAVAILABLE: &str = "Forecast unavailable";

pub fn section_heading(symbol: &str) -> String {
    format!("Stock Price Analysis for {}", symbol)
}

pub fn ticker_error_message(symbol: &str) -> String {
    format!(
        "Error occurred while fetching data for {}. Please check the ticker and try again.",
        symbol
    )
}

/// Produces a price forecast from a ticker's full history
pub trait ForecastProvider: Send + Sync {
    fn forecast(&self, symbol: &str, history: &DataFrame, days: usize)
        -> Result<Vec<ForecastPoint>, ForecastError>;
}

/// Loads `{TICKER}_lstm_model` or `default_lstm_model` from a directory
#[derive(Debug, Clone)]
pub struct ModelDirectoryForecaster {
    pub model_dir: PathBuf,
    /// Window the models are expected to use; the saved metadata wins on mismatch
    pub sequence_length: usize,
}

impl ForecastProvider for ModelDirectoryForecaster {
    fn forecast(
        &self,
        symbol: &str,
        history: &DataFrame,
        days: usize,
    ) -> Result<Vec<ForecastPoint>, ForecastError> {
        let artifacts = ModelArtifacts::locate(&self.model_dir, symbol)?;
        let metadata = read_metadata(&artifacts.model_path)?;
        metadata.validate()?;
        if metadata.sequence_length != self.sequence_length {
            warn!(
                "Model for {} uses a {}-step window, configured {}; using the model's",
                symbol, metadata.sequence_length, self.sequence_length
            );
        }

        // Check history against the model's window before loading any weights
        let window = closing_window(history, metadata.sequence_length)?;
        let last_date = date_values(history)?
            .into_iter()
            .flatten()
            .last()
            .ok_or(ForecastError::InsufficientHistory {
                needed: metadata.sequence_length,
                available: 0,
            })?;

        forecast_with_artifacts(&artifacts, &window, last_date, days)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForecastOutcome {
    Disabled,
    /// Carries the reason, which is logged but not shown
    Unavailable(String),
    Ready(Vec<ForecastPoint>),
}

/// Everything displayed for one successfully loaded ticker
#[derive(Debug, Clone)]
pub struct TickerReport {
    pub symbol: String,
    pub heading: String,
    /// The rows shown in the charts
    pub recent: DataFrame,
    pub snapshot: PriceSnapshot,
    pub charts: Vec<Chart>,
    pub forecast: ForecastOutcome,
    pub forecast_chart: Option<Chart>,
}

#[derive(Debug, Clone)]
pub enum TickerSection {
    Report(Box<TickerReport>),
    Failed { symbol: String, message: String },
}

impl TickerSection {
    pub fn symbol(&self) -> &str {
        match self {
            TickerSection::Report(report) => &report.symbol,
            TickerSection::Failed { symbol, .. } => symbol,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardPage {
    pub generated_on: NaiveDate,
    pub sections: Vec<TickerSection>,
    pub watchlist: Vec<WatchlistRow>,
}

/// Entered ticker first (if any), then the default one, without duplicates
pub fn ticker_order(entered: Option<&str>, default_ticker: &str) -> Vec<String> {
    let mut tickers: Vec<String> = Vec::new();
    for ticker in entered.into_iter().chain(std::iter::once(default_ticker)) {
        let ticker = ticker.trim().to_uppercase();
        if !ticker.is_empty() && !tickers.contains(&ticker) {
            tickers.push(ticker);
        }
    }
    tickers
}

pub struct Dashboard {
    config: DashboardConfig,
    source: Box<dyn PriceSource>,
    forecaster: Option<Box<dyn ForecastProvider>>,
    today: NaiveDate,
    history_export_dir: Option<PathBuf>,
}

impl Dashboard {
    /// A dashboard over `source`, forecasting from `config.model_dir` when enabled
    pub fn new(config: DashboardConfig, source: Box<dyn PriceSource>, today: NaiveDate) -> Self {
        let forecaster: Option<Box<dyn ForecastProvider>> = if config.forecast_enabled {
            Some(Box::new(ModelDirectoryForecaster {
                model_dir: config.model_dir.clone(),
                sequence_length: config.sequence_length,
            }))
        } else {
            None
        };
        Self {
            config,
            source,
            forecaster,
            today,
            history_export_dir: None,
        }
    }

    pub fn with_forecaster(mut self, forecaster: Option<Box<dyn ForecastProvider>>) -> Self {
        self.forecaster = forecaster;
        self
    }

    /// Also write each fetched history to `{dir}/{SYMBOL}.csv`
    pub fn with_history_export(mut self, dir: Option<PathBuf>) -> Self {
        self.history_export_dir = dir;
        self
    }

    pub fn build(&self, entered: Option<&str>) -> DashboardPage {
        let sections = ticker_order(entered, &self.config.default_ticker)
            .iter()
            .map(|symbol| self.section(symbol))
            .collect();

        let watchlist = if self.config.watchlist_enabled {
            let (start, end) = lookback_window(self.today, self.config.lookback_days);
            build_watchlist(
                self.source.as_ref(),
                &self.config.watchlist,
                start,
                end,
                self.config.ma_windows(),
            )
        } else {
            Vec::new()
        };

        DashboardPage {
            generated_on: self.today,
            sections,
            watchlist,
        }
    }

    /// Analyses one ticker, turning any failure into the generic error section
    pub fn section(&self, symbol: &str) -> TickerSection {
        match self.analyse_ticker(symbol) {
            Ok(report) => TickerSection::Report(Box::new(report)),
            Err(e) => {
                error!("Failed to analyse {}: {:#}", symbol, e);
                TickerSection::Failed {
                    symbol: symbol.to_string(),
                    message: ticker_error_message(symbol),
                }
            }
        }
    }

    pub fn analyse_ticker(&self, symbol: &str) -> Result<TickerReport> {
        let (start, end) = lookback_window(self.today, self.config.lookback_days);
        info!("Analysing {} from {} to {} via {}", symbol, start, end, self.source.name());

        let mut history = self
            .source
            .history(symbol, start, end)
            .with_context(|| format!("Failed to load history for {}", symbol))?;

        if let Some(dir) = &self.history_export_dir {
            let path = dir.join(format!("{}.csv", symbol));
            save_history_csv(&mut history, &path)
                .with_context(|| format!("Failed to export history to {}", path.display()))?;
            info!("Saved {} rows of {} history to {}", history.height(), symbol, path.display());
        }

        let windows = self.config.ma_windows();
        let prepared = prepare_price_frame(history, &windows, PRICE_DECIMALS)
            .with_context(|| format!("Failed to compute indicators for {}", symbol))?;
        let snapshot = PriceSnapshot::from_frame(&prepared, windows)?;
        let recent = tail_rows(&prepared, self.config.days_to_show);
        let charts = price_charts(&recent, windows[0], windows[1])?;

        let forecast = self.forecast_outcome(symbol, &prepared);
        let forecast_chart = match &forecast {
            ForecastOutcome::Ready(points) => Some(forecast_chart(&recent, points)?),
            _ => None,
        };

        Ok(TickerReport {
            symbol: symbol.to_string(),
            heading: section_heading(symbol),
            recent,
            snapshot,
            charts,
            forecast,
            forecast_chart,
        })
    }

    fn forecast_outcome(&self, symbol: &str, history: &DataFrame) -> ForecastOutcome {
        let Some(forecaster) = &self.forecaster else {
            return ForecastOutcome::Disabled;
        };
        match forecaster.forecast(symbol, history, self.config.forecast_days) {
            Ok(points) => ForecastOutcome::Ready(points),
            Err(e @ ForecastError::ArtifactsNotFound { .. }) => {
                warn!("Skipping forecast for {}: {}", symbol, e);
                ForecastOutcome::Unavailable(e.to_string())
            }
            Err(e) => {
                error!("Forecast for {} failed: {}", symbol, e);
                ForecastOutcome::Unavailable(e.to_string())
            }
        }
    }
}
