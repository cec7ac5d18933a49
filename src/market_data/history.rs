// External crates
use chrono::{Datelike, Duration, NaiveDate};
use polars::prelude::*;
use std::path::Path;
use thiserror::Error;

/// Days between 0001-01-01 and 1970-01-01, used to map polars `Date` values
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// A single daily OHLCV bar
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Close adjusted for splits and dividends
    pub adj_close: f64,
    pub volume: u64,
}

/// Errors raised while retrieving price history
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid ticker symbol: {0:?}")]
    InvalidSymbol(String),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("market data API returned HTTP {status} for {symbol}")]
    Status { symbol: String, status: u16 },
    #[error("failed to parse market data response: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("API error [{code}]: {description}")]
    Api { code: String, description: String },
    #[error("no price data returned for {symbol}")]
    NoData { symbol: String },
    #[error("malformed price file: {0}")]
    Malformed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Polars(#[from] PolarsError),
}

/// Anything that can produce a daily price history for a ticker.
///
/// The returned frame always carries the columns `date`, `open`, `high`,
/// `low`, `close`, `adjusted_close` and `volume`, sorted ascending by date.
pub trait PriceSource: Send + Sync {
    /// Human readable name used in logs
    fn name(&self) -> &str;

    /// Daily bars for `symbol` between `start` and `end` (both inclusive)
    fn history(&self, symbol: &str, start: NaiveDate, end: NaiveDate)
        -> Result<DataFrame, FetchError>;
}

/// Trims and upper-cases a ticker, rejecting anything that is not a plausible symbol
pub fn normalize_symbol(symbol: &str) -> Result<String, FetchError> {
    let trimmed = symbol.trim();
    let valid = !trimmed.is_empty()
        && trimmed.len() <= 16
        && trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='));
    if !valid {
        return Err(FetchError::InvalidSymbol(symbol.to_string()));
    }
    Ok(trimmed.to_uppercase())
}

/// Returns the `[today - days, today]` window used for history requests
pub fn lookback_window(today: NaiveDate, days: i64) -> (NaiveDate, NaiveDate) {
    let start = Duration::try_days(days)
        .and_then(|span| today.checked_sub_signed(span))
        .unwrap_or(NaiveDate::MIN);
    (start, today)
}

pub fn date_to_epoch_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - EPOCH_DAYS_FROM_CE
}

pub fn epoch_days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days + EPOCH_DAYS_FROM_CE)
}

/// Builds the standard price frame from a list of quotes.
///
/// Quotes are sorted by date; when two quotes share a date the later one wins.
pub fn quotes_to_dataframe(mut quotes: Vec<Quote>) -> PolarsResult<DataFrame> {
    quotes.sort_by_key(|q| q.date);

    let mut deduped: Vec<Quote> = Vec::with_capacity(quotes.len());
    for quote in quotes {
        match deduped.last_mut() {
            Some(last) if last.date == quote.date => *last = quote,
            _ => deduped.push(quote),
        }
    }

    let dates: Vec<i32> = deduped.iter().map(|q| date_to_epoch_days(q.date)).collect();
    let date_series = Series::new("date".into(), dates).cast(&DataType::Date)?;

    DataFrame::new(vec![
        date_series.into_column(),
        Series::new("open".into(), deduped.iter().map(|q| q.open).collect::<Vec<f64>>()).into_column(),
        Series::new("high".into(), deduped.iter().map(|q| q.high).collect::<Vec<f64>>()).into_column(),
        Series::new("low".into(), deduped.iter().map(|q| q.low).collect::<Vec<f64>>()).into_column(),
        Series::new("close".into(), deduped.iter().map(|q| q.close).collect::<Vec<f64>>()).into_column(),
        Series::new(
            "adjusted_close".into(),
            deduped.iter().map(|q| q.adj_close).collect::<Vec<f64>>(),
        )
        .into_column(),
        Series::new(
            "volume".into(),
            deduped.iter().map(|q| q.volume as f64).collect::<Vec<f64>>(),
        )
        .into_column(),
    ])
}

/// Reads the `date` column back into calendar dates
pub fn date_values(df: &DataFrame) -> PolarsResult<Vec<Option<NaiveDate>>> {
    let days = df.column("date")?.cast(&DataType::Int32)?;
    Ok(days
        .i32()?
        .into_iter()
        .map(|d| d.and_then(epoch_days_to_date))
        .collect())
}

/// Reads a Float64 column as a vector of optional values
pub fn column_values(df: &DataFrame, column: &str) -> PolarsResult<Vec<Option<f64>>> {
    Ok(df.column(column)?.f64()?.into_iter().collect())
}

/// Last non-null value of a Float64 column
pub fn last_value(df: &DataFrame, column: &str) -> PolarsResult<Option<f64>> {
    Ok(df.column(column)?.f64()?.into_iter().rev().flatten().next())
}

/// Writes a price frame to CSV so it can be reloaded in offline mode
pub fn save_history_csv(df: &mut DataFrame, path: &Path) -> PolarsResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)
}
