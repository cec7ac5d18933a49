// External imports
use chrono::{Datelike, NaiveDate, Weekday};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::Cell;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

// Internal imports
use crate::forecast::step_5_prediction::SequenceRegressor;
use crate::forecast::ForecastError;
use crate::market_data::history::{quotes_to_dataframe, Quote};

/// Generate `rows` daily quotes on consecutive weekdays starting 2022-01-03.
///
/// Prices follow a seeded random walk around $100, so the same seed always
/// produces the same series.
pub fn generate_quotes(rows: usize, seed: u64) -> Vec<Quote> {
    let mut rng = StdRng::seed_from_u64(seed);
    let start = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap_or_default();
    let dates = start
        .iter_days()
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .take(rows);

    let mut current_price = 100.0 + rng.random::<f64>() * 50.0;
    dates
        .map(|date| {
            // Random price movement between -1% and +1%
            let movement = (rng.random::<f64>() * 2.0 - 1.0) * 0.01;
            current_price *= 1.0 + movement;

            let open = current_price * (1.0 + (rng.random::<f64>() * 0.01 - 0.005));
            let high = current_price.max(open) * (1.0 + rng.random::<f64>() * 0.005);
            let low = current_price.min(open) * (1.0 - rng.random::<f64>() * 0.005);
            let volume = rng.random_range(10_000_000..90_000_000u64);

            Quote {
                date,
                open,
                high,
                low,
                close: current_price,
                adj_close: current_price,
                volume,
            }
        })
        .collect()
}

/// Price frame built from generated quotes
pub fn quotes_frame(quotes: Vec<Quote>) -> DataFrame {
    quotes_to_dataframe(quotes).unwrap()
}

/// Writes quotes as a Yahoo-style `{SYMBOL}.csv` file and returns its path
pub fn write_quotes_csv(dir: &Path, symbol: &str, quotes: &[Quote]) -> PathBuf {
    let mut contents = String::from("Date,Open,High,Low,Close,Adj Close,Volume\n");
    for q in quotes {
        writeln!(
            contents,
            "{},{},{},{},{},{},{}",
            q.date.format("%Y-%m-%d"),
            q.open,
            q.high,
            q.low,
            q.close,
            q.adj_close,
            q.volume
        )
        .unwrap();
    }
    let path = dir.join(format!("{}.csv", symbol));
    std::fs::write(&path, contents).unwrap();
    path
}

/// Predicts the last window value plus a fixed step
pub struct LastValueRegressor {
    pub len: usize,
    pub step: f32,
}

impl SequenceRegressor for LastValueRegressor {
    fn window_len(&self) -> usize {
        self.len
    }

    fn predict_next(&self, window: &[f32]) -> Result<f32, ForecastError> {
        window
            .last()
            .map(|v| v + self.step)
            .ok_or_else(|| ForecastError::Model("empty window".into()))
    }
}

/// Succeeds `fail_after` times, then returns a model error
pub struct FailingRegressor {
    len: usize,
    fail_after: usize,
    calls: Cell<usize>,
}

impl FailingRegressor {
    pub fn new(len: usize, fail_after: usize) -> Self {
        Self {
            len,
            fail_after,
            calls: Cell::new(0),
        }
    }
}

impl SequenceRegressor for FailingRegressor {
    fn window_len(&self) -> usize {
        self.len
    }

    fn predict_next(&self, _window: &[f32]) -> Result<f32, ForecastError> {
        let calls = self.calls.get();
        self.calls.set(calls + 1);
        if calls >= self.fail_after {
            return Err(ForecastError::Model("simulated failure".into()));
        }
        Ok(0.5)
    }
}
