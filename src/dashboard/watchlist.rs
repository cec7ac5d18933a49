// External crates
use chrono::NaiveDate;
use log::{error, info};
use polars::prelude::*;
use rayon::prelude::*;
use serde::Serialize;

// Internal modules
use crate::constants::PRICE_DECIMALS;
use crate::market_data::history::{column_values, date_values, PriceSource};
use crate::util::feature_engineering::{ma_column_name, prepare_price_frame};

/// Direction implied by the short moving average relative to the long one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trend {
    Up,
    Down,
    Flat,
    Unknown,
}

impl Trend {
    pub fn from_averages(short_ma: Option<f64>, long_ma: Option<f64>) -> Self {
        match (short_ma, long_ma) {
            (Some(s), Some(l)) if s > l => Trend::Up,
            (Some(s), Some(l)) if s < l => Trend::Down,
            (Some(_), Some(_)) => Trend::Flat,
            _ => Trend::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Trend::Up => "Uptrend",
            Trend::Down => "Downtrend",
            Trend::Flat => "Flat",
            Trend::Unknown => "n/a",
        }
    }
}

/// Latest values of a prepared price frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSnapshot {
    pub last_date: Option<NaiveDate>,
    pub last_close: Option<f64>,
    /// Percent change of the last close versus the previous one
    pub change_pct: Option<f64>,
    pub short_ma: Option<f64>,
    pub long_ma: Option<f64>,
}

impl PriceSnapshot {
    /// Reads the last row of a frame produced by `prepare_price_frame`
    pub fn from_frame(df: &DataFrame, ma_windows: [usize; 2]) -> PolarsResult<Self> {
        let last = |column: &str| -> PolarsResult<Option<f64>> {
            Ok(column_values(df, column)?.last().copied().flatten())
        };
        Ok(Self {
            last_date: date_values(df)?.last().copied().flatten(),
            last_close: last("close")?,
            change_pct: last("returns")?,
            short_ma: last(ma_column_name(ma_windows[0]).as_str())?,
            long_ma: last(ma_column_name(ma_windows[1]).as_str())?,
        })
    }

    pub fn trend(&self) -> Trend {
        Trend::from_averages(self.short_ma, self.long_ma)
    }
}

/// One watchlist line; `snapshot` is `None` when the ticker could not be loaded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchlistRow {
    pub symbol: String,
    pub snapshot: Option<PriceSnapshot>,
    pub trend: Trend,
}

fn watchlist_row(
    source: &dyn PriceSource,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    ma_windows: [usize; 2],
) -> anyhow::Result<WatchlistRow> {
    let history = source.history(symbol, start, end)?;
    let prepared = prepare_price_frame(history, &ma_windows, PRICE_DECIMALS)?;
    let snapshot = PriceSnapshot::from_frame(&prepared, ma_windows)?;
    Ok(WatchlistRow {
        symbol: symbol.to_string(),
        trend: snapshot.trend(),
        snapshot: Some(snapshot),
    })
}

/// Summary rows for `symbols`, fetched in parallel. Order follows `symbols`.
pub fn build_watchlist(
    source: &dyn PriceSource,
    symbols: &[String],
    start: NaiveDate,
    end: NaiveDate,
    ma_windows: [usize; 2],
) -> Vec<WatchlistRow> {
    info!("Building watchlist for {} symbols", symbols.len());
    symbols
        .par_iter()
        .map(|symbol| {
            watchlist_row(source, symbol, start, end, ma_windows).unwrap_or_else(|e| {
                error!("Watchlist entry {} failed: {:#}", symbol, e);
                WatchlistRow {
                    symbol: symbol.clone(),
                    snapshot: None,
                    trend: Trend::Unknown,
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::csv_source::CsvDirectory;
    use crate::util::test_utils::{generate_quotes, write_quotes_csv};
    use tempfile::tempdir;

    #[test]
    fn test_trend_from_averages() {
        assert_eq!(Trend::from_averages(Some(2.0), Some(1.0)), Trend::Up);
        assert_eq!(Trend::from_averages(Some(1.0), Some(2.0)), Trend::Down);
        assert_eq!(Trend::from_averages(Some(1.0), Some(1.0)), Trend::Flat);
        assert_eq!(Trend::from_averages(Some(1.0), None), Trend::Unknown);
        assert_eq!(Trend::Unknown.label(), "n/a");
    }

    #[test]
    fn test_snapshot_reads_last_row() {
        let df = df!(
            "date" => [0i32, 1],
            "close" => [100.0, 110.0],
            "returns" => [None, Some(10.0)],
            "ma_2" => [None, Some(105.0)],
            "ma_3" => [None::<f64>, None]
        )
        .unwrap();
        let df = df
            .lazy()
            .with_column(col("date").cast(DataType::Date))
            .collect()
            .unwrap();

        let snapshot = PriceSnapshot::from_frame(&df, [2, 3]).unwrap();
        assert_eq!(snapshot.last_date, NaiveDate::from_ymd_opt(1970, 1, 2));
        assert_eq!(snapshot.last_close, Some(110.0));
        assert_eq!(snapshot.change_pct, Some(10.0));
        assert_eq!(snapshot.short_ma, Some(105.0));
        assert_eq!(snapshot.long_ma, None);
        assert_eq!(snapshot.trend(), Trend::Unknown);
    }

    #[test]
    fn test_build_watchlist_keeps_order_and_failures() {
        let dir = tempdir().unwrap();
        let quotes = generate_quotes(260, 3);
        write_quotes_csv(dir.path(), "AAPL", &quotes);
        write_quotes_csv(dir.path(), "MSFT", &quotes);

        let source = CsvDirectory::new(dir.path());
        let symbols: Vec<String> = ["MSFT", "TSLA", "AAPL"].iter().map(|s| s.to_string()).collect();
        let start = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let rows = build_watchlist(&source, &symbols, start, end, [100, 200]);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].symbol, "MSFT");
        assert!(rows[0].snapshot.is_some());
        assert_ne!(rows[0].trend, Trend::Unknown);
        assert_eq!(rows[1].symbol, "TSLA");
        assert!(rows[1].snapshot.is_none());
        assert_eq!(rows[2].symbol, "AAPL");
    }
}
