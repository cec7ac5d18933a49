// External crates
use chrono::{DateTime, NaiveDate};
use log::{debug, info};
use polars::prelude::*;
use std::path::{Path, PathBuf};

// Internal modules
use super::history::{
    date_values, normalize_symbol, quotes_to_dataframe, FetchError, PriceSource, Quote,
};

/// Offline price source reading `{dir}/{SYMBOL}.csv` files
#[derive(Debug, Clone)]
pub struct CsvDirectory {
    dir: PathBuf,
}

impl CsvDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", symbol))
    }
}

/// Maps common spellings of OHLCV headers onto the standard column names
pub fn standard_column_name(column_name: &str) -> Option<&'static str> {
    let name = match column_name.trim().to_lowercase().as_str() {
        "open" | "o" | "op" | "openprice" | "open_price" => "open",
        "high" | "h" | "highprice" | "high_price" | "max" => "high",
        "low" | "l" | "lowprice" | "low_price" | "min" => "low",
        "close" | "c" | "cl" | "closeprice" | "close_price" => "close",
        "volume" | "vol" | "v" | "volumes" => "volume",
        "timestamp" | "time" | "date" | "t" | "datetime" | "dt" | "day" => "date",
        "adj close" | "adj_close" | "adjusted close" | "adjusted_close" | "adjclose" | "adj" => {
            "adjusted_close"
        }
        _ => return None,
    };
    Some(name)
}

/// Renames recognised headers in place. The first column claiming a standard name keeps it.
pub fn standardize_columns(df: &mut DataFrame) -> PolarsResult<()> {
    let mut taken: Vec<&'static str> = Vec::new();
    let renamed: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| match standard_column_name(name.as_str()) {
            Some(standard) if !taken.contains(&standard) => {
                taken.push(standard);
                standard.to_string()
            }
            _ => name.to_string(),
        })
        .collect();

    debug!("Standardized columns: {:?}", renamed);
    df.set_column_names(renamed)
}

fn parse_date_str(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let head = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%m/%d/%Y"))
        .ok()
}

fn parse_dates(df: &DataFrame) -> Result<Vec<Option<NaiveDate>>, FetchError> {
    let column = df.column("date")?;
    let dates = match column.dtype() {
        DataType::String => column
            .str()?
            .into_iter()
            .map(|v| v.and_then(parse_date_str))
            .collect(),
        DataType::Date => date_values(df)?,
        DataType::Datetime(_, _) => {
            let mut as_dates = df.clone();
            as_dates.with_column(column.cast(&DataType::Date)?)?;
            date_values(&as_dates)?
        }
        DataType::Int64 | DataType::Int32 | DataType::UInt64 => {
            // Unix seconds
            column
                .cast(&DataType::Int64)?
                .i64()?
                .into_iter()
                .map(|v| v.and_then(|s| DateTime::from_timestamp(s, 0)).map(|dt| dt.date_naive()))
                .collect()
        }
        other => {
            return Err(FetchError::Malformed(format!(
                "unsupported date column type {:?}",
                other
            )))
        }
    };
    Ok(dates)
}

fn float_column(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<f64>>>, FetchError> {
    if !df.schema().contains(name) {
        return Ok(None);
    }
    let column = df.column(name)?.cast(&DataType::Float64)?;
    Ok(Some(column.f64()?.into_iter().collect()))
}

/// Loads a CSV file into quotes, keeping only complete rows inside `[start, end]`
pub fn read_quotes(path: &Path, start: NaiveDate, end: NaiveDate) -> Result<Vec<Quote>, FetchError> {
    let file = std::fs::File::open(path)?;
    let mut df = CsvReader::new(file).finish()?;
    standardize_columns(&mut df)?;

    let required = |name: &str| -> Result<Vec<Option<f64>>, FetchError> {
        float_column(&df, name)?
            .ok_or_else(|| FetchError::Malformed(format!("required column {} not found", name)))
    };
    let open = required("open")?;
    let high = required("high")?;
    let low = required("low")?;
    let close = required("close")?;
    let adj_close = float_column(&df, "adjusted_close")?;
    let volume = float_column(&df, "volume")?;
    let dates = parse_dates(&df)?;

    let mut quotes = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        if let (Some(date), Some(o), Some(h), Some(l), Some(c)) =
            (dates[i], open[i], high[i], low[i], close[i])
        {
            if date < start || date > end {
                continue;
            }
            let adj = adj_close.as_ref().and_then(|a| a[i]).unwrap_or(c);
            let vol = volume.as_ref().and_then(|v| v[i]).unwrap_or(0.0);
            quotes.push(Quote {
                date,
                open: o,
                high: h,
                low: l,
                close: c,
                adj_close: adj,
                volume: vol.max(0.0) as u64,
            });
        }
    }
    Ok(quotes)
}

impl PriceSource for CsvDirectory {
    fn name(&self) -> &str {
        "CSV directory"
    }

    fn history(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<DataFrame, FetchError> {
        let symbol = normalize_symbol(symbol)?;
        let path = self.path_for(&symbol);
        info!("Loading {} history from {}", symbol, path.display());

        let quotes = read_quotes(&path, start, end)?;
        if quotes.is_empty() {
            return Err(FetchError::NoData { symbol });
        }
        Ok(quotes_to_dataframe(quotes)?)
    }
}
