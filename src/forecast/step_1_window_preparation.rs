// External crates
use polars::prelude::*;

// Internal modules
use super::ForecastError;

/// The last `len` closing prices, oldest first.
///
/// Null closes are skipped, so the window is always made of observed prices.
pub fn closing_window(df: &DataFrame, len: usize) -> Result<Vec<f64>, ForecastError> {
    let closes: Vec<f64> = df
        .column("close")?
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .flatten()
        .collect();

    if len == 0 || closes.len() < len {
        return Err(ForecastError::InsufficientHistory {
            needed: len,
            available: closes.len(),
        });
    }
    Ok(closes[closes.len() - len..].to_vec())
}
