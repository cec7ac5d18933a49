// External crates
use polars::prelude::*;

/// Rounds a value half away from zero to `decimals` places
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Name of the moving-average column for a window, e.g. `ma_100`
pub fn ma_column_name(window: usize) -> String {
    format!("ma_{}", window)
}

/// Rounds every value of a Float64 column in place
pub fn round_column(df: &mut DataFrame, column: &str, decimals: u32) -> PolarsResult<()> {
    let rounded: Vec<Option<f64>> = df
        .column(column)?
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .map(|v| v.map(|x| round_to(x, decimals)))
        .collect();
    df.replace(column, Series::new(column.into(), rounded))?;
    Ok(())
}

/// Calculates the trailing Simple Moving Average (SMA) of `column`.
///
/// Rows before the window fills are null. A series shorter than the window
/// produces an all-null column rather than an error.
pub fn calculate_sma(df: &DataFrame, column: &str, window: usize) -> PolarsResult<Series> {
    if window == 0 {
        return Err(PolarsError::ComputeError(
            "SMA window must be greater than zero".into(),
        ));
    }

    let series = df.column(column)?.f64()?.clone().into_series();
    if series.len() < window {
        return Ok(Series::full_null(column.into(), series.len(), &DataType::Float64));
    }

    series.rolling_mean(RollingOptionsFixedWindow {
        window_size: window,
        min_periods: window,
        center: false,
        weights: None,
        fn_params: None,
    })
}

/// Appends a rounded `ma_{window}` column for each window
pub fn add_moving_averages(df: &mut DataFrame, windows: &[usize], decimals: u32) -> PolarsResult<()> {
    for &window in windows {
        let name = ma_column_name(window);
        let sma = calculate_sma(df, "close", window)?;
        let rounded: Vec<Option<f64>> = sma
            .f64()?
            .into_iter()
            .map(|v| v.map(|x| round_to(x, decimals)))
            .collect();
        df.with_column(Series::new(name.as_str().into(), rounded))?;
    }
    Ok(())
}

/// Appends `returns`, the percentage change of close versus the previous row
pub fn add_daily_returns(df: &mut DataFrame) -> PolarsResult<()> {
    let close = df.column("close")?.f64()?;
    let close_shifted = close.shift(1);
    let returns: Vec<Option<f64>> = close_shifted
        .into_iter()
        .zip(close.into_iter())
        .map(|(prev, curr)| match (prev, curr) {
            (Some(p), Some(c)) if p != 0.0 => Some((c - p) / p * 100.0),
            _ => None,
        })
        .collect();
    df.with_column(Series::new("returns".into(), returns))?;
    Ok(())
}

/// Rounds close prices and derives every column the charts need
pub fn prepare_price_frame(mut df: DataFrame, ma_windows: &[usize], decimals: u32) -> PolarsResult<DataFrame> {
    round_column(&mut df, "close", decimals)?;
    add_moving_averages(&mut df, ma_windows, decimals)?;
    add_daily_returns(&mut df)?;
    Ok(df)
}

/// The last `n` rows of the frame (all rows if shorter)
pub fn tail_rows(df: &DataFrame, n: usize) -> DataFrame {
    df.tail(Some(n))
}
