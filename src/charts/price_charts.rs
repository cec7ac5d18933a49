// External crates
use polars::prelude::*;
use serde_json::{json, Value};

// Internal modules
use super::vega::{base_spec, date_axis, date_string, frame_records, stroke_width, Chart};
use crate::forecast::step_5_prediction::ForecastPoint;
use crate::market_data::history::{column_values, date_values};
use crate::util::feature_engineering::ma_column_name;

/// Closing price line with date/close tooltips
pub fn closing_price_chart(df: &DataFrame) -> PolarsResult<Chart> {
    let title = "Closing Price by Days";
    let records = frame_records(df, &[("close", "Close")])?;

    let mut spec = base_spec(title, records);
    spec.insert("mark".into(), json!({ "type": "line" }));
    spec.insert(
        "encoding".into(),
        json!({
            "x": date_axis(),
            "y": { "field": "Close", "type": "quantitative", "title": "Price in Dollar" },
            "tooltip": [
                { "field": "Date", "type": "temporal" },
                { "field": "Close", "type": "quantitative" }
            ],
            "strokeWidth": stroke_width()
        }),
    );

    Ok(Chart::new("closing-price", title, Value::Object(spec)))
}

/// Short moving average as a solid green line, long one dashed red, on one chart
pub fn moving_average_chart(df: &DataFrame, short_window: usize, long_window: usize) -> PolarsResult<Chart> {
    let title = format!("{} & {} Moving Average by Days", short_window, long_window);
    let short_key = format!("{}_MA", short_window);
    let long_key = format!("{}_MA", long_window);
    let short_column = ma_column_name(short_window);
    let long_column = ma_column_name(long_window);

    let records = frame_records(
        df,
        &[
            (short_column.as_str(), short_key.as_str()),
            (long_column.as_str(), long_key.as_str()),
        ],
    )?;

    let layer = |key: &str, window: usize, color: &str, dashed: bool| {
        let mut mark = json!({ "type": "line" });
        if dashed {
            mark["strokeDash"] = json!([2, 2]);
        }
        json!({
            "mark": mark,
            "encoding": {
                "x": date_axis(),
                "y": { "field": key, "type": "quantitative", "title": "Price in Dollar" },
                "color": { "value": color },
                "tooltip": [
                    { "field": "Date", "type": "temporal" },
                    { "field": key, "type": "quantitative", "title": format!("{}-day MA", window) }
                ],
                "strokeWidth": stroke_width()
            }
        })
    };

    let mut spec = base_spec(&title, records);
    spec.insert(
        "layer".into(),
        json!([
            layer(&short_key, short_window, "green", false),
            layer(&long_key, long_window, "red", true)
        ]),
    );

    Ok(Chart::new("moving-averages", &title, Value::Object(spec)))
}

/// Closing prices as points sized by traded volume
pub fn price_scatter_chart(df: &DataFrame) -> PolarsResult<Chart> {
    let title = "Closing Price and Volume by Days";
    let records = frame_records(df, &[("close", "Close"), ("volume", "Volume")])?;

    let mut spec = base_spec(title, records);
    spec.insert("mark".into(), json!({ "type": "point", "filled": true, "opacity": 0.7 }));
    spec.insert(
        "encoding".into(),
        json!({
            "x": date_axis(),
            "y": {
                "field": "Close",
                "type": "quantitative",
                "title": "Price in Dollar",
                "scale": { "zero": false }
            },
            "size": { "field": "Volume", "type": "quantitative", "legend": { "title": "Volume" } },
            "tooltip": [
                { "field": "Date", "type": "temporal" },
                { "field": "Close", "type": "quantitative" },
                { "field": "Volume", "type": "quantitative", "format": "," }
            ]
        }),
    );

    Ok(Chart::new("price-scatter", title, Value::Object(spec)))
}

/// Daily percentage returns as points, green for gains and red for losses
pub fn returns_scatter_chart(df: &DataFrame) -> PolarsResult<Chart> {
    let title = "Daily Returns (%)";
    let records = frame_records(df, &[("returns", "Return")])?;

    let mut spec = base_spec(title, records);
    spec.insert("mark".into(), json!({ "type": "point", "filled": true }));
    spec.insert(
        "encoding".into(),
        json!({
            "x": date_axis(),
            "y": { "field": "Return", "type": "quantitative", "title": "Return (%)" },
            "color": {
                "condition": { "test": "datum.Return >= 0", "value": "green" },
                "value": "red"
            },
            "tooltip": [
                { "field": "Date", "type": "temporal" },
                { "field": "Return", "type": "quantitative", "format": ".2f" }
            ]
        }),
    );

    Ok(Chart::new("daily-returns", title, Value::Object(spec)))
}

/// Recent closing prices followed by the forecast, on one time axis.
///
/// The forecast series starts at the last observed close so the two lines join.
pub fn forecast_chart(history: &DataFrame, forecast: &[ForecastPoint]) -> PolarsResult<Chart> {
    let title = format!("{}-Day Price Forecast", forecast.len());

    let dates = date_values(history)?;
    let closes = column_values(history, "close")?;
    let mut records: Vec<Value> = dates
        .iter()
        .zip(closes.iter())
        .filter_map(|(date, close)| match (date, close) {
            (Some(d), Some(c)) => Some(json!({ "Date": date_string(*d), "Price": c, "Series": "History" })),
            _ => None,
        })
        .collect();

    if let Some(anchor) = records.last().cloned() {
        records.push(json!({ "Date": anchor["Date"], "Price": anchor["Price"], "Series": "Forecast" }));
    }
    records.extend(forecast.iter().map(|point| {
        json!({ "Date": date_string(point.date), "Price": point.price, "Series": "Forecast" })
    }));

    let mut spec = base_spec(&title, records);
    spec.insert("mark".into(), json!({ "type": "line", "point": true }));
    spec.insert(
        "encoding".into(),
        json!({
            "x": date_axis(),
            "y": {
                "field": "Price",
                "type": "quantitative",
                "title": "Price in Dollar",
                "scale": { "zero": false }
            },
            "color": {
                "field": "Series",
                "type": "nominal",
                "scale": { "domain": ["History", "Forecast"], "range": ["steelblue", "orange"] }
            },
            "strokeDash": {
                "field": "Series",
                "type": "nominal",
                "scale": { "domain": ["History", "Forecast"], "range": [[1, 0], [6, 4]] },
                "legend": null
            },
            "tooltip": [
                { "field": "Date", "type": "temporal" },
                { "field": "Price", "type": "quantitative", "format": ".2f" },
                { "field": "Series", "type": "nominal" }
            ],
            "strokeWidth": { "value": 3 }
        }),
    );

    Ok(Chart::new("forecast", &title, Value::Object(spec)))
}

/// The standard chart set for a prepared price frame
pub fn price_charts(df: &DataFrame, short_window: usize, long_window: usize) -> PolarsResult<Vec<Chart>> {
    Ok(vec![
        closing_price_chart(df)?,
        moving_average_chart(df, short_window, long_window)?,
        price_scatter_chart(df)?,
        returns_scatter_chart(df)?,
    ])
}
