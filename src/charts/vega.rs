//! Vega-Lite specification helpers.
//!
//! Charts are plain Vega-Lite v5 JSON documents with inline data, rendered in
//! the browser by vega-embed.

use chrono::NaiveDate;
use polars::prelude::*;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::constants::{CHART_HEIGHT, CHART_WIDTH, STROKE_WIDTH, VEGA_LITE_SCHEMA};
use crate::market_data::history::{column_values, date_values};

/// A titled chart ready to be embedded in the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct Chart {
    /// DOM-safe identifier, unique within a page section
    pub id: String,
    pub title: String,
    pub spec: Value,
}

impl Chart {
    pub fn new(id: &str, title: &str, spec: Value) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            spec,
        }
    }

    /// The embedded data records, if any
    pub fn records(&self) -> &[Value] {
        self.spec["data"]["values"]
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Top-level properties shared by every chart
pub fn base_spec(title: &str, records: Vec<Value>) -> Map<String, Value> {
    let mut spec = Map::new();
    spec.insert("$schema".into(), json!(VEGA_LITE_SCHEMA));
    spec.insert("title".into(), json!(title));
    spec.insert("width".into(), json!(CHART_WIDTH));
    spec.insert("height".into(), json!(CHART_HEIGHT));
    spec.insert("data".into(), json!({ "values": records }));
    spec
}

pub fn date_string(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Temporal x encoding on the `Date` field
pub fn date_axis() -> Value {
    json!({ "field": "Date", "type": "temporal", "axis": { "title": "Days" } })
}

pub fn stroke_width() -> Value {
    json!({ "value": STROKE_WIDTH })
}

/// Turns frame rows into records keyed by display name.
///
/// `fields` maps a Float64 column to the record key it is published under.
/// Null values become JSON `null` so Vega-Lite leaves a gap.
pub fn frame_records(df: &DataFrame, fields: &[(&str, &str)]) -> PolarsResult<Vec<Value>> {
    let dates = date_values(df)?;
    let mut columns = Vec::with_capacity(fields.len());
    for &(column, key) in fields {
        columns.push((key, column_values(df, column)?));
    }

    let records = dates
        .iter()
        .enumerate()
        .map(|(row, date)| {
            let mut record = Map::new();
            record.insert(
                "Date".into(),
                date.map(|d| json!(date_string(d))).unwrap_or(Value::Null),
            );
            for (key, values) in &columns {
                let value = values[row]
                    .filter(|v| v.is_finite())
                    .map(|v| json!(v))
                    .unwrap_or(Value::Null);
                record.insert((*key).to_string(), value);
            }
            Value::Object(record)
        })
        .collect();
    Ok(records)
}
