//! Yahoo Finance chart API client
//!
//! Fetches daily OHLCV history for a ticker from the public v8 chart
//! endpoint and converts it into the standard price frame.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime};
use log::{debug, info};
use polars::prelude::DataFrame;
use serde::Deserialize;

use super::history::{normalize_symbol, quotes_to_dataframe, FetchError, PriceSource, Quote};
use crate::constants::{HTTP_TIMEOUT_SECS, USER_AGENT, YAHOO_CHART_URL};

/// Bar interval supported by the chart endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    Daily,
    Weekly,
    Monthly,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Daily => "1d",
            Interval::Weekly => "1wk",
            Interval::Monthly => "1mo",
        }
    }
}

#[derive(Debug, Deserialize)]
struct YahooResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    result: Option<Vec<ChartData>>,
    error: Option<YahooApiError>,
}

#[derive(Debug, Deserialize)]
struct YahooApiError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjClose>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// Blocking Yahoo Finance client. The underlying HTTP client is reused across requests.
#[derive(Debug, Clone)]
pub struct YahooFinance {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl YahooFinance {
    /// Create a client with the default timeout and user agent
    pub fn new() -> Result<Self, FetchError> {
        Self::with_settings(HTTP_TIMEOUT_SECS, USER_AGENT)
    }

    pub fn with_settings(timeout_secs: u64, user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            base_url: YAHOO_CHART_URL.to_string(),
            client,
        })
    }

    fn unix_seconds(date: NaiveDate) -> i64 {
        date.and_time(NaiveTime::MIN).and_utc().timestamp()
    }

    fn build_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate, interval: Interval) -> String {
        // period2 is exclusive, so push it to the start of the following day
        let period2 = Self::unix_seconds(end) + 86_400;
        format!(
            "{}/{}?period1={}&period2={}&interval={}&events=div%2Csplit",
            self.base_url,
            symbol.replace('^', "%5E"),
            Self::unix_seconds(start),
            period2,
            interval.as_str()
        )
    }

    /// Fetch historical bars for `symbol`
    pub fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<Vec<Quote>, FetchError> {
        let symbol = normalize_symbol(symbol)?;
        let url = self.build_url(&symbol, start, end, interval);
        debug!("GET {}", url);

        let response = self.client.get(&url).send()?;
        let status = response.status();
        let body = response.text()?;

        match self.parse_response(&symbol, &body) {
            Err(FetchError::Parse(_)) if !status.is_success() => Err(FetchError::Status {
                symbol,
                status: status.as_u16(),
            }),
            result => result,
        }
    }

    fn parse_response(&self, symbol: &str, json: &str) -> Result<Vec<Quote>, FetchError> {
        let response: YahooResponse = serde_json::from_str(json)?;

        if let Some(error) = response.chart.error {
            return Err(FetchError::Api {
                code: error.code,
                description: error.description,
            });
        }

        let no_data = || FetchError::NoData {
            symbol: symbol.to_string(),
        };
        let results = response.chart.result.ok_or_else(no_data)?;
        let data = results.first().ok_or_else(no_data)?;
        let quote_data = data.indicators.quote.first().ok_or_else(no_data)?;
        let adj_close_data = data.indicators.adjclose.as_ref().and_then(|a| a.first());

        let mut quotes = Vec::with_capacity(data.timestamp.len());
        for (i, &timestamp) in data.timestamp.iter().enumerate() {
            let open = quote_data.open.get(i).copied().flatten();
            let high = quote_data.high.get(i).copied().flatten();
            let low = quote_data.low.get(i).copied().flatten();
            let close = quote_data.close.get(i).copied().flatten();
            let volume = quote_data.volume.get(i).copied().flatten();
            let adj_close = adj_close_data
                .and_then(|a| a.adjclose.get(i))
                .copied()
                .flatten();
            // Bars are stamped at the session open; shift into exchange time before taking the date
            let date = DateTime::from_timestamp(timestamp + data.meta.gmtoffset, 0)
                .map(|dt| dt.date_naive());

            // Skip bars with any missing field
            if let (Some(date), Some(o), Some(h), Some(l), Some(c), Some(v)) =
                (date, open, high, low, close, volume)
            {
                quotes.push(Quote {
                    date,
                    open: o,
                    high: h,
                    low: l,
                    close: c,
                    adj_close: adj_close.unwrap_or(c),
                    volume: v,
                });
            }
        }

        if quotes.is_empty() {
            return Err(no_data());
        }
        Ok(quotes)
    }
}

impl PriceSource for YahooFinance {
    fn name(&self) -> &str {
        "Yahoo Finance"
    }

    fn history(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<DataFrame, FetchError> {
        let quotes = self.fetch(symbol, start, end, Interval::Daily)?;
        info!("Fetched {} daily bars for {} from Yahoo Finance", quotes.len(), symbol);
        Ok(quotes_to_dataframe(quotes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> YahooFinance {
        YahooFinance::new().unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_interval_str() {
        assert_eq!(Interval::Daily.as_str(), "1d");
        assert_eq!(Interval::Weekly.as_str(), "1wk");
        assert_eq!(Interval::Monthly.as_str(), "1mo");
    }

    #[test]
    fn test_build_url() {
        let url = client().build_url("AAPL", date("2024-01-01"), date("2024-01-31"), Interval::Daily);

        assert!(url.starts_with(YAHOO_CHART_URL));
        assert!(url.contains("/AAPL?"));
        assert!(url.contains("period1=1704067200"));
        // End date is inclusive
        assert!(url.contains("period2=1706745600"));
        assert!(url.contains("interval=1d"));
    }

    #[test]
    fn test_build_url_encodes_index_symbols() {
        let url = client().build_url("^GSPC", date("2024-01-01"), date("2024-01-02"), Interval::Daily);
        assert!(url.contains("/%5EGSPC?"));
    }

    #[test]
    fn test_parse_response_valid() {
        let json = r#"{"chart":{"result":[{"meta":{"gmtoffset":-18000},"timestamp":[1704205800,1704292200,1704378600],"indicators":{"quote":[{"open":[187.15,184.22,182.15],"high":[188.44,185.88,183.09],"low":[183.89,183.43,180.88],"close":[185.64,184.25,181.91],"volume":[82488700,58414500,71983600]}],"adjclose":[{"adjclose":[184.94,183.56,181.23]}]}}],"error":null}}"#;
        let quotes = client().parse_response("AAPL", json).unwrap();

        assert_eq!(quotes.len(), 3);
        assert_eq!(quotes[0].date, date("2024-01-02"));
        assert_eq!(quotes[2].date, date("2024-01-04"));
        assert_eq!(quotes[0].close, 185.64);
        assert_eq!(quotes[0].adj_close, 184.94);
        assert_eq!(quotes[1].volume, 58_414_500);
    }

    #[test]
    fn test_parse_response_skips_incomplete_bars() {
        let json = r#"{"chart":{"result":[{"timestamp":[1704205800,1704292200,1704378600],"indicators":{"quote":[{"open":[1.0,null,3.0],"high":[1.0,null,3.0],"low":[1.0,null,3.0],"close":[1.0,null,3.0],"volume":[10,null,30]}]}}],"error":null}}"#;
        let quotes = client().parse_response("AAPL", json).unwrap();

        assert_eq!(quotes.len(), 2);
        // Missing adjclose block falls back to close
        assert_eq!(quotes[1].adj_close, 3.0);
    }

    #[test]
    fn test_parse_response_api_error() {
        let json = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let result = client().parse_response("ZZZZ", json);
        assert!(matches!(result, Err(FetchError::Api { ref code, .. }) if code == "Not Found"));
    }

    #[test]
    fn test_parse_response_no_data() {
        let json = r#"{"chart":{"result":[],"error":null}}"#;
        assert!(matches!(
            client().parse_response("AAPL", json),
            Err(FetchError::NoData { .. })
        ));

        let all_null = r#"{"chart":{"result":[{"timestamp":[1704205800],"indicators":{"quote":[{"open":[null],"high":[null],"low":[null],"close":[null],"volume":[null]}]}}],"error":null}}"#;
        assert!(matches!(
            client().parse_response("AAPL", all_null),
            Err(FetchError::NoData { .. })
        ));
    }

    #[test]
    fn test_parse_response_invalid_json() {
        assert!(matches!(
            client().parse_response("AAPL", "not json"),
            Err(FetchError::Parse(_))
        ));
    }
}
