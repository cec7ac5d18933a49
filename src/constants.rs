// Tickers
pub const DEFAULT_TICKER: &str = "AAPL";
pub const WATCHLIST: [&str; 5] = ["AAPL", "TSLA", "MSFT", "NFLX", "NVDA"];

// Data window
pub const LOOKBACK_DAYS: i64 = 365 * 2; // Two years of daily bars
pub const MAX_LOOKBACK_DAYS: i64 = 36_500;
pub const DAYS_TO_SHOW: usize = 50; // Rows displayed in each chart
pub const PRICE_DECIMALS: u32 = 2;

// Moving averages
pub const SHORT_MA_WINDOW: usize = 100;
pub const LONG_MA_WINDOW: usize = 200;

// Forecasting
pub const SEQUENCE_LENGTH: usize = 60; // Number of closes the model looks back on
pub const FORECAST_DAYS: usize = 30;

// Model paths
pub const MODEL_DIR: &str = "models";
pub const MODEL_FILE_NAME: &str = "_lstm_model";
pub const SCALER_FILE_NAME: &str = "_scaler.json";
pub const SHARED_MODEL_PREFIX: &str = "default";

// Output
pub const OUTPUT_DIR: &str = "dashboard";

// Charts
pub const CHART_WIDTH: u32 = 800;
pub const CHART_HEIGHT: u32 = 400;
pub const STROKE_WIDTH: u32 = 6;
pub const VEGA_LITE_SCHEMA: &str = "https://vega.github.io/schema/vega-lite/v5.json";

// Market data
pub const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
pub const HTTP_TIMEOUT_SECS: u64 = 15;
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
