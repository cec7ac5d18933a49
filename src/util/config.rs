// External crates
use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// Internal modules
use crate::constants::{
    DAYS_TO_SHOW, DEFAULT_TICKER, FORECAST_DAYS, HTTP_TIMEOUT_SECS, LONG_MA_WINDOW, LOOKBACK_DAYS,
    MAX_LOOKBACK_DAYS, MODEL_DIR, OUTPUT_DIR, SEQUENCE_LENGTH, SHORT_MA_WINDOW, USER_AGENT, WATCHLIST,
};

/// Environment variable naming a JSON config file
pub const CONFIG_ENV: &str = "STOCKLENS_CONFIG";

/// Dashboard settings.
///
/// Every field has a default, so a config file only needs the values it
/// overrides. Precedence: defaults, JSON file, environment, CLI flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Ticker always shown after the user's own
    pub default_ticker: String,
    pub watchlist: Vec<String>,
    /// Calendar days of history requested per ticker
    pub lookback_days: i64,
    /// Rows shown in each chart
    pub days_to_show: usize,
    pub short_ma_window: usize,
    pub long_ma_window: usize,
    pub sequence_length: usize,
    pub forecast_days: usize,
    pub forecast_enabled: bool,
    pub watchlist_enabled: bool,
    pub model_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Read `{SYMBOL}.csv` files from here instead of the network
    pub data_dir: Option<PathBuf>,
    pub http_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            default_ticker: DEFAULT_TICKER.to_string(),
            watchlist: WATCHLIST.iter().map(|s| s.to_string()).collect(),
            lookback_days: LOOKBACK_DAYS,
            days_to_show: DAYS_TO_SHOW,
            short_ma_window: SHORT_MA_WINDOW,
            long_ma_window: LONG_MA_WINDOW,
            sequence_length: SEQUENCE_LENGTH,
            forecast_days: FORECAST_DAYS,
            forecast_enabled: true,
            watchlist_enabled: true,
            model_dir: PathBuf::from(MODEL_DIR),
            output_dir: PathBuf::from(OUTPUT_DIR),
            data_dir: None,
            http_timeout_secs: HTTP_TIMEOUT_SECS,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl DashboardConfig {
    /// Read a JSON config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Defaults, overlaid with the config file (explicit path or `STOCKLENS_CONFIG`)
    /// and then the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(env_path) {
            Some(p) => Self::from_file(&p)?,
            None => Self::default(),
        };
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies `STOCKLENS_*` overrides read through `lookup`
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("STOCKLENS_MODEL_DIR") {
            self.model_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("STOCKLENS_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("STOCKLENS_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(days) = lookup("STOCKLENS_FORECAST_DAYS") {
            self.forecast_days = days
                .trim()
                .parse()
                .with_context(|| format!("Invalid STOCKLENS_FORECAST_DAYS value {:?}", days))?;
        }
        if let Some(list) = lookup("STOCKLENS_WATCHLIST") {
            self.watchlist = list
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
        }
        debug!("Configuration after environment overrides: {:?}", self);
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.short_ma_window == 0 || self.long_ma_window == 0 {
            bail!("Moving average windows must be greater than zero");
        }
        if self.short_ma_window >= self.long_ma_window {
            bail!(
                "Short moving average window ({}) must be smaller than the long one ({})",
                self.short_ma_window,
                self.long_ma_window
            );
        }
        if self.days_to_show == 0 {
            bail!("days_to_show must be greater than zero");
        }
        if self.sequence_length == 0 {
            bail!("sequence_length must be greater than zero");
        }
        if self.lookback_days <= 0 || self.lookback_days > MAX_LOOKBACK_DAYS {
            bail!(
                "lookback_days must be between 1 and {}, got {}",
                MAX_LOOKBACK_DAYS,
                self.lookback_days
            );
        }
        if self.forecast_enabled && self.forecast_days == 0 {
            warn!("forecast_days is 0; forecasts will be empty");
        }
        Ok(())
    }

    pub fn ma_windows(&self) -> [usize; 2] {
        [self.short_ma_window, self.long_ma_window]
    }
}
