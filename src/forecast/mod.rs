//! # LSTM Price Forecasting
//!
//! Autoregressive closing-price forecasts from a pre-trained two-layer LSTM.
//!
//! ## Pipeline
//!
//! 1. **Window Preparation**: the last `sequence_length` closes of the history
//! 2. **Scaling**: the fitted min-max scaler stored next to the weights
//! 3. **Model Architecture**: stacked LSTM layers followed by a dense head
//! 4. **Model Serialization**: burn binary weights plus JSON metadata
//! 5. **Prediction**: a lazy iterator feeding each prediction back into the window
//!
//! Training is done elsewhere; this crate only loads the weights and runs inference.

pub mod step_1_window_preparation;
pub mod step_2_min_max_scaler;
pub mod step_3_lstm_model_arch;
pub mod step_4_model_serialization;
pub mod step_5_prediction;

use polars::prelude::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while preparing or running a forecast
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("not enough history: need {needed} closing prices, have {available}")]
    InsufficientHistory { needed: usize, available: usize },
    #[error("input window has {actual} values, model expects {expected}")]
    WindowLength { expected: usize, actual: usize },
    #[error("model error: {0}")]
    Model(String),
    #[error("no model artifacts for {ticker} in {}", dir.display())]
    ArtifactsNotFound { ticker: String, dir: PathBuf },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Polars(#[from] PolarsError),
}
