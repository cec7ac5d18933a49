// External imports
use burn::tensor::{backend::Backend, ElementConversion, Tensor};
use chrono::{Datelike, NaiveDate, Weekday};
use log::{debug, info};
use serde::Serialize;
use std::collections::VecDeque;
use std::iter::FusedIterator;
use std::path::Path;

// Internal imports
use super::step_2_min_max_scaler::MinMaxScaler;
use super::step_3_lstm_model_arch::PriceLstm;
use super::step_4_model_serialization::{load_model_with_metadata, ModelArtifacts};
use super::ForecastError;
use crate::constants::PRICE_DECIMALS;
use crate::util::feature_engineering::round_to;

/// CPU backend used for dashboard inference
pub type InferenceBackend = burn_ndarray::NdArray<f32>;

/// A model that predicts the next scaled value from a fixed-length window
pub trait SequenceRegressor {
    /// Number of values the model consumes per prediction
    fn window_len(&self) -> usize;

    /// Predicts the value following `window`, which is oldest first
    fn predict_next(&self, window: &[f32]) -> Result<f32, ForecastError>;
}

/// A forecasted closing price for one trading day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// Lazily produces autoregressive predictions.
///
/// Each prediction is appended to the window and the oldest value dropped, so
/// the window always holds exactly `window_len` values. Iteration stops after
/// the requested number of steps or at the first error.
pub struct Forecast<'a, M: SequenceRegressor + ?Sized> {
    model: &'a M,
    window: VecDeque<f32>,
    remaining: usize,
}

impl<'a, M: SequenceRegressor + ?Sized> Forecast<'a, M> {
    pub fn new(model: &'a M, initial_window: &[f32], steps: usize) -> Result<Self, ForecastError> {
        if initial_window.len() != model.window_len() {
            return Err(ForecastError::WindowLength {
                expected: model.window_len(),
                actual: initial_window.len(),
            });
        }
        Ok(Self {
            model,
            window: initial_window.iter().copied().collect(),
            remaining: steps,
        })
    }

    /// The current input window, oldest first
    pub fn window(&self) -> Vec<f32> {
        self.window.iter().copied().collect()
    }
}

impl<M: SequenceRegressor + ?Sized> Iterator for Forecast<'_, M> {
    type Item = Result<f32, ForecastError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        match self.model.predict_next(self.window.make_contiguous()) {
            Ok(prediction) => {
                self.remaining -= 1;
                self.window.pop_front();
                self.window.push_back(prediction);
                Some(Ok(prediction))
            }
            Err(e) => {
                self.remaining = 0;
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

impl<M: SequenceRegressor + ?Sized> FusedIterator for Forecast<'_, M> {}

/// Forecasts `days` closing prices from the most recent `window_len` closes.
///
/// Prices are scaled with the fitted scaler, run through the model one step
/// at a time and mapped back to dollars rounded to cents.
pub fn forecast_prices<M: SequenceRegressor + ?Sized>(
    model: &M,
    scaler: &MinMaxScaler,
    closes: &[f64],
    days: usize,
) -> Result<Vec<f64>, ForecastError> {
    let window_len = model.window_len();
    if closes.len() < window_len {
        return Err(ForecastError::InsufficientHistory {
            needed: window_len,
            available: closes.len(),
        });
    }

    let recent = &closes[closes.len() - window_len..];
    let scaled: Vec<f32> = scaler.transform(recent).into_iter().map(|v| v as f32).collect();

    let predictions = Forecast::new(model, &scaled, days)?.collect::<Result<Vec<f32>, _>>()?;
    let as_f64: Vec<f64> = predictions.into_iter().map(f64::from).collect();

    Ok(scaler
        .inverse_transform(&as_f64)
        .into_iter()
        .map(|price| round_to(price, PRICE_DECIMALS))
        .collect())
}

/// The next `n` weekdays after `last_date`
pub fn future_trading_days(last_date: NaiveDate, n: usize) -> Vec<NaiveDate> {
    last_date
        .iter_days()
        .skip(1)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .take(n)
        .collect()
}

/// Pairs forecast prices with the trading days they fall on
pub fn forecast_points(last_date: NaiveDate, prices: &[f64]) -> Vec<ForecastPoint> {
    future_trading_days(last_date, prices.len())
        .into_iter()
        .zip(prices.iter())
        .map(|(date, &price)| ForecastPoint { date, price })
        .collect()
}

/// A trained [`PriceLstm`] with the sequence length it was trained on
pub struct LoadedModel<B: Backend> {
    model: PriceLstm<B>,
    sequence_length: usize,
    device: B::Device,
}

impl<B: Backend> LoadedModel<B> {
    pub fn new(model: PriceLstm<B>, sequence_length: usize, device: B::Device) -> Self {
        Self {
            model,
            sequence_length,
            device,
        }
    }

    /// Loads the weights at `model_path` (base path, no extension)
    pub fn load(model_path: &Path, device: B::Device) -> Result<Self, ForecastError> {
        let (model, metadata) = load_model_with_metadata::<B>(model_path, &device)?;
        debug!(
            "Loaded model v{} (sequence length {})",
            metadata.version, metadata.sequence_length
        );
        Ok(Self::new(model, metadata.sequence_length, device))
    }
}

impl<B: Backend> SequenceRegressor for LoadedModel<B> {
    fn window_len(&self) -> usize {
        self.sequence_length
    }

    fn predict_next(&self, window: &[f32]) -> Result<f32, ForecastError> {
        if window.is_empty() {
            return Err(ForecastError::Model("empty input window".into()));
        }
        if window.len() != self.sequence_length {
            return Err(ForecastError::WindowLength {
                expected: self.sequence_length,
                actual: window.len(),
            });
        }
        let input = Tensor::<B, 1>::from_floats(window, &self.device).reshape([1, window.len(), 1]);
        let output = self.model.forward(input);
        let value: f32 = output.into_scalar().elem();
        if !value.is_finite() {
            return Err(ForecastError::Model(format!("non-finite prediction {}", value)));
        }
        Ok(value)
    }
}

/// Loads the artifacts for `ticker` from `model_dir` and forecasts `days` prices
/// after the last observed close.
pub fn forecast_from_artifacts(
    model_dir: &Path,
    ticker: &str,
    closes: &[f64],
    last_date: NaiveDate,
    days: usize,
) -> Result<Vec<ForecastPoint>, ForecastError> {
    let artifacts = ModelArtifacts::locate(model_dir, ticker)?;
    forecast_with_artifacts(&artifacts, closes, last_date, days)
}

/// Forecasts `days` prices with already located artifacts
pub fn forecast_with_artifacts(
    artifacts: &ModelArtifacts,
    closes: &[f64],
    last_date: NaiveDate,
    days: usize,
) -> Result<Vec<ForecastPoint>, ForecastError> {
    info!("Forecasting {} days with {}", days, artifacts.model_path.display());

    let scaler = MinMaxScaler::load(&artifacts.scaler_path)?;
    let model = LoadedModel::<InferenceBackend>::load(&artifacts.model_path, Default::default())?;
    let prices = forecast_prices(&model, &scaler, closes, days)?;
    Ok(forecast_points(last_date, &prices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_utils::{FailingRegressor, LastValueRegressor};
    use std::cell::RefCell;

    /// Records every window it sees and predicts the window sum
    struct RecordingRegressor {
        len: usize,
        seen: RefCell<Vec<Vec<f32>>>,
    }

    impl SequenceRegressor for RecordingRegressor {
        fn window_len(&self) -> usize {
            self.len
        }

        fn predict_next(&self, window: &[f32]) -> Result<f32, ForecastError> {
            self.seen.borrow_mut().push(window.to_vec());
            Ok(window.iter().sum())
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_forecast_slides_window() {
        let model = RecordingRegressor {
            len: 3,
            seen: RefCell::new(Vec::new()),
        };
        let mut forecast = Forecast::new(&model, &[1.0, 2.0, 3.0], 3).unwrap();
        let mut predictions = Vec::new();
        while let Some(prediction) = forecast.next() {
            predictions.push(prediction.unwrap());
            assert_eq!(forecast.window().len(), 3);
            assert_eq!(forecast.window().last(), predictions.last());
        }

        assert_eq!(predictions, vec![6.0, 11.0, 20.0]);
        assert_eq!(forecast.window(), vec![6.0, 11.0, 20.0]);
        let seen = model.seen.borrow();
        assert_eq!(seen[0], vec![1.0, 2.0, 3.0]);
        assert_eq!(seen[1], vec![2.0, 3.0, 6.0]);
        assert_eq!(seen[2], vec![3.0, 6.0, 11.0]);
        assert!(seen.iter().all(|w| w.len() == 3));
    }

    #[test]
    fn test_forecast_rejects_wrong_window() {
        let model = LastValueRegressor { len: 60, step: 0.0 };
        assert!(matches!(
            Forecast::new(&model, &[0.5; 10], 5),
            Err(ForecastError::WindowLength { expected: 60, actual: 10 })
        ));
    }

    #[test]
    fn test_forecast_is_fused_after_error() {
        let model = FailingRegressor::new(2, 1);
        let mut forecast = Forecast::new(&model, &[0.1, 0.2], 5).unwrap();

        assert!(matches!(forecast.next(), Some(Ok(_))));
        assert!(matches!(forecast.next(), Some(Err(ForecastError::Model(_)))));
        assert!(forecast.next().is_none());
        assert!(forecast.next().is_none());
    }

    #[test]
    fn test_forecast_zero_steps() {
        let model = LastValueRegressor { len: 2, step: 0.1 };
        let mut forecast = Forecast::new(&model, &[0.1, 0.2], 0).unwrap();
        assert_eq!(forecast.size_hint(), (0, Some(0)));
        assert!(forecast.next().is_none());
    }

    #[test]
    fn test_forecast_prices_rescales_and_rounds() {
        // Each step adds 0.1 in scaled units, i.e. 1 dollar for a 100..110 range
        let closes: Vec<f64> = (0..=10).map(|v| 100.0 + v as f64).collect();
        let scaler = MinMaxScaler::fit(&closes).unwrap();
        let model = LastValueRegressor { len: 5, step: 0.1 };

        let prices = forecast_prices(&model, &scaler, &closes, 3).unwrap();
        assert_eq!(prices, vec![111.0, 112.0, 113.0]);
    }

    #[test]
    fn test_forecast_prices_insufficient_history() {
        let scaler = MinMaxScaler::fit(&[1.0, 2.0]).unwrap();
        let model = LastValueRegressor { len: 60, step: 0.0 };
        assert!(matches!(
            forecast_prices(&model, &scaler, &[1.0, 2.0], 30),
            Err(ForecastError::InsufficientHistory { needed: 60, available: 2 })
        ));
    }

    #[test]
    fn test_future_trading_days_skip_weekends() {
        // 2024-01-05 is a Friday
        let days = future_trading_days(date("2024-01-05"), 6);
        assert_eq!(
            days,
            vec![
                date("2024-01-08"),
                date("2024-01-09"),
                date("2024-01-10"),
                date("2024-01-11"),
                date("2024-01-12"),
                date("2024-01-15"),
            ]
        );
        assert!(future_trading_days(date("2024-01-05"), 0).is_empty());
    }

    #[test]
    fn test_forecast_points() {
        let points = forecast_points(date("2024-01-03"), &[10.0, 11.0]);
        assert_eq!(points[0], ForecastPoint { date: date("2024-01-04"), price: 10.0 });
        assert_eq!(points[1].date, date("2024-01-05"));
    }

    #[test]
    fn test_loaded_model_predicts_finite_value() {
        use crate::forecast::step_3_lstm_model_arch::PriceLstmConfig;
        use burn_ndarray::{NdArray, NdArrayDevice};

        let device = NdArrayDevice::Cpu;
        let model: PriceLstm<NdArray> = PriceLstmConfig::default().init(&device);
        let loaded = LoadedModel::new(model, 60, device);

        let window = vec![0.5f32; 60];
        let value = loaded.predict_next(&window).unwrap();
        assert!(value.is_finite());
        assert!(loaded.predict_next(&window[..59]).is_err());
        assert!(loaded.predict_next(&[]).is_err());

        let predictions: Vec<f32> = Forecast::new(&loaded, &window, 4)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(predictions.len(), 4);
        assert_eq!(predictions[0], value);
    }
}
