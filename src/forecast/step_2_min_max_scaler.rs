// External crates
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// Internal modules
use super::ForecastError;

/// Single-feature min-max scaler mapping prices into `feature_range`.
///
/// Stored as JSON next to the model weights so inference uses exactly the
/// scaling the model was trained with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    pub feature_range: (f64, f64),
    pub data_min: f64,
    pub data_max: f64,
}

impl MinMaxScaler {
    /// Fits the scaler to the observed values, mapping them into `[0, 1]`
    pub fn fit(values: &[f64]) -> Result<Self, ForecastError> {
        Self::fit_with_range(values, (0.0, 1.0))
    }

    pub fn fit_with_range(values: &[f64], feature_range: (f64, f64)) -> Result<Self, ForecastError> {
        let finite = Array1::from_iter(values.iter().copied().filter(|v| v.is_finite()));
        if finite.is_empty() {
            return Err(ForecastError::InsufficientHistory {
                needed: 1,
                available: 0,
            });
        }
        let data_min = finite.fold(f64::INFINITY, |acc, &v| acc.min(v));
        let data_max = finite.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
        Ok(Self {
            feature_range,
            data_min,
            data_max,
        })
    }

    /// Multiplier from data units to feature units. A constant series scales by 1.
    fn scale(&self) -> f64 {
        let data_range = self.data_max - self.data_min;
        if data_range.abs() < f64::EPSILON {
            1.0
        } else {
            (self.feature_range.1 - self.feature_range.0) / data_range
        }
    }

    pub fn transform(&self, values: &[f64]) -> Vec<f64> {
        let scale = self.scale();
        let (low, _) = self.feature_range;
        Array1::from_vec(values.to_vec())
            .mapv(|v| (v - self.data_min) * scale + low)
            .to_vec()
    }

    pub fn inverse_transform(&self, values: &[f64]) -> Vec<f64> {
        let scale = self.scale();
        let (low, _) = self.feature_range;
        Array1::from_vec(values.to_vec())
            .mapv(|v| (v - low) / scale + self.data_min)
            .to_vec()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ForecastError> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ForecastError> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
