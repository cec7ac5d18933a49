use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::step_3_lstm_model_arch::{PriceLstm, PriceLstmConfig};
use super::ForecastError;
use crate::constants::{MODEL_FILE_NAME, SCALER_FILE_NAME, SHARED_MODEL_PREFIX};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ModelMetadata {
    pub version: String,
    pub timestamp: u64,
    pub sequence_length: usize,
    pub config: PriceLstmConfig,
    /// Ticker the weights were trained on, if ticker specific
    #[serde(default)]
    pub ticker: Option<String>,
}

impl ModelMetadata {
    pub fn new(config: PriceLstmConfig, sequence_length: usize, ticker: Option<&str>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            sequence_length,
            config,
            ticker: ticker.map(str::to_string),
        }
    }

    /// Rejects metadata the inference path cannot run: an empty window or a
    /// model that does not map one price per step to one price.
    pub fn validate(&self) -> Result<(), ForecastError> {
        if self.sequence_length == 0 {
            return Err(ForecastError::Model("sequence_length must be greater than zero".into()));
        }
        if self.config.input_size != 1 || self.config.output_size != 1 {
            return Err(ForecastError::Model(format!(
                "expected a univariate model (input 1, output 1), got input {} and output {}",
                self.config.input_size, self.config.output_size
            )));
        }
        Ok(())
    }
}

fn recorder() -> BinFileRecorder<FullPrecisionSettings> {
    BinFileRecorder::<FullPrecisionSettings>::new()
}

/// Appends an extension to a base path. Tickers such as `BRK.B` contain dots,
/// so `Path::with_extension` would cut the name short.
pub fn artifact_file(base: &Path, extension: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// Reads the `.meta.json` next to a base path without validating it
pub fn read_metadata(path: &Path) -> Result<ModelMetadata, ForecastError> {
    let metadata_json = std::fs::read_to_string(artifact_file(path, "meta.json"))?;
    Ok(serde_json::from_str(&metadata_json)?)
}

/// Save the model weights (`.bin`) and metadata (`.meta.json`) under a base path
pub fn save_model_with_metadata<B: Backend>(
    model: &PriceLstm<B>,
    metadata: &ModelMetadata,
    path: impl AsRef<Path>,
) -> Result<(), ForecastError> {
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent)?;
    }
    let model_path = artifact_file(path.as_ref(), "bin");
    model
        .clone()
        .save_file(&model_path, &recorder())
        .map_err(|e| ForecastError::Model(format!("failed to save weights: {}", e)))?;

    let metadata_json = serde_json::to_string_pretty(metadata)?;
    std::fs::write(artifact_file(path.as_ref(), "meta.json"), metadata_json)?;
    info!("Saved model to {}", model_path.display());
    Ok(())
}

/// Load the model and its metadata from a base path.
///
/// The metadata is read first so the module is built with the layer sizes
/// the weights were saved with.
pub fn load_model_with_metadata<B: Backend>(
    path: impl AsRef<Path>,
    device: &B::Device,
) -> Result<(PriceLstm<B>, ModelMetadata), ForecastError> {
    let metadata = read_metadata(path.as_ref())?;
    metadata.validate()?;
    let model_path = artifact_file(path.as_ref(), "bin");
    debug!("Loading weights from {}", model_path.display());

    let model = metadata
        .config
        .init::<B>(device)
        .load_file(&model_path, &recorder(), device)
        .map_err(|e| ForecastError::Model(format!("failed to load {}: {}", model_path.display(), e)))?;
    Ok((model, metadata))
}

/// Check that the weights exist and the metadata parses
pub fn verify_model(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    artifact_file(path, "bin").exists() && read_metadata(path).is_ok()
}

/// Model weights and scaler that belong together
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifacts {
    /// Base path without extension; weights live at `.bin`, metadata at `.meta.json`
    pub model_path: PathBuf,
    pub scaler_path: PathBuf,
}

impl ModelArtifacts {
    pub fn for_prefix(model_dir: &Path, prefix: &str) -> Self {
        Self {
            model_path: model_dir.join(format!("{}{}", prefix, MODEL_FILE_NAME)),
            scaler_path: model_dir.join(format!("{}{}", prefix, SCALER_FILE_NAME)),
        }
    }

    pub fn exists(&self) -> bool {
        verify_model(&self.model_path) && self.scaler_path.exists()
    }

    /// Ticker-specific artifacts if present, otherwise the shared `default` ones
    pub fn locate(model_dir: &Path, ticker: &str) -> Result<Self, ForecastError> {
        [ticker, SHARED_MODEL_PREFIX]
            .iter()
            .map(|prefix| Self::for_prefix(model_dir, prefix))
            .find(|artifacts| {
                let found = artifacts.exists();
                debug!("Model candidate {}: {}", artifacts.model_path.display(), found);
                found
            })
            .ok_or_else(|| ForecastError::ArtifactsNotFound {
                ticker: ticker.to_string(),
                dir: model_dir.to_path_buf(),
            })
    }
}
