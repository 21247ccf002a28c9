use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::artifacts::persist_bytes;
use super::model::{ClassifierWeights, Prediction, SignalClassifier};
use super::scaler::FeatureScaler;
use crate::config::ArtifactPaths;
use crate::error::{PipelineError, PipelineResult};
use crate::indicators::IndicatorSet;

/// Classifier and scaler, only ever constructed together
#[derive(Debug, Clone)]
pub struct TrainedModel {
    classifier: SignalClassifier,
    scaler: FeatureScaler,
}

impl TrainedModel {
    /// Pairs a classifier with its scaler; both must describe the engine's feature layout
    pub fn new(classifier: SignalClassifier, scaler: FeatureScaler) -> Result<Self, String> {
        scaler.validate()?;

        if classifier.feature_names() != scaler.feature_names.as_slice() {
            return Err(format!(
                "model and scaler feature layouts differ ({} vs {} features)",
                classifier.feature_names().len(),
                scaler.width()
            ));
        }

        let expected = IndicatorSet::FEATURE_NAMES;
        if classifier.feature_names().iter().map(String::as_str).ne(expected.iter().copied()) {
            return Err(format!(
                "model features {:?} do not match indicator layout {:?}",
                classifier.feature_names(),
                expected
            ));
        }

        Ok(Self { classifier, scaler })
    }

    pub fn classifier(&self) -> &SignalClassifier {
        &self.classifier
    }

    pub fn scaler(&self) -> &FeatureScaler {
        &self.scaler
    }

    /// Scale the raw indicator values and apply the classifier
    pub fn predict(&self, features: &IndicatorSet) -> Prediction {
        let scaled = self.scaler.transform(&features.to_array());
        self.classifier.predict(&scaled)
    }
}

/// Loads and stores the `model.json` / `scaler.json` pair
#[derive(Debug, Clone)]
pub struct ModelLoader {
    model_path: PathBuf,
    scaler_path: PathBuf,
}

impl ModelLoader {
    pub fn new(model_path: impl Into<PathBuf>, scaler_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            scaler_path: scaler_path.into(),
        }
    }

    pub fn from_paths(paths: &ArtifactPaths) -> Self {
        Self::new(&paths.model, &paths.scaler)
    }

    /// `ModelUnavailable` when either file is missing, unreadable, or the two disagree
    pub fn load(&self) -> PipelineResult<Arc<TrainedModel>> {
        match (self.model_path.exists(), self.scaler_path.exists()) {
            (false, false) => {
                return Err(PipelineError::ModelUnavailable(format!(
                    "no trained model at {}",
                    self.model_path.display()
                )))
            }
            (true, false) => {
                return Err(PipelineError::ModelUnavailable(format!(
                    "model present but scaler missing at {}",
                    self.scaler_path.display()
                )))
            }
            (false, true) => {
                return Err(PipelineError::ModelUnavailable(format!(
                    "scaler present but model missing at {}",
                    self.model_path.display()
                )))
            }
            (true, true) => {}
        }

        let weights: ClassifierWeights =
            read_json(&self.model_path).map_err(|e| unavailable("unreadable model", e))?;
        let scaler: FeatureScaler =
            read_json(&self.scaler_path).map_err(|e| unavailable("unreadable scaler", e))?;
        let classifier =
            SignalClassifier::from_weights(weights).map_err(|e| unavailable("invalid model", e))?;

        let version = classifier.version().clone();
        let model = TrainedModel::new(classifier, scaler).map_err(|reason| {
            warn!("Rejecting model pair: {}", reason);
            PipelineError::ModelUnavailable(reason)
        })?;

        info!("Loaded model v{} from {}", version, self.model_path.display());
        Ok(Arc::new(model))
    }

    /// Validates the pair `source` points at and copies it into this loader's paths.
    /// Nothing is written unless the source pair loads cleanly.
    pub fn import_from(&self, source: &ModelLoader) -> PipelineResult<Arc<TrainedModel>> {
        let model = source.load()?;
        self.save_pair(&model)?;
        info!(
            "Imported model v{} into {}",
            model.classifier().version(),
            self.model_path.display()
        );
        Ok(model)
    }

    /// Writes both artifacts; each file is replaced atomically
    pub fn save_pair(&self, model: &TrainedModel) -> PipelineResult<()> {
        let model_json = serde_json::to_vec_pretty(&model.classifier().to_weights())
            .map_err(|e| PipelineError::persistence(&self.model_path, e))?;
        let scaler_json = serde_json::to_vec_pretty(model.scaler())
            .map_err(|e| PipelineError::persistence(&self.scaler_path, e))?;

        persist_bytes(&self.model_path, &model_json)?;
        persist_bytes(&self.scaler_path, &scaler_json)?;
        debug!(
            "Saved model pair to {} and {}",
            self.model_path.display(),
            self.scaler_path.display()
        );
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

fn unavailable(what: &str, err: anyhow::Error) -> PipelineError {
    warn!("{}: {:#}", what, err);
    PipelineError::ModelUnavailable(format!("{}: {:#}", what, err))
}
