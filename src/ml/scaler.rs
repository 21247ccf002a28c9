use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Z-score feature scaler persisted next to the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaler {
    pub feature_names: Vec<String>,
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

impl FeatureScaler {
    pub fn width(&self) -> usize {
        self.feature_names.len()
    }

    pub fn validate(&self) -> Result<(), String> {
        let n = self.width();
        if n == 0 {
            return Err("scaler has no features".to_string());
        }
        if self.means.len() != n || self.stds.len() != n {
            return Err(format!(
                "scaler shape mismatch: {} names, {} means, {} stds",
                n,
                self.means.len(),
                self.stds.len()
            ));
        }
        if self.means.iter().chain(&self.stds).any(|v| !v.is_finite()) {
            return Err("scaler contains non-finite values".to_string());
        }
        Ok(())
    }

    /// Scale one raw feature vector; near-constant features map to 0
    pub fn transform(&self, raw: &[f64]) -> Array1<f64> {
        raw.iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(x, (mean, std))| if *std > 1e-10 { (x - mean) / std } else { 0.0 })
            .collect()
    }
}
