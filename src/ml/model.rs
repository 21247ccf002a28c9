use anyhow::{anyhow, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::SignalClass;

/// Semantic version recorded in the model artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ModelVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    pub fn initial() -> Self {
        Self::new(1, 0, 0)
    }
}

impl Default for ModelVersion {
    fn default() -> Self {
        Self::initial()
    }
}

impl FromStr for ModelVersion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(anyhow!("Invalid version format: {}", s));
        }

        Ok(Self {
            major: parts[0].parse()?,
            minor: parts[1].parse()?,
            patch: parts[2].parse()?,
        })
    }
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Multinomial logistic regression weights as persisted in `model.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierWeights {
    #[serde(default)]
    pub version: ModelVersion,
    pub classes: Vec<SignalClass>,
    pub feature_names: Vec<String>,
    /// One row per class, one column per feature
    pub coefficients: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
}

/// Outcome of applying the classifier to one feature vector
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub class: SignalClass,
    /// Probability the model assigns to `class`
    pub confidence: f64,
    pub probabilities: Vec<(SignalClass, f64)>,
}

/// Softmax classifier over buy/sell/hold
#[derive(Debug, Clone)]
pub struct SignalClassifier {
    version: ModelVersion,
    classes: Vec<SignalClass>,
    feature_names: Vec<String>,
    coefficients: Array2<f64>,
    intercepts: Array1<f64>,
}

impl SignalClassifier {
    pub fn from_weights(weights: ClassifierWeights) -> Result<Self> {
        let n_classes = weights.classes.len();
        let n_features = weights.feature_names.len();

        if n_classes < 2 {
            return Err(anyhow!("Classifier needs at least 2 classes, got {}", n_classes));
        }
        let mut seen = weights.classes.clone();
        seen.sort();
        seen.dedup();
        if seen.len() != n_classes {
            return Err(anyhow!("Classifier lists a class more than once"));
        }
        if weights.intercepts.len() != n_classes {
            return Err(anyhow!(
                "Expected {} intercepts, got {}",
                n_classes,
                weights.intercepts.len()
            ));
        }
        if weights.coefficients.len() != n_classes
            || weights.coefficients.iter().any(|row| row.len() != n_features)
        {
            return Err(anyhow!("Coefficient matrix must be {}x{}", n_classes, n_features));
        }

        let flat: Vec<f64> = weights.coefficients.iter().flatten().copied().collect();
        if flat.iter().chain(&weights.intercepts).any(|v| !v.is_finite()) {
            return Err(anyhow!("Classifier contains non-finite weights"));
        }

        Ok(Self {
            version: weights.version,
            classes: weights.classes,
            feature_names: weights.feature_names,
            coefficients: Array2::from_shape_vec((n_classes, n_features), flat)?,
            intercepts: Array1::from(weights.intercepts),
        })
    }

    pub fn to_weights(&self) -> ClassifierWeights {
        ClassifierWeights {
            version: self.version.clone(),
            classes: self.classes.clone(),
            feature_names: self.feature_names.clone(),
            coefficients: self.coefficients.outer_iter().map(|row| row.to_vec()).collect(),
            intercepts: self.intercepts.to_vec(),
        }
    }

    pub fn version(&self) -> &ModelVersion {
        &self.version
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Class probabilities in the order classes appear in the weights
    pub fn predict_proba(&self, scaled: &Array1<f64>) -> Array1<f64> {
        let logits = self.coefficients.dot(scaled) + &self.intercepts;
        softmax(&logits)
    }

    /// Most probable class; exact ties go to the class with the higher
    /// `tie_break_rank`, so the result never depends on class order
    pub fn predict(&self, scaled: &Array1<f64>) -> Prediction {
        let proba = self.predict_proba(scaled);

        let mut best = 0;
        for idx in 1..self.classes.len() {
            let better = proba[idx] > proba[best]
                || (proba[idx] == proba[best]
                    && self.classes[idx].tie_break_rank() > self.classes[best].tie_break_rank());
            if better {
                best = idx;
            }
        }

        Prediction {
            class: self.classes[best],
            confidence: proba[best].clamp(0.0, 1.0),
            probabilities: self.classes.iter().copied().zip(proba.iter().copied()).collect(),
        }
    }
}

/// Numerically stable softmax
fn softmax(logits: &Array1<f64>) -> Array1<f64> {
    let max = logits.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
    let exp = logits.mapv(|v| (v - max).exp());
    let sum = exp.sum();
    exp / sum
}
