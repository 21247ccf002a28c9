use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// Failure kinds reported by the forward-test and live-inference pipeline.
///
/// Expected conditions (no model yet, empty range) are values of this type,
/// never panics. Only `MarketData` and `PersistenceFailure` come from real I/O faults.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("insufficient history: need {required} bars, have {available}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("invalid range: {start} to {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("no market data between {start} and {end}")]
    NoMarketData { start: NaiveDate, end: NaiveDate },

    #[error("forward test dataset not found at {}", .0.display())]
    DatasetMissing(PathBuf),

    #[error("malformed artifact {}: {reason}", .path.display())]
    MalformedArtifact { path: PathBuf, reason: String },

    #[error("failed to persist {}: {cause}", .path.display())]
    PersistenceFailure { path: PathBuf, cause: anyhow::Error },

    #[error("market data source error: {0}")]
    MarketData(anyhow::Error),
}

impl PipelineError {
    /// True when the caller should skip the step rather than count it as failed
    pub fn is_skip(&self) -> bool {
        matches!(self, PipelineError::ModelUnavailable(_))
    }

    pub fn persistence(path: impl Into<PathBuf>, source: impl Into<anyhow::Error>) -> Self {
        PipelineError::PersistenceFailure { path: path.into(), cause: source.into() }
    }

    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PipelineError::MalformedArtifact { path: path.into(), reason: reason.into() }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::InsufficientHistory { .. } => "insufficient_history",
            PipelineError::ModelUnavailable(_) => "model_unavailable",
            PipelineError::InvalidRange { .. } => "invalid_range",
            PipelineError::NoMarketData { .. } => "no_market_data",
            PipelineError::DatasetMissing(_) => "dataset_missing",
            PipelineError::MalformedArtifact { .. } => "malformed_artifact",
            PipelineError::PersistenceFailure { .. } => "persistence_failure",
            PipelineError::MarketData(_) => "market_data",
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_model_unavailable_is_skip() {
        assert!(PipelineError::ModelUnavailable("missing scaler".into()).is_skip());
        assert!(!PipelineError::InsufficientHistory { required: 34, available: 3 }.is_skip());
        assert!(!PipelineError::DatasetMissing(PathBuf::from("x.csv")).is_skip());
    }

    #[test]
    fn test_error_messages() {
        let err = PipelineError::InvalidRange {
            start: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        };
        assert_eq!(err.to_string(), "invalid range: 2024-06-01 to 2024-05-01");
        assert_eq!(err.kind(), "invalid_range");

        let err = PipelineError::persistence("ml_data/out.csv", anyhow::anyhow!("disk full"));
        assert_eq!(err.to_string(), "failed to persist ml_data/out.csv: disk full");
    }
}
