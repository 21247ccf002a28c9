use std::path::PathBuf;
use tracing::{debug, info};

use super::results::{ForwardTestMetrics, MetricsCalculator};
use crate::error::{PipelineError, PipelineResult};
use crate::ml::artifacts::{read_dataset, write_results, ForwardTestRecord};
use crate::ml::persistence::TrainedModel;

/// Replays the prepared dataset through a trained model
pub struct ForwardTestEvaluator {
    dataset_path: PathBuf,
    results_path: PathBuf,
}

impl ForwardTestEvaluator {
    pub fn new(dataset_path: impl Into<PathBuf>, results_path: impl Into<PathBuf>) -> Self {
        Self {
            dataset_path: dataset_path.into(),
            results_path: results_path.into(),
        }
    }

    /// Predicts every dataset row in timestamp order, writes the per-row
    /// results file and returns the aggregate metrics
    pub fn evaluate(&self, model: &TrainedModel) -> PipelineResult<ForwardTestMetrics> {
        let rows = read_dataset(&self.dataset_path)?;
        info!("Forward testing {} rows from {}", rows.len(), self.dataset_path.display());

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let actual = row.label.ok_or_else(|| {
                PipelineError::malformed(&self.dataset_path, format!("row {} has no label", row.timestamp))
            })?;
            let prediction = model.predict(&row.features);
            debug!(
                "{}: predicted {} ({:.3}), actual {}",
                row.timestamp, prediction.class, prediction.confidence, actual
            );

            records.push(ForwardTestRecord {
                timestamp: row.timestamp,
                prediction: prediction.class,
                actual,
                confidence: prediction.confidence,
                correct: prediction.class == actual,
            });
        }

        write_results(&self.results_path, &records)?;
        let metrics = MetricsCalculator::calculate(&records);
        info!(
            "Forward test accuracy {:.2}% over {} samples",
            metrics.accuracy * 100.0,
            metrics.total_samples
        );
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::artifacts::write_dataset;
    use crate::ml::features::FeatureRow;
    use crate::ml::persistence::tests::momentum_model;
    use crate::indicators::IndicatorSet;
    use crate::types::SignalClass;
    use chrono::{Duration, TimeZone, Utc};

    fn row(day: i64, rsi: f64, return_5: f64, label: Option<SignalClass>) -> FeatureRow {
        let mut features = IndicatorSet::from_array([0.0; IndicatorSet::NUM_FEATURES]);
        features.rsi = rsi;
        features.return_5 = return_5;
        FeatureRow {
            timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap() + Duration::days(day),
            features,
            label,
        }
    }

    #[test]
    fn test_evaluate_counts_hits() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dir.path().join("dataset.csv");
        let results = dir.path().join("results.csv");
        write_dataset(
            &dataset,
            &[
                row(0, 85.0, 0.08, Some(SignalClass::Buy)),
                row(1, 15.0, -0.08, Some(SignalClass::Sell)),
                row(2, 85.0, 0.08, Some(SignalClass::Sell)),
                row(3, 50.0, 0.0, Some(SignalClass::Hold)),
            ],
        )
        .unwrap();

        let metrics = ForwardTestEvaluator::new(&dataset, &results)
            .evaluate(&momentum_model())
            .unwrap();

        assert_eq!(metrics.total_samples, 4);
        assert_eq!(metrics.correct_predictions, 3);
        assert_eq!(metrics.accuracy, 0.75);
        assert_eq!(metrics.buy_predictions, 2);
        assert_eq!(metrics.sell_predictions, 1);
        assert_eq!(metrics.hold_predictions, 1);

        let content = std::fs::read_to_string(&results).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[1].starts_with("2024-06-01T00:00:00Z,buy,buy,"));
        assert!(lines[3].ends_with(",false"));
    }

    #[test]
    fn test_empty_dataset_gives_zero_accuracy() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dir.path().join("dataset.csv");
        write_dataset(&dataset, &[]).unwrap();

        let metrics = ForwardTestEvaluator::new(&dataset, dir.path().join("results.csv"))
            .evaluate(&momentum_model())
            .unwrap();
        assert_eq!(metrics.total_samples, 0);
        assert_eq!(metrics.accuracy, 0.0);
    }

    #[test]
    fn test_missing_dataset_writes_no_results() {
        let dir = tempfile::tempdir().unwrap();
        let results = dir.path().join("results.csv");
        let err = ForwardTestEvaluator::new(dir.path().join("absent.csv"), &results)
            .evaluate(&momentum_model())
            .unwrap_err();

        assert!(matches!(err, PipelineError::DatasetMissing(_)));
        assert!(!results.exists());
    }

    #[test]
    fn test_nan_feature_fails_without_results() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dir.path().join("dataset.csv");
        let results = dir.path().join("results.csv");
        write_dataset(&dataset, &[row(0, f64::NAN, 0.08, Some(SignalClass::Buy))]).unwrap();

        let err = ForwardTestEvaluator::new(&dataset, &results)
            .evaluate(&momentum_model())
            .unwrap_err();
        assert!(matches!(err, PipelineError::MalformedArtifact { .. }));
        assert!(!results.exists());
    }

    #[test]
    fn test_unlabeled_row_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dir.path().join("dataset.csv");
        let results = dir.path().join("results.csv");
        write_dataset(&dataset, &[row(0, 50.0, 0.0, None)]).unwrap();

        let err = ForwardTestEvaluator::new(&dataset, &results)
            .evaluate(&momentum_model())
            .unwrap_err();
        assert!(matches!(err, PipelineError::MalformedArtifact { .. }));
        assert!(!results.exists());
    }
}
