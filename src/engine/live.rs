use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::IndicatorSettings;
use crate::error::{PipelineError, PipelineResult};
use crate::indicators::{IndicatorEngine, IndicatorSet};
use crate::market::MarketData;
use crate::ml::artifacts::{append_live_entry, LiveLogEntry};
use crate::ml::persistence::TrainedModel;
use crate::types::{PriceBar, SignalClass};

/// Signal for the most recent bar
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LivePrediction {
    /// When the prediction was made
    pub timestamp: DateTime<Utc>,
    /// Timestamp of the bar the prediction is for
    pub bar_time: DateTime<Utc>,
    pub prediction: SignalClass,
    pub confidence: f64,
    pub probabilities: Vec<(SignalClass, f64)>,
    pub current_price: Decimal,
    pub indicators: IndicatorSet,
}

impl LivePrediction {
    pub fn rsi(&self) -> f64 {
        self.indicators.rsi
    }

    fn log_entry(&self) -> LiveLogEntry {
        LiveLogEntry {
            timestamp: self.timestamp,
            bar_time: self.bar_time,
            prediction: self.prediction,
            confidence: self.confidence,
            current_price: self.current_price,
            indicators: self.indicators,
        }
    }
}

pub struct LiveInferenceEngine {
    market: Arc<dyn MarketData>,
    engine: IndicatorEngine,
    live_log: PathBuf,
}

impl LiveInferenceEngine {
    pub fn new(market: Arc<dyn MarketData>, indicators: &IndicatorSettings, live_log: impl Into<PathBuf>) -> Self {
        Self {
            market,
            engine: IndicatorEngine::new(indicators),
            live_log: live_log.into(),
        }
    }

    /// Fetches the latest window, predicts on its last bar and appends one log row
    pub async fn infer(&self, model: &TrainedModel) -> PipelineResult<LivePrediction> {
        let window_len = self.engine.window_len();
        let bars = self
            .market
            .latest_bars(window_len)
            .await
            .map_err(PipelineError::MarketData)?;
        debug!("Fetched {} of {} requested bars", bars.len(), window_len);

        let prediction = self.predict_window(model, &bars, Utc::now())?;
        append_live_entry(&self.live_log, &prediction.log_entry())?;

        info!(
            "Live signal {} ({:.1}% confidence) at {} | price {} | RSI {:.1}",
            prediction.prediction,
            prediction.confidence * 100.0,
            prediction.bar_time,
            prediction.current_price,
            prediction.rsi()
        );
        Ok(prediction)
    }

    /// Prediction for the last bar of `bars`, stamped with `as_of`; no I/O
    pub fn predict_window(
        &self,
        model: &TrainedModel,
        bars: &[PriceBar],
        as_of: DateTime<Utc>,
    ) -> PipelineResult<LivePrediction> {
        let required = self.engine.required_history();
        let last = match bars.last() {
            Some(bar) if bars.len() >= required => bar,
            _ => return Err(PipelineError::InsufficientHistory { required, available: bars.len() }),
        };

        let window = self.engine.trailing_window(bars, bars.len() - 1);
        let indicators = self.engine.compute(window)?;
        let prediction = model.predict(&indicators);

        Ok(LivePrediction {
            timestamp: as_of,
            bar_time: last.timestamp,
            prediction: prediction.class,
            confidence: prediction.confidence,
            probabilities: prediction.probabilities,
            current_price: last.close,
            indicators,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::synthetic_daily_bars;
    use crate::market::MockMarketData;
    use crate::ml::persistence::tests::momentum_model;
    use chrono::{NaiveDate, TimeZone};

    fn first_day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn mock_latest(bars: Vec<PriceBar>) -> Arc<dyn MarketData> {
        let mut mock = MockMarketData::new();
        mock.expect_latest_bars().returning(move |count| {
            let skip = bars.len().saturating_sub(count);
            Ok(bars[skip..].to_vec())
        });
        Arc::new(mock)
    }

    #[tokio::test]
    async fn test_infer_appends_to_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("live.csv");
        let bars = synthetic_daily_bars(first_day(), 160);
        let last = bars.last().unwrap().clone();
        let engine = LiveInferenceEngine::new(mock_latest(bars), &IndicatorSettings::default(), &log);
        let model = momentum_model();

        let first = engine.infer(&model).await.unwrap();
        assert_eq!(first.bar_time, last.timestamp);
        assert_eq!(first.current_price, last.close);
        assert!((0.0..=1.0).contains(&first.confidence));
        assert!((0.0..=100.0).contains(&first.rsi()));
        let total: f64 = first.probabilities.iter().map(|(_, p)| p).sum();
        assert!((total - 1.0).abs() < 1e-9);

        engine.infer(&model).await.unwrap();
        let content = std::fs::read_to_string(&log).unwrap();
        assert_eq!(content.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_short_history_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("live.csv");
        let engine = LiveInferenceEngine::new(
            mock_latest(synthetic_daily_bars(first_day(), 10)),
            &IndicatorSettings::default(),
            &log,
        );

        match engine.infer(&momentum_model()).await {
            Err(PipelineError::InsufficientHistory { required, available }) => {
                assert_eq!(required, 34);
                assert_eq!(available, 10);
            }
            other => panic!("expected InsufficientHistory, got {:?}", other),
        }
        assert!(!log.exists());
    }

    #[tokio::test]
    async fn test_source_failure_leaves_log_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("live.csv");
        let mut mock = MockMarketData::new();
        mock.expect_latest_bars()
            .returning(|_| Err(anyhow::anyhow!("exchange unavailable")));
        let engine = LiveInferenceEngine::new(Arc::new(mock), &IndicatorSettings::default(), &log);

        let err = engine.infer(&momentum_model()).await.unwrap_err();
        assert_eq!(err.kind(), "market_data");
        assert!(!log.exists());
    }

    #[test]
    fn test_same_window_same_prediction() {
        let dir = tempfile::tempdir().unwrap();
        let bars = synthetic_daily_bars(first_day(), 120);
        let engine = LiveInferenceEngine::new(
            mock_latest(Vec::new()),
            &IndicatorSettings::default(),
            dir.path().join("live.csv"),
        );
        let model = momentum_model();
        let as_of = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let a = engine.predict_window(&model, &bars, as_of).unwrap();
        let b = engine.predict_window(&model, &bars, as_of).unwrap();
        assert_eq!(a, b);
    }
}
