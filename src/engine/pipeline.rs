use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::dataset::{DatasetBuilder, DatasetSummary};
use super::forward_test::ForwardTestEvaluator;
use super::live::{LiveInferenceEngine, LivePrediction};
use super::results::ForwardTestMetrics;
use crate::config::AppConfig;
use crate::error::PipelineResult;
use crate::market::MarketData;
use crate::ml::persistence::{ModelLoader, TrainedModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    NoModel,
    ModelLoaded,
    Evaluating,
    Inferring,
    Idle,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineState::NoModel => write!(f, "NoModel"),
            PipelineState::ModelLoaded => write!(f, "ModelLoaded"),
            PipelineState::Evaluating => write!(f, "Evaluating"),
            PipelineState::Inferring => write!(f, "Inferring"),
            PipelineState::Idle => write!(f, "Idle"),
        }
    }
}

/// Entry point tying the market source, model artifacts and the three
/// operations together. Dataset preparation works without a model; the
/// forward test and live inference report `ModelUnavailable` until one loads.
pub struct SignalPipeline {
    builder: DatasetBuilder,
    evaluator: ForwardTestEvaluator,
    live: LiveInferenceEngine,
    loader: ModelLoader,
    model: Option<Arc<TrainedModel>>,
    state: PipelineState,
}

impl SignalPipeline {
    pub fn new(config: &AppConfig, market: Arc<dyn MarketData>) -> Self {
        let paths = &config.artifacts;
        Self {
            builder: DatasetBuilder::new(
                market.clone(),
                &config.indicators,
                config.labeling.clone(),
                config.market.timeframe,
                &paths.dataset,
            ),
            evaluator: ForwardTestEvaluator::new(&paths.dataset, &paths.results),
            live: LiveInferenceEngine::new(market, &config.indicators, &paths.live_log),
            loader: ModelLoader::from_paths(paths),
            model: None,
            state: PipelineState::NoModel,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Loads the model pair if not already held. A failed load leaves the
    /// pipeline in `NoModel` so a later call can retry.
    pub fn load_model(&mut self) -> PipelineResult<Arc<TrainedModel>> {
        if let Some(model) = &self.model {
            return Ok(model.clone());
        }

        match self.loader.load() {
            Ok(model) => {
                self.model = Some(model.clone());
                self.set_state(PipelineState::ModelLoaded);
                Ok(model)
            }
            Err(e) => {
                self.set_state(PipelineState::NoModel);
                Err(e)
            }
        }
    }

    pub async fn prepare_forward_test_data(&self, start: NaiveDate, end: NaiveDate) -> PipelineResult<DatasetSummary> {
        self.builder.prepare_forward_test_data(start, end).await
    }

    pub fn run_forward_test(&mut self) -> PipelineResult<ForwardTestMetrics> {
        let model = self.load_model()?;
        self.set_state(PipelineState::Evaluating);
        let result = self.evaluator.evaluate(&model);
        self.set_state(PipelineState::Idle);
        result
    }

    pub async fn run_live_inference(&mut self) -> PipelineResult<LivePrediction> {
        let model = self.load_model()?;
        self.set_state(PipelineState::Inferring);
        let result = self.live.infer(&model).await;
        self.set_state(PipelineState::Idle);
        result
    }

    fn set_state(&mut self, next: PipelineState) {
        if self.state != next {
            info!("Pipeline state: {} -> {}", self.state, next);
            self.state = next;
        }
    }
}
