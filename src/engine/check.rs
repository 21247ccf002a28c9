use chrono::NaiveDate;
use tracing::{error, info, warn};

use super::pipeline::{PipelineState, SignalPipeline};
use crate::config::ArtifactPaths;
use crate::error::PipelineError;

/// Outcome of one check section; a skip counts as a pass
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    Passed,
    Skipped(String),
    Failed(String),
}

impl CheckOutcome {
    pub fn passed(&self) -> bool {
        !matches!(self, CheckOutcome::Failed(_))
    }

    fn label(&self) -> String {
        match self {
            CheckOutcome::Passed => "PASS".to_string(),
            CheckOutcome::Skipped(reason) => format!("SKIP ({})", reason),
            CheckOutcome::Failed(reason) => format!("FAIL ({})", reason),
        }
    }
}

fn failed(e: PipelineError) -> CheckOutcome {
    error!("{}", e);
    CheckOutcome::Failed(e.kind().to_string())
}

fn missing(path: &std::path::Path) -> CheckOutcome {
    CheckOutcome::Failed(format!("{} not written", path.display()))
}

#[derive(Debug, Clone)]
pub struct CheckReport {
    pub dataset: CheckOutcome,
    pub forward_test: CheckOutcome,
    pub live: CheckOutcome,
    pub final_state: PipelineState,
}

impl CheckReport {
    pub fn passed(&self) -> bool {
        self.dataset.passed() && self.forward_test.passed() && self.live.passed()
    }

    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(60));
        println!("Dataset:       {}", self.dataset.label());
        println!("Forward test:  {}", self.forward_test.label());
        println!("Live:          {}", self.live.label());
        println!("Pipeline:      {}", self.final_state);
        println!("{}", "=".repeat(60));
        println!("{}", if self.passed() { "ALL CHECKS PASSED" } else { "SOME CHECKS FAILED" });
    }
}

/// Prepares the dataset for `[start, end]`, then forward tests and runs live
/// inference when a model pair is present. Each section is judged by its
/// result and by the artifact it must leave behind.
pub async fn run_check(
    pipeline: &mut SignalPipeline,
    paths: &ArtifactPaths,
    start: NaiveDate,
    end: NaiveDate,
) -> CheckReport {
    info!("Preparing forward test data {} to {}", start, end);
    let dataset = match pipeline.prepare_forward_test_data(start, end).await {
        Ok(summary) if paths.dataset.exists() => {
            info!("Dataset ready: {} rows", summary.rows);
            CheckOutcome::Passed
        }
        Ok(_) => missing(&paths.dataset),
        Err(e) => failed(e),
    };

    let forward_test = if !dataset.passed() {
        CheckOutcome::Skipped("no dataset".to_string())
    } else if !paths.model_pair_present() {
        warn!("No trained model at {}, skipping forward test", paths.model.display());
        CheckOutcome::Skipped("no model".to_string())
    } else {
        match pipeline.run_forward_test() {
            Ok(metrics) if paths.results.exists() => {
                metrics.print_summary();
                CheckOutcome::Passed
            }
            Ok(_) => missing(&paths.results),
            Err(e) if e.is_skip() => CheckOutcome::Skipped(e.to_string()),
            Err(e) => failed(e),
        }
    };

    let live = if !paths.model_pair_present() {
        warn!("No trained model at {}, skipping live inference", paths.model.display());
        CheckOutcome::Skipped("no model".to_string())
    } else {
        match pipeline.run_live_inference().await {
            Ok(prediction) if paths.live_log.exists() => {
                info!(
                    "Live prediction {} ({:.1}%), RSI {:.1}",
                    prediction.prediction,
                    prediction.confidence * 100.0,
                    prediction.rsi()
                );
                CheckOutcome::Passed
            }
            Ok(_) => missing(&paths.live_log),
            Err(e) if e.is_skip() => CheckOutcome::Skipped(e.to_string()),
            Err(e) => failed(e),
        }
    };

    let report = CheckReport {
        dataset,
        forward_test,
        live,
        final_state: pipeline.state(),
    };
    info!("Check finished in state {}", report.final_state);
    report
}
