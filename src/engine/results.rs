use serde::{Deserialize, Serialize};

use crate::ml::artifacts::ForwardTestRecord;
use crate::types::SignalClass;

/// Per-class prediction statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassStats {
    pub class: SignalClass,
    pub predicted: usize,
    pub actual: usize,
    pub correct: usize,
}

impl ClassStats {
    /// Fraction of predictions of this class that were right (0 when never predicted)
    pub fn precision(&self) -> f64 {
        if self.predicted == 0 {
            0.0
        } else {
            self.correct as f64 / self.predicted as f64
        }
    }

    /// Fraction of actual occurrences of this class the model caught
    pub fn recall(&self) -> f64 {
        if self.actual == 0 {
            0.0
        } else {
            self.correct as f64 / self.actual as f64
        }
    }
}

/// Aggregate over one full forward-test pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardTestMetrics {
    pub accuracy: f64,
    pub total_samples: usize,
    pub correct_predictions: usize,
    pub buy_predictions: usize,
    pub sell_predictions: usize,
    pub hold_predictions: usize,
    pub class_stats: Vec<ClassStats>,
}

impl ForwardTestMetrics {
    /// Pretty print results to console
    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(60));
        println!("                 FORWARD TEST RESULTS");
        println!("{}", "=".repeat(60));
        println!("Accuracy:          {:.2}%", self.accuracy * 100.0);
        println!("Total samples:     {}", self.total_samples);
        println!("Correct:           {}", self.correct_predictions);
        println!("Buy predictions:   {}", self.buy_predictions);
        println!("Sell predictions:  {}", self.sell_predictions);
        println!("Hold predictions:  {}", self.hold_predictions);
        println!("{}", "-".repeat(60));
        println!("{:<8} {:>10} {:>10} {:>10} {:>10}", "Class", "Predicted", "Actual", "Precision", "Recall");
        for stats in &self.class_stats {
            println!(
                "{:<8} {:>10} {:>10} {:>9.1}% {:>9.1}%",
                stats.class,
                stats.predicted,
                stats.actual,
                stats.precision() * 100.0,
                stats.recall() * 100.0
            );
        }
        println!("{}", "=".repeat(60));
    }
}

pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Derive metrics from the per-row records in one pass
    pub fn calculate(records: &[ForwardTestRecord]) -> ForwardTestMetrics {
        let mut class_stats: Vec<ClassStats> = SignalClass::all()
            .into_iter()
            .map(|class| ClassStats { class, predicted: 0, actual: 0, correct: 0 })
            .collect();

        let mut correct = 0;
        for record in records {
            if let Some(stats) = class_stats.iter_mut().find(|s| s.class == record.prediction) {
                stats.predicted += 1;
                if record.correct {
                    stats.correct += 1;
                }
            }
            if let Some(stats) = class_stats.iter_mut().find(|s| s.class == record.actual) {
                stats.actual += 1;
            }
            if record.correct {
                correct += 1;
            }
        }

        let total = records.len();
        let accuracy = if total == 0 { 0.0 } else { correct as f64 / total as f64 };
        let predicted = |class: SignalClass| {
            class_stats.iter().find(|s| s.class == class).map(|s| s.predicted).unwrap_or(0)
        };

        ForwardTestMetrics {
            accuracy,
            total_samples: total,
            correct_predictions: correct,
            buy_predictions: predicted(SignalClass::Buy),
            sell_predictions: predicted(SignalClass::Sell),
            hold_predictions: predicted(SignalClass::Hold),
            class_stats,
        }
    }
}
