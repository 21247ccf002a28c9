use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{IndicatorSettings, LabelSettings};
use crate::error::{PipelineError, PipelineResult};
use crate::indicators::IndicatorEngine;
use crate::market::MarketData;
use crate::ml::artifacts::write_dataset;
use crate::ml::features::{forward_return, label_for_return, FeatureRow};
use crate::types::{normalize_bars, PriceBar, SignalClass, TimeFrame};

/// Extra calendar slack when converting bar counts to a fetch window,
/// covering sessions without bars (weekends, exchange holidays)
const CALENDAR_SLACK_DAYS: i64 = 7;

/// What a dataset build produced
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub path: PathBuf,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub rows: usize,
    /// Bars in range skipped for lack of lookback or forward horizon
    pub skipped: usize,
    pub buy_labels: usize,
    pub sell_labels: usize,
    pub hold_labels: usize,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
}

impl DatasetSummary {
    fn from_rows(path: &Path, start: NaiveDate, end: NaiveDate, rows: &[FeatureRow], skipped: usize) -> Self {
        let count = |class: SignalClass| rows.iter().filter(|r| r.label == Some(class)).count();
        Self {
            path: path.to_path_buf(),
            start,
            end,
            rows: rows.len(),
            skipped,
            buy_labels: count(SignalClass::Buy),
            sell_labels: count(SignalClass::Sell),
            hold_labels: count(SignalClass::Hold),
            first_timestamp: rows.first().map(|r| r.timestamp),
            last_timestamp: rows.last().map(|r| r.timestamp),
        }
    }
}

/// Builds the labeled forward-test dataset for a date range
pub struct DatasetBuilder {
    market: Arc<dyn MarketData>,
    engine: IndicatorEngine,
    labeling: LabelSettings,
    timeframe: TimeFrame,
    dataset_path: PathBuf,
}

impl DatasetBuilder {
    pub fn new(
        market: Arc<dyn MarketData>,
        indicators: &IndicatorSettings,
        labeling: LabelSettings,
        timeframe: TimeFrame,
        dataset_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            market,
            engine: IndicatorEngine::new(indicators),
            labeling,
            timeframe,
            dataset_path: dataset_path.into(),
        }
    }

    /// Fetches bars for `[start, end]` plus lookback and horizon padding,
    /// computes one labeled row per eligible bar and replaces the dataset file.
    /// An invalid range or an empty fetch leaves any existing dataset untouched.
    pub async fn prepare_forward_test_data(&self, start: NaiveDate, end: NaiveDate) -> PipelineResult<DatasetSummary> {
        if end < start {
            return Err(PipelineError::InvalidRange { start, end });
        }

        let (from, to) = self.fetch_window(start, end)?;
        info!("Preparing forward test data {} to {} (fetching {} to {})", start, end, from, to);

        let mut bars = self
            .market
            .bars_between(from, to)
            .await
            .map_err(PipelineError::MarketData)?;
        let dropped = normalize_bars(&mut bars);
        if dropped > 0 {
            warn!("Dropped {} duplicate bars", dropped);
        }

        let in_range = bars.iter().filter(|b| in_dates(b, start, end)).count();
        if in_range == 0 {
            return Err(PipelineError::NoMarketData { start, end });
        }

        let rows = self.build_rows(&bars, start, end)?;
        let skipped = in_range - rows.len();
        if rows.is_empty() {
            warn!(
                "No bar in {} to {} has {} bars of lookback and {} bars ahead",
                start,
                end,
                self.engine.required_history(),
                self.labeling.horizon_bars
            );
        } else if skipped > 0 {
            debug!("Skipped {} bars without full lookback or horizon", skipped);
        }

        write_dataset(&self.dataset_path, &rows)?;
        let summary = DatasetSummary::from_rows(&self.dataset_path, start, end, &rows, skipped);
        info!(
            "Wrote {} rows to {} (buy {}, sell {}, hold {})",
            summary.rows,
            self.dataset_path.display(),
            summary.buy_labels,
            summary.sell_labels,
            summary.hold_labels
        );
        Ok(summary)
    }

    /// One row per bar dated inside `[start, end]` with full lookback and a
    /// bar `horizon_bars` ahead. `bars` must be sorted and unique.
    pub fn build_rows(&self, bars: &[PriceBar], start: NaiveDate, end: NaiveDate) -> PipelineResult<Vec<FeatureRow>> {
        let required = self.engine.required_history();
        let mut rows = Vec::new();

        for (idx, bar) in bars.iter().enumerate() {
            if !in_dates(bar, start, end) || idx + 1 < required {
                continue;
            }
            let Some(ret) = forward_return(bars, idx, self.labeling.horizon_bars) else {
                continue;
            };

            let features = self.engine.compute(self.engine.trailing_window(bars, idx))?;
            let label = label_for_return(ret, self.labeling.threshold);
            rows.push(FeatureRow::labeled(bar.timestamp, features, label));
        }

        Ok(rows)
    }

    /// Calendar span to fetch for `[start, end]`; a span that does not fit
    /// the calendar is reported as `InvalidRange`
    fn fetch_window(&self, start: NaiveDate, end: NaiveDate) -> PipelineResult<(DateTime<Utc>, DateTime<Utc>)> {
        let invalid = || PipelineError::InvalidRange { start, end };
        let padding = |bars: usize| -> Option<Duration> {
            let bars = i32::try_from(bars).ok()?.checked_mul(2)?;
            self.timeframe
                .duration()
                .checked_mul(bars)?
                .checked_add(&Duration::days(CALENDAR_SLACK_DAYS))
        };

        let lookback = padding(self.engine.window_len()).ok_or_else(invalid)?;
        let horizon = padding(self.labeling.horizon_bars).ok_or_else(invalid)?;

        let from = start
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .and_then(|dt| dt.checked_sub_signed(lookback))
            .ok_or_else(invalid)?;
        let to = end
            .and_hms_opt(23, 59, 59)
            .map(|dt| dt.and_utc())
            .and_then(|dt| dt.checked_add_signed(horizon))
            .ok_or_else(invalid)?;
        Ok((from, to))
    }
}

fn in_dates(bar: &PriceBar, start: NaiveDate, end: NaiveDate) -> bool {
    let day = bar.timestamp.date_naive();
    day >= start && day <= end
}
