use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{BollingerBands, DoubleEMA, Indicator, ATR, MACD, RSI, VolumeProfile};
use crate::config::IndicatorSettings;
use crate::error::{PipelineError, PipelineResult};
use crate::types::PriceBar;

const SHORT_RETURN_BARS: usize = 1;
const LONG_RETURN_BARS: usize = 5;

/// Indicator values for one point in time, in fixed feature order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_hist: f64,
    pub bb_position: f64,
    pub bb_width: f64,
    pub atr_pct: f64,
    pub ema_spread_pct: f64,
    pub volume_ratio: f64,
    pub return_1: f64,
    pub return_5: f64,
}

impl IndicatorSet {
    pub const NUM_FEATURES: usize = 11;

    pub const FEATURE_NAMES: [&'static str; Self::NUM_FEATURES] = [
        "rsi",
        "macd",
        "macd_signal",
        "macd_hist",
        "bb_position",
        "bb_width",
        "atr_pct",
        "ema_spread_pct",
        "volume_ratio",
        "return_1",
        "return_5",
    ];

    pub fn to_array(&self) -> [f64; Self::NUM_FEATURES] {
        [
            self.rsi,
            self.macd,
            self.macd_signal,
            self.macd_hist,
            self.bb_position,
            self.bb_width,
            self.atr_pct,
            self.ema_spread_pct,
            self.volume_ratio,
            self.return_1,
            self.return_5,
        ]
    }

    pub fn from_array(values: [f64; Self::NUM_FEATURES]) -> Self {
        let [rsi, macd, macd_signal, macd_hist, bb_position, bb_width, atr_pct, ema_spread_pct, volume_ratio, return_1, return_5] =
            values;
        Self {
            rsi,
            macd,
            macd_signal,
            macd_hist,
            bb_position,
            bb_width,
            atr_pct,
            ema_spread_pct,
            volume_ratio,
            return_1,
            return_5,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> {
        Self::FEATURE_NAMES.into_iter().zip(self.to_array())
    }
}

/// Computes the feature set from a trailing window of bars
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    rsi: RSI,
    macd: MACD,
    bollinger: BollingerBands,
    atr: ATR,
    ema_spread: DoubleEMA,
    volume: VolumeProfile,
    window_bars: usize,
}

impl IndicatorEngine {
    pub fn new(settings: &IndicatorSettings) -> Self {
        Self {
            rsi: RSI::new(settings.rsi_period),
            macd: MACD::new(settings.macd_fast, settings.macd_slow, settings.macd_signal),
            bollinger: BollingerBands::new(settings.bb_period, settings.bb_std_dev),
            atr: ATR::new(settings.atr_period),
            ema_spread: DoubleEMA::new(settings.ema_fast, settings.ema_slow),
            volume: VolumeProfile::new(settings.volume_period),
            window_bars: settings.window_bars,
        }
    }

    fn indicators(&self) -> [&dyn Indicator; 6] {
        [&self.rsi as &dyn Indicator, &self.macd, &self.bollinger, &self.atr, &self.ema_spread, &self.volume]
    }

    /// Minimum number of bars `compute` accepts
    pub fn required_history(&self) -> usize {
        self.indicators()
            .iter()
            .map(|ind| ind.warmup_bars())
            .chain([LONG_RETURN_BARS + 1, SHORT_RETURN_BARS + 1])
            .max()
            .unwrap_or(1)
    }

    /// Bars fed per computation: the configured window, never below the lookback
    pub fn window_len(&self) -> usize {
        self.window_bars.max(self.required_history())
    }

    /// Trailing slice of `bars` ending at index `end` (inclusive), capped at `window_len`
    pub fn trailing_window<'a>(&self, bars: &'a [PriceBar], end: usize) -> &'a [PriceBar] {
        let len = (end + 1).min(self.window_len());
        &bars[end + 1 - len..=end]
    }

    pub fn compute(&self, window: &[PriceBar]) -> PipelineResult<IndicatorSet> {
        let required = self.required_history();
        if window.len() < required {
            return Err(PipelineError::InsufficientHistory { required, available: window.len() });
        }

        // Fresh state per call so identical windows give identical output
        let mut rsi = self.rsi.clone();
        let mut macd = self.macd.clone();
        let mut bollinger = self.bollinger.clone();
        let mut atr = self.atr.clone();
        let mut ema_spread = self.ema_spread.clone();
        let mut volume = self.volume.clone();

        let mut volume_ratio = None;
        for bar in window {
            rsi.update(bar.close);
            macd.update(bar.close);
            bollinger.update(bar.close);
            atr.update(bar.high, bar.low, bar.close);
            ema_spread.update(bar.close);
            volume_ratio = volume.update(bar.volume);
        }

        let not_ready = || PipelineError::InsufficientHistory { required, available: window.len() };
        let last = window.last().ok_or_else(not_ready)?;
        let macd_out = macd.output().ok_or_else(not_ready)?;
        let bb = bollinger.output().ok_or_else(not_ready)?;

        Ok(IndicatorSet {
            rsi: to_f64(rsi.value().ok_or_else(not_ready)?),
            macd: to_f64(macd_out.macd_line),
            macd_signal: to_f64(macd_out.signal_line),
            macd_hist: to_f64(macd_out.histogram),
            bb_position: to_f64(bb.percent_b),
            bb_width: to_f64(bb.bandwidth),
            atr_pct: to_f64(atr.percent_of(last.close).ok_or_else(not_ready)?),
            ema_spread_pct: to_f64(ema_spread.spread_percentage().ok_or_else(not_ready)?),
            volume_ratio: to_f64(volume_ratio.ok_or_else(not_ready)?),
            return_1: trailing_return(window, SHORT_RETURN_BARS),
            return_5: trailing_return(window, LONG_RETURN_BARS),
        })
    }
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Close-to-close return over the last `bars` bars
fn trailing_return(window: &[PriceBar], bars: usize) -> f64 {
    let n = window.len();
    if n <= bars {
        return 0.0;
    }
    let prev = window[n - 1 - bars].close;
    if prev.is_zero() {
        return 0.0;
    }
    to_f64((window[n - 1].close - prev) / prev)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn make_bars(closes: &[f64]) -> Vec<PriceBar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let close = Decimal::from_f64_retain(*c).unwrap().round_dp(4);
                PriceBar::new(
                    start + Duration::days(i as i64),
                    close,
                    close + Decimal::ONE,
                    close - Decimal::ONE,
                    close,
                    Decimal::from(1000 + (i as i64 % 7) * 10),
                )
            })
            .collect()
    }

    fn wave(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0 + i as f64 * 0.1).collect()
    }

    #[test]
    fn test_required_history_is_macd_bound() {
        let engine = IndicatorEngine::new(&IndicatorSettings::default());
        assert_eq!(engine.required_history(), 34);
        assert_eq!(engine.window_len(), 100);
    }

    #[test]
    fn test_insufficient_history() {
        let engine = IndicatorEngine::new(&IndicatorSettings::default());
        let bars = make_bars(&wave(20));
        match engine.compute(&bars) {
            Err(PipelineError::InsufficientHistory { required, available }) => {
                assert_eq!(required, 34);
                assert_eq!(available, 20);
            }
            other => panic!("expected InsufficientHistory, got {:?}", other),
        }
    }

    #[test]
    fn test_compute_is_deterministic_and_bounded() {
        let engine = IndicatorEngine::new(&IndicatorSettings::default());
        let bars = make_bars(&wave(60));

        let first = engine.compute(&bars).unwrap();
        let second = engine.compute(&bars).unwrap();
        assert_eq!(first, second);
        assert!((0.0..=100.0).contains(&first.rsi));
        assert!((0.0..=1.0).contains(&first.bb_position));
        assert!(first.atr_pct > 0.0);
    }

    #[test]
    fn test_exact_lookback_is_enough() {
        let engine = IndicatorEngine::new(&IndicatorSettings::default());
        let bars = make_bars(&wave(34));
        assert!(engine.compute(&bars).is_ok());
    }

    #[test]
    fn test_trailing_window_caps_length() {
        let mut settings = IndicatorSettings::default();
        settings.window_bars = 40;
        let engine = IndicatorEngine::new(&settings);
        let bars = make_bars(&wave(80));

        let window = engine.trailing_window(&bars, 79);
        assert_eq!(window.len(), 40);
        assert_eq!(window.last().unwrap().timestamp, bars[79].timestamp);

        let early = engine.trailing_window(&bars, 9);
        assert_eq!(early.len(), 10);
    }

    #[test]
    fn test_returns_and_named_lookup() {
        let engine = IndicatorEngine::new(&IndicatorSettings::default());
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let set = engine.compute(&make_bars(&closes)).unwrap();

        assert!((set.return_1 - (139.0 / 138.0 - 1.0)).abs() < 1e-9);
        assert!((set.return_5 - (139.0 / 134.0 - 1.0)).abs() < 1e-9);
        assert_eq!(set.iter().next(), Some(("rsi", set.rsi)));
        assert_eq!(set.iter().count(), IndicatorSet::NUM_FEATURES);
        assert_eq!(IndicatorSet::from_array(set.to_array()), set);
    }
}
