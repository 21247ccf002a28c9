use anyhow::{anyhow, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::types::TimeFrame;

/// Upper bound for `window_bars` and every indicator period
pub const MAX_WINDOW_BARS: usize = 10_000;
/// Upper bound for `labeling.horizon_bars`
pub const MAX_HORIZON_BARS: usize = 1_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub artifacts: ArtifactPaths,
    pub indicators: IndicatorSettings,
    pub labeling: LabelSettings,
    pub market: MarketSettings,
}

impl AppConfig {
    /// Layers built-in defaults, an optional TOML file and `SIGNAL_*` env vars
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?);

        if let Some(path) = path {
            debug!("Reading configuration from {}", path.display());
            builder = builder.add_source(config::File::from(path).required(false));
        }

        let settings: AppConfig = builder
            .add_source(
                config::Environment::with_prefix("SIGNAL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings
            .validate()
            .map_err(|errors| anyhow!("Invalid configuration: {}", errors.join(", ")))?;

        Ok(settings)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let ind = &self.indicators;

        // Indicator validation
        for (name, period) in [
            ("rsi_period", ind.rsi_period),
            ("macd_fast", ind.macd_fast),
            ("macd_slow", ind.macd_slow),
            ("macd_signal", ind.macd_signal),
            ("bb_period", ind.bb_period),
            ("atr_period", ind.atr_period),
            ("ema_fast", ind.ema_fast),
            ("ema_slow", ind.ema_slow),
            ("volume_period", ind.volume_period),
        ] {
            if period == 0 {
                errors.push(format!("indicators.{} must be > 0", name));
            } else if period > MAX_WINDOW_BARS {
                errors.push(format!("indicators.{} must be <= {}", name, MAX_WINDOW_BARS));
            }
        }
        if ind.window_bars > MAX_WINDOW_BARS {
            errors.push(format!("indicators.window_bars must be <= {}", MAX_WINDOW_BARS));
        }
        if ind.macd_fast >= ind.macd_slow {
            errors.push("indicators: macd_fast must be < macd_slow".to_string());
        }
        if ind.ema_fast >= ind.ema_slow {
            errors.push("indicators: ema_fast must be < ema_slow".to_string());
        }
        if ind.bb_std_dev <= Decimal::ZERO {
            errors.push("indicators.bb_std_dev must be > 0".to_string());
        }

        // Labeling validation
        if self.labeling.horizon_bars == 0 {
            errors.push("labeling.horizon_bars must be > 0".to_string());
        } else if self.labeling.horizon_bars > MAX_HORIZON_BARS {
            errors.push(format!("labeling.horizon_bars must be <= {}", MAX_HORIZON_BARS));
        }
        if self.labeling.threshold < Decimal::ZERO || self.labeling.threshold >= Decimal::ONE {
            errors.push("labeling.threshold must be between 0 and 1".to_string());
        }

        // Market validation
        if self.market.source == MarketSource::Binance && self.market.symbol.trim().is_empty() {
            errors.push("market.symbol is required for the binance source".to_string());
        }
        if self.market.source == MarketSource::Csv && self.market.csv_path.as_os_str().is_empty() {
            errors.push("market.csv_path is required for the csv source".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Locations of every persisted artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactPaths {
    pub dataset: PathBuf,
    pub results: PathBuf,
    pub live_log: PathBuf,
    pub model: PathBuf,
    pub scaler: PathBuf,
}

impl ArtifactPaths {
    /// Default file names rooted at `dir`
    pub fn under(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            dataset: dir.join("forward_test_dataset.csv"),
            results: dir.join("forward_test_results.csv"),
            live_log: dir.join("live_predictions.csv"),
            model: dir.join("model.json"),
            scaler: dir.join("scaler.json"),
        }
    }

    pub fn model_pair_present(&self) -> bool {
        self.model.exists() && self.scaler.exists()
    }
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self::under("ml_data")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorSettings {
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bb_period: usize,
    pub bb_std_dev: Decimal,
    pub atr_period: usize,
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub volume_period: usize,
    /// Trailing bars fed to the engine per step (never less than the lookback)
    pub window_bars: usize,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bb_period: 20,
            bb_std_dev: dec!(2),
            atr_period: 14,
            ema_fast: 9,
            ema_slow: 21,
            volume_period: 20,
            window_bars: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelSettings {
    /// Bars between the feature row and the close used for its label
    pub horizon_bars: usize,
    /// Forward return beyond which a move counts as buy/sell (0.01 = 1%)
    pub threshold: Decimal,
}

impl Default for LabelSettings {
    fn default() -> Self {
        Self {
            horizon_bars: 5,
            threshold: dec!(0.01),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketSource {
    Csv,
    Binance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketSettings {
    pub source: MarketSource,
    pub csv_path: PathBuf,
    pub symbol: String,
    pub timeframe: TimeFrame,
    pub base_url: String,
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            source: MarketSource::Csv,
            csv_path: PathBuf::from("ml_data/price_history.csv"),
            symbol: "BTCUSDT".to_string(),
            timeframe: TimeFrame::D1,
            base_url: "https://api.binance.us".to_string(),
        }
    }
}
