pub mod binance;
pub mod csv_source;

pub use binance::*;
pub use csv_source::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::{MarketSettings, MarketSource};
use crate::types::PriceBar;

/// Source of historical and most-recent price bars.
/// Implementations return bars sorted ascending with unique timestamps.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketData: Send + Sync {
    fn describe(&self) -> String;

    /// Bars with `from <= timestamp <= to`
    async fn bars_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> anyhow::Result<Vec<PriceBar>>;

    /// Up to `count` of the most recent bars
    async fn latest_bars(&self, count: usize) -> anyhow::Result<Vec<PriceBar>>;
}

pub fn create_market_data(settings: &MarketSettings) -> Box<dyn MarketData> {
    match settings.source {
        MarketSource::Csv => Box::new(CsvMarketData::new(&settings.csv_path)),
        MarketSource::Binance => Box::new(BinanceMarketData::new(
            &settings.base_url,
            &settings.symbol,
            settings.timeframe,
        )),
    }
}
