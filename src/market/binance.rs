use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::MarketData;
use crate::types::{normalize_bars, PriceBar, TimeFrame};

/// Binance caps klines responses at 1000 rows per request
const KLINES_LIMIT: usize = 1000;

/// Public klines endpoint of Binance (no API key required)
#[derive(Debug, Clone)]
pub struct BinanceMarketData {
    client: Client,
    base_url: String,
    symbol: String,
    timeframe: TimeFrame,
}

impl BinanceMarketData {
    pub fn new(base_url: &str, symbol: &str, timeframe: TimeFrame) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            symbol: symbol.to_uppercase(),
            timeframe,
        }
    }

    async fn fetch(&self, query: &str) -> Result<Vec<PriceBar>> {
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&{}",
            self.base_url,
            self.symbol,
            self.timeframe.as_str(),
            query
        );
        debug!("GET {}", url);

        let resp: Vec<Vec<serde_json::Value>> = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        resp.iter().map(|k| parse_kline(k)).collect()
    }
}

/// Converts one kline array `[open_time, open, high, low, close, volume, ...]`
pub fn parse_kline(k: &[serde_json::Value]) -> Result<PriceBar> {
    let open_time = k
        .first()
        .and_then(|v| v.as_i64())
        .ok_or_else(|| anyhow!("Kline missing open time"))?;
    let field = |idx: usize, name: &str| -> Result<Decimal> {
        let raw = k
            .get(idx)
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("Kline missing {}", name))?;
        Ok(Decimal::from_str(raw)?)
    };

    let timestamp = Utc
        .timestamp_millis_opt(open_time)
        .single()
        .ok_or_else(|| anyhow!("Invalid kline open time {}", open_time))?;

    Ok(PriceBar::new(
        timestamp,
        field(1, "open")?,
        field(2, "high")?,
        field(3, "low")?,
        field(4, "close")?,
        field(5, "volume")?,
    ))
}

#[async_trait]
impl MarketData for BinanceMarketData {
    fn describe(&self) -> String {
        format!("binance:{}:{}", self.symbol, self.timeframe)
    }

    /// Paginates forward from `from` until `to` is reached
    async fn bars_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<PriceBar>> {
        let mut all_bars = Vec::new();
        let mut current_start = from.timestamp_millis();
        let end_millis = to.timestamp_millis();
        let step = self.timeframe.duration().num_milliseconds();

        info!("Fetching {} {} bars from {} to {}", self.symbol, self.timeframe, from, to);

        while current_start <= end_millis {
            let batch = self
                .fetch(&format!(
                    "startTime={}&endTime={}&limit={}",
                    current_start, end_millis, KLINES_LIMIT
                ))
                .await?;

            let batch_len = batch.len();
            match batch.last() {
                Some(last) => current_start = last.timestamp.timestamp_millis() + step,
                None => break,
            }
            all_bars.extend(batch);

            if batch_len < KLINES_LIMIT {
                break;
            }

            // Rate limiting - avoid hitting API limits
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        normalize_bars(&mut all_bars);
        all_bars.retain(|b| b.timestamp >= from && b.timestamp <= to);
        info!("Fetched {} bars for {}", all_bars.len(), self.symbol);
        Ok(all_bars)
    }

    async fn latest_bars(&self, count: usize) -> Result<Vec<PriceBar>> {
        if count > KLINES_LIMIT {
            warn!("Requested {} bars, Binance returns at most {}", count, KLINES_LIMIT);
        }
        let mut bars = self.fetch(&format!("limit={}", count.min(KLINES_LIMIT))).await?;
        normalize_bars(&mut bars);
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_parse_kline() {
        let raw = json!([
            1717200000000i64, "67500.10", "68000.00", "67000.00", "67750.50", "123.45",
            1717286399999i64, "8340000.0", 1500, "60.0", "4050000.0", "0"
        ]);
        let values = raw.as_array().unwrap();
        let bar = parse_kline(values).unwrap();

        assert_eq!(bar.timestamp, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(bar.close, dec!(67750.50));
        assert_eq!(bar.volume, dec!(123.45));
    }

    #[test]
    fn test_parse_kline_rejects_truncated_row() {
        let raw = json!([1717200000000i64, "1.0", "2.0"]);
        assert!(parse_kline(raw.as_array().unwrap()).is_err());
    }

    #[test]
    fn test_describe_normalizes_symbol() {
        let source = BinanceMarketData::new("https://api.binance.us/", "btcusdt", TimeFrame::H1);
        assert_eq!(source.describe(), "binance:BTCUSDT:1h");
    }
}
