use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

use super::MarketData;
use crate::types::{normalize_bars, PriceBar};

/// Raw OHLCV row; accepts both lowercase and spreadsheet-style headers
#[derive(Debug, Deserialize)]
struct BarRecord {
    #[serde(alias = "Date", alias = "date", alias = "Timestamp")]
    timestamp: String,
    #[serde(alias = "Open")]
    open: String,
    #[serde(alias = "High")]
    high: String,
    #[serde(alias = "Low")]
    low: String,
    #[serde(alias = "Close")]
    close: String,
    #[serde(alias = "Volume")]
    volume: String,
}

impl BarRecord {
    fn into_bar(self) -> Result<PriceBar> {
        Ok(PriceBar::new(
            parse_timestamp(&self.timestamp)?,
            parse_decimal("open", &self.open)?,
            parse_decimal("high", &self.high)?,
            parse_decimal("low", &self.low)?,
            parse_decimal("close", &self.close)?,
            parse_decimal("volume", &self.volume)?,
        ))
    }
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC)
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| anyhow!("Invalid timestamp: {}", raw))?;
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .ok_or_else(|| anyhow!("Invalid timestamp: {}", raw))
}

fn parse_decimal(field: &str, raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw.trim()).map_err(|e| anyhow!("Invalid {} value '{}': {}", field, raw, e))
}

/// Price history from a local OHLCV CSV file
#[derive(Debug, Clone)]
pub struct CsvMarketData {
    path: PathBuf,
}

impl CsvMarketData {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    fn load(&self) -> Result<Vec<PriceBar>> {
        let mut reader = csv::Reader::from_path(&self.path)
            .with_context(|| format!("Failed to open price history {}", self.path.display()))?;

        let mut bars = Vec::new();
        for (line, record) in reader.deserialize::<BarRecord>().enumerate() {
            let record = record.with_context(|| format!("Bad row {} in {}", line + 2, self.path.display()))?;
            bars.push(record.into_bar()?);
        }

        let duplicates = normalize_bars(&mut bars);
        if duplicates > 0 {
            warn!("Dropped {} duplicate timestamps from {}", duplicates, self.path.display());
        }
        debug!("Loaded {} bars from {}", bars.len(), self.path.display());
        Ok(bars)
    }
}

#[async_trait]
impl MarketData for CsvMarketData {
    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }

    async fn bars_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<PriceBar>> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|b| b.timestamp >= from && b.timestamp <= to)
            .collect())
    }

    async fn latest_bars(&self, count: usize) -> Result<Vec<PriceBar>> {
        let mut bars = self.load()?;
        let skip = bars.len().saturating_sub(count);
        Ok(bars.split_off(skip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn write_history(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("prices.csv");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let day = parse_timestamp("2024-06-01").unwrap();
        assert_eq!(day, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());

        let ts = parse_timestamp("2024-06-01T09:15:00+05:30").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 6, 1, 3, 45, 0).unwrap());

        assert!(parse_timestamp("June 1st").is_err());
    }

    #[tokio::test]
    async fn test_reads_sorted_unique_bars() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_history(
            dir.path(),
            "timestamp,open,high,low,close,volume\n\
             2024-06-03,3,4,2,3.5,100\n\
             2024-06-01,1,2,0.5,1.5,100\n\
             2024-06-02,2,3,1,2.5,100\n\
             2024-06-02,9,9,9,9,9\n",
        );

        let source = CsvMarketData::new(&path);
        let from = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap();
        let bars = source.bars_between(from, to).await.unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, dec!(1.5));
        assert_eq!(bars[1].close, dec!(2.5));

        let latest = source.latest_bars(2).await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[1].close, dec!(3.5));
    }

    #[tokio::test]
    async fn test_accepts_spreadsheet_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_history(
            dir.path(),
            "Date,Open,High,Low,Close,Adj Close,Volume\n2024-06-01,10,11,9,10.5,10.4,5000\n",
        );

        let bars = CsvMarketData::new(&path).latest_bars(10).await.unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].volume, dec!(5000));
    }

    #[tokio::test]
    async fn test_bad_value_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_history(dir.path(), "timestamp,open,high,low,close,volume\n2024-06-01,a,1,1,1,1\n");
        assert!(CsvMarketData::new(&path).latest_bars(5).await.is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        let source = CsvMarketData::new("/nonexistent/prices.csv");
        assert!(tokio_test::block_on(source.latest_bars(5)).is_err());
        assert_eq!(source.describe(), "csv:/nonexistent/prices.csv");
    }
}
