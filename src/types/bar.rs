use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One time-stamped OHLCV observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl PriceBar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self { timestamp, open, high, low, close, volume }
    }
}

/// Sort bars by timestamp and drop repeated timestamps (first one wins).
/// Returns the number of duplicates removed.
pub fn normalize_bars(bars: &mut Vec<PriceBar>) -> usize {
    bars.sort_by_key(|b| b.timestamp);
    let before = bars.len();
    bars.dedup_by_key(|b| b.timestamp);
    before - bars.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn bar(day: u32, close: Decimal) -> PriceBar {
        let ts = Utc.with_ymd_and_hms(2024, 6, day, 0, 0, 0).unwrap();
        PriceBar::new(ts, close, close + dec!(1), close - dec!(1), close, dec!(100))
    }

    #[test]
    fn test_normalize_sorts_and_dedups() {
        let mut bars = vec![bar(3, dec!(12)), bar(1, dec!(10)), bar(3, dec!(99)), bar(2, dec!(11))];
        let removed = normalize_bars(&mut bars);

        assert_eq!(removed, 1);
        assert_eq!(bars.len(), 3);
        assert!(bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(bars[2].close, dec!(12));
    }
}
