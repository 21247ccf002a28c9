use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::indicators::IndicatorSet;
use crate::types::{PriceBar, SignalClass};

/// One dataset row: indicator values at `timestamp` and, for labeled rows,
/// the direction the price actually took afterwards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub timestamp: DateTime<Utc>,
    pub features: IndicatorSet,
    pub label: Option<SignalClass>,
}

impl FeatureRow {
    pub fn labeled(timestamp: DateTime<Utc>, features: IndicatorSet, label: SignalClass) -> Self {
        Self { timestamp, features, label: Some(label) }
    }
}

/// Close-to-close return from `bars[idx]` to `bars[idx + horizon]`
pub fn forward_return(bars: &[PriceBar], idx: usize, horizon: usize) -> Option<Decimal> {
    let entry = bars.get(idx)?.close;
    let exit = bars.get(idx.checked_add(horizon)?)?.close;
    if entry.is_zero() {
        return None;
    }
    Some((exit - entry) / entry)
}

/// Direction of a realized move; returns within `±threshold` are hold
pub fn label_for_return(forward_return: Decimal, threshold: Decimal) -> SignalClass {
    if forward_return > threshold {
        SignalClass::Buy
    } else if forward_return < -threshold {
        SignalClass::Sell
    } else {
        SignalClass::Hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn bars(closes: &[Decimal]) -> Vec<PriceBar> {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| PriceBar::new(start + Duration::days(i as i64), *c, *c, *c, *c, dec!(1)))
            .collect()
    }

    #[test]
    fn test_forward_return() {
        let series = bars(&[dec!(100), dec!(101), dec!(110)]);
        assert_eq!(forward_return(&series, 0, 2), Some(dec!(0.1)));
        assert_eq!(forward_return(&series, 1, 2), None);
        assert_eq!(forward_return(&series, 0, usize::MAX), None);
    }

    #[test]
    fn test_label_thresholds() {
        let threshold = dec!(0.01);
        assert_eq!(label_for_return(dec!(0.02), threshold), SignalClass::Buy);
        assert_eq!(label_for_return(dec!(-0.015), threshold), SignalClass::Sell);
        assert_eq!(label_for_return(dec!(0.01), threshold), SignalClass::Hold);
        assert_eq!(label_for_return(dec!(-0.01), threshold), SignalClass::Hold);
        assert_eq!(label_for_return(Decimal::ZERO, threshold), SignalClass::Hold);
    }
}
