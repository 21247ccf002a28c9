use rust_decimal::Decimal;
use super::Indicator;

/// Average True Range with Wilder smoothing
#[derive(Debug, Clone)]
pub struct ATR {
    period: usize,
    prev_close: Option<Decimal>,
    true_ranges: Vec<Decimal>,
    value: Option<Decimal>,
}

impl ATR {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            prev_close: None,
            true_ranges: Vec::with_capacity(period),
            value: None,
        }
    }

    pub fn update(&mut self, high: Decimal, low: Decimal, close: Decimal) -> Option<Decimal> {
        let tr = self.calculate_true_range(high, low);
        self.prev_close = Some(close);

        if self.value.is_none() {
            self.true_ranges.push(tr);
            if self.true_ranges.len() == self.period {
                let sum: Decimal = self.true_ranges.iter().sum();
                self.value = Some(sum / Decimal::from(self.period as u32));
            }
        } else if let Some(prev_atr) = self.value {
            let period_dec = Decimal::from(self.period as u32);
            self.value = Some((prev_atr * (period_dec - Decimal::ONE) + tr) / period_dec);
        }

        self.value
    }

    fn calculate_true_range(&self, high: Decimal, low: Decimal) -> Decimal {
        let hl = high - low;

        match self.prev_close {
            Some(prev_close) => {
                let hc = (high - prev_close).abs();
                let lc = (low - prev_close).abs();
                hl.max(hc).max(lc)
            }
            None => hl,
        }
    }

    /// ATR as a percentage of `price`
    pub fn percent_of(&self, price: Decimal) -> Option<Decimal> {
        let atr = self.value?;
        if price.is_zero() {
            return Some(Decimal::ZERO);
        }
        Some(atr / price * Decimal::from(100))
    }
}

impl Indicator for ATR {
    fn warmup_bars(&self) -> usize {
        self.period
    }
}
