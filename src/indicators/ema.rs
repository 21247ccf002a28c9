use rust_decimal::Decimal;
use super::Indicator;

#[derive(Debug, Clone)]
pub struct EMA {
    period: usize,
    multiplier: Decimal,
    value: Option<Decimal>,
    count: usize,
    sum: Decimal,
}

impl EMA {
    pub fn new(period: usize) -> Self {
        let multiplier = Decimal::from(2) / Decimal::from(period as u32 + 1);
        Self {
            period,
            multiplier,
            value: None,
            count: 0,
            sum: Decimal::ZERO,
        }
    }

    /// Seeds with the SMA of the first `period` values, then smooths
    pub fn update(&mut self, price: Decimal) -> Option<Decimal> {
        self.count += 1;

        if self.count < self.period {
            self.sum += price;
            return None;
        } else if self.count == self.period {
            self.sum += price;
            self.value = Some(self.sum / Decimal::from(self.period as u32));
            return self.value;
        }

        if let Some(prev_ema) = self.value {
            self.value = Some((price - prev_ema) * self.multiplier + prev_ema);
        }

        self.value
    }

    pub fn value(&self) -> Option<Decimal> {
        self.value
    }
}

impl Indicator for EMA {
    fn warmup_bars(&self) -> usize {
        self.period
    }
}

/// Fast/slow EMA pair, reported as the percentage spread of fast over slow
#[derive(Debug, Clone)]
pub struct DoubleEMA {
    fast: EMA,
    slow: EMA,
}

impl DoubleEMA {
    pub fn new(fast_period: usize, slow_period: usize) -> Self {
        Self {
            fast: EMA::new(fast_period),
            slow: EMA::new(slow_period),
        }
    }

    pub fn update(&mut self, price: Decimal) -> Option<Decimal> {
        self.fast.update(price);
        self.slow.update(price);
        self.spread_percentage()
    }

    pub fn spread_percentage(&self) -> Option<Decimal> {
        match (self.fast.value(), self.slow.value()) {
            (Some(fast), Some(slow)) if !slow.is_zero() => {
                Some(((fast - slow) / slow) * Decimal::from(100))
            }
            (Some(_), Some(_)) => Some(Decimal::ZERO),
            _ => None,
        }
    }
}

impl Indicator for DoubleEMA {
    fn warmup_bars(&self) -> usize {
        self.fast.warmup_bars().max(self.slow.warmup_bars())
    }
}
