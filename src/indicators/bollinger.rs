use rust_decimal::Decimal;
use super::{Indicator, stddev, sma};

#[derive(Debug, Clone)]
pub struct BollingerBands {
    period: usize,
    std_dev_multiplier: Decimal,
    prices: Vec<Decimal>,
    output: Option<BollingerOutput>,
}

impl BollingerBands {
    pub fn new(period: usize, std_dev_multiplier: Decimal) -> Self {
        Self {
            period,
            std_dev_multiplier,
            prices: Vec::with_capacity(period),
            output: None,
        }
    }

    pub fn update(&mut self, price: Decimal) -> Option<BollingerOutput> {
        self.prices.push(price);
        if self.prices.len() > self.period {
            self.prices.remove(0);
        }

        if self.prices.len() < self.period {
            return None;
        }

        let middle = sma(&self.prices, self.period)?;
        let deviation = stddev(&self.prices, self.period)? * self.std_dev_multiplier;
        let upper = middle + deviation;
        let lower = middle - deviation;

        // (upper - lower) / middle * 100
        let bandwidth = if middle.is_zero() {
            Decimal::ZERO
        } else {
            (upper - lower) / middle * Decimal::from(100)
        };

        // %B clamped to the band; a collapsed band puts price in the middle
        let band_range = upper - lower;
        let percent_b = if band_range.is_zero() {
            Decimal::new(5, 1)
        } else {
            ((price - lower) / band_range).clamp(Decimal::ZERO, Decimal::ONE)
        };

        self.output = Some(BollingerOutput { upper, middle, lower, bandwidth, percent_b });
        self.output
    }

    pub fn output(&self) -> Option<BollingerOutput> {
        self.output
    }
}

impl Indicator for BollingerBands {
    fn warmup_bars(&self) -> usize {
        self.period
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerOutput {
    pub upper: Decimal,
    pub middle: Decimal,
    pub lower: Decimal,
    pub bandwidth: Decimal,
    pub percent_b: Decimal,
}
