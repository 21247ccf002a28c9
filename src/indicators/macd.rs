use rust_decimal::Decimal;
use super::{ema::EMA, Indicator};

#[derive(Debug, Clone)]
pub struct MACD {
    fast_ema: EMA,
    slow_ema: EMA,
    signal_ema: EMA,
    slow_period: usize,
    signal_period: usize,
    output: Option<MACDOutput>,
}

impl MACD {
    pub fn new(fast_period: usize, slow_period: usize, signal_period: usize) -> Self {
        Self {
            fast_ema: EMA::new(fast_period),
            slow_ema: EMA::new(slow_period),
            signal_ema: EMA::new(signal_period),
            slow_period,
            signal_period,
            output: None,
        }
    }

    pub fn update(&mut self, price: Decimal) -> Option<MACDOutput> {
        let fast = self.fast_ema.update(price);
        let slow = self.slow_ema.update(price);

        if let (Some(f), Some(s)) = (fast, slow) {
            let macd_line = f - s;
            if let Some(signal) = self.signal_ema.update(macd_line) {
                self.output = Some(MACDOutput {
                    macd_line,
                    signal_line: signal,
                    histogram: macd_line - signal,
                });
            }
        }

        self.output
    }

    pub fn output(&self) -> Option<MACDOutput> {
        self.output
    }
}

impl Indicator for MACD {
    /// The signal EMA starts on the bar the slow EMA first produces a value
    fn warmup_bars(&self) -> usize {
        self.slow_period + self.signal_period - 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MACDOutput {
    pub macd_line: Decimal,
    pub signal_line: Decimal,
    pub histogram: Decimal,
}
