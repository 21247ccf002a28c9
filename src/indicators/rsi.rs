use rust_decimal::Decimal;
use super::Indicator;

/// Relative Strength Index with Wilder smoothing
#[derive(Debug, Clone)]
pub struct RSI {
    period: usize,
    avg_gain: Option<Decimal>,
    avg_loss: Option<Decimal>,
    prev_price: Option<Decimal>,
    gains: Vec<Decimal>,
    losses: Vec<Decimal>,
    value: Option<Decimal>,
}

impl RSI {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            avg_gain: None,
            avg_loss: None,
            prev_price: None,
            gains: Vec::with_capacity(period),
            losses: Vec::with_capacity(period),
            value: None,
        }
    }

    pub fn update(&mut self, price: Decimal) -> Option<Decimal> {
        if let Some(prev) = self.prev_price {
            let change = price - prev;
            let gain = if change > Decimal::ZERO { change } else { Decimal::ZERO };
            let loss = if change < Decimal::ZERO { change.abs() } else { Decimal::ZERO };

            if self.gains.len() < self.period {
                self.gains.push(gain);
                self.losses.push(loss);

                if self.gains.len() == self.period {
                    let sum_gain: Decimal = self.gains.iter().sum();
                    let sum_loss: Decimal = self.losses.iter().sum();
                    self.avg_gain = Some(sum_gain / Decimal::from(self.period as u32));
                    self.avg_loss = Some(sum_loss / Decimal::from(self.period as u32));
                    self.value = self.calculate_rsi();
                }
            } else if let (Some(avg_gain), Some(avg_loss)) = (self.avg_gain, self.avg_loss) {
                let period_dec = Decimal::from(self.period as u32);
                self.avg_gain = Some((avg_gain * (period_dec - Decimal::ONE) + gain) / period_dec);
                self.avg_loss = Some((avg_loss * (period_dec - Decimal::ONE) + loss) / period_dec);
                self.value = self.calculate_rsi();
            }
        }

        self.prev_price = Some(price);
        self.value
    }

    fn calculate_rsi(&self) -> Option<Decimal> {
        match (self.avg_gain, self.avg_loss) {
            // Flat window: no momentum either way
            (Some(avg_gain), Some(avg_loss)) if avg_gain.is_zero() && avg_loss.is_zero() => {
                Some(Decimal::from(50))
            }
            (Some(_), Some(avg_loss)) if avg_loss.is_zero() => Some(Decimal::from(100)),
            (Some(avg_gain), Some(avg_loss)) => {
                let rs = avg_gain / avg_loss;
                let rsi = Decimal::from(100) - (Decimal::from(100) / (Decimal::ONE + rs));
                Some(rsi.clamp(Decimal::ZERO, Decimal::from(100)))
            }
            _ => None,
        }
    }

    pub fn value(&self) -> Option<Decimal> {
        self.value
    }
}

impl Indicator for RSI {
    /// One extra bar: the first change needs a previous close
    fn warmup_bars(&self) -> usize {
        self.period + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn feed(rsi: &mut RSI, prices: &[Decimal]) -> Option<Decimal> {
        prices.iter().fold(None, |_, p| rsi.update(*p))
    }

    #[test]
    fn test_rsi_needs_period_plus_one_prices() {
        let mut rsi = RSI::new(14);
        let prices: Vec<Decimal> = (0..14).map(|i| Decimal::from(100 + i)).collect();
        assert_eq!(feed(&mut rsi, &prices), None);
        assert!(rsi.update(dec!(114)).is_some());
        assert_eq!(rsi.warmup_bars(), 15);
    }

    #[test]
    fn test_rsi_extremes() {
        let mut up = RSI::new(5);
        let rising: Vec<Decimal> = (0..10).map(|i| Decimal::from(10 + i)).collect();
        assert_eq!(feed(&mut up, &rising), Some(dec!(100)));

        let mut down = RSI::new(5);
        let falling: Vec<Decimal> = (0..10).map(|i| Decimal::from(100 - i)).collect();
        assert_eq!(feed(&mut down, &falling), Some(dec!(0)));

        let mut flat = RSI::new(5);
        assert_eq!(feed(&mut flat, &[dec!(7); 10]), Some(dec!(50)));
    }

    #[test]
    fn test_rsi_bounded_on_mixed_series() {
        let mut rsi = RSI::new(14);
        let prices = [
            dec!(44.34), dec!(44.09), dec!(44.15), dec!(43.61), dec!(44.33), dec!(44.83),
            dec!(45.10), dec!(45.42), dec!(45.84), dec!(46.08), dec!(45.89), dec!(46.03),
            dec!(45.61), dec!(46.28), dec!(46.28), dec!(46.00), dec!(46.03), dec!(46.41),
        ];
        let value = feed(&mut rsi, &prices).unwrap();
        assert!(value > dec!(50) && value < dec!(100));
    }
}
