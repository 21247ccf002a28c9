use rust_decimal::Decimal;
use super::{Indicator, sma};

/// Rolling average volume, reported as current volume relative to the average
#[derive(Debug, Clone)]
pub struct VolumeProfile {
    period: usize,
    volumes: Vec<Decimal>,
    avg_volume: Option<Decimal>,
}

impl VolumeProfile {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            volumes: Vec::with_capacity(period),
            avg_volume: None,
        }
    }

    pub fn update(&mut self, volume: Decimal) -> Option<Decimal> {
        self.volumes.push(volume);
        if self.volumes.len() > self.period {
            self.volumes.remove(0);
        }

        if self.volumes.len() >= self.period {
            self.avg_volume = sma(&self.volumes, self.period);
        }

        self.relative_volume(volume)
    }

    pub fn relative_volume(&self, current_volume: Decimal) -> Option<Decimal> {
        self.avg_volume.map(|avg| {
            if avg.is_zero() {
                Decimal::ONE
            } else {
                current_volume / avg
            }
        })
    }
}

impl Indicator for VolumeProfile {
    fn warmup_bars(&self) -> usize {
        self.period
    }
}
