use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeFrame {
    M5,   // 5 minutes
    M15,  // 15 minutes
    H1,   // 1 hour
    H4,   // 4 hours
    D1,   // 1 day
}

impl TimeFrame {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFrame::M5 => "5m",
            TimeFrame::M15 => "15m",
            TimeFrame::H1 => "1h",
            TimeFrame::H4 => "4h",
            TimeFrame::D1 => "1d",
        }
    }

    pub fn to_minutes(&self) -> i64 {
        match self {
            TimeFrame::M5 => 5,
            TimeFrame::M15 => 15,
            TimeFrame::H1 => 60,
            TimeFrame::H4 => 240,
            TimeFrame::D1 => 1440,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.to_minutes())
    }
}

impl FromStr for TimeFrame {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_uppercase().as_str() {
            "M5" | "5M" => Ok(TimeFrame::M5),
            "M15" | "15M" => Ok(TimeFrame::M15),
            "H1" | "1H" => Ok(TimeFrame::H1),
            "H4" | "4H" => Ok(TimeFrame::H4),
            "D1" | "1D" => Ok(TimeFrame::D1),
            _ => Err(anyhow::anyhow!("Unknown timeframe: {}", s)),
        }
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_parsing() {
        assert_eq!(TimeFrame::from_str("d1").unwrap(), TimeFrame::D1);
        assert_eq!(TimeFrame::from_str("4H").unwrap(), TimeFrame::H4);
        assert!(TimeFrame::from_str("W1").is_err());
    }

    #[test]
    fn test_timeframe_duration() {
        assert_eq!(TimeFrame::H4.duration(), Duration::hours(4));
        assert_eq!(TimeFrame::D1.as_str(), "1d");
    }
}
