use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction class predicted by the model and realized by the labeler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalClass {
    Buy,
    Sell,
    Hold,
}

impl SignalClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalClass::Buy => "buy",
            SignalClass::Sell => "sell",
            SignalClass::Hold => "hold",
        }
    }

    /// Priority used when two classes receive the same probability.
    /// Higher wins: a tie never produces a directional call over hold.
    pub fn tie_break_rank(&self) -> u8 {
        match self {
            SignalClass::Hold => 2,
            SignalClass::Sell => 1,
            SignalClass::Buy => 0,
        }
    }

    pub fn all() -> [SignalClass; 3] {
        [SignalClass::Buy, SignalClass::Sell, SignalClass::Hold]
    }
}

impl FromStr for SignalClass {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "buy" | "1" => Ok(SignalClass::Buy),
            "sell" | "-1" => Ok(SignalClass::Sell),
            "hold" | "0" => Ok(SignalClass::Hold),
            _ => Err(anyhow::anyhow!("Unknown signal class: {}", s)),
        }
    }
}

impl fmt::Display for SignalClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_class_from_str() {
        assert_eq!(SignalClass::from_str("BUY").unwrap(), SignalClass::Buy);
        assert_eq!(SignalClass::from_str("-1").unwrap(), SignalClass::Sell);
        assert_eq!(SignalClass::from_str(" hold ").unwrap(), SignalClass::Hold);
        assert!(SignalClass::from_str("short").is_err());
    }

    #[test]
    fn test_tie_break_prefers_hold() {
        let mut classes = SignalClass::all().to_vec();
        classes.sort_by_key(|c| std::cmp::Reverse(c.tie_break_rank()));
        assert_eq!(classes, vec![SignalClass::Hold, SignalClass::Sell, SignalClass::Buy]);
    }
}
