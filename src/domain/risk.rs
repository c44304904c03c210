use crate::domain::transaction::Transaction;
use serde::Serialize;
use std::fmt;

/// Coarse risk classification of a single score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

impl RiskBand {
    pub fn from_score(score: f64) -> Self {
        if score > 0.7 {
            Self::High
        } else if score > 0.4 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
        }
    }
}

/// Human-readable red flags shown next to a transaction's detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskFactor {
    HighAmount,
    LateNight,
    HighVelocity,
    FarFromHome,
}

impl RiskFactor {
    pub fn label(&self) -> &'static str {
        match self {
            Self::HighAmount => "High Amount",
            Self::LateNight => "Late Night",
            Self::HighVelocity => "High Velocity",
            Self::FarFromHome => "Far from Home",
        }
    }

    /// Factors present on `txn`, in fixed display order.
    pub fn detect(txn: &Transaction) -> Vec<RiskFactor> {
        let checks = [
            (txn.amount > 3000.0, Self::HighAmount),
            (txn.hour <= 5, Self::LateNight),
            (txn.velocity > 6, Self::HighVelocity),
            (txn.dist_from_home > 1000.0, Self::FarFromHome),
        ];
        checks
            .into_iter()
            .filter_map(|(present, factor)| present.then_some(factor))
            .collect()
    }
}

impl fmt::Display for RiskFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
