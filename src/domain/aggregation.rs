//! Threshold-independent views over a transaction set.
//!
//! Everything here is recomputed wholesale when the transaction set changes;
//! none of it depends on the decision threshold.

use crate::domain::transaction::Transaction;
use serde::Serialize;

pub const HOURS_PER_DAY: usize = 24;
pub const TOP_RISK_LIMIT: usize = 15;

/// Transaction volume for one hour of the day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourlyBucket {
    pub hour: u8,
    pub label: String,
    pub total: usize,
    pub fraud: usize,
}

/// Half-open amount range `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmountBinSpec {
    pub label: &'static str,
    pub min: f64,
    pub max: f64,
}

impl AmountBinSpec {
    pub fn contains(&self, amount: f64) -> bool {
        amount >= self.min && amount < self.max
    }
}

/// Fixed, ordered, non-overlapping amount ranges. The last one is open-ended.
pub const AMOUNT_BINS: [AmountBinSpec; 6] = [
    AmountBinSpec {
        label: "$0-100",
        min: 0.0,
        max: 100.0,
    },
    AmountBinSpec {
        label: "$100-500",
        min: 100.0,
        max: 500.0,
    },
    AmountBinSpec {
        label: "$500-1K",
        min: 500.0,
        max: 1000.0,
    },
    AmountBinSpec {
        label: "$1K-3K",
        min: 1000.0,
        max: 3000.0,
    },
    AmountBinSpec {
        label: "$3K-5K",
        min: 3000.0,
        max: 5000.0,
    },
    AmountBinSpec {
        label: "$5K+",
        min: 5000.0,
        max: f64::INFINITY,
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmountBin {
    pub range: String,
    pub legit: usize,
    pub fraud: usize,
}

impl AmountBin {
    pub fn total(&self) -> usize {
        self.legit + self.fraud
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub amount: f64,
    pub velocity: f64,
    pub risk: f64,
    /// 1 for fraud, 0 for legitimate
    pub fraud: u8,
}

/// All threshold-independent aggregates for one transaction set.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateViews {
    pub hourly: Vec<HourlyBucket>,
    pub amount_distribution: Vec<AmountBin>,
    pub scatter: Vec<ScatterPoint>,
    pub top_risk: Vec<Transaction>,
}

impl AggregateViews {
    pub fn compute(transactions: &[Transaction], top_risk_limit: usize) -> Self {
        Self {
            hourly: hourly_volume(transactions),
            amount_distribution: amount_distribution(transactions),
            scatter: scatter_points(transactions),
            top_risk: top_risk(transactions, top_risk_limit),
        }
    }
}

/// Exactly 24 buckets; empty hours report zero.
pub fn hourly_volume(transactions: &[Transaction]) -> Vec<HourlyBucket> {
    let mut counts = [(0usize, 0usize); HOURS_PER_DAY];
    for txn in transactions {
        // TransactionSet rejects hours past 23
        if let Some((total, fraud)) = counts.get_mut(txn.hour as usize) {
            *total += 1;
            if txn.is_fraud {
                *fraud += 1;
            }
        }
    }

    counts
        .iter()
        .enumerate()
        .map(|(hour, &(total, fraud))| HourlyBucket {
            hour: hour as u8,
            label: format!("{:02}:00", hour),
            total,
            fraud,
        })
        .collect()
}

pub fn amount_distribution(transactions: &[Transaction]) -> Vec<AmountBin> {
    let mut bins: Vec<AmountBin> = AMOUNT_BINS
        .iter()
        .map(|spec| AmountBin {
            range: spec.label.to_string(),
            legit: 0,
            fraud: 0,
        })
        .collect();

    for txn in transactions {
        if let Some(position) = AMOUNT_BINS.iter().position(|spec| spec.contains(txn.amount)) {
            let bin = &mut bins[position];
            if txn.is_fraud {
                bin.fraud += 1;
            } else {
                bin.legit += 1;
            }
        }
    }

    bins
}

pub fn scatter_points(transactions: &[Transaction]) -> Vec<ScatterPoint> {
    transactions
        .iter()
        .map(|t| ScatterPoint {
            amount: t.amount,
            velocity: f64::from(t.velocity),
            risk: t.risk_score,
            fraud: u8::from(t.is_fraud),
        })
        .collect()
}

/// Highest-risk prefix. The sort is stable, so ties keep insertion order.
pub fn top_risk(transactions: &[Transaction], limit: usize) -> Vec<Transaction> {
    let mut ranked: Vec<&Transaction> = transactions.iter().collect();
    ranked.sort_by(|a, b| b.risk_score.total_cmp(&a.risk_score));
    ranked.into_iter().take(limit).cloned().collect()
}
