use crate::domain::transaction::Transaction;
use serde::{Deserialize, Serialize};

/// Four-way classification outcome counts at one threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    #[serde(rename = "tp")]
    pub true_positives: usize,
    #[serde(rename = "fp")]
    pub false_positives: usize,
    #[serde(rename = "fn")]
    pub false_negatives: usize,
    #[serde(rename = "tn")]
    pub true_negatives: usize,
}

impl ConfusionMatrix {
    /// Classify every transaction with `risk_score > threshold`.
    pub fn from_transactions(transactions: &[Transaction], threshold: f64) -> Self {
        let mut matrix = Self::default();
        for txn in transactions {
            match (txn.is_flagged_at(threshold), txn.is_fraud) {
                (true, true) => matrix.true_positives += 1,
                (true, false) => matrix.false_positives += 1,
                (false, true) => matrix.false_negatives += 1,
                (false, false) => matrix.true_negatives += 1,
            }
        }
        matrix
    }

    pub fn total(&self) -> usize {
        self.true_positives + self.false_positives + self.false_negatives + self.true_negatives
    }

    pub fn flagged(&self) -> usize {
        self.true_positives + self.false_positives
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    /// Also the true positive rate.
    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    pub fn tpr(&self) -> f64 {
        self.recall()
    }

    pub fn fpr(&self) -> f64 {
        ratio(self.false_positives, self.false_positives + self.true_negatives)
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positives + self.true_negatives, self.total())
    }
}

/// Confusion matrix plus derived rates, all fractions in [0, 1].
///
/// Serialized flat (`tp`, `fp`, `fn`, `tn`, `precision`, ...) to match the
/// scoring service's evaluation payload.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelMetrics {
    #[serde(flatten)]
    pub confusion: ConfusionMatrix,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub accuracy: f64,
}

impl ModelMetrics {
    pub fn from_confusion(confusion: ConfusionMatrix) -> Self {
        let precision = confusion.precision();
        let recall = confusion.recall();
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            confusion,
            precision,
            recall,
            f1,
            accuracy: confusion.accuracy(),
        }
    }

    /// Rates rounded to `decimals` places, counts untouched.
    pub fn rounded(&self, decimals: i32) -> Self {
        Self {
            confusion: self.confusion,
            precision: round_to(self.precision, decimals),
            recall: round_to(self.recall, decimals),
            f1: round_to(self.f1, decimals),
            accuracy: round_to(self.accuracy, decimals),
        }
    }

    /// `other - self` for each rate, in percentage points.
    pub fn delta_to(&self, other: &ModelMetrics) -> MetricDelta {
        MetricDelta {
            precision_pp: (other.precision - self.precision) * 100.0,
            recall_pp: (other.recall - self.recall) * 100.0,
            f1_pp: (other.f1 - self.f1) * 100.0,
            accuracy_pp: (other.accuracy - self.accuracy) * 100.0,
        }
    }
}

/// Per-rate difference between two models, in percentage points.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MetricDelta {
    pub precision_pp: f64,
    pub recall_pp: f64,
    pub f1_pp: f64,
    pub accuracy_pp: f64,
}

/// Evaluate `transactions` at `threshold`.
///
/// Pure and total: an empty set yields all-zero metrics.
pub fn evaluate(transactions: &[Transaction], threshold: f64) -> ModelMetrics {
    ModelMetrics::from_confusion(ConfusionMatrix::from_transactions(transactions, threshold))
}

/// Flagged subset in input order.
pub fn flagged(transactions: &[Transaction], threshold: f64) -> Vec<&Transaction> {
    transactions
        .iter()
        .filter(|t| t.is_flagged_at(threshold))
        .collect()
}

/// 0/0 is defined as 0.
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
