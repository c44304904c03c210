use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One row of the scorer's threshold sweep.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RocPoint {
    pub threshold: f64,
    pub fpr: f64,
    pub tpr: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Reshaped views over a pre-computed sweep.
///
/// The sweep itself comes from the scoring service; nothing here recomputes
/// rates from scores.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurveSet {
    roc: Vec<RocPoint>,
    by_threshold: Vec<RocPoint>,
}

impl CurveSet {
    pub fn from_points(points: Vec<RocPoint>) -> Self {
        let mut roc = points.clone();
        roc.sort_by(roc_order);

        let mut by_threshold = points;
        by_threshold.sort_by(|a, b| a.threshold.total_cmp(&b.threshold));

        Self { roc, by_threshold }
    }

    /// fpr ascending, ties by tpr ascending.
    pub fn roc_order(&self) -> &[RocPoint] {
        &self.roc
    }

    /// Threshold ascending, for precision/recall/F1-vs-threshold plots.
    pub fn threshold_order(&self) -> &[RocPoint] {
        &self.by_threshold
    }

    pub fn len(&self) -> usize {
        self.roc.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roc.is_empty()
    }

    /// Trapezoidal area under the ROC-ordered curve.
    pub fn auc(&self) -> f64 {
        self.roc
            .windows(2)
            .map(|w| (w[1].fpr - w[0].fpr) * (w[0].tpr + w[1].tpr) / 2.0)
            .sum()
    }

    /// Sweep row with the highest F1; the lowest threshold wins ties.
    pub fn best_f1(&self) -> Option<RocPoint> {
        self.by_threshold.iter().copied().fold(None, |best, point| match best {
            Some(b) if b.f1 >= point.f1 => Some(b),
            _ => Some(point),
        })
    }
}

fn roc_order(a: &RocPoint, b: &RocPoint) -> Ordering {
    a.fpr.total_cmp(&b.fpr).then_with(|| a.tpr.total_cmp(&b.tpr))
}
