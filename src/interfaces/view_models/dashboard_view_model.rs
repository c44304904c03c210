use crate::application::comparison::PairedMetrics;
use crate::application::dashboard::DashboardSession;
use crate::domain::explanation::{Explanation, FeatureImportance, max_importance};
use crate::domain::metrics::ModelMetrics;
use crate::domain::risk::{RiskBand, RiskFactor};
use crate::domain::transaction::Transaction;

/// Differences smaller than this are shown as a tie.
const TIE_EPSILON: f64 = 0.0001;

#[derive(Debug, Clone, PartialEq)]
pub struct MetricCard {
    pub label: &'static str,
    pub value: String,
    pub sub: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionCell {
    pub label: &'static str,
    pub desc: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leader {
    Primary,
    Challenger,
    Tie,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub label: &'static str,
    pub primary: String,
    pub challenger: String,
    /// Challenger minus primary, e.g. `+2.50pp`
    pub delta: String,
    pub leader: Leader,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBar {
    pub feature: String,
    pub percent: String,
    /// Bar length relative to the largest importance, in [0, 1]
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskRow {
    pub id: String,
    pub amount: String,
    pub merchant: String,
    pub risk_score: String,
    pub band: RiskBand,
    pub factors: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExplanationRow {
    pub feature: String,
    pub raw_value: f64,
    pub shap_value: f64,
    /// Pushes the score up
    pub increases_risk: bool,
    /// Bar length relative to the largest absolute contribution
    pub width: f64,
}

fn percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

fn signed_pp(delta_pp: f64) -> String {
    let sign = if delta_pp > 0.0 { "+" } else { "" };
    format!("{}{:.2}pp", sign, delta_pp)
}

pub struct DashboardViewModel;

impl DashboardViewModel {
    /// Headline cards. Falls back to local metrics until the first
    /// evaluation has been applied.
    pub fn overview_cards(session: &DashboardSession) -> Vec<MetricCard> {
        let threshold = session.threshold();
        let metrics = session.metrics().unwrap_or_else(|| session.local_metrics());

        vec![
            MetricCard {
                label: "Transactions",
                value: session.transactions().len().to_string(),
                sub: "Total processed".to_string(),
            },
            MetricCard {
                label: "Flagged",
                value: session.flagged().len().to_string(),
                sub: format!("At threshold {:.2}", threshold),
            },
            MetricCard {
                label: "Precision",
                value: percent(metrics.precision),
                sub: "Of flagged, actually fraud".to_string(),
            },
            MetricCard {
                label: "Recall",
                value: percent(metrics.recall),
                sub: "Of all fraud, caught".to_string(),
            },
            MetricCard {
                label: "F1 Score",
                value: format!("{:.3}", metrics.f1),
                sub: "Harmonic mean".to_string(),
            },
        ]
    }

    pub fn confusion_cells(metrics: &ModelMetrics) -> [ConfusionCell; 4] {
        let c = &metrics.confusion;
        [
            ConfusionCell {
                label: "True Positive",
                desc: "Fraud caught",
                count: c.true_positives,
            },
            ConfusionCell {
                label: "False Positive",
                desc: "False alarm",
                count: c.false_positives,
            },
            ConfusionCell {
                label: "False Negative",
                desc: "Fraud missed",
                count: c.false_negatives,
            },
            ConfusionCell {
                label: "True Negative",
                desc: "Correct pass",
                count: c.true_negatives,
            },
        ]
    }

    pub fn comparison_rows(paired: &PairedMetrics) -> Vec<ComparisonRow> {
        let deltas = paired.deltas();
        let (p, c) = (&paired.primary, &paired.challenger);
        let rows: [(&'static str, f64, f64, f64, fn(f64) -> String); 4] = [
            ("Precision", p.precision, c.precision, deltas.precision_pp, percent),
            ("Recall", p.recall, c.recall, deltas.recall_pp, percent),
            ("F1 Score", p.f1, c.f1, deltas.f1_pp, |v| format!("{:.4}", v)),
            ("Accuracy", p.accuracy, c.accuracy, deltas.accuracy_pp, percent),
        ];

        rows.into_iter()
            .map(|(label, primary, challenger, delta_pp, format)| {
                let diff = challenger - primary;
                let leader = if diff > TIE_EPSILON {
                    Leader::Challenger
                } else if diff < -TIE_EPSILON {
                    Leader::Primary
                } else {
                    Leader::Tie
                };
                ComparisonRow {
                    label,
                    primary: format(primary),
                    challenger: format(challenger),
                    delta: signed_pp(delta_pp),
                    leader,
                }
            })
            .collect()
    }

    pub fn feature_bars(importances: &[FeatureImportance]) -> Vec<FeatureBar> {
        let max = max_importance(importances).max(0.01);
        importances
            .iter()
            .map(|f| FeatureBar {
                feature: f.feature.clone(),
                percent: format!("{:.0}%", f.importance * 100.0),
                width: (f.importance / max).clamp(0.0, 1.0),
            })
            .collect()
    }

    pub fn risk_rows(transactions: &[Transaction]) -> Vec<RiskRow> {
        transactions
            .iter()
            .map(|t| RiskRow {
                id: t.id.clone(),
                amount: format!("${:.2}", t.amount),
                merchant: t.merchant.clone(),
                risk_score: format!("{:.3}", t.risk_score),
                band: RiskBand::from_score(t.risk_score),
                factors: RiskFactor::detect(t).iter().map(RiskFactor::label).collect(),
            })
            .collect()
    }

    pub fn explanation_rows(explanation: &Explanation) -> Vec<ExplanationRow> {
        let max = explanation.max_abs_contribution();
        explanation
            .features
            .iter()
            .map(|f| ExplanationRow {
                feature: f.feature.clone(),
                raw_value: f.raw_value,
                shap_value: f.shap_value,
                increases_risk: f.shap_value > 0.0,
                width: (f.shap_value.abs() / max).min(1.0),
            })
            .collect()
    }
}
