//! Seeded synthetic transaction set for offline runs and demos.
//!
//! Feature distributions follow the reference data generator. Risk scores
//! are drawn per model from label-conditioned distributions, so the two
//! models disagree in a realistic way without running any classifier.
//! Explanations are fixture attributions that satisfy the additivity
//! identity; they are not computed from a model.

use crate::domain::explanation::{
    Explanation, FeatureContribution, FeatureImportance, rank_importances,
};
use crate::domain::metrics::round_to;
use crate::domain::transaction::{ModelKind, Transaction};
use crate::infrastructure::mock::MockScoringService;
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const DEFAULT_COUNT: usize = 500;
pub const DEFAULT_SEED: u64 = 42;

/// Share of generated transactions labelled as fraud.
pub const FRAUD_RATE: f64 = 0.08;

/// Score above which the reference service pre-flags a transaction.
pub const PREFLAG_SCORE: f64 = 0.6;

pub const MERCHANTS: [&str; 12] = [
    "Amazon",
    "Walmart",
    "Target",
    "Starbucks",
    "Shell",
    "Costco",
    "Uber",
    "Netflix",
    "Crypto Exchange",
    "Wire Transfer",
    "Gift Card Kiosk",
    "Offshore Casino",
];

pub const CITIES: [&str; 10] = [
    "New York",
    "Chicago",
    "Houston",
    "Phoenix",
    "Seattle",
    "Miami",
    "Las Vegas",
    "Lagos",
    "Bucharest",
    "Manila",
];

pub const CARD_TYPES: [&str; 4] = ["Visa", "Mastercard", "Amex", "Discover"];

/// Legitimate activity only uses the first few merchants and cities.
const LEGIT_MERCHANTS: usize = 8;
const LEGIT_CITIES: usize = 5;

/// Explanation features in display form, in the order weights are listed.
const FEATURES: [&str; 6] = [
    "Transaction Amount",
    "Time of Day",
    "Velocity (txns/hr)",
    "Distance from Home",
    "Merchant Category",
    "City",
];

/// Per-model weights of each feature's signal; each row sums to 1.
fn feature_weights(model: ModelKind) -> [f64; 6] {
    match model {
        ModelKind::Xgboost => [0.30, 0.15, 0.25, 0.20, 0.05, 0.05],
        ModelKind::Tensorflow => [0.24, 0.18, 0.22, 0.24, 0.06, 0.06],
    }
}

/// One generated set, scored by both models.
#[derive(Debug, Clone)]
pub struct SyntheticDataset {
    xgboost: Vec<Transaction>,
    tensorflow: Vec<Transaction>,
}

/// Generate `count` transactions. The same seed always yields the same set.
pub fn generate(count: usize, seed: u64) -> SyntheticDataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut xgboost = Vec::with_capacity(count);
    let mut tensorflow = Vec::with_capacity(count);

    for i in 0..count {
        let base = base_transaction(&mut rng, i);
        let xgb_score = draw_score(&mut rng, ModelKind::Xgboost, base.is_fraud);
        let tf_score = draw_score(&mut rng, ModelKind::Tensorflow, base.is_fraud);
        xgboost.push(with_score(base.clone(), xgb_score));
        tensorflow.push(with_score(base, tf_score));
    }

    SyntheticDataset {
        xgboost,
        tensorflow,
    }
}

fn pick<'a>(rng: &mut StdRng, items: &[&'a str]) -> &'a str {
    items[rng.random_range(0..items.len())]
}

fn base_transaction(rng: &mut StdRng, index: usize) -> Transaction {
    let is_fraud = rng.random::<f64>() < FRAUD_RATE;

    // Fraud skews toward 01:00-05:00
    let hour: u8 = if is_fraud && rng.random::<f64>() < 0.6 {
        rng.random_range(1..=5)
    } else {
        rng.random_range(0..=23)
    };

    let amount = if is_fraud {
        if rng.random::<f64>() < 0.5 {
            rng.random::<f64>() * 8000.0 + 2000.0
        } else {
            rng.random::<f64>() * 500.0 + 10.0
        }
    } else {
        rng.random::<f64>() * 400.0 + 5.0
    };

    let velocity: u32 = if is_fraud {
        rng.random_range(5..=19)
    } else {
        rng.random_range(1..=4)
    };

    let dist_from_home = if is_fraud {
        rng.random::<f64>() * 8000.0 + 500.0
    } else {
        rng.random::<f64>() * 200.0
    };

    let merchant = if is_fraud {
        pick(rng, &MERCHANTS)
    } else {
        pick(rng, &MERCHANTS[..LEGIT_MERCHANTS])
    };
    let city = if is_fraud {
        pick(rng, &CITIES)
    } else {
        pick(rng, &CITIES[..LEGIT_CITIES])
    };
    let card_type = pick(rng, &CARD_TYPES);

    let day: u32 = rng.random_range(1..=13);
    let minute: u32 = rng.random_range(0..=59);
    let date = NaiveDate::from_ymd_opt(2026, 2, day)
        .and_then(|d| d.and_hms_opt(u32::from(hour), minute, 0))
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_default();

    Transaction {
        id: format!("TXN-{:05}", index + 1),
        amount: round_to(amount, 2),
        merchant: merchant.to_string(),
        city: city.to_string(),
        card_type: card_type.to_string(),
        hour,
        velocity,
        dist_from_home: dist_from_home.round(),
        is_fraud,
        risk_score: 0.0,
        date,
        flagged: false,
    }
}

/// Label-conditioned score. The tensorflow stand-in is noisier and misses
/// more fraud than the xgboost one.
fn draw_score(rng: &mut StdRng, model: ModelKind, is_fraud: bool) -> f64 {
    let (miss_rate, false_alarm_rate) = match model {
        ModelKind::Xgboost => (0.10, 0.03),
        ModelKind::Tensorflow => (0.18, 0.06),
    };
    let u: f64 = rng.random();
    let roll: f64 = rng.random();

    let score = match (is_fraud, roll) {
        (true, r) if r < miss_rate => 0.15 + 0.45 * u,
        (true, _) => 0.55 + 0.45 * u.sqrt(),
        (false, r) if r < false_alarm_rate => 0.45 + 0.5 * u,
        (false, _) => 0.5 * u * u,
    };
    round_to(score.clamp(0.0, 1.0), 3)
}

fn with_score(mut transaction: Transaction, score: f64) -> Transaction {
    transaction.risk_score = score;
    transaction.flagged = score > PREFLAG_SCORE;
    transaction
}

fn position(items: &[&str], value: &str) -> f64 {
    items.iter().position(|item| *item == value).map_or(-1.0, |i| i as f64)
}

/// Signal in [-1, 1] per feature, plus the raw value shown next to it.
fn feature_signals(t: &Transaction) -> [(f64, f64); 6] {
    let merchant = position(&MERCHANTS, &t.merchant);
    let city = position(&CITIES, &t.city);
    [
        (t.amount, ((t.amount - 500.0) / 3000.0).clamp(-1.0, 1.0)),
        (f64::from(t.hour), if t.hour <= 5 { 1.0 } else { -0.3 }),
        (f64::from(t.velocity), ((f64::from(t.velocity) - 4.0) / 6.0).clamp(-1.0, 1.0)),
        (t.dist_from_home, ((t.dist_from_home - 200.0) / 2000.0).clamp(-1.0, 1.0)),
        (merchant, if merchant >= LEGIT_MERCHANTS as f64 { 0.6 } else { -0.2 }),
        (city, if city >= LEGIT_CITIES as f64 { 0.5 } else { -0.2 }),
    ]
}

/// Fixture attribution for one transaction.
///
/// Contributions follow the feature signals and are shifted so that
/// `base_value + sum(contributions) == risk_score`.
pub fn explain(transaction: &Transaction, model: ModelKind, base_value: f64) -> Explanation {
    let weights = feature_weights(model);
    let signals = feature_signals(transaction);

    let mut contributions: Vec<f64> = weights
        .iter()
        .zip(signals.iter())
        .map(|(w, (_, s))| w * s * 0.5)
        .collect();
    let gap = (transaction.risk_score - base_value) - contributions.iter().sum::<f64>();
    for (c, w) in contributions.iter_mut().zip(weights.iter()) {
        *c += gap * w;
    }

    let mut features: Vec<FeatureContribution> = FEATURES
        .iter()
        .zip(signals.iter())
        .zip(contributions)
        .map(|((name, (raw, _)), shap)| FeatureContribution {
            feature: name.to_string(),
            raw_value: round_to(*raw, 4),
            shap_value: round_to(shap, 6),
        })
        .collect();
    features.sort_by(|a, b| b.shap_value.abs().total_cmp(&a.shap_value.abs()));

    Explanation {
        base_value,
        output_value: transaction.risk_score,
        features,
    }
}

impl SyntheticDataset {
    pub fn transactions(&self, model: ModelKind) -> &[Transaction] {
        match model {
            ModelKind::Xgboost => &self.xgboost,
            ModelKind::Tensorflow => &self.tensorflow,
        }
    }

    pub fn len(&self) -> usize {
        self.xgboost.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xgboost.is_empty()
    }

    /// Mean score, used as the explanation base value.
    pub fn base_value(&self, model: ModelKind) -> f64 {
        let transactions = self.transactions(model);
        if transactions.is_empty() {
            return 0.0;
        }
        let sum: f64 = transactions.iter().map(|t| t.risk_score).sum();
        round_to(sum / transactions.len() as f64, 4)
    }

    pub fn explanations(&self, model: ModelKind) -> Vec<Explanation> {
        let base_value = self.base_value(model);
        self.transactions(model)
            .iter()
            .map(|t| explain(t, model, base_value))
            .collect()
    }

    /// Mean absolute contribution per feature, normalized to sum to 1.
    pub fn feature_importance(&self, model: ModelKind) -> Vec<FeatureImportance> {
        let explanations = self.explanations(model);
        let mut totals = [0.0_f64; 6];
        for explanation in &explanations {
            for contribution in &explanation.features {
                if let Some(i) = FEATURES.iter().position(|f| *f == contribution.feature) {
                    totals[i] += contribution.shap_value.abs();
                }
            }
        }
        let sum: f64 = totals.iter().sum();
        let norm = if sum > 0.0 { sum } else { 1.0 };

        rank_importances(
            FEATURES
                .iter()
                .zip(totals)
                .map(|(feature, total)| FeatureImportance {
                    feature: feature.to_string(),
                    importance: round_to(total / norm, 4),
                })
                .collect(),
        )
    }

    /// Serve this dataset, its importances and its explanations in-process.
    pub fn into_mock(self) -> MockScoringService {
        let mut service = MockScoringService::new();
        for model in ModelKind::ALL {
            let transactions = self.transactions(model);
            for (transaction, explanation) in transactions.iter().zip(self.explanations(model)) {
                service = service.with_explanation(&transaction.id, model, explanation);
            }
            service = service
                .with_feature_importance(model, self.feature_importance(model))
                .with_transactions(model, transactions.to_vec());
        }
        service
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::ScoringService;
    use crate::domain::transaction::TransactionSet;
    use tokio_test::assert_ok;

    #[test]
    fn test_same_seed_same_data() {
        let a = generate(50, 7);
        let b = generate(50, 7);
        assert_eq!(a.transactions(ModelKind::Xgboost), b.transactions(ModelKind::Xgboost));
        assert_eq!(a.transactions(ModelKind::Tensorflow), b.transactions(ModelKind::Tensorflow));
        assert_ne!(
            generate(50, 8).transactions(ModelKind::Xgboost),
            a.transactions(ModelKind::Xgboost)
        );
    }

    #[test]
    fn test_models_share_features_not_scores() {
        let data = generate(DEFAULT_COUNT, DEFAULT_SEED);
        let xgb = data.transactions(ModelKind::Xgboost);
        let tf = data.transactions(ModelKind::Tensorflow);
        assert_eq!(xgb.len(), DEFAULT_COUNT);

        for (a, b) in xgb.iter().zip(tf) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.amount, b.amount);
            assert_eq!(a.is_fraud, b.is_fraud);
        }
        assert!(xgb.iter().zip(tf).any(|(a, b)| a.risk_score != b.risk_score));
        assert_ok!(TransactionSet::new(xgb.to_vec()));
    }

    #[test]
    fn test_distributions_follow_labels() {
        let data = generate(DEFAULT_COUNT, DEFAULT_SEED);
        let transactions = data.transactions(ModelKind::Xgboost);
        let fraud = transactions.iter().filter(|t| t.is_fraud).count() as f64;
        let rate = fraud / transactions.len() as f64;
        assert!((0.03..0.15).contains(&rate), "fraud rate {}", rate);

        for t in transactions {
            assert!(t.hour <= 23);
            assert!((0.0..=1.0).contains(&t.risk_score));
            assert_eq!(t.flagged, t.risk_score > PREFLAG_SCORE);
            assert!(t.date.starts_with("2026-02-"));
            if t.is_fraud {
                assert!((5..=19).contains(&t.velocity));
                assert!(t.dist_from_home >= 500.0);
            } else {
                assert!((1..=4).contains(&t.velocity));
                assert!(t.amount >= 5.0 && t.amount <= 405.0);
                assert!(MERCHANTS[..LEGIT_MERCHANTS].contains(&t.merchant.as_str()));
            }
        }
    }

    #[test]
    fn test_fixture_explanations_are_additive() {
        let data = generate(100, 3);
        for model in ModelKind::ALL {
            for explanation in data.explanations(model) {
                assert_eq!(explanation.features.len(), FEATURES.len());
                assert!(explanation.is_consistent(1e-4), "residual {}", explanation.residual());
                let magnitudes: Vec<f64> =
                    explanation.features.iter().map(|f| f.shap_value.abs()).collect();
                assert!(magnitudes.windows(2).all(|w| w[0] >= w[1]));
            }
        }
    }

    #[test]
    fn test_importances_are_normalized_and_ranked() {
        let data = generate(200, 11);
        let importances = data.feature_importance(ModelKind::Xgboost);
        assert_eq!(importances.len(), 6);
        let total: f64 = importances.iter().map(|i| i.importance).sum();
        assert!((total - 1.0).abs() < 1e-3);
        assert!(importances.windows(2).all(|w| w[0].importance >= w[1].importance));
    }

    #[tokio::test]
    async fn test_mock_serves_generated_data() {
        let data = generate(40, 5);
        let first = data.transactions(ModelKind::Tensorflow)[0].clone();
        let service = data.into_mock();

        let response = assert_ok!(service.fetch_transactions(ModelKind::Tensorflow).await);
        assert_eq!(response.transactions.len(), 40);
        let explanation =
            assert_ok!(service.fetch_explanation(&first.id, ModelKind::Tensorflow).await);
        assert_eq!(explanation.output_value, first.risk_score);
        let curve = assert_ok!(service.fetch_curve(ModelKind::Xgboost).await);
        assert_eq!(curve.len(), 21);
    }

    #[test]
    fn test_empty_dataset() {
        let data = generate(0, 1);
        assert!(data.is_empty());
        assert_eq!(data.base_value(ModelKind::Xgboost), 0.0);
        assert!(data.explanations(ModelKind::Xgboost).is_empty());
    }
}
