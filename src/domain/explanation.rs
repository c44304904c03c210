use serde::{Deserialize, Serialize};

/// Global importance of one feature within a single model's set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Sort descending by importance; equal weights keep their order.
pub fn rank_importances(mut importances: Vec<FeatureImportance>) -> Vec<FeatureImportance> {
    importances.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    importances
}

/// Largest weight, used to scale importance bars. 0 for an empty set.
pub fn max_importance(importances: &[FeatureImportance]) -> f64 {
    importances
        .iter()
        .map(|f| f.importance)
        .fold(0.0, f64::max)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureContribution {
    pub feature: String,
    pub raw_value: f64,
    pub shap_value: f64,
}

/// Per-transaction additive explanation from the scoring service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Explanation {
    pub base_value: f64,
    pub output_value: f64,
    pub features: Vec<FeatureContribution>,
}

impl Explanation {
    /// `output - (base + sum of contributions)`; ~0 for a well-formed explanation.
    pub fn residual(&self) -> f64 {
        let contributed: f64 = self.features.iter().map(|f| f.shap_value).sum();
        self.output_value - (self.base_value + contributed)
    }

    pub fn is_consistent(&self, tolerance: f64) -> bool {
        self.residual().abs() <= tolerance
    }

    /// Largest absolute contribution, floored at 0.001 so bars never divide by zero.
    pub fn max_abs_contribution(&self) -> f64 {
        self.features
            .iter()
            .map(|f| f.shap_value.abs())
            .fold(0.001, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contribution(feature: &str, shap_value: f64) -> FeatureContribution {
        FeatureContribution {
            feature: feature.to_string(),
            raw_value: 1.0,
            shap_value,
        }
    }

    #[test]
    fn test_residual_of_additive_explanation() {
        let explanation = Explanation {
            base_value: 0.1,
            output_value: 0.85,
            features: vec![
                contribution("Transaction Amount", 0.5),
                contribution("Time of Day", 0.3),
                contribution("City", -0.05),
            ],
        };
        assert!(explanation.residual().abs() < 1e-9);
        assert!(explanation.is_consistent(1e-6));
        assert_eq!(explanation.max_abs_contribution(), 0.5);
    }

    #[test]
    fn test_inconsistent_explanation_detected() {
        let explanation = Explanation {
            base_value: 0.1,
            output_value: 0.9,
            features: vec![contribution("Velocity (txns/hr)", 0.2)],
        };
        assert!(!explanation.is_consistent(1e-3));
        assert!((explanation.residual() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_wire_format() {
        let json = r#"{
            "baseValue": -2.31,
            "outputValue": 1.2,
            "features": [{"feature": "City", "rawValue": 3.0, "shapValue": 3.51}]
        }"#;
        let explanation: Explanation = serde_json::from_str(json).unwrap();
        assert_eq!(explanation.features[0].raw_value, 3.0);
        assert!(explanation.is_consistent(1e-6));
    }

    #[test]
    fn test_rank_importances_is_stable() {
        let ranked = rank_importances(vec![
            FeatureImportance { feature: "City".into(), importance: 0.1 },
            FeatureImportance { feature: "Amount".into(), importance: 0.4 },
            FeatureImportance { feature: "Hour".into(), importance: 0.1 },
        ]);
        let names: Vec<&str> = ranked.iter().map(|f| f.feature.as_str()).collect();
        assert_eq!(names, vec!["Amount", "City", "Hour"]);
        assert_eq!(max_importance(&ranked), 0.4);
        assert_eq!(max_importance(&[]), 0.0);
    }
}
