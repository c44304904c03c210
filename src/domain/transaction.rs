use crate::domain::errors::DashboardError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// The two interchangeable classifiers the scoring service exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    #[default]
    Xgboost,
    Tensorflow,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::Xgboost, ModelKind::Tensorflow];

    /// Wire name used in query strings and request bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Xgboost => "xgboost",
            Self::Tensorflow => "tensorflow",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Xgboost => "XGBoost",
            Self::Tensorflow => "TensorFlow",
        }
    }

    /// The other model of the pair.
    pub fn counterpart(&self) -> ModelKind {
        match self {
            Self::Xgboost => Self::Tensorflow,
            Self::Tensorflow => Self::Xgboost,
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "xgboost" | "xgb" => Ok(Self::Xgboost),
            "tensorflow" | "tf" => Ok(Self::Tensorflow),
            _ => Err(DashboardError::UnknownModel {
                name: s.to_string(),
            }),
        }
    }
}

/// A scored card transaction. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    /// Currency units
    pub amount: f64,
    pub merchant: String,
    pub city: String,
    pub card_type: String,
    /// Hour of day, 0-23
    pub hour: u8,
    /// Transactions per hour
    pub velocity: u32,
    /// Miles
    pub dist_from_home: f64,
    pub is_fraud: bool,
    /// Model risk score in [0, 1]
    pub risk_score: f64,
    pub date: String,
    pub flagged: bool,
}

impl Transaction {
    /// Strict comparison: a score equal to the threshold is not flagged.
    pub fn is_flagged_at(&self, threshold: f64) -> bool {
        self.risk_score > threshold
    }

    /// First field outside its domain, with the offending value.
    ///
    /// NaN fails every range check.
    pub fn out_of_range_field(&self) -> Option<(&'static str, f64)> {
        if self.hour > 23 {
            return Some(("hour", f64::from(self.hour)));
        }
        [
            ("amount", self.amount, 0.0, f64::INFINITY),
            ("distFromHome", self.dist_from_home, 0.0, f64::INFINITY),
            ("riskScore", self.risk_score, 0.0, 1.0),
        ]
        .into_iter()
        .find(|&(_, value, min, max)| !(value.is_finite() && value >= min && value <= max))
        .map(|(field, value, _, _)| (field, value))
    }
}

/// Payload of the transaction fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsResponse {
    pub transactions: Vec<Transaction>,
    pub total_fraud: usize,
}

/// Read-only transaction collection for one session, indexed by id.
#[derive(Debug, Clone, Default)]
pub struct TransactionSet {
    transactions: Vec<Transaction>,
    index: HashMap<String, usize>,
}

impl TransactionSet {
    pub fn new(transactions: Vec<Transaction>) -> Result<Self, DashboardError> {
        let mut index = HashMap::with_capacity(transactions.len());
        for (position, txn) in transactions.iter().enumerate() {
            if let Some((field, value)) = txn.out_of_range_field() {
                return Err(DashboardError::InvalidTransaction {
                    id: txn.id.clone(),
                    field,
                    value,
                });
            }
            if index.insert(txn.id.clone(), position).is_some() {
                return Err(DashboardError::DuplicateTransaction { id: txn.id.clone() });
            }
        }
        Ok(Self {
            transactions,
            index,
        })
    }

    pub fn as_slice(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Transaction> {
        self.transactions.iter()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&Transaction> {
        self.index.get(id).map(|&position| &self.transactions[position])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn total_fraud(&self) -> usize {
        self.transactions.iter().filter(|t| t.is_fraud).count()
    }

    /// Fraud base rate as a fraction; 0 for an empty set.
    pub fn fraud_rate(&self) -> f64 {
        if self.transactions.is_empty() {
            0.0
        } else {
            self.total_fraud() as f64 / self.transactions.len() as f64
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::Transaction;

    /// Minimal transaction for derivation tests.
    pub fn txn(id: &str, risk_score: f64, is_fraud: bool) -> Transaction {
        Transaction {
            id: id.to_string(),
            amount: 120.0,
            merchant: "Amazon".to_string(),
            city: "New York".to_string(),
            card_type: "Visa".to_string(),
            hour: 14,
            velocity: 2,
            dist_from_home: 12.0,
            is_fraud,
            risk_score,
            date: "2026-02-03T14:05:00".to_string(),
            flagged: risk_score > 0.6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::txn;
    use super::*;

    #[test]
    fn test_model_kind_parsing() {
        assert_eq!("xgboost".parse::<ModelKind>().unwrap(), ModelKind::Xgboost);
        assert_eq!(" TensorFlow ".parse::<ModelKind>().unwrap(), ModelKind::Tensorflow);
        assert!("random_forest".parse::<ModelKind>().is_err());
        assert_eq!(ModelKind::Xgboost.counterpart(), ModelKind::Tensorflow);
    }

    #[test]
    fn test_transaction_wire_format_is_camel_case() {
        let json = serde_json::to_value(txn("TXN-00001", 0.8, true)).unwrap();
        assert_eq!(json["riskScore"], 0.8);
        assert_eq!(json["isFraud"], true);
        assert_eq!(json["cardType"], "Visa");
        assert!(json.get("risk_score").is_none());
    }

    #[test]
    fn test_flagging_is_strict() {
        let t = txn("TXN-00001", 0.5, false);
        assert!(!t.is_flagged_at(0.5));
        assert!(t.is_flagged_at(0.49));
    }

    #[test]
    fn test_transaction_set_rejects_duplicates() {
        let result = TransactionSet::new(vec![txn("A", 0.1, false), txn("A", 0.2, true)]);
        assert!(matches!(
            result,
            Err(DashboardError::DuplicateTransaction { id }) if id == "A"
        ));
    }

    fn rejected_field(txn: Transaction) -> Option<(String, &'static str)> {
        match TransactionSet::new(vec![txn]) {
            Err(DashboardError::InvalidTransaction { id, field, .. }) => Some((id, field)),
            _ => None,
        }
    }

    #[test]
    fn test_transaction_set_rejects_hour_past_midnight() {
        let mut t = txn("A", 0.2, false);
        t.hour = 24;
        assert_eq!(rejected_field(t), Some(("A".to_string(), "hour")));
    }

    #[test]
    fn test_transaction_set_rejects_negative_amount() {
        let mut t = txn("B", 0.3, false);
        t.amount = -5.0;
        assert_eq!(rejected_field(t), Some(("B".to_string(), "amount")));

        let mut t = txn("B", 0.3, false);
        t.dist_from_home = f64::INFINITY;
        assert_eq!(rejected_field(t), Some(("B".to_string(), "distFromHome")));
    }

    #[test]
    fn test_transaction_set_rejects_bad_scores() {
        assert_eq!(
            rejected_field(txn("C", f64::NAN, true)),
            Some(("C".to_string(), "riskScore"))
        );
        assert_eq!(
            rejected_field(txn("D", 1.2, true)),
            Some(("D".to_string(), "riskScore"))
        );
    }

    #[test]
    fn test_transaction_set_accepts_range_edges() {
        let mut t = txn("E", 1.0, true);
        t.hour = 23;
        t.amount = 0.0;
        t.dist_from_home = 0.0;
        let set = TransactionSet::new(vec![t, txn("F", 0.0, false)]).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_transaction_set_lookup_and_rates() {
        let set = TransactionSet::new(vec![
            txn("A", 0.9, true),
            txn("B", 0.1, false),
            txn("C", 0.2, false),
            txn("D", 0.7, false),
        ])
        .unwrap();

        assert_eq!(set.len(), 4);
        assert_eq!(set.find("C").map(|t| t.risk_score), Some(0.2));
        assert!(set.find("Z").is_none());
        assert_eq!(set.total_fraud(), 1);
        assert!((set.fraud_rate() - 0.25).abs() < 1e-12);

        let empty = TransactionSet::default();
        assert_eq!(empty.fraud_rate(), 0.0);
    }
}
