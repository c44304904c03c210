use crate::domain::metrics;
use crate::domain::transaction::{ModelKind, Transaction};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// Which rows an export contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportScope {
    /// Rows flagged at the current threshold
    #[default]
    Flagged,
    All,
}

impl ExportScope {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Flagged => "flagged",
            Self::All => "all",
        }
    }

    pub fn select<'a>(
        &self,
        transactions: &'a [Transaction],
        threshold: f64,
    ) -> Vec<&'a Transaction> {
        match self {
            Self::Flagged => metrics::flagged(transactions, threshold),
            Self::All => transactions.iter().collect(),
        }
    }
}

impl fmt::Display for ExportScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ExportScope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "flagged" => Ok(Self::Flagged),
            "all" => Ok(Self::All),
            _ => anyhow::bail!("Invalid export scope: {}. Must be 'flagged' or 'all'", s),
        }
    }
}

#[derive(Serialize)]
struct CsvRow<'a> {
    #[serde(rename = "ID")]
    id: &'a str,
    #[serde(rename = "Date")]
    date: &'a str,
    #[serde(rename = "Amount")]
    amount: String,
    #[serde(rename = "Merchant")]
    merchant: &'a str,
    #[serde(rename = "City")]
    city: &'a str,
    #[serde(rename = "Card Type")]
    card_type: &'a str,
    #[serde(rename = "Hour")]
    hour: u8,
    #[serde(rename = "Velocity")]
    velocity: u32,
    #[serde(rename = "Distance From Home")]
    dist_from_home: String,
    #[serde(rename = "Risk Score")]
    risk_score: String,
    #[serde(rename = "Is Fraud")]
    is_fraud: &'static str,
    #[serde(rename = "Flagged")]
    flagged: &'static str,
}

fn yes_no(value: bool) -> &'static str {
    if value { "Yes" } else { "No" }
}

impl<'a> From<&'a Transaction> for CsvRow<'a> {
    fn from(t: &'a Transaction) -> Self {
        Self {
            id: &t.id,
            date: &t.date,
            amount: t.amount.to_string(),
            merchant: &t.merchant,
            city: &t.city,
            card_type: &t.card_type,
            hour: t.hour,
            velocity: t.velocity,
            dist_from_home: t.dist_from_home.to_string(),
            risk_score: format!("{:.4}", t.risk_score),
            is_fraud: yes_no(t.is_fraud),
            flagged: yes_no(t.flagged),
        }
    }
}

/// Write `transactions` as CSV with a header row. Returns the row count.
pub fn write_transactions_csv<'a, W, I>(writer: W, transactions: I) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut wtr = csv::WriterBuilder::new().has_headers(true).from_writer(writer);
    let mut rows = 0;
    for transaction in transactions {
        wtr.serialize(CsvRow::from(transaction))
            .with_context(|| format!("Failed to serialize transaction {}", transaction.id))?;
        rows += 1;
    }
    if rows == 0 {
        // serde-driven headers are only emitted with the first record
        wtr.write_record(CSV_HEADERS)
            .context("Failed to write CSV header")?;
    }
    wtr.flush().context("Failed to flush CSV writer")?;
    Ok(rows)
}

pub const CSV_HEADERS: [&str; 12] = [
    "ID",
    "Date",
    "Amount",
    "Merchant",
    "City",
    "Card Type",
    "Hour",
    "Velocity",
    "Distance From Home",
    "Risk Score",
    "Is Fraud",
    "Flagged",
];

/// `fraud-{scope}-{model}-{YYYY-MM-DD}.csv`
pub fn export_file_name(scope: ExportScope, model: ModelKind, date: NaiveDate) -> String {
    format!("fraud-{}-{}-{}.csv", scope.label(), model.as_str(), date.format("%Y-%m-%d"))
}

/// Export the selected rows into `dir` and return the written path.
pub fn export_to_dir(
    dir: &Path,
    scope: ExportScope,
    model: ModelKind,
    threshold: f64,
    transactions: &[Transaction],
    date: NaiveDate,
) -> Result<PathBuf> {
    let path = dir.join(export_file_name(scope, model, date));
    let file = File::create(&path)
        .with_context(|| format!("Failed to create export file {}", path.display()))?;
    let rows = write_transactions_csv(file, scope.select(transactions, threshold))?;
    info!(path = %path.display(), rows, %scope, %model, threshold, "CSV export written");
    Ok(path)
}
