//! Console output for the CLI.
//!
//! Everything printed here comes from the view model; the reporter only lays
//! it out.

use crate::application::comparison::ComparisonSession;
use crate::application::dashboard::DashboardSession;
use crate::application::explanation_selector::ExplanationView;
use crate::domain::aggregation::AggregateViews;
use crate::domain::curves::CurveSet;
use crate::domain::transaction::Transaction;
use crate::interfaces::view_models::dashboard_view_model::{
    DashboardViewModel, FeatureBar, Leader,
};

const RULE_WIDTH: usize = 72;
const BAR_WIDTH: f64 = 30.0;

fn bar(width: f64) -> String {
    "█".repeat((width * BAR_WIDTH).round() as usize)
}

#[derive(Default)]
pub struct DashboardReporter;

impl DashboardReporter {
    pub fn print_header(&self, title: &str) {
        println!("\n{}", "=".repeat(RULE_WIDTH));
        println!("{}", title);
        println!("{}", "=".repeat(RULE_WIDTH));
    }

    pub fn print_summary(&self, session: &DashboardSession) {
        self.print_header(&format!(
            "{} at threshold {:.2}",
            session.model().display_name(),
            session.threshold()
        ));

        for card in DashboardViewModel::overview_cards(session) {
            println!("  {:<14} {:>10}   {}", card.label, card.value, card.sub);
        }

        if let Some(metrics) = session.metrics() {
            println!("\nConfusion matrix:");
            for cell in DashboardViewModel::confusion_cells(&metrics) {
                println!("  {:<16} {:>6}   {}", cell.label, cell.count, cell.desc);
            }
        }
        if let Some(error) = session.snapshot().last_error {
            println!("\n  Last evaluation failed: {}", error);
        }

        println!(
            "\nFraud base rate: {:.1}% ({} of {})",
            session.fraud_rate() * 100.0,
            session.total_fraud(),
            session.transactions().len()
        );

        self.print_aggregates(session.aggregates());
        self.print_curves(session.curves());
        self.print_features(
            "Feature importance",
            &DashboardViewModel::feature_bars(session.feature_importance()),
        );
    }

    pub fn print_aggregates(&self, aggregates: &AggregateViews) {
        println!("\nHourly volume (total / fraud):");
        for bucket in aggregates.hourly.iter().filter(|b| b.total > 0) {
            println!("  {}  {:>5} / {:<5}", bucket.label, bucket.total, bucket.fraud);
        }

        println!("\nAmount distribution (legit / fraud):");
        for bin in &aggregates.amount_distribution {
            println!("  {:<10} {:>5} / {:<5}", bin.range, bin.legit, bin.fraud);
        }

        self.print_risk_table("Highest risk", &aggregates.top_risk);
    }

    pub fn print_risk_table(&self, title: &str, transactions: &[Transaction]) {
        println!("\n{}:", title);
        println!(
            "  {:<10} | {:>11} | {:<16} | {:>6} | {:<6} | {}",
            "ID", "Amount", "Merchant", "Risk", "Band", "Flags"
        );
        println!("  {}", "-".repeat(RULE_WIDTH - 2));
        for row in DashboardViewModel::risk_rows(transactions) {
            println!(
                "  {:<10} | {:>11} | {:<16} | {:>6} | {:<6} | {}",
                row.id,
                row.amount,
                row.merchant,
                row.risk_score,
                row.band,
                row.factors.join(", ")
            );
        }
    }

    pub fn print_curves(&self, curves: &CurveSet) {
        if curves.is_empty() {
            println!("\nNo curve data.");
            return;
        }
        println!("\nROC AUC: {:.4} over {} points", curves.auc(), curves.len());
        if let Some(best) = curves.best_f1() {
            println!(
                "Best F1: {:.4} at threshold {:.2} (precision {:.4}, recall {:.4})",
                best.f1, best.threshold, best.precision, best.recall
            );
        }
    }

    pub fn print_features(&self, title: &str, bars: &[FeatureBar]) {
        println!("\n{}:", title);
        for b in bars {
            println!("  {:<22} {:>4}  {}", b.feature, b.percent, bar(b.width));
        }
    }

    pub fn print_sweep(&self, session: &DashboardSession, changes: usize) {
        self.print_header("Threshold sweep");
        let snapshot = session.snapshot();
        println!("  Changes applied:       {}", changes);
        println!("  Evaluations sent:      {}", session.evaluations_dispatched());
        println!("  Final threshold:       {:.2}", snapshot.threshold);
        match snapshot.evaluated_threshold {
            Some(t) => println!("  Metrics evaluated at:  {:.2}", t),
            None => println!("  Metrics evaluated at:  -"),
        }
        for card in DashboardViewModel::overview_cards(session) {
            println!("  {:<14} {:>10}", card.label, card.value);
        }
    }

    pub fn print_comparison(&self, session: &ComparisonSession) {
        let primary = session.primary();
        let challenger = session.challenger();
        self.print_header(&format!(
            "{} vs {} at threshold {:.2}",
            primary.model.display_name(),
            challenger.model.display_name(),
            session.threshold()
        ));

        if let Some(paired) = session.metrics() {
            println!(
                "  {:<10} | {:>10} | {:>10} | {:>9}",
                "Metric",
                primary.model.display_name(),
                challenger.model.display_name(),
                "Diff"
            );
            println!("  {}", "-".repeat(48));
            for row in DashboardViewModel::comparison_rows(&paired) {
                let marker = match row.leader {
                    Leader::Primary => "<",
                    Leader::Challenger => ">",
                    Leader::Tie => "=",
                };
                println!(
                    "  {:<10} | {:>10} | {:>10} | {:>9} {}",
                    row.label, row.primary, row.challenger, row.delta, marker
                );
            }
        }

        for pipeline in [primary, challenger] {
            println!("\n{}:", pipeline.model.display_name());
            self.print_curves(&pipeline.curves);
            self.print_features(
                "Feature importance",
                &DashboardViewModel::feature_bars(&pipeline.feature_importance),
            );
        }
    }

    pub fn print_explanation(&self, transaction: Option<&Transaction>, view: &ExplanationView) {
        if let Some(t) = transaction {
            self.print_risk_table("Transaction", std::slice::from_ref(t));
        }

        match view {
            ExplanationView::Ready {
                transaction_id,
                model,
                explanation,
            } => {
                self.print_header(&format!(
                    "Explanation for {} ({})",
                    transaction_id,
                    model.display_name()
                ));
                println!("  Base value:   {:.4}", explanation.base_value);
                println!("  Output value: {:.4}", explanation.output_value);
                for row in DashboardViewModel::explanation_rows(explanation) {
                    let sign = if row.increases_risk { "+" } else { "-" };
                    println!(
                        "  {:<22} {:>12.4}  {}{:.6}  {}",
                        row.feature,
                        row.raw_value,
                        sign,
                        row.shap_value.abs(),
                        bar(row.width)
                    );
                }
            }
            ExplanationView::Unavailable {
                transaction_id,
                reason,
                ..
            } => println!("\nExplanation unavailable for {}: {}", transaction_id, reason),
            ExplanationView::Loading { transaction_id, .. } => {
                println!("\nExplanation for {} still loading", transaction_id)
            }
            ExplanationView::Idle => println!("\nNo transaction selected"),
        }
    }
}
