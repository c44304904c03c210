// Threshold-independent aggregates
pub mod aggregation;

// ROC / PR curve views
pub mod curves;

// Domain-specific error types
pub mod errors;

// Per-transaction explanations and feature importances
pub mod explanation;

// Confusion matrix and classification rates
pub mod metrics;

// Port interfaces
pub mod ports;

// Risk bands and red-flag factors
pub mod risk;

// Transactions and models
pub mod transaction;
