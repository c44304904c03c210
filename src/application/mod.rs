// Debounced threshold state and stale-response suppression
pub mod threshold_controller;

// On-demand explanation for the selected transaction
pub mod explanation_selector;

// Single-model dashboard session
pub mod dashboard;

// Two-model comparison under one threshold
pub mod comparison;
