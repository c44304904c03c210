//! In-process observability for fraudlens
//!
//! Counters are kept in a private Prometheus registry and rendered on demand
//! in text format. Nothing listens on a socket.

pub mod metrics;

pub use metrics::DashboardMetrics;
