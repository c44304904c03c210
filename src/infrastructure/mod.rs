pub mod core;
pub mod export;
pub mod mock;
pub mod observability;
pub mod scoring_client;
pub mod synthetic;

pub use mock::MockScoringService;
pub use observability::DashboardMetrics;
pub use scoring_client::HttpScoringService;
