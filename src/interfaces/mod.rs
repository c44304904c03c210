pub mod reporting;
pub mod view_models;
