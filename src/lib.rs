//! Carbon-emissions dashboard backend: aggregates per-company monthly
//! emission records into KPI figures and chart series, and keeps report
//! posts attached to companies.

pub mod commands;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use error::{AppError, AppResult};
pub use services::aggregation::{aggregate, estimate_tax};
