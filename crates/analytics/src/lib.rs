//! Batch analytics over telemetry windows: anomaly detection, failure risk,
//! energy forecasting, and the combined copilot mode.

pub mod features;
pub mod forest;
pub mod models;
pub mod worker;

pub use models::{model_for, ModelError};
pub use worker::AnalyticsWorker;
