//! Model implementations and the job-type dispatch table.
//!
//! Adding a job type means adding one function here and one entry in
//! [`model_for`].

pub mod anomaly;
pub mod copilot;
pub mod failure;
pub mod forecast;

use serde_json::Value;
use thiserror::Error;

use plantops_db::models::JobType;
use plantops_tsdb::TelemetryFrame;

#[derive(Debug, Error)]
pub enum ModelError {
    /// Input preconditions unmet (too few rows, missing columns). The job is
    /// marked failed with this message and is not retried.
    #[error("{0}")]
    Insufficient(String),

    /// The model itself failed; the job fails and may be retried.
    #[error("{0}")]
    Failed(String),
}

pub type ModelFn = fn(&TelemetryFrame) -> Result<Value, ModelError>;

/// Dispatch table from job type to model entry point.
pub fn model_for(job_type: JobType) -> ModelFn {
    match job_type {
        JobType::Anomaly => anomaly::run,
        JobType::FailurePrediction => failure::run,
        JobType::EnergyForecast => forecast::run,
        JobType::AiCopilot => copilot::run,
    }
}
