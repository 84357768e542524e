//! Report generation: cross-store aggregation and PDF / Excel / JSON
//! rendering.

pub mod data;
pub mod excel;
pub mod pdf;
pub mod worker;

use thiserror::Error;

pub use data::ReportData;
pub use worker::ReportWorker;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("pdf render error: {0}")]
    Pdf(String),

    #[error("excel render error: {0}")]
    Excel(String),

    #[error("json render error: {0}")]
    Json(String),
}
