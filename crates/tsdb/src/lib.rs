//! Time-series store client and wide-format telemetry frame.
//!
//! Talks to the InfluxDB v2 HTTP API directly: line-protocol batch writes on
//! the ingest path, Flux queries (annotated CSV responses) on the analytics
//! and reporting paths.

pub mod client;
pub mod error;
pub mod frame;
pub mod point;

pub use client::TsdbClient;
pub use error::TsdbError;
pub use frame::{ColumnStats, TelemetryFrame, TelemetryRow};
pub use point::Point;

/// Measurement name for all device telemetry.
pub const MEASUREMENT: &str = "device_metrics";
