//! Telemetry ingestion: MQTT subscription, per-message pipeline, metadata
//! write-back caching, parameter discovery, time-series writes, and rule
//! evaluation hand-off.

pub mod lookup;
pub mod pipeline;
pub mod subscriber;

pub use pipeline::IngestPipeline;
pub use subscriber::MqttSubscriber;

/// Wildcard filter for all device telemetry.
pub const TELEMETRY_TOPIC_FILTER: &str = "factories/+/devices/+/telemetry";
