pub mod config;
pub mod error;
pub mod telemetry;
pub mod types;

pub use config::Config;
pub use error::CoreError;
pub use telemetry::{parse_topic, TelemetryPayload};
pub use types::NotificationChannels;
