//! Durable task queue over Redis lists.
//!
//! Each worker class owns a named queue. Publishing is an `LPUSH` of a JSON
//! task envelope; consuming is a `BLMOVE` into a per-consumer processing
//! list, which gives ack-late, single-inflight semantics: the entry is
//! removed from the processing list only after the handler finishes, and a
//! restarted worker re-drains its own processing list so interrupted tasks
//! are redelivered. Retries are driven by the task wrapper, not the broker.

pub mod broker;
pub mod envelope;
pub mod error;
pub mod worker;

pub use broker::{Delivery, QueueConsumer, RedisBroker};
pub use envelope::{
    EvaluateRules, GenerateReport, RunAnalyticsJob, SendNotifications, TaskEnvelope,
};
pub use error::QueueError;
pub use worker::{Backoff, RetryPolicy, TaskError, TaskHandler, Worker};

// ── Queue names ─────────────────────────────────────────────────────

pub const QUEUE_RULE_ENGINE: &str = "rule_engine";
pub const QUEUE_ANALYTICS: &str = "analytics";
pub const QUEUE_REPORTING: &str = "reporting";
pub const QUEUE_NOTIFICATIONS: &str = "notifications";

// ── Task names ──────────────────────────────────────────────────────

pub const TASK_EVALUATE_RULES: &str = "evaluate_rules";
pub const TASK_RUN_ANALYTICS_JOB: &str = "run_analytics_job";
pub const TASK_GENERATE_REPORT: &str = "generate_report";
pub const TASK_SEND_NOTIFICATIONS: &str = "send_notifications";
