//! Rule evaluation: condition trees, schedule windows, cooldown arbitration,
//! and alert emission.

pub mod condition;
pub mod engine;
pub mod schedule;

pub use condition::{build_alert_message, evaluate, Condition};
pub use engine::RuleEngine;
