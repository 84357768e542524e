pub mod alerts;
pub mod analytics;
pub mod common;
pub mod health;
pub mod reports;
