pub mod alert;
pub mod device;
pub mod factory;
pub mod job;
pub mod parameter;
pub mod report;
pub mod rule;
pub mod user;
