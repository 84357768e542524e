//! Alert notification delivery: per-channel transports, templating, and the
//! fan-out worker.

pub mod dispatcher;
pub mod email;
pub mod templating;
pub mod traits;
pub mod whatsapp;
pub mod worker;

pub use dispatcher::Dispatcher;
pub use traits::{AlertMessage, Notifier, NotifyError};
pub use worker::NotificationWorker;
