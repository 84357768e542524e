use sqlx::PgPool;

use plantops_core::Config;
use plantops_queue::RedisBroker;

/// Shared state for all HTTP handlers.
pub struct AppState {
    pub pool: PgPool,
    pub broker: RedisBroker,
    pub config: Config,
}
