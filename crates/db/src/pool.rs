use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use plantops_core::config::PostgresConfig;

use crate::error::DbError;

/// Connect to Postgres with the configured pool size.
pub async fn connect(config: &PostgresConfig) -> Result<PgPool, DbError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await?;

    info!(max_connections = config.max_connections, "Postgres pool ready");
    Ok(pool)
}
