//! User lookups for notification fan-out.

use sqlx::PgPool;

use crate::error::DbError;
use crate::models::User;

/// All active users of a factory (the notification audience).
pub async fn active_for_factory(pool: &PgPool, factory_id: i64) -> Result<Vec<User>, DbError> {
    let users = sqlx::query_as::<_, User>(
        "SELECT id, factory_id, email, whatsapp_number, role, is_active
         FROM users
         WHERE factory_id = $1 AND is_active = TRUE",
    )
    .bind(factory_id)
    .fetch_all(pool)
    .await?;

    Ok(users)
}
