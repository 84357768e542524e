//! Factory (tenant) lookups.

use sqlx::PgPool;

use crate::error::DbError;
use crate::models::Factory;

const COLUMNS: &str = "id, name, slug, timezone, created_at, updated_at";

pub async fn get_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Factory>, DbError> {
    let factory = sqlx::query_as::<_, Factory>(&format!(
        "SELECT {COLUMNS} FROM factories WHERE slug = $1"
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await?;

    Ok(factory)
}

pub async fn get_by_id(pool: &PgPool, factory_id: i64) -> Result<Option<Factory>, DbError> {
    let factory = sqlx::query_as::<_, Factory>(&format!(
        "SELECT {COLUMNS} FROM factories WHERE id = $1"
    ))
    .bind(factory_id)
    .fetch_optional(pool)
    .await?;

    Ok(factory)
}
