//! Read-through cache lookups for the hot ingest path.
//!
//! The cache is consulted first; misses fall through to Postgres and the
//! result is written back with a short TTL. Device auto-registration
//! re-primes the key immediately so the next message from the same device
//! skips the database entirely.

use sqlx::PgPool;

use plantops_cache::{device_key, factory_key, Cache};
use plantops_db::models::{Device, Factory};
use plantops_db::repo;
use plantops_db::DbError;

/// Resolve a factory by its external slug. `None` means unknown tenant and
/// the message should be dropped.
pub async fn factory_by_slug(
    cache: &Cache,
    pool: &PgPool,
    slug: &str,
) -> Result<Option<Factory>, DbError> {
    let key = factory_key(slug);

    if let Some(factory) = cache.get::<Factory>(&key).await {
        return Ok(Some(factory));
    }

    let factory = repo::factory::get_by_slug(pool, slug).await?;
    if let Some(ref factory) = factory {
        cache.put(&key, factory).await;
    }

    Ok(factory)
}

/// Resolve a device by `(factory_id, device_key)`, auto-registering it on
/// first contact.
pub async fn resolve_device(
    cache: &Cache,
    pool: &PgPool,
    factory_id: i64,
    device_key_str: &str,
) -> Result<Device, DbError> {
    let key = device_key(factory_id, device_key_str);

    if let Some(device) = cache.get::<Device>(&key).await {
        return Ok(device);
    }

    let device = repo::device::get_or_create(pool, factory_id, device_key_str).await?;
    cache.put(&key, &device).await;

    Ok(device)
}
