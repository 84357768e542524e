//! Redis read-through cache for hot metadata lookups.
//!
//! The cache is an optimization layer: every operation degrades to a miss on
//! I/O or decode errors, so correctness never depends on it. Keys are plain
//! strings (`factory:slug:<slug>`, `device:<factory_id>:<device_key>`),
//! values JSON, TTL short.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use plantops_core::config::CacheConfig;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Key for a factory cached by its external slug.
pub fn factory_key(slug: &str) -> String {
    format!("factory:slug:{slug}")
}

/// Key for a device cached by `(factory_id, device_key)`.
pub fn device_key(factory_id: i64, device_key: &str) -> String {
    format!("device:{factory_id}:{device_key}")
}

/// Async cache client with JSON-encoded values.
#[derive(Clone)]
pub struct Cache {
    manager: ConnectionManager,
    ttl_seconds: u64,
}

impl Cache {
    /// Connect to Redis; the connection manager reconnects transparently.
    pub async fn connect(config: &CacheConfig) -> Result<Self, CacheError> {
        let client = redis::Client::open(config.url.as_str())?;
        let manager = ConnectionManager::new(client).await?;

        Ok(Self {
            manager,
            ttl_seconds: config.ttl_seconds,
        })
    }

    /// Read a cached value.
    ///
    /// A present-but-undecodable value is evicted and reported as a miss so
    /// the caller re-reads the source of truth.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.manager.clone();

        let raw: Option<String> = match conn.get(key).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "cache read failed");
                return None;
            }
        };

        let raw = raw?;
        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(key, "cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(key, error = %e, "cache decode failed, evicting");
                self.delete(key).await;
                None
            }
        }
    }

    /// Write a value with the configured TTL. Failures are logged and
    /// swallowed; the next read simply misses.
    pub async fn put<T: Serialize>(&self, key: &str, value: &T) {
        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(key, error = %e, "cache encode failed");
                return;
            }
        };

        let mut conn = self.manager.clone();
        if let Err(e) = conn.set_ex::<_, _, ()>(key, encoded, self.ttl_seconds).await {
            warn!(key, error = %e, "cache write failed");
        } else {
            debug!(key, ttl = self.ttl_seconds, "cache set");
        }
    }

    /// Invalidate a key (used after writes to the underlying row).
    pub async fn delete(&self, key: &str) {
        let mut conn = self.manager.clone();
        if let Err(e) = conn.del::<_, ()>(key).await {
            warn!(key, error = %e, "cache delete failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_formats() {
        assert_eq!(factory_key("vpc"), "factory:slug:vpc");
        assert_eq!(device_key(7, "M01"), "device:7:M01");
    }
}
