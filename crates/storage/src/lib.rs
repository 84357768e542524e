//! Object-store artifact handoff (MinIO / S3).
//!
//! Workers upload immutable analytics results and rendered reports here and
//! store a presigned read URL on the owning row. Keys are namespaced by
//! tenant: `<factory_id>/analytics/<job_id>.json` and
//! `<factory_id>/reports/<report_id>.<ext>`.

use std::time::Duration;

use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use plantops_core::config::ObjectStoreConfig;

/// Presign lifetime for analytics artifacts.
pub const ANALYTICS_URL_TTL: Duration = Duration::from_secs(3600);
/// Presign lifetime for report artifacts.
pub const REPORT_URL_TTL: Duration = Duration::from_secs(86_400);

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("not configured: {0}")]
    NotConfigured(String),
}

/// S3-compatible artifact store.
pub struct ArtifactStore {
    store: AmazonS3,
    bucket: String,
}

impl ArtifactStore {
    pub fn new(config: &ObjectStoreConfig) -> Result<Self, StorageError> {
        if config.bucket.is_empty() {
            return Err(StorageError::NotConfigured("bucket not set".into()));
        }

        let endpoint = if config.endpoint.starts_with("http://")
            || config.endpoint.starts_with("https://")
        {
            config.endpoint.clone()
        } else {
            format!("https://{}", config.endpoint)
        };

        let store = AmazonS3Builder::new()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region)
            .with_endpoint(&endpoint)
            .with_allow_http(endpoint.starts_with("http://"))
            .with_access_key_id(&config.access_key)
            .with_secret_access_key(&config.secret_key)
            .build()?;

        info!(
            bucket = %config.bucket,
            endpoint = %endpoint,
            "artifact store ready"
        );

        Ok(Self {
            store,
            bucket: config.bucket.clone(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Upload raw bytes with an explicit content type.
    pub async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());

        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        let size = body.len();
        self.store
            .put_opts(&Path::from(key), PutPayload::from(body), options)
            .await?;

        info!(key, size_bytes = size, content_type, "artifact uploaded");
        Ok(())
    }

    /// Serialize a JSON value and upload it as `application/json`.
    pub async fn put_json(&self, key: &str, data: &serde_json::Value) -> Result<(), StorageError> {
        let body = serde_json::to_vec_pretty(data)?;
        self.put(key, body, "application/json").await
    }

    /// Presigned GET URL for a previously uploaded artifact.
    pub async fn presign_get(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        let url = self
            .store
            .signed_url(Method::GET, &Path::from(key), expires_in)
            .await?;
        Ok(url.to_string())
    }
}

/// Key for an analytics result artifact.
pub fn analytics_key(factory_id: i64, job_id: Uuid) -> String {
    format!("{factory_id}/analytics/{job_id}.json")
}

/// Key for a rendered report artifact.
pub fn report_key(factory_id: i64, report_id: Uuid, extension: &str) -> String {
    format!("{factory_id}/reports/{report_id}.{extension}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_keys_are_tenant_namespaced() {
        let job_id = Uuid::nil();
        assert_eq!(
            analytics_key(7, job_id),
            format!("7/analytics/{job_id}.json")
        );
        assert_eq!(
            report_key(7, job_id, "pdf"),
            format!("7/reports/{job_id}.pdf")
        );
    }

    #[test]
    fn presign_ttls_match_contract() {
        assert_eq!(ANALYTICS_URL_TTL, Duration::from_secs(60 * 60));
        assert_eq!(REPORT_URL_TTL, Duration::from_secs(24 * 60 * 60));
    }
}
