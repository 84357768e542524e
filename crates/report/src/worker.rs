//! Report job execution: lifecycle, aggregation, rendering, artifact upload.

use std::time::Duration;

use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

use plantops_db::models::{JobStatus, ReportFormat};
use plantops_db::repo;
use plantops_queue::TaskError;
use plantops_storage::{report_key, ArtifactStore, REPORT_URL_TTL};
use plantops_tsdb::TsdbClient;

use crate::data;
use crate::{excel, pdf};

const ANALYTICS_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ReportWorker {
    pool: PgPool,
    tsdb: TsdbClient,
    store: ArtifactStore,
    http: reqwest::Client,
}

impl ReportWorker {
    pub fn new(pool: PgPool, tsdb: TsdbClient, store: ArtifactStore) -> Self {
        Self {
            pool,
            tsdb,
            store,
            http: reqwest::Client::new(),
        }
    }

    pub async fn execute(&self, report_id: Uuid) -> Result<(), TaskError> {
        let report = repo::report::get_for_worker(&self.pool, report_id)
            .await
            .map_err(|e| TaskError::Retryable(e.to_string()))?
            .ok_or_else(|| TaskError::Fatal(format!("report not found: {report_id}")))?;

        let Some(format) = ReportFormat::parse(&report.format) else {
            let message = format!("unknown report format: {}", report.format);
            self.fail(report_id, &message).await;
            return Err(TaskError::Fatal(message));
        };

        repo::report::mark_running(&self.pool, report_id)
            .await
            .map_err(|e| TaskError::Retryable(e.to_string()))?;

        let device_ids = report.device_id_list();
        info!(
            report_id = %report_id,
            factory_id = report.factory_id,
            format = format.as_str(),
            device_count = device_ids.len(),
            "report fetching data"
        );

        let report_data = match data::aggregate(
            &self.pool,
            &self.tsdb,
            report.factory_id,
            &device_ids,
            report.date_range_start,
            report.date_range_end,
        )
        .await
        {
            Ok(report_data) => report_data,
            Err(e) => {
                let message = format!("report aggregation failed: {e}");
                self.fail(report_id, &message).await;
                return Err(TaskError::Retryable(message));
            }
        };

        // Optional analytics artifact embed; anything short of a complete
        // job with a fetchable artifact just proceeds without.
        let analytics = if report.include_analytics {
            match report.analytics_job_id {
                Some(job_id) => self.fetch_analytics(job_id).await,
                None => None,
            }
        } else {
            None
        };

        let title = report
            .title
            .clone()
            .unwrap_or_else(|| format!("Report {}", &report_id.to_string()[..8]));

        let bytes = match self.render(format, &title, &report_data, analytics.as_ref()) {
            Ok(bytes) => bytes,
            Err(e) => {
                let message = format!("report render failed: {e}");
                self.fail(report_id, &message).await;
                return Err(TaskError::Retryable(message));
            }
        };

        info!(
            report_id = %report_id,
            format = format.as_str(),
            size_bytes = bytes.len(),
            "report rendered"
        );

        let key = report_key(report.factory_id, report_id, format.extension());
        let size = bytes.len() as i64;
        let file_url = match self.upload(&key, bytes, format.content_type()).await {
            Ok(url) => url,
            Err(message) => {
                self.fail(report_id, &message).await;
                return Err(TaskError::Retryable(message));
            }
        };

        repo::report::mark_complete(&self.pool, report_id, &file_url, size)
            .await
            .map_err(|e| TaskError::Retryable(e.to_string()))?;

        info!(report_id = %report_id, "report complete");
        Ok(())
    }

    fn render(
        &self,
        format: ReportFormat,
        title: &str,
        report_data: &data::ReportData,
        analytics: Option<&serde_json::Value>,
    ) -> Result<Vec<u8>, crate::RenderError> {
        match format {
            ReportFormat::Pdf => pdf::generate(title, report_data, analytics),
            ReportFormat::Excel => excel::generate(title, report_data, analytics),
            ReportFormat::Json => {
                let mut body = serde_json::to_value(report_data)
                    .map_err(|e| crate::RenderError::Json(e.to_string()))?;
                body["analytics"] = analytics.cloned().unwrap_or(serde_json::Value::Null);
                serde_json::to_vec_pretty(&body)
                    .map_err(|e| crate::RenderError::Json(e.to_string()))
            }
        }
    }

    /// Fetch a completed analytics job's artifact by its presigned URL.
    async fn fetch_analytics(&self, job_id: Uuid) -> Option<serde_json::Value> {
        let job = match repo::job::get_for_worker(&self.pool, job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                warn!(job_id = %job_id, "analytics job not found, report proceeds without");
                return None;
            }
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "analytics lookup failed, report proceeds without");
                return None;
            }
        };

        if job.status() != Some(JobStatus::Complete) {
            warn!(job_id = %job_id, status = %job.status, "analytics job not complete, report proceeds without");
            return None;
        }
        let url = job.result_url?;

        let response = self
            .http
            .get(&url)
            .timeout(ANALYTICS_FETCH_TIMEOUT)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => match response.json().await {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(job_id = %job_id, error = %e, "analytics artifact decode failed");
                    None
                }
            },
            Ok(response) => {
                warn!(job_id = %job_id, status = %response.status(), "analytics artifact fetch failed");
                None
            }
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "analytics artifact fetch failed");
                None
            }
        }
    }

    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, String> {
        self.store
            .put(key, bytes, content_type)
            .await
            .map_err(|e| format!("artifact upload failed: {e}"))?;
        self.store
            .presign_get(key, REPORT_URL_TTL)
            .await
            .map_err(|e| format!("artifact presign failed: {e}"))
    }

    async fn fail(&self, report_id: Uuid, message: &str) {
        error!(report_id = %report_id, error = %message, "report failed");
        if let Err(e) = repo::report::mark_failed(&self.pool, report_id, message).await {
            error!(report_id = %report_id, error = %e, "failed to record report failure");
        }
    }
}
