//! Analytics job execution: lifecycle transitions, telemetry fetch, model
//! dispatch, artifact upload.

use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use plantops_db::models::JobType;
use plantops_db::repo;
use plantops_queue::TaskError;
use plantops_storage::{analytics_key, ArtifactStore, ANALYTICS_URL_TTL};
use plantops_tsdb::{TelemetryFrame, TsdbClient};

use crate::models::{model_for, ModelError};

pub struct AnalyticsWorker {
    pool: PgPool,
    tsdb: TsdbClient,
    store: ArtifactStore,
}

impl AnalyticsWorker {
    pub fn new(pool: PgPool, tsdb: TsdbClient, store: ArtifactStore) -> Self {
        Self { pool, tsdb, store }
    }

    /// Run one job to a terminal state.
    ///
    /// Unmet input preconditions mark the job failed without retry; fetch,
    /// model, and upload failures mark it failed and surface as retryable
    /// (the queue policy allows one retry after 60 s).
    pub async fn execute(&self, job_id: Uuid) -> Result<(), TaskError> {
        let job = repo::job::get_for_worker(&self.pool, job_id)
            .await
            .map_err(|e| TaskError::Retryable(e.to_string()))?
            .ok_or_else(|| TaskError::Fatal(format!("analytics job not found: {job_id}")))?;

        let Some(job_type) = JobType::parse(&job.job_type) else {
            let message = format!("unknown job type: {}", job.job_type);
            self.fail(job_id, &message).await;
            return Err(TaskError::Fatal(message));
        };

        repo::job::mark_running(&self.pool, job_id)
            .await
            .map_err(|e| TaskError::Retryable(e.to_string()))?;

        let device_ids = job.device_id_list();
        info!(
            job_id = %job_id,
            factory_id = job.factory_id,
            job_type = %job.job_type,
            device_count = device_ids.len(),
            "analytics job fetching data"
        );

        let frame = match self
            .tsdb
            .fetch_rows(
                job.factory_id,
                &device_ids,
                job.date_range_start,
                job.date_range_end,
            )
            .await
        {
            Ok(rows) => TelemetryFrame::from_rows(rows),
            Err(e) => {
                let message = format!("telemetry fetch failed: {e}");
                self.fail(job_id, &message).await;
                return Err(TaskError::Retryable(message));
            }
        };

        info!(
            job_id = %job_id,
            rows = frame.row_count(),
            parameters = frame.parameter_names().len(),
            "analytics job data fetched"
        );

        let result = match model_for(job_type)(&frame) {
            Ok(result) => result,
            Err(ModelError::Insufficient(message)) => {
                // Preconditions unmet: terminal, no retry.
                self.fail(job_id, &message).await;
                return Err(TaskError::Fatal(message));
            }
            Err(ModelError::Failed(message)) => {
                self.fail(job_id, &message).await;
                return Err(TaskError::Retryable(message));
            }
        };

        let key = analytics_key(job.factory_id, job_id);
        let result_url = match self.upload(&key, &result).await {
            Ok(url) => url,
            Err(message) => {
                self.fail(job_id, &message).await;
                return Err(TaskError::Retryable(message));
            }
        };

        repo::job::mark_complete(&self.pool, job_id, &result_url)
            .await
            .map_err(|e| TaskError::Retryable(e.to_string()))?;

        info!(job_id = %job_id, "analytics job complete");
        Ok(())
    }

    async fn upload(&self, key: &str, result: &serde_json::Value) -> Result<String, String> {
        self.store
            .put_json(key, result)
            .await
            .map_err(|e| format!("artifact upload failed: {e}"))?;
        self.store
            .presign_get(key, ANALYTICS_URL_TTL)
            .await
            .map_err(|e| format!("artifact presign failed: {e}"))
    }

    async fn fail(&self, job_id: Uuid, message: &str) {
        error!(job_id = %job_id, error = %message, "analytics job failed");
        if let Err(e) = repo::job::mark_failed(&self.pool, job_id, message).await {
            error!(job_id = %job_id, error = %e, "failed to record job failure");
        }
    }
}
