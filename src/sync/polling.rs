//! Fixed-cadence wait for pipeline ingestion to finish.

use crate::cloud::{CloudApi, IngestionStatus};
use crate::sync::SyncError;
use async_trait::async_trait;
use std::time::Duration;

/// Suspends the polling loop between status checks.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Wait for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Wall-clock sleeper backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Polling cadence for ingestion status checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay after every non-terminal status.
    pub interval: Duration,
    /// Status checks performed before giving up.
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            max_attempts: 20,
        }
    }
}

/// Poll the pipeline until `file_id` reports `SUCCESS` or `ERROR`.
///
/// Every status other than the two terminal ones counts as pending. Transport failures while
/// polling are returned as [`SyncError::Cloud`].
pub async fn wait_for_ingestion(
    cloud: &dyn CloudApi,
    sleeper: &dyn Sleeper,
    policy: PollPolicy,
    file_id: &str,
    pipeline_id: &str,
) -> Result<(), SyncError> {
    for attempt in 1..=policy.max_attempts {
        let status = cloud.get_pipeline_file_status(file_id, pipeline_id).await?;
        if !status.status.is_terminal() {
            tracing::trace!(
                file_id,
                pipeline_id,
                attempt,
                status = ?status.status,
                "Ingestion pending"
            );
            sleeper.sleep(policy.interval).await;
            continue;
        }
        if status.status == IngestionStatus::Error {
            tracing::warn!(
                file_id,
                pipeline_id,
                attempt,
                status = %status,
                "File ingestion failed"
            );
            return Err(SyncError::IngestionFailed {
                file_id: file_id.to_string(),
                status,
            });
        }
        tracing::debug!(file_id, pipeline_id, attempt, "File ingested");
        return Ok(());
    }

    tracing::warn!(
        file_id,
        pipeline_id,
        attempts = policy.max_attempts,
        "File ingestion did not complete"
    );
    Err(SyncError::IngestionTimeout {
        attempts: policy.max_attempts,
    })
}
