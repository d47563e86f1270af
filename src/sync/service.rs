//! Sync service tying the LlamaCloud client to the local file cache.

use crate::cloud::{
    CloudApi, CloudError, FileUpload, LlamaCloudClient, PipelineFileCreate, PipelineSummary,
    ProjectRoster,
};
use crate::config::get_config;
use crate::metrics::{SyncMetrics, SyncMetricsSnapshot};
use crate::sync::{
    SyncError, is_remote_configured,
    file_ref::FileRef,
    naming::{FileNamer, local_file_name},
    nodes::{NodeWithScore, distinct_file_refs},
    polling::{PollPolicy, Sleeper, TokioSleeper, wait_for_ingestion},
    scheduler::{TaskScheduler, TokioScheduler},
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// How a cache lookup was settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheOutcome {
    /// The file was already on disk; no remote call was made.
    Hit {
        /// Cached file location.
        path: PathBuf,
    },
    /// The file was downloaded into the cache.
    Resolved {
        /// Cached file location.
        path: PathBuf,
        /// Number of bytes written.
        bytes: u64,
    },
    /// The file could not be fetched and stays missing locally.
    Unresolved(MissReason),
}

/// Why a cache miss could not be filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissReason {
    /// No pipeline file carries the requested name.
    NotFound,
    /// The file name or pipeline id is not a single path component.
    InvalidName,
    /// A remote call or the disk write failed.
    Failed(String),
}

/// File upload destined for a pipeline.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Project owning the file store.
    pub project_id: String,
    /// Pipeline that ingests the file.
    pub pipeline_id: String,
    /// File name and contents.
    pub upload: FileUpload,
    /// Extra metadata attached to every node produced from the file.
    pub custom_metadata: Map<String, Value>,
    /// Block until the pipeline reports a terminal status.
    pub wait_for_processing: bool,
}

/// Abstraction over the sync service used by the HTTP surface.
#[async_trait]
pub trait SyncApi: Send + Sync {
    /// Whether a LlamaCloud credential is available.
    fn is_configured(&self) -> bool;

    /// Projects with their pipelines; empty when LlamaCloud is unreachable.
    async fn pipeline_roster(&self) -> Vec<ProjectRoster>;

    /// Upload a file into a pipeline, optionally waiting for ingestion.
    async fn upload(&self, request: UploadRequest) -> Result<String, SyncError>;

    /// Queue background downloads for the files behind retrieval results.
    fn schedule_source_downloads(&self, nodes: &[NodeWithScore]) -> usize;

    /// Directory holding cached pipeline files.
    fn cache_root(&self) -> &Path;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> SyncMetricsSnapshot;
}

/// Keeps local copies of pipeline files and uploads new files into pipelines.
///
/// Cloning is cheap; background download tasks each hold a clone.
#[derive(Clone)]
pub struct FileSyncService {
    cloud: Arc<dyn CloudApi>,
    cache_root: PathBuf,
    namer: FileNamer,
    poll_policy: PollPolicy,
    sleeper: Arc<dyn Sleeper>,
    scheduler: Arc<dyn TaskScheduler>,
    metrics: Arc<SyncMetrics>,
    configured: bool,
}

impl FileSyncService {
    /// Build a service over `cloud`, caching files under `cache_root`.
    pub fn new(cloud: Arc<dyn CloudApi>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cloud,
            cache_root: cache_root.into(),
            namer: local_file_name,
            poll_policy: PollPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
            scheduler: Arc::new(TokioScheduler),
            metrics: Arc::new(SyncMetrics::new()),
            configured: true,
        }
    }

    /// Build a service backed by [`LlamaCloudClient`] using the loaded configuration.
    pub fn from_config() -> Result<Self, CloudError> {
        let config = get_config();
        let cloud = LlamaCloudClient::new()?;
        let mut service = Self::new(Arc::new(cloud), config.cache_dir.clone())
            .with_poll_policy(PollPolicy {
                interval: config.poll_interval,
                max_attempts: config.poll_max_attempts,
            });
        service.configured = is_remote_configured();
        tracing::debug!(
            cache_dir = %service.cache_root.display(),
            configured = service.configured,
            "Initialized file sync service"
        );
        Ok(service)
    }

    /// Override the cache naming function.
    pub fn with_namer(mut self, namer: FileNamer) -> Self {
        self.namer = namer;
        self
    }

    /// Override the ingestion polling cadence.
    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }

    /// Override how the poll loop waits between status checks.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Override the scheduler used by [`SyncApi::schedule_source_downloads`].
    pub fn with_scheduler(mut self, scheduler: Arc<dyn TaskScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// List every project together with its pipelines.
    ///
    /// Listing is best-effort: failures are logged and yield an empty roster.
    pub async fn resolve_pipeline_roster(&self) -> Vec<ProjectRoster> {
        match self.fetch_roster().await {
            Ok(roster) => roster,
            Err(error) => {
                tracing::error!(error = %error, "Error listing projects and pipelines");
                Vec::new()
            }
        }
    }

    async fn fetch_roster(&self) -> Result<Vec<ProjectRoster>, CloudError> {
        let projects = self.cloud.list_projects().await?;
        let pipelines = self.cloud.list_pipelines().await?;

        Ok(projects
            .into_iter()
            .map(|project| {
                let pipelines = pipelines
                    .iter()
                    .filter(|pipeline| pipeline.project_id == project.id)
                    .map(|pipeline| PipelineSummary {
                        id: pipeline.id.clone(),
                        name: pipeline.name.clone(),
                    })
                    .collect();
                ProjectRoster {
                    project,
                    pipelines,
                }
            })
            .collect())
    }

    /// Upload a file, register it with the pipeline, and optionally wait for ingestion.
    ///
    /// The registered metadata always carries the new file id under `file_id`. Returns the file id
    /// once registered (no wait) or once the pipeline reports `SUCCESS`.
    pub async fn upload_and_wait(&self, request: UploadRequest) -> Result<String, SyncError> {
        let UploadRequest {
            project_id,
            pipeline_id,
            upload,
            custom_metadata,
            wait_for_processing,
        } = request;
        let file_name = upload.name.clone();

        let file_id = self.cloud.upload_file(&project_id, upload).await?.id;

        let mut metadata = custom_metadata;
        metadata.insert("file_id".into(), Value::String(file_id.clone()));
        self.cloud
            .add_files_to_pipeline(
                &pipeline_id,
                vec![PipelineFileCreate {
                    file_id: file_id.clone(),
                    custom_metadata: metadata,
                }],
            )
            .await?;
        self.metrics.record_upload();
        tracing::info!(
            file_name = %file_name,
            file_id = %file_id,
            pipeline_id = %pipeline_id,
            "File added to pipeline"
        );

        if !wait_for_processing {
            return Ok(file_id);
        }

        let waited = wait_for_ingestion(
            self.cloud.as_ref(),
            self.sleeper.as_ref(),
            self.poll_policy,
            &file_id,
            &pipeline_id,
        )
        .await;

        match waited {
            Ok(()) => Ok(file_id),
            Err(error) => {
                if matches!(
                    error,
                    SyncError::IngestionFailed { .. } | SyncError::IngestionTimeout { .. }
                ) {
                    self.metrics.record_ingestion_failure();
                }
                Err(error)
            }
        }
    }

    /// Location of the cached copy of `file`.
    pub fn local_path(&self, file: &FileRef) -> PathBuf {
        self.cache_root
            .join((self.namer)(&file.file_name, &file.pipeline_id))
    }

    /// Make sure a local copy of `file` exists, reporting how the lookup was settled.
    ///
    /// An existing file is left alone unless `force_refresh` is set. Remote failures never
    /// escape; they come back as [`CacheOutcome::Unresolved`].
    pub async fn sync_file(&self, file: &FileRef, force_refresh: bool) -> CacheOutcome {
        if !file.is_well_formed() {
            tracing::warn!(
                file_name = %file.file_name,
                pipeline_id = %file.pipeline_id,
                "Refusing to sync file with a path-like name"
            );
            self.metrics.record_unresolved();
            return CacheOutcome::Unresolved(MissReason::InvalidName);
        }
        let path = self.local_path(file);
        if !force_refresh && tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::debug!(file_name = %file.file_name, "File already exists in local storage");
            self.metrics.record_cache_hit();
            return CacheOutcome::Hit { path };
        }

        tracing::info!(
            file_name = %file.file_name,
            pipeline_id = %file.pipeline_id,
            "Downloading file"
        );
        let reason = match self.fetch_remote(file, &path).await {
            Ok(Some(bytes)) => {
                tracing::info!(path = %path.display(), bytes, "File downloaded successfully");
                self.metrics.record_download();
                return CacheOutcome::Resolved { path, bytes };
            }
            Ok(None) => MissReason::NotFound,
            Err(error) => MissReason::Failed(error.to_string()),
        };

        tracing::info!(
            file_name = %file.file_name,
            pipeline_id = %file.pipeline_id,
            reason = ?reason,
            "Error fetching file from LlamaCloud"
        );
        self.metrics.record_unresolved();
        CacheOutcome::Unresolved(reason)
    }

    /// Fire-and-forget variant of [`FileSyncService::sync_file`].
    pub async fn ensure_local_copy(&self, file: &FileRef, force_refresh: bool) {
        let _ = self.sync_file(file, force_refresh).await;
    }

    /// First pipeline file whose name matches exactly wins; no match is `Ok(None)`.
    async fn fetch_remote(&self, file: &FileRef, path: &Path) -> Result<Option<u64>, CloudError> {
        let entries = self.cloud.list_pipeline_files(&file.pipeline_id).await?;
        let Some(entry) = entries
            .into_iter()
            .find(|entry| entry.name.as_deref() == Some(file.file_name.as_str()))
        else {
            return Ok(None);
        };
        let Some(file_id) = entry.file_id else {
            return Ok(None);
        };

        let content = self
            .cloud
            .read_file_content(&file_id, &entry.project_id)
            .await?;
        tracing::info!(path = %path.display(), "Saving file");
        let bytes = self.cloud.download_to(&content.url, path).await?;
        Ok(Some(bytes))
    }

    /// Hand one download per distinct source file to `scheduler`.
    ///
    /// Performs no I/O; each task runs [`FileSyncService::ensure_local_copy`] without forcing a
    /// refresh. References with path-like names are dropped. Returns the number of tasks
    /// scheduled.
    pub fn schedule_downloads(
        &self,
        nodes: &[NodeWithScore],
        scheduler: &dyn TaskScheduler,
    ) -> usize {
        let mut scheduled = 0;
        for file in distinct_file_refs(nodes) {
            if !file.is_well_formed() {
                tracing::warn!(
                    file_name = %file.file_name,
                    pipeline_id = %file.pipeline_id,
                    "Skipping download with a path-like name"
                );
                continue;
            }
            scheduled += 1;
            tracing::info!(file_name = %file.file_name, "Adding download to background tasks");
            let service = self.clone();
            scheduler.schedule(Box::pin(async move {
                service.ensure_local_copy(&file, false).await;
            }));
        }
        scheduled
    }
}

#[async_trait]
impl SyncApi for FileSyncService {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn pipeline_roster(&self) -> Vec<ProjectRoster> {
        self.resolve_pipeline_roster().await
    }

    async fn upload(&self, request: UploadRequest) -> Result<String, SyncError> {
        self.upload_and_wait(request).await
    }

    fn schedule_source_downloads(&self, nodes: &[NodeWithScore]) -> usize {
        self.schedule_downloads(nodes, self.scheduler.as_ref())
    }

    fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    fn metrics_snapshot(&self) -> SyncMetricsSnapshot {
        self.metrics.snapshot()
    }
}
