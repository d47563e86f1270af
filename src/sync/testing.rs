//! In-memory doubles for the LlamaCloud API and the poll sleeper.

use crate::cloud::{
    CloudApi, CloudError, CloudFile, FileContent, FileStatus, FileUpload, IngestionStatus,
    Pipeline, PipelineFile, PipelineFileCreate, Project,
};
use crate::sync::polling::Sleeper;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Map;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub(crate) struct FakeCloud {
    pub(crate) projects: Vec<Project>,
    pub(crate) pipelines: Vec<Pipeline>,
    pub(crate) pipeline_files: Vec<PipelineFile>,
    pub(crate) content: Vec<u8>,
    pub(crate) fail_listing: bool,
    pub(crate) fail_upload: bool,
    pub(crate) statuses: Mutex<VecDeque<IngestionStatus>>,
    pub(crate) calls: Mutex<Vec<String>>,
    pub(crate) registrations: Mutex<Vec<(String, Vec<PipelineFileCreate>)>>,
}

impl FakeCloud {
    pub(crate) fn with_statuses(statuses: impl IntoIterator<Item = IngestionStatus>) -> Self {
        Self {
            statuses: Mutex::new(statuses.into_iter().collect()),
            ..Self::default()
        }
    }

    pub(crate) fn with_pipeline_file(file_name: &str, content: &[u8]) -> Self {
        Self {
            pipeline_files: vec![
                PipelineFile {
                    name: Some("other.pdf".into()),
                    file_id: Some("file-other".into()),
                    project_id: "proj-1".into(),
                },
                PipelineFile {
                    name: Some(file_name.into()),
                    file_id: Some("file-1".into()),
                    project_id: "proj-1".into(),
                },
            ],
            content: content.to_vec(),
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub(crate) fn count(&self, name: &str) -> usize {
        self.calls().iter().filter(|call| call.as_str() == name).count()
    }

    pub(crate) fn registrations(&self) -> Vec<(String, Vec<PipelineFileCreate>)> {
        self.registrations.lock().expect("registrations lock").clone()
    }

    fn record(&self, name: &str) {
        self.calls.lock().expect("calls lock").push(name.to_string());
    }

    fn unavailable() -> CloudError {
        CloudError::UnexpectedStatus {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: "unavailable".into(),
        }
    }
}

#[async_trait]
impl CloudApi for FakeCloud {
    async fn list_projects(&self) -> Result<Vec<Project>, CloudError> {
        self.record("list_projects");
        if self.fail_listing {
            return Err(Self::unavailable());
        }
        Ok(self.projects.clone())
    }

    async fn list_pipelines(&self) -> Result<Vec<Pipeline>, CloudError> {
        self.record("list_pipelines");
        if self.fail_listing {
            return Err(Self::unavailable());
        }
        Ok(self.pipelines.clone())
    }

    async fn upload_file(
        &self,
        project_id: &str,
        upload: FileUpload,
    ) -> Result<CloudFile, CloudError> {
        self.record("upload_file");
        if self.fail_upload {
            return Err(Self::unavailable());
        }
        Ok(CloudFile {
            id: "file-new".into(),
            name: Some(upload.name),
            project_id: Some(project_id.to_string()),
        })
    }

    async fn add_files_to_pipeline(
        &self,
        pipeline_id: &str,
        files: Vec<PipelineFileCreate>,
    ) -> Result<Vec<PipelineFile>, CloudError> {
        self.record("add_files_to_pipeline");
        self.registrations
            .lock()
            .expect("registrations lock")
            .push((pipeline_id.to_string(), files));
        Ok(Vec::new())
    }

    async fn get_pipeline_file_status(
        &self,
        _file_id: &str,
        _pipeline_id: &str,
    ) -> Result<FileStatus, CloudError> {
        self.record("get_pipeline_file_status");
        let status = self
            .statuses
            .lock()
            .expect("statuses lock")
            .pop_front()
            .unwrap_or(IngestionStatus::InProgress);
        Ok(FileStatus::new(status))
    }

    async fn list_pipeline_files(
        &self,
        _pipeline_id: &str,
    ) -> Result<Vec<PipelineFile>, CloudError> {
        self.record("list_pipeline_files");
        if self.fail_listing {
            return Err(Self::unavailable());
        }
        Ok(self.pipeline_files.clone())
    }

    async fn read_file_content(
        &self,
        file_id: &str,
        _project_id: &str,
    ) -> Result<FileContent, CloudError> {
        self.record("read_file_content");
        Ok(FileContent {
            url: format!("https://storage.example.com/{file_id}"),
            expires_at: None,
        })
    }

    async fn download_to(&self, _url: &str, destination: &Path) -> Result<u64, CloudError> {
        self.record("download_to");
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(destination, &self.content).await?;
        Ok(self.content.len() as u64)
    }
}

/// Records requested sleeps without waiting.
#[derive(Default)]
pub(crate) struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub(crate) fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().expect("sleeps lock").clone()
    }

    pub(crate) fn total(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().expect("sleeps lock").push(duration);
    }
}

pub(crate) fn project(id: &str, name: &str) -> Project {
    Project {
        id: id.into(),
        name: name.into(),
        extra: Map::new(),
    }
}

pub(crate) fn pipeline(id: &str, name: &str, project_id: &str) -> Pipeline {
    Pipeline {
        id: id.into(),
        name: name.into(),
        project_id: project_id.into(),
    }
}
