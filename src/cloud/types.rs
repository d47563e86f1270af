//! Wire types and errors shared by the LlamaCloud client and its callers.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Errors returned while interacting with LlamaCloud.
#[derive(Debug, Error)]
pub enum CloudError {
    /// No API key is available to authenticate requests.
    #[error("LlamaCloud API key is not configured")]
    MissingApiKey,
    /// Base URL failed to parse or normalize.
    #[error("Invalid LlamaCloud URL: {0}")]
    InvalidUrl(String),
    /// An id cannot be used as a URL path segment.
    #[error("Invalid LlamaCloud path segment: {0:?}")]
    InvalidPathSegment(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// LlamaCloud responded with an unexpected status code.
    #[error("Unexpected LlamaCloud response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from LlamaCloud.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Writing downloaded content to disk failed.
    #[error("Failed to write downloaded file: {0}")]
    Io(#[from] std::io::Error),
}

/// Project record as returned by `GET /api/v1/projects`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Project identifier.
    pub id: String,
    /// Human readable project name.
    pub name: String,
    /// Remaining project fields, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Pipeline record as returned by `GET /api/v1/pipelines`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Pipeline {
    /// Pipeline identifier.
    pub id: String,
    /// Pipeline name.
    pub name: String,
    /// Owning project.
    pub project_id: String,
}

/// Pipeline entry attached to a [`ProjectRoster`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineSummary {
    /// Pipeline identifier.
    pub id: String,
    /// Pipeline name.
    pub name: String,
}

/// A project together with the pipelines that belong to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectRoster {
    /// Project fields, flattened into the serialized record.
    #[serde(flatten)]
    pub project: Project,
    /// Pipelines whose `project_id` matches the project.
    pub pipelines: Vec<PipelineSummary>,
}

/// Raw file bytes handed to [`crate::cloud::CloudApi::upload_file`].
#[derive(Debug, Clone)]
pub struct FileUpload {
    /// File name reported to LlamaCloud.
    pub name: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

/// File record returned after an upload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CloudFile {
    /// Identifier assigned by LlamaCloud.
    pub id: String,
    /// Stored file name.
    #[serde(default)]
    pub name: Option<String>,
    /// Owning project.
    #[serde(default)]
    pub project_id: Option<String>,
}

/// Request item for `PUT /api/v1/pipelines/{pipeline_id}/files`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineFileCreate {
    /// File to attach.
    pub file_id: String,
    /// Metadata stored with every node produced from the file.
    pub custom_metadata: Map<String, Value>,
}

/// File entry listed under a pipeline.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PipelineFile {
    /// Original file name; absent for some data-source backed files.
    #[serde(default)]
    pub name: Option<String>,
    /// Identifier of the underlying file.
    #[serde(default)]
    pub file_id: Option<String>,
    /// Project owning the file.
    pub project_id: String,
}

/// Managed ingestion state of a pipeline file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngestionStatus {
    /// Queued, nothing processed yet.
    NotStarted,
    /// Parsing or embedding in progress.
    InProgress,
    /// Fully ingested.
    Success,
    /// Ingestion failed.
    Error,
    /// Ingested with some documents skipped.
    PartialSuccess,
    /// Ingestion was cancelled.
    Cancelled,
    /// Any status this client does not know about.
    #[serde(other)]
    Unknown,
}

impl IngestionStatus {
    /// Whether polling can stop on this status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

/// Response of `GET /api/v1/pipelines/{pipeline_id}/files/{file_id}/status`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FileStatus {
    /// Current ingestion status.
    pub status: IngestionStatus,
    /// Ingestion job identifier, if one was started.
    #[serde(default)]
    pub job_id: Option<String>,
    /// Error messages reported by the pipeline.
    #[serde(default)]
    pub error: Option<Vec<String>>,
}

impl FileStatus {
    /// Build a status record without job or error details.
    pub fn new(status: IngestionStatus) -> Self {
        Self {
            status,
            job_id: None,
            error: None,
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status={:?}", self.status)?;
        if let Some(job_id) = &self.job_id {
            write!(f, " job_id={job_id}")?;
        }
        if let Some(errors) = self.error.as_ref().filter(|errors| !errors.is_empty()) {
            write!(f, " error=[{}]", errors.join("; "))?;
        }
        Ok(())
    }
}

/// Signed download location returned by `GET /api/v1/files/{id}/content`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FileContent {
    /// Presigned URL serving the raw bytes.
    pub url: String,
    /// Expiry of the signed URL.
    #[serde(default)]
    pub expires_at: Option<String>,
}
