//! HTTP client wrapper for the LlamaCloud REST API.

use crate::cloud::types::{
    CloudError, CloudFile, FileContent, FileStatus, FileUpload, Pipeline, PipelineFile,
    PipelineFileCreate, Project,
};
use crate::config::get_config;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, Response, Url};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Remote operations the sync cache needs from LlamaCloud.
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// List every project visible to the API key.
    async fn list_projects(&self) -> Result<Vec<Project>, CloudError>;

    /// List every pipeline visible to the API key.
    async fn list_pipelines(&self) -> Result<Vec<Pipeline>, CloudError>;

    /// Upload raw bytes into the project's file store.
    async fn upload_file(
        &self,
        project_id: &str,
        upload: FileUpload,
    ) -> Result<CloudFile, CloudError>;

    /// Attach uploaded files to a pipeline, triggering ingestion.
    async fn add_files_to_pipeline(
        &self,
        pipeline_id: &str,
        files: Vec<PipelineFileCreate>,
    ) -> Result<Vec<PipelineFile>, CloudError>;

    /// Fetch the ingestion status of one pipeline file.
    async fn get_pipeline_file_status(
        &self,
        file_id: &str,
        pipeline_id: &str,
    ) -> Result<FileStatus, CloudError>;

    /// List the files attached to a pipeline.
    async fn list_pipeline_files(
        &self,
        pipeline_id: &str,
    ) -> Result<Vec<PipelineFile>, CloudError>;

    /// Resolve the signed content URL of a file.
    async fn read_file_content(
        &self,
        file_id: &str,
        project_id: &str,
    ) -> Result<FileContent, CloudError>;

    /// Stream the bytes behind a signed URL into `destination`, returning the byte count.
    async fn download_to(&self, url: &str, destination: &Path) -> Result<u64, CloudError>;
}

/// Lightweight HTTP client for LlamaCloud operations.
pub struct LlamaCloudClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
}

impl LlamaCloudClient {
    /// Construct a new client using configuration derived from the environment.
    ///
    /// A missing API key is not an error here; every API call fails with
    /// [`CloudError::MissingApiKey`] instead.
    pub fn new() -> Result<Self, CloudError> {
        let config = get_config();
        Self::with_credentials(
            &config.llama_cloud_base_url,
            config.llama_cloud_api_key.clone(),
        )
    }

    /// Construct a client for an explicit endpoint and key.
    pub fn with_credentials(base_url: &str, api_key: Option<String>) -> Result<Self, CloudError> {
        let client = Client::builder().user_agent("llamasync/0.1").build()?;
        let base_url = normalize_base_url(base_url).map_err(CloudError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = %api_key.as_deref().map(|value| !value.is_empty()).unwrap_or(false),
            "Initialized LlamaCloud HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Build an authenticated request for the endpoint made of `segments`.
    ///
    /// Each segment is percent-encoded on its own, so ids can never climb out of their slot.
    fn request(
        &self,
        method: Method,
        segments: &[&str],
    ) -> Result<reqwest::RequestBuilder, CloudError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|value| !value.is_empty())
            .ok_or(CloudError::MissingApiKey)?;
        let url = endpoint_url(&self.base_url, segments)?;
        Ok(self.client.request(method, url).bearer_auth(api_key))
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        response: Response,
        action: &'static str,
    ) -> Result<T, CloudError> {
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = CloudError::UnexpectedStatus { status, body };
            tracing::debug!(action, error = %error, "LlamaCloud request failed");
            Err(error)
        }
    }
}

#[async_trait]
impl CloudApi for LlamaCloudClient {
    async fn list_projects(&self) -> Result<Vec<Project>, CloudError> {
        let response = self.request(Method::GET, &["api", "v1", "projects"])?.send().await?;
        self.read_json(response, "list_projects").await
    }

    async fn list_pipelines(&self) -> Result<Vec<Pipeline>, CloudError> {
        let response = self.request(Method::GET, &["api", "v1", "pipelines"])?.send().await?;
        self.read_json(response, "list_pipelines").await
    }

    async fn upload_file(
        &self,
        project_id: &str,
        upload: FileUpload,
    ) -> Result<CloudFile, CloudError> {
        let size = upload.bytes.len();
        let part = Part::bytes(upload.bytes).file_name(upload.name.clone());
        let form = Form::new().part("upload_file", part);
        let response = self
            .request(Method::POST, &["api", "v1", "files"])?
            .query(&[("project_id", project_id)])
            .multipart(form)
            .send()
            .await?;
        let file: CloudFile = self.read_json(response, "upload_file").await?;
        tracing::debug!(
            project_id,
            file_id = %file.id,
            file_name = %upload.name,
            bytes = size,
            "File uploaded"
        );
        Ok(file)
    }

    async fn add_files_to_pipeline(
        &self,
        pipeline_id: &str,
        files: Vec<PipelineFileCreate>,
    ) -> Result<Vec<PipelineFile>, CloudError> {
        let response = self
            .request(Method::PUT, &["api", "v1", "pipelines", pipeline_id, "files"])?
            .json(&files)
            .send()
            .await?;
        self.read_json(response, "add_files_to_pipeline").await
    }

    async fn get_pipeline_file_status(
        &self,
        file_id: &str,
        pipeline_id: &str,
    ) -> Result<FileStatus, CloudError> {
        let response = self
            .request(
                Method::GET,
                &["api", "v1", "pipelines", pipeline_id, "files", file_id, "status"],
            )?
            .send()
            .await?;
        self.read_json(response, "get_pipeline_file_status").await
    }

    async fn list_pipeline_files(
        &self,
        pipeline_id: &str,
    ) -> Result<Vec<PipelineFile>, CloudError> {
        let response = self
            .request(Method::GET, &["api", "v1", "pipelines", pipeline_id, "files"])?
            .send()
            .await?;
        self.read_json(response, "list_pipeline_files").await
    }

    async fn read_file_content(
        &self,
        file_id: &str,
        project_id: &str,
    ) -> Result<FileContent, CloudError> {
        let response = self
            .request(Method::GET, &["api", "v1", "files", file_id, "content"])?
            .query(&[("project_id", project_id)])
            .send()
            .await?;
        self.read_json(response, "read_file_content").await
    }

    async fn download_to(&self, url: &str, destination: &Path) -> Result<u64, CloudError> {
        // Signed URLs carry their own credentials; the bearer token stays off this request.
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CloudError::UnexpectedStatus { status, body });
        }

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let partial = partial_path(destination);
        match stream_to_file(response, &partial).await {
            Ok(written) => {
                tokio::fs::rename(&partial, destination).await?;
                Ok(written)
            }
            Err(error) => {
                let _ = tokio::fs::remove_file(&partial).await;
                Err(error)
            }
        }
    }
}

async fn stream_to_file(mut response: Response, path: &Path) -> Result<u64, CloudError> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0_u64;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

/// Sibling temp path so readers never observe a half-written cache file.
fn partial_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    destination.with_file_name(format!(".{name}.{}.part", Uuid::new_v4()))
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn endpoint_url(base: &str, segments: &[&str]) -> Result<Url, CloudError> {
    if let Some(segment) = segments
        .iter()
        .find(|segment| matches!(**segment, "" | "." | ".."))
    {
        return Err(CloudError::InvalidPathSegment((*segment).to_string()));
    }
    let mut url = Url::parse(base).map_err(|err| CloudError::InvalidUrl(err.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| CloudError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
