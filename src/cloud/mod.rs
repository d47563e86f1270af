//! LlamaCloud managed-ingestion API integration.

pub mod client;
pub mod types;

pub use client::{CloudApi, LlamaCloudClient};
pub use types::{
    CloudError, CloudFile, FileContent, FileStatus, FileUpload, IngestionStatus, Pipeline,
    PipelineFile, PipelineFileCreate, PipelineSummary, Project, ProjectRoster,
};
