//! Local cache of LlamaCloud pipeline files and the ingestion helpers around it.

pub mod file_ref;
pub mod naming;
pub mod nodes;
pub mod polling;
pub mod scheduler;
pub mod service;
#[cfg(test)]
pub(crate) mod testing;

pub use file_ref::FileRef;
pub use naming::{FileNamer, local_file_name};
pub use nodes::{NodeWithScore, TextNode, distinct_file_refs};
pub use polling::{PollPolicy, Sleeper, TokioSleeper, wait_for_ingestion};
pub use scheduler::{DeferredTasks, Task, TaskScheduler, TokioScheduler};
pub use service::{CacheOutcome, FileSyncService, MissReason, SyncApi, UploadRequest};

use crate::cloud::{CloudError, FileStatus};
use crate::config::API_KEY_VAR;
use std::env::{self, VarError};
use thiserror::Error;

/// Errors surfaced by the upload path. Read-path failures are logged instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// LlamaCloud could not be reached or rejected a request.
    #[error("LlamaCloud request failed: {0}")]
    Cloud(#[from] CloudError),
    /// The pipeline reported `ERROR` for the uploaded file.
    #[error("File processing failed for {file_id}: {status}")]
    IngestionFailed {
        /// File whose ingestion failed.
        file_id: String,
        /// Status payload returned by the pipeline.
        status: FileStatus,
    },
    /// The pipeline did not reach a terminal status within the attempt budget.
    #[error("File processing did not complete after {attempts} attempts")]
    IngestionTimeout {
        /// Number of status checks performed.
        attempts: u32,
    },
}

/// Whether a LlamaCloud API key is present in the process environment.
pub fn is_remote_configured() -> bool {
    is_configured_with(|key| env::var(key))
}

/// Like [`is_remote_configured`], reading through `lookup`. Any lookup error means "not configured".
pub fn is_configured_with<F>(lookup: F) -> bool
where
    F: FnOnce(&str) -> Result<String, VarError>,
{
    lookup(API_KEY_VAR).is_ok()
}
