//! Identity of a pipeline file referenced by retrieval results.

use crate::sync::naming::is_plain_file_name;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A file living in a LlamaCloud pipeline, identified by its name and pipeline.
///
/// Equality and hashing cover both fields, so a `HashSet<FileRef>` dedupes references
/// gathered from many retrieval results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileRef {
    /// File name as stored in the pipeline.
    pub file_name: String,
    /// Pipeline the file was ingested into.
    pub pipeline_id: String,
}

impl FileRef {
    /// Build a reference from its two identifying parts.
    pub fn new(file_name: impl Into<String>, pipeline_id: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            pipeline_id: pipeline_id.into(),
        }
    }

    /// Extract a reference from node metadata, requiring string `file_name` and `pipeline_id`.
    pub fn from_metadata(metadata: &Map<String, Value>) -> Option<Self> {
        let file_name = metadata.get("file_name")?.as_str()?;
        let pipeline_id = metadata.get("pipeline_id")?.as_str()?;
        Some(Self::new(file_name, pipeline_id))
    }

    /// Whether both parts are single path components, safe to put in URLs and cache paths.
    pub fn is_well_formed(&self) -> bool {
        is_plain_file_name(&self.file_name) && is_plain_file_name(&self.pipeline_id)
    }
}
