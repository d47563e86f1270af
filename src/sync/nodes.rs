//! Retrieval results as handed over by the query engine.

use crate::sync::file_ref::FileRef;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// A retrieved node and its similarity score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeWithScore {
    /// The retrieved node.
    pub node: TextNode,
    /// Similarity score, when the retriever provides one.
    #[serde(default)]
    pub score: Option<f32>,
}

/// Text chunk with the metadata LlamaCloud attaches at ingestion time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    /// Node identifier.
    #[serde(default, alias = "id_")]
    pub id: String,
    /// Chunk text.
    #[serde(default)]
    pub text: String,
    /// Arbitrary metadata; `file_name` and `pipeline_id` locate the source file.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Distinct source files referenced by a batch of retrieval results.
///
/// Nodes lacking either `file_name` or `pipeline_id` are skipped.
pub fn distinct_file_refs(nodes: &[NodeWithScore]) -> BTreeSet<FileRef> {
    nodes
        .iter()
        .filter_map(|node| FileRef::from_metadata(&node.node.metadata))
        .collect()
}
