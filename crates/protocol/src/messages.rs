use serde::{Deserialize, Serialize};

use crate::types::SessionState;

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Body of `GET /upload-status/{id}`.
///
/// `uploaded_chunks` is always present and sorted ascending; it is empty for
/// an id the server has never seen. `state` and `total_chunks` are omitted
/// for unknown ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStatusResponse {
    pub uploaded_chunks: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<SessionState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<u32>,
}

impl UploadStatusResponse {
    /// Status for an id with no recorded chunks.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns `true` if the session finished merging.
    pub fn is_completed(&self) -> bool {
        self.state.is_some_and(SessionState::is_completed)
    }

    /// Indices in `0..total_chunks` that the server does not hold yet.
    pub fn missing_chunks(&self, total_chunks: u32) -> Vec<u32> {
        (0..total_chunks)
            .filter(|i| self.uploaded_chunks.binary_search(i).is_err())
            .collect()
    }
}

/// Body returned by `POST /upload` when a chunk is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkAck {
    pub id: String,
    pub chunk_index: u32,
    /// Number of distinct chunks recorded for the session so far.
    pub uploaded_chunks: u32,
    /// `true` when this chunk completed the upload and the merge succeeded.
    pub completed: bool,
    /// Name of the final file, present once `completed` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}
