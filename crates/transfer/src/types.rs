use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chunkyard_protocol::{SessionState, UploadStatusResponse};

/// Tracked state of one chunked upload, as persisted in the status record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    /// Caller-supplied identifier, unique per upload attempt.
    pub id: String,
    /// Target name of the reassembled file.
    pub filename: String,
    /// Total byte size the client asserted; advisory only.
    #[serde(rename = "fileSize")]
    pub declared_size: u64,
    /// Declared number of chunks, fixed by the first chunk received.
    pub total_chunks: u32,
    /// Indices persisted so far.
    #[serde(rename = "uploadedChunks")]
    pub received_chunks: BTreeSet<u32>,
    #[serde(default)]
    pub state: SessionState,
    /// Name the final file actually received (differs from `filename`
    /// after a collision rename).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl UploadSession {
    /// Creates an empty session in the `receiving` state.
    pub fn new(id: &str, filename: &str, declared_size: u64, total_chunks: u32) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            filename: filename.to_string(),
            declared_size,
            total_chunks,
            received_chunks: BTreeSet::new(),
            state: SessionState::Receiving,
            output_name: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Returns `true` iff the received set is exactly `{0, …, total_chunks-1}`.
    pub fn is_complete(&self, total_chunks: u32) -> bool {
        if total_chunks == 0 || self.received_chunks.len() != total_chunks as usize {
            return false;
        }
        // A BTreeSet of the right size whose largest element is in range
        // cannot have gaps.
        self.received_chunks
            .last()
            .is_some_and(|&max| max == total_chunks - 1)
    }

    /// Returns the status body reported to resuming clients.
    pub fn to_status(&self) -> UploadStatusResponse {
        UploadStatusResponse {
            uploaded_chunks: self.received_chunks.iter().copied().collect(),
            state: Some(self.state),
            total_chunks: Some(self.total_chunks),
        }
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// One chunk as handed to the [`ChunkReceiver`](crate::ChunkReceiver).
///
/// Indices arrive as signed integers so that range validation happens here
/// rather than in every transport's parser.
#[derive(Debug, Clone)]
pub struct ChunkUpload {
    pub id: String,
    pub filename: String,
    pub chunk_index: i64,
    pub total_chunks: i64,
    pub declared_size: u64,
    pub data: Vec<u8>,
    /// Hex MD5 or SHA-256 digest of `data`.
    pub checksum: Option<String>,
}

/// What the merge does when the final file name is already taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Write to the first free `name-N.ext` sibling.
    #[default]
    Rename,
    /// Overwrite the existing file.
    Replace,
}

/// Behaviour switches for the receiver and merge engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOptions {
    /// Reject later chunks whose filename, size, or chunk count differ from
    /// the first chunk of the session. When off, the first values win.
    pub strict_metadata: bool,
    pub on_collision: CollisionPolicy,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            strict_metadata: true,
            on_collision: CollisionPolicy::Rename,
        }
    }
}
