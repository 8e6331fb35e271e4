//! Chunked upload session tracking and reassembly.
//!
//! A client sends a large file as independently transmitted chunks. Each
//! chunk is validated and persisted by the [`ChunkReceiver`], which records
//! it in the [`SessionStore`]. When the last missing index arrives the
//! [`MergeEngine`] streams every chunk, in index order, into the final file.
//! The [`StatusReporter`] answers "which indices do you already have?" so an
//! interrupted client can resume.
//!
//! All I/O here is blocking; async callers should run it on a blocking pool.

mod chunked;
mod layout;
mod merge;
mod receiver;
mod service;
mod status;
mod store;
mod sync;
mod types;
mod validation;

pub use chunked::{ChunkWriter, checksum_bytes, md5_hex, verify_checksum};
pub use layout::{MAX_FILENAME_LEN, MAX_ID_LEN, StorageLayout};
pub use merge::{MergeEngine, MergeReport};
pub use receiver::{ChunkReceiver, ReceiveOutcome};
pub use service::UploadService;
pub use status::StatusReporter;
pub use store::SessionStore;
pub use types::{ChunkUpload, CollisionPolicy, UploadOptions, UploadSession};
pub use validation::{validate_filename, validate_upload_id};

pub use chunkyard_protocol::SessionState;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("status record error: {0}")]
    Record(#[from] serde_json::Error),

    #[error(transparent)]
    Merge(#[from] MergeError),
}

/// Client-side faults; the chunk is not persisted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no payload")]
    NoPayload,

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("index out of range")]
    IndexOutOfRange,

    #[error("invalid upload id: {0}")]
    InvalidId(String),

    #[error("invalid filename: {0}")]
    InvalidFilename(String),

    #[error("session metadata mismatch: {0}")]
    MetadataMismatch(String),

    #[error("upload already completed")]
    AlreadyCompleted,
}

/// Reassembly faults.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    #[error("missing chunk {0}")]
    MissingChunk(u32),
}

/// Coarse classification of an [`UploadError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Storage,
    Merge,
}

impl UploadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UploadError::Validation(_) => ErrorKind::Validation,
            UploadError::Storage(_) | UploadError::Record(_) => ErrorKind::Storage,
            UploadError::Merge(_) => ErrorKind::Merge,
        }
    }

    /// Storage failures may succeed on retry; everything else needs the
    /// client to change what it sends.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Storage
    }
}
