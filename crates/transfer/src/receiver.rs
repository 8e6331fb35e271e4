//! Per-chunk intake: validate, persist, record, and trigger the merge.

use std::sync::Arc;

use chunkyard_protocol::SessionState;

use crate::chunked::{ChunkWriter, verify_checksum};
use crate::layout::StorageLayout;
use crate::merge::{MergeEngine, MergeReport};
use crate::store::SessionStore;
use crate::types::{ChunkUpload, UploadOptions, UploadSession};
use crate::validation::{validate_filename, validate_upload_id};
use crate::{UploadError, ValidationError};

/// Result of accepting one chunk.
#[derive(Debug, Clone)]
pub enum ReceiveOutcome {
    /// The chunk is persisted and recorded; more chunks are outstanding.
    Stored(UploadSession),
    /// The chunk completed the session and the merge succeeded.
    Completed {
        session: UploadSession,
        report: MergeReport,
    },
}

impl ReceiveOutcome {
    pub fn session(&self) -> &UploadSession {
        match self {
            ReceiveOutcome::Stored(session) => session,
            ReceiveOutcome::Completed { session, .. } => session,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, ReceiveOutcome::Completed { .. })
    }
}

/// Accepts chunks for any number of sessions.
///
/// Everything that touches one session's state (metadata check, chunk
/// write, record, completion check, merge) runs under that session's lock,
/// so recorded indices are never lost and a session merges at most once.
pub struct ChunkReceiver {
    store: Arc<SessionStore>,
    writer: ChunkWriter,
    merger: MergeEngine,
    options: UploadOptions,
}

impl ChunkReceiver {
    pub fn new(store: Arc<SessionStore>, layout: StorageLayout, options: UploadOptions) -> Self {
        Self {
            store,
            writer: ChunkWriter::new(layout.clone()),
            merger: MergeEngine::new(layout, options.on_collision),
            options,
        }
    }

    /// Validates, persists and records one chunk.
    ///
    /// Validation runs in a fixed order: payload present, checksum (when
    /// supplied), index in range, then id and filename safety. A rejected
    /// chunk is neither written nor recorded.
    pub fn receive(&self, chunk: ChunkUpload) -> Result<ReceiveOutcome, UploadError> {
        let (index, total) = validate_chunk(&chunk)?;
        validate_upload_id(&chunk.id)?;
        validate_filename(&chunk.filename)?;

        self.store
            .with_session_lock(&chunk.id, || self.receive_locked(&chunk, index, total))
    }

    fn receive_locked(
        &self,
        chunk: &ChunkUpload,
        index: u32,
        total: u32,
    ) -> Result<ReceiveOutcome, UploadError> {
        let existing = self.store.get(&chunk.id);

        // Chunk keys and completion use the session's first-seen metadata.
        let (filename, total) = match &existing {
            Some(session) => {
                if session.state.is_completed() {
                    return Err(ValidationError::AlreadyCompleted.into());
                }
                if self.options.strict_metadata {
                    check_metadata(session, chunk, total)?;
                }
                if index >= session.total_chunks {
                    return Err(ValidationError::IndexOutOfRange.into());
                }
                (session.filename.clone(), session.total_chunks)
            }
            None => (chunk.filename.clone(), total),
        };
        if self.writer.layout().is_reserved(&filename) {
            return Err(
                ValidationError::InvalidFilename(format!("reserved name: {filename}")).into(),
            );
        }

        self.writer
            .write_chunk(&chunk.id, &filename, index, &chunk.data)?;
        let session =
            self.store
                .record_chunk(&chunk.id, &filename, index, chunk.declared_size, total)?;

        if session.state == SessionState::Receiving && session.is_complete(total) {
            return self.complete(session);
        }
        Ok(ReceiveOutcome::Stored(session))
    }

    fn complete(&self, session: UploadSession) -> Result<ReceiveOutcome, UploadError> {
        self.store.set_state(&session.id, SessionState::Merging)?;

        let report = match self
            .merger
            .merge(&session.id, &session.filename, session.total_chunks)
        {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(id = %session.id, error = %e, "merge failed");
                if let Err(re) = self.reconcile_session(&session) {
                    tracing::warn!(id = %session.id, error = %re, "reconcile after failed merge failed");
                }
                return Err(e);
            }
        };

        if report.bytes_written != session.declared_size {
            tracing::warn!(
                id = %session.id,
                declared = session.declared_size,
                actual = report.bytes_written,
                "merged size differs from declared size"
            );
        }

        let session = self
            .store
            .mark_completed(&session.id, &report.output_name)?
            .unwrap_or(session);
        Ok(ReceiveOutcome::Completed { session, report })
    }

    /// Brings every unfinished session back in line with the chunk files
    /// actually on disk.
    ///
    /// Indices whose file is gone are dropped, interrupted merges return to
    /// `receiving`, and stale staging files are removed. Returns the number
    /// of indices dropped.
    pub fn reconcile(&self) -> Result<usize, UploadError> {
        let mut dropped = 0;
        for session in self.store.snapshot() {
            if session.state.is_completed() {
                continue;
            }
            dropped += self
                .store
                .with_session_lock(&session.id, || self.reconcile_session(&session))?
                .len();
        }
        Ok(dropped)
    }

    fn reconcile_session(&self, session: &UploadSession) -> Result<Vec<u32>, UploadError> {
        let staging = self.writer.layout().staging_path(&session.id);
        if let Err(e) = std::fs::remove_file(&staging)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %staging.display(), error = %e, "failed to remove staging file");
        }

        let dropped = self
            .store
            .retain_chunks(&session.id, |i| {
                self.writer.has_chunk(&session.id, &session.filename, i)
            })?
            .unwrap_or_default();
        if !dropped.is_empty() {
            tracing::warn!(
                id = %session.id,
                ?dropped,
                "dropped recorded chunks with no file on disk"
            );
        }
        Ok(dropped)
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }
}

/// Runs the ordered payload checks and returns `(index, total)`.
fn validate_chunk(chunk: &ChunkUpload) -> Result<(u32, u32), ValidationError> {
    if chunk.data.is_empty() {
        return Err(ValidationError::NoPayload);
    }

    if let Some(expected) = chunk.checksum.as_deref().filter(|c| !c.trim().is_empty())
        && !verify_checksum(&chunk.data, expected)
    {
        return Err(ValidationError::ChecksumMismatch);
    }

    if chunk.chunk_index < 0 || chunk.chunk_index >= chunk.total_chunks {
        return Err(ValidationError::IndexOutOfRange);
    }
    let index = u32::try_from(chunk.chunk_index).map_err(|_| ValidationError::IndexOutOfRange)?;
    let total = u32::try_from(chunk.total_chunks).map_err(|_| ValidationError::IndexOutOfRange)?;
    Ok((index, total))
}

fn check_metadata(
    session: &UploadSession,
    chunk: &ChunkUpload,
    total: u32,
) -> Result<(), ValidationError> {
    if session.filename != chunk.filename {
        return Err(ValidationError::MetadataMismatch(format!(
            "filename {:?} differs from {:?}",
            chunk.filename, session.filename
        )));
    }
    if session.declared_size != chunk.declared_size {
        return Err(ValidationError::MetadataMismatch(format!(
            "fileSize {} differs from {}",
            chunk.declared_size, session.declared_size
        )));
    }
    if session.total_chunks != total {
        return Err(ValidationError::MetadataMismatch(format!(
            "totalChunks {} differs from {}",
            total, session.total_chunks
        )));
    }
    Ok(())
}
