//! Wiring of store, receiver and reporter over one storage layout.

use std::sync::Arc;

use chunkyard_protocol::UploadStatusResponse;

use crate::UploadError;
use crate::layout::StorageLayout;
use crate::receiver::{ChunkReceiver, ReceiveOutcome};
use crate::status::StatusReporter;
use crate::store::SessionStore;
use crate::types::{ChunkUpload, UploadOptions};

/// Single entry point for an upload front end.
pub struct UploadService {
    layout: StorageLayout,
    receiver: ChunkReceiver,
    reporter: StatusReporter,
}

impl UploadService {
    /// Creates the directories, loads the status record and repairs any
    /// session left inconsistent by a previous crash.
    pub fn open(layout: StorageLayout, options: UploadOptions) -> Result<Self, UploadError> {
        layout.ensure_dirs()?;
        let store = Arc::new(SessionStore::open(layout.status_file())?);
        let receiver = ChunkReceiver::new(Arc::clone(&store), layout.clone(), options);
        let reporter = StatusReporter::new(store);

        let dropped = receiver.reconcile()?;
        if dropped > 0 {
            tracing::warn!(dropped, "reconciled status record with chunk files on disk");
        }
        tracing::info!(
            output_dir = %layout.output_dir().display(),
            sessions = receiver.store().len(),
            "upload service ready"
        );

        Ok(Self {
            layout,
            receiver,
            reporter,
        })
    }

    pub fn receive(&self, chunk: ChunkUpload) -> Result<ReceiveOutcome, UploadError> {
        self.receiver.receive(chunk)
    }

    pub fn status(&self, id: &str) -> UploadStatusResponse {
        self.reporter.report(id)
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        self.receiver.store()
    }

    pub fn receiver(&self) -> &ChunkReceiver {
        &self.receiver
    }

    pub fn reporter(&self) -> &StatusReporter {
        &self.reporter
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }
}
