//! Read-only resume queries.

use std::collections::BTreeSet;
use std::sync::Arc;

use chunkyard_protocol::UploadStatusResponse;

use crate::store::SessionStore;

/// Answers which chunk indices a session already holds.
///
/// An unknown id is not an error: a brand-new upload simply has no chunks.
#[derive(Clone)]
pub struct StatusReporter {
    store: Arc<SessionStore>,
}

impl StatusReporter {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }

    /// Received indices for `id`, empty if the id is unknown.
    pub fn query(&self, id: &str) -> BTreeSet<u32> {
        self.store
            .get(id)
            .map(|s| s.received_chunks)
            .unwrap_or_default()
    }

    /// Status body for `id`, with state and chunk count when known.
    pub fn report(&self, id: &str) -> UploadStatusResponse {
        self.store
            .get(id)
            .map(|s| s.to_status())
            .unwrap_or_else(UploadStatusResponse::empty)
    }
}
