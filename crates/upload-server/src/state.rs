use std::sync::Arc;

use chunkyard_transfer::{UploadError, UploadService};

use crate::config::ServerConfig;

/// Shared application state, cheap to clone into handlers and blocking
/// tasks.
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub config: ServerConfig,
    pub service: UploadService,
}

impl AppState {
    /// Opens the upload service described by `config`.
    pub fn new(config: ServerConfig) -> Result<Self, UploadError> {
        let service = UploadService::open(config.layout(), config.upload_options())?;
        Ok(Self {
            inner: Arc::new(AppStateInner { config, service }),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    pub fn service(&self) -> &UploadService {
        &self.inner.service
    }
}
