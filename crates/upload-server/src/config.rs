//! Server configuration.
//!
//! Read from a JSON file with camelCase keys. Every key is optional; a
//! missing file means all defaults.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chunkyard_protocol::constants::DEFAULT_MAX_CHUNK_BYTES;
use chunkyard_transfer::{CollisionPolicy, StorageLayout, UploadOptions};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub listen: String,

    /// Directory receiving final files.
    pub upload_dir: PathBuf,

    /// Chunk area. Defaults to `<uploadDir>/temp`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,

    /// Status record. Defaults to `<uploadDir>/uploadStatus.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_file: Option<PathBuf>,

    /// Largest accepted chunk payload in bytes.
    pub max_chunk_bytes: usize,

    /// Reject later chunks whose filename, size or count differ from the
    /// first chunk of the session.
    pub strict_metadata: bool,

    /// What to do when the final file name is taken.
    pub on_collision: CollisionPolicy,

    /// Log output format: "json" or "pretty".
    pub log_format: String,

    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:3000".into(),
            upload_dir: PathBuf::from("./public/upload"),
            temp_dir: None,
            status_file: None,
            max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
            strict_metadata: true,
            on_collision: CollisionPolicy::default(),
            log_format: "pretty".into(),
            log_level: "info".into(),
        }
    }
}

impl ServerConfig {
    /// Loads the config at `path`, falling back to defaults if it does not
    /// exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn layout(&self) -> StorageLayout {
        let mut layout = StorageLayout::new(&self.upload_dir);
        if let Some(temp_dir) = &self.temp_dir {
            layout = layout.with_temp_dir(temp_dir);
        }
        if let Some(status_file) = &self.status_file {
            layout = layout.with_status_file(status_file);
        }
        layout
    }

    pub fn upload_options(&self) -> UploadOptions {
        UploadOptions {
            strict_metadata: self.strict_metadata,
            on_collision: self.on_collision,
        }
    }
}
