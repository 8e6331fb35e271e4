//! On-disk placement of chunk files, staging files, final files and the
//! status record.

use std::path::{Path, PathBuf};

use crate::chunked::{TMP_SUFFIX, tmp_sibling};

/// Default name of the status record inside the output directory.
pub const STATUS_FILE_NAME: &str = "uploadStatus.json";

/// Default name of the chunk area inside the output directory.
pub const TEMP_DIR_NAME: &str = "temp";

const CHUNK_INFIX: &str = ".chunk-";
const STAGING_SUFFIX: &str = ".part";

/// Longest single path component common filesystems accept, in bytes.
pub const MAX_COMPONENT_LEN: usize = 255;

/// Digits of the largest chunk index (`u32::MAX`).
const MAX_INDEX_DIGITS: usize = 10;

/// Longest filename whose chunk files, `{filename}.chunk-{index}.tmp`,
/// still fit in one component for every `u32` index.
pub const MAX_FILENAME_LEN: usize =
    MAX_COMPONENT_LEN - CHUNK_INFIX.len() - MAX_INDEX_DIGITS - TMP_SUFFIX.len();

/// Longest upload id whose staging file, `.{id}.part`, fits in one component.
pub const MAX_ID_LEN: usize = MAX_COMPONENT_LEN - 1 - STAGING_SUFFIX.len();

/// Derives every path the upload pipeline touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    output_dir: PathBuf,
    temp_dir: PathBuf,
    status_file: PathBuf,
}

impl StorageLayout {
    /// Layout rooted at `output_dir`, with chunks under `temp/` and the
    /// status record at `uploadStatus.json` beside the final files.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        let output_dir = output_dir.into();
        Self {
            temp_dir: output_dir.join(TEMP_DIR_NAME),
            status_file: output_dir.join(STATUS_FILE_NAME),
            output_dir,
        }
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    pub fn with_status_file(mut self, status_file: impl Into<PathBuf>) -> Self {
        self.status_file = status_file.into();
        self
    }

    /// Creates the output, temp and status-record directories.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.output_dir)?;
        std::fs::create_dir_all(&self.temp_dir)?;
        if let Some(parent) = self.status_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn status_file(&self) -> &Path {
        &self.status_file
    }

    /// Directory holding every chunk of session `id`.
    pub fn chunk_dir(&self, id: &str) -> PathBuf {
        self.temp_dir.join(id)
    }

    /// Chunk file keyed by `(id, filename, index)`.
    pub fn chunk_path(&self, id: &str, filename: &str, index: u32) -> PathBuf {
        self.chunk_dir(id).join(format!("{filename}{CHUNK_INFIX}{index}"))
    }

    /// Hidden file the merge of session `id` writes into before it is
    /// renamed into place.
    ///
    /// Keyed by the id alone, which is unique per session; final file names
    /// never start with a dot, so it cannot shadow one either.
    pub fn staging_path(&self, id: &str) -> PathBuf {
        self.output_dir.join(format!(".{id}{STAGING_SUFFIX}"))
    }

    /// Final location for `filename`.
    pub fn final_path(&self, filename: &str) -> PathBuf {
        self.output_dir.join(filename)
    }

    /// Returns `true` if a final file named `filename` would land on the
    /// chunk area or the status record.
    pub fn is_reserved(&self, filename: &str) -> bool {
        let target = self.final_path(filename);
        target == self.temp_dir
            || target == self.status_file
            || target == tmp_sibling(&self.status_file)
    }
}
