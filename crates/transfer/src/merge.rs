//! Order-preserving reassembly of a session's chunk files.

use std::fs::File;
use std::io::{BufWriter, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::layout::StorageLayout;
use crate::sync::lock_unpoisoned;
use crate::types::CollisionPolicy;
use crate::{MergeError, UploadError};

/// Outcome of a successful merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub id: String,
    /// Where the final file was written.
    pub final_path: PathBuf,
    /// File name of `final_path` (differs from the requested name after a
    /// collision rename).
    pub output_name: String,
    pub bytes_written: u64,
    pub chunks_merged: u32,
}

/// Streams chunks `0..total_chunks` into one final file.
///
/// The output is assembled in a hidden staging file and only renamed to
/// its final name once every chunk has been appended, so a failed merge
/// never leaves a valid-looking truncated file behind.
pub struct MergeEngine {
    layout: StorageLayout,
    on_collision: CollisionPolicy,
    /// Serialises picking a free final name and renaming into it.
    publish: Mutex<()>,
}

impl MergeEngine {
    pub fn new(layout: StorageLayout, on_collision: CollisionPolicy) -> Self {
        Self {
            layout,
            on_collision,
            publish: Mutex::new(()),
        }
    }

    /// Merges every chunk of `(id, filename)` in ascending index order.
    ///
    /// Fails with [`MergeError::MissingChunk`] naming the lowest absent
    /// index before any output is created. Each chunk file is deleted right
    /// after its bytes are appended; a merge that fails on I/O part-way has
    /// already consumed the earlier chunks.
    pub fn merge(
        &self,
        id: &str,
        filename: &str,
        total_chunks: u32,
    ) -> Result<MergeReport, UploadError> {
        if let Some(index) = self.first_missing(id, filename, total_chunks) {
            tracing::warn!(id, chunk = index, "merge refused: chunk missing");
            return Err(MergeError::MissingChunk(index).into());
        }

        tracing::info!(id, filename, total_chunks, "merging chunks");
        let staging = self.layout.staging_path(id);
        let bytes_written = match self.stream_chunks(id, filename, total_chunks, &staging) {
            Ok(n) => n,
            Err(e) => {
                if let Err(rm) = std::fs::remove_file(&staging)
                    && rm.kind() != ErrorKind::NotFound
                {
                    tracing::warn!(path = %staging.display(), error = %rm, "failed to remove staging file");
                }
                return Err(e);
            }
        };

        let final_path = self.publish(&staging, filename)?;
        let output_name = final_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename.to_string());

        // The chunk directory is empty now; a leftover entry just stays.
        let _ = std::fs::remove_dir(self.layout.chunk_dir(id));

        tracing::info!(
            id,
            path = %final_path.display(),
            bytes = bytes_written,
            "merge complete"
        );
        Ok(MergeReport {
            id: id.to_string(),
            final_path,
            output_name,
            bytes_written,
            chunks_merged: total_chunks,
        })
    }

    fn first_missing(&self, id: &str, filename: &str, total_chunks: u32) -> Option<u32> {
        if total_chunks == 0 {
            return Some(0);
        }
        (0..total_chunks).find(|&i| !self.layout.chunk_path(id, filename, i).is_file())
    }

    fn stream_chunks(
        &self,
        id: &str,
        filename: &str,
        total_chunks: u32,
        staging: &Path,
    ) -> Result<u64, UploadError> {
        let mut out = BufWriter::new(File::create(staging)?);
        let mut total: u64 = 0;

        for index in 0..total_chunks {
            let path = self.layout.chunk_path(id, filename, index);
            let mut chunk = match File::open(&path) {
                Ok(f) => f,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(MergeError::MissingChunk(index).into());
                }
                Err(e) => return Err(e.into()),
            };
            total += std::io::copy(&mut chunk, &mut out)?;
            drop(chunk);
            std::fs::remove_file(&path)?;
            tracing::debug!(id, chunk = index, "chunk merged");
        }

        let file = out.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(total)
    }

    fn publish(&self, staging: &Path, filename: &str) -> Result<PathBuf, UploadError> {
        let _guard = lock_unpoisoned(&self.publish, "merge publish");
        let target = self.choose_target(filename)?;
        if let Err(e) = std::fs::rename(staging, &target) {
            let _ = std::fs::remove_file(staging);
            return Err(e.into());
        }
        Ok(target)
    }

    fn choose_target(&self, filename: &str) -> std::io::Result<PathBuf> {
        let first = self.layout.final_path(filename);
        if self.on_collision == CollisionPolicy::Replace || !first.exists() {
            return Ok(first);
        }

        let name = Path::new(filename);
        let stem = name
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename.to_string());
        let ext = name.extension().map(|e| e.to_string_lossy().into_owned());

        (1..=u32::MAX)
            .map(|n| match &ext {
                Some(ext) => self.layout.final_path(&format!("{stem}-{n}.{ext}")),
                None => self.layout.final_path(&format!("{stem}-{n}")),
            })
            .find(|p| !p.exists())
            .ok_or_else(|| {
                std::io::Error::new(ErrorKind::AlreadyExists, format!("no free name for {filename}"))
            })
    }
}
