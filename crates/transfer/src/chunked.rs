use std::io::Write;
use std::path::{Path, PathBuf};

use md5::Md5;
use sha2::{Digest, Sha256};

use crate::layout::StorageLayout;

// ---------------------------------------------------------------------------
// Checksum helpers
// ---------------------------------------------------------------------------

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Computes MD5 of `data` and returns the hex-encoded digest.
pub fn md5_hex(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Checks `data` against a hex digest supplied by the client.
///
/// The digest length picks the algorithm: 32 hex chars is MD5, 64 is
/// SHA-256. Comparison ignores case. Any other length never matches.
pub fn verify_checksum(data: &[u8], expected: &str) -> bool {
    let expected = expected.trim();
    let actual = match expected.len() {
        32 => md5_hex(data),
        64 => checksum_bytes(data),
        _ => return false,
    };
    actual.eq_ignore_ascii_case(expected)
}

// ---------------------------------------------------------------------------
// ChunkWriter
// ---------------------------------------------------------------------------

/// Persists chunk payloads into the temp area.
///
/// Each chunk goes to a sibling temp file first and is renamed over its
/// final key, so a chunk file on disk is always complete. Writing the same
/// key again replaces the earlier bytes.
#[derive(Debug, Clone)]
pub struct ChunkWriter {
    layout: StorageLayout,
}

impl ChunkWriter {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    /// Writes `data` as chunk `index` of `(id, filename)` and returns its path.
    pub fn write_chunk(
        &self,
        id: &str,
        filename: &str,
        index: u32,
        data: &[u8],
    ) -> std::io::Result<PathBuf> {
        let path = self.layout.chunk_path(id, filename, index);
        std::fs::create_dir_all(self.layout.chunk_dir(id))?;

        let tmp = tmp_sibling(&path);
        let result = write_synced(&tmp, data).and_then(|()| std::fs::rename(&tmp, &path));
        if let Err(e) = result {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }

        tracing::debug!(id, chunk = index, bytes = data.len(), "chunk persisted");
        Ok(path)
    }

    /// Returns `true` if chunk `index` of `(id, filename)` is on disk.
    pub fn has_chunk(&self, id: &str, filename: &str, index: u32) -> bool {
        self.layout.chunk_path(id, filename, index).is_file()
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }
}

/// Writes `data` to `path` and fsyncs it before returning.
pub(crate) fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(data)?;
    file.sync_all()
}

/// Suffix of the sibling a file is written to before being renamed into place.
pub(crate) const TMP_SUFFIX: &str = ".tmp";

pub(crate) fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(TMP_SUFFIX);
    path.with_file_name(name)
}
