//! Routes and multipart field names of the upload surface.

/// Chunk upload endpoint (multipart POST).
pub const ROUTE_UPLOAD: &str = "/upload";

/// Resume query endpoint; `{id}` is the upload session identifier.
pub const ROUTE_UPLOAD_STATUS: &str = "/upload-status/{id}";

/// Liveness endpoint.
pub const ROUTE_HEALTH: &str = "/health";

/// Multipart field carrying the chunk bytes.
pub const FIELD_FILE: &str = "file";
/// Multipart field carrying the 0-based chunk index.
pub const FIELD_CHUNK_INDEX: &str = "chunkIndex";
/// Multipart field carrying the declared number of chunks.
pub const FIELD_TOTAL_CHUNKS: &str = "totalChunks";
/// Multipart field carrying the final file name.
pub const FIELD_FILENAME: &str = "filename";
/// Multipart field carrying the declared total byte size.
pub const FIELD_FILE_SIZE: &str = "fileSize";
/// Multipart field carrying the upload session identifier.
pub const FIELD_ID: &str = "id";
/// Multipart field carrying an optional hex digest of the chunk.
pub const FIELD_CHECKSUM: &str = "checksum";
/// Legacy alias for [`FIELD_CHECKSUM`]; older clients always send an MD5 here.
pub const FIELD_MD5: &str = "md5";

/// Default upper bound on a single chunk body (64 MiB).
pub const DEFAULT_MAX_CHUNK_BYTES: usize = 64 * 1024 * 1024;
