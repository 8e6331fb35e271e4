//! Wire types shared by the chunkyard upload server and its clients.
//!
//! Everything here is plain serde data: the JSON bodies returned by the
//! HTTP surface, the session state enum that also lands in the persisted
//! status record, and the names of the multipart fields a client sends.

pub mod constants;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use messages::{ChunkAck, UploadStatusResponse};
pub use types::SessionState;
