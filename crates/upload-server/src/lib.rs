//! HTTP front end for chunked uploads.
//!
//! `POST /upload` takes one chunk as a multipart form, `GET /upload-status/{id}`
//! reports which chunk indices the server already holds. All file work is
//! delegated to [`chunkyard_transfer::UploadService`] on the blocking pool.

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

pub use config::ServerConfig;
pub use error::ServerError;
pub use handlers::router;
pub use state::AppState;
