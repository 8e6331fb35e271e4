use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use crate::config::ServerConfig;
use crate::state::AppState;

pub const BOUNDARY: &str = "chunkyard-test-boundary";

/// Create a wired-up router and AppState backed by a temp directory.
pub fn setup_app() -> (Router, AppState, tempfile::TempDir) {
    setup_app_with(ServerConfig::default())
}

/// Like [`setup_app`], with `upload_dir` pointed at the temp directory.
pub fn setup_app_with(config: ServerConfig) -> (Router, AppState, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("create tempdir");
    let config = ServerConfig {
        upload_dir: tmp.path().join("upload"),
        ..config
    };
    let state = AppState::new(config).expect("open upload service");
    let router = super::router(state.clone());
    (router, state, tmp)
}

/// Hand-built `multipart/form-data` body.
#[derive(Default)]
pub struct MultipartBody {
    buf: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.buf.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, data: &[u8]) -> Self {
        self.buf.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"blob\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\r\n");
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.buf
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.buf
    }
}

/// All metadata fields of one chunk plus its payload.
pub fn chunk_form(
    id: &str,
    filename: &str,
    index: u32,
    total: u32,
    file_size: u64,
    data: &[u8],
) -> MultipartBody {
    MultipartBody::new()
        .text("id", id)
        .text("filename", filename)
        .text("chunkIndex", &index.to_string())
        .text("totalChunks", &total.to_string())
        .text("fileSize", &file_size.to_string())
        .file("file", data)
}

/// Send a multipart POST to `/upload`.
pub async fn post_upload(router: Router, body: MultipartBody) -> axum::response::Response {
    let req = Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body.finish()))
        .unwrap();

    router.oneshot(req).await.unwrap()
}

/// Send a GET request.
pub async fn get(router: Router, path: &str) -> axum::response::Response {
    let req = Request::builder()
        .method("GET")
        .uri(path)
        .body(Body::empty())
        .unwrap();

    router.oneshot(req).await.unwrap()
}

/// Read full response body into `Vec<u8>`.
pub async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("collect body")
        .to_vec()
}

/// Read the response body as JSON.
pub async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).expect("parse json body")
}

/// Read the response body as UTF-8 text.
pub async fn body_text(response: axum::response::Response) -> String {
    String::from_utf8(body_bytes(response).await).expect("utf-8 body")
}

/// Assert response has expected status.
pub fn assert_status(response: &axum::response::Response, expected: StatusCode) {
    assert_eq!(
        response.status(),
        expected,
        "expected {expected}, got {}",
        response.status()
    );
}
