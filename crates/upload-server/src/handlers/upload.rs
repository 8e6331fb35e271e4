use std::str::FromStr;

use axum::Json;
use axum::extract::multipart::Field;
use axum::extract::{Multipart, State};
use chunkyard_protocol::ChunkAck;
use chunkyard_protocol::constants::{
    FIELD_CHECKSUM, FIELD_CHUNK_INDEX, FIELD_FILE, FIELD_FILE_SIZE, FIELD_FILENAME, FIELD_ID,
    FIELD_MD5, FIELD_TOTAL_CHUNKS,
};
use chunkyard_transfer::{ChunkUpload, ReceiveOutcome, UploadError, ValidationError};

use crate::error::ServerError;
use crate::state::AppState;

/// Fields collected from one multipart request.
#[derive(Debug, Default)]
struct ChunkForm {
    id: Option<String>,
    filename: Option<String>,
    chunk_index: Option<i64>,
    total_chunks: Option<i64>,
    file_size: Option<u64>,
    checksum: Option<String>,
    /// Legacy digest field; only consulted when `checksum` is absent.
    md5: Option<String>,
    data: Option<Vec<u8>>,
}

impl ChunkForm {
    async fn read(multipart: &mut Multipart, max_chunk_bytes: usize) -> Result<Self, ServerError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            match name.as_str() {
                FIELD_FILE => form.data = Some(read_payload(field, max_chunk_bytes).await?),
                FIELD_ID => form.id = Some(field.text().await?.trim().to_string()),
                FIELD_FILENAME => form.filename = Some(field.text().await?.trim().to_string()),
                FIELD_CHUNK_INDEX => form.chunk_index = Some(parse_number(&name, field).await?),
                FIELD_TOTAL_CHUNKS => form.total_chunks = Some(parse_number(&name, field).await?),
                FIELD_FILE_SIZE => form.file_size = Some(parse_number(&name, field).await?),
                FIELD_CHECKSUM => form.checksum = Some(field.text().await?),
                FIELD_MD5 => form.md5 = Some(field.text().await?),
                _ => tracing::debug!(field = %name, "ignoring unknown multipart field"),
            }
        }
        Ok(form)
    }

    /// Builds the core request. A missing payload is reported before any
    /// missing metadata; a missing `id` falls back to the filename.
    fn into_chunk(self) -> Result<ChunkUpload, ServerError> {
        let data = self.data.unwrap_or_default();
        if data.is_empty() {
            return Err(UploadError::from(ValidationError::NoPayload).into());
        }
        let checksum = pick_checksum(self.checksum, self.md5)?;
        let filename = self.filename.ok_or_else(|| missing(FIELD_FILENAME))?;
        let id = match self.id {
            Some(id) if !id.is_empty() => id,
            _ => filename.clone(),
        };
        Ok(ChunkUpload {
            id,
            filename,
            chunk_index: self.chunk_index.ok_or_else(|| missing(FIELD_CHUNK_INDEX))?,
            total_chunks: self.total_chunks.ok_or_else(|| missing(FIELD_TOTAL_CHUNKS))?,
            declared_size: self.file_size.unwrap_or(0),
            data,
            checksum,
        })
    }
}

/// `checksum` wins over the legacy `md5` field; two different digests are
/// rejected rather than silently picking one.
fn pick_checksum(
    checksum: Option<String>,
    md5: Option<String>,
) -> Result<Option<String>, ServerError> {
    let present = |d: Option<String>| d.filter(|d| !d.trim().is_empty());
    match (present(checksum), present(md5)) {
        (Some(checksum), Some(md5)) if !checksum.trim().eq_ignore_ascii_case(md5.trim()) => {
            Err(ServerError::BadRequest(format!(
                "conflicting digests in {FIELD_CHECKSUM} and {FIELD_MD5}"
            )))
        }
        (Some(checksum), _) => Ok(Some(checksum)),
        (None, md5) => Ok(md5),
    }
}

fn missing(field: &str) -> ServerError {
    ServerError::BadRequest(format!("missing field {field}"))
}

async fn parse_number<T: FromStr>(name: &str, field: Field<'_>) -> Result<T, ServerError> {
    let text = field.text().await?;
    text.trim()
        .parse()
        .map_err(|_| ServerError::BadRequest(format!("invalid {name}: {:?}", text.trim())))
}

async fn read_payload(mut field: Field<'_>, max_chunk_bytes: usize) -> Result<Vec<u8>, ServerError> {
    let mut data = Vec::new();
    while let Some(bytes) = field.chunk().await? {
        if data.len() + bytes.len() > max_chunk_bytes {
            return Err(ServerError::PayloadTooLarge(format!(
                "chunk exceeds {max_chunk_bytes} bytes"
            )));
        }
        data.extend_from_slice(&bytes);
    }
    Ok(data)
}

/// POST /upload: store one chunk, merging when it completes the upload.
pub async fn upload_chunk(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ChunkAck>, ServerError> {
    let form = ChunkForm::read(&mut multipart, state.config().max_chunk_bytes).await?;
    let chunk = form.into_chunk()?;
    let id = chunk.id.clone();
    let chunk_index = u32::try_from(chunk.chunk_index).unwrap_or_default();

    let outcome =
        tokio::task::spawn_blocking(move || state.service().receive(chunk)).await??;

    let file = match &outcome {
        ReceiveOutcome::Completed { report, .. } => Some(report.output_name.clone()),
        ReceiveOutcome::Stored(_) => None,
    };
    let uploaded_chunks =
        u32::try_from(outcome.session().received_chunks.len()).unwrap_or(u32::MAX);
    tracing::info!(id = %id, chunk = chunk_index, uploaded_chunks, "chunk stored");

    Ok(Json(ChunkAck {
        id,
        chunk_index,
        uploaded_chunks,
        completed: outcome.is_completed(),
        file,
    }))
}
