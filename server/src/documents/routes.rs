//! REST endpoints for document upload and retrieval.
//!
//! POST /upload: multipart upload, field `file`
//! GET /documents: pending documents for the caller (marks them retrieved)
//! GET /document/{id}: single document metadata
//! GET /document/{id}/content: raw PDF bytes
//! GET /list_documents: every document, newest first

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::AuthUser;
use crate::db::models::Document;
use crate::error::AppError;
use crate::state::AppState;

/// Filename recorded when the client sends none.
const DEFAULT_FILENAME: &str = "upload.pdf";

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub document_id: String,
}

/// Run a store call on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(AppError::join)?
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        AppError::BadRequest(e.body_text())
    }
}

/// POST /upload
pub async fn upload_pdf(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_FILENAME)
            .to_string();
        let content = field.bytes().await.map_err(multipart_error)?;
        upload = Some((filename, content));
        break;
    }

    let (filename, content) =
        upload.ok_or_else(|| AppError::BadRequest("Missing multipart field 'file'".to_string()))?;
    let size = content.len();

    let documents = state.documents.clone();
    let name_for_store = filename.clone();
    let document_id = blocking(move || documents.store(&name_for_store, &content)).await?;

    tracing::info!(
        "{} uploaded {} as {} ({} bytes)",
        user.username,
        filename,
        document_id,
        size
    );

    Ok(Json(UploadResponse { document_id }))
}

/// GET /documents
///
/// Documents the caller has not retrieved yet, oldest first. Every document
/// returned is added to the caller's retrieved set.
pub async fn get_pending_documents(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<Document>>, AppError> {
    let documents = state.documents.clone();
    let docs = blocking(move || documents.list_pending_for(&user.username)).await?;
    Ok(Json(docs))
}

/// GET /document/{id}
pub async fn get_document(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(document_id): Path<String>,
) -> Result<Json<Document>, AppError> {
    let documents = state.documents.clone();
    let doc = blocking(move || documents.get_by_id(&document_id)).await?;
    Ok(Json(doc))
}

/// GET /document/{id}/content
///
/// Raw bytes as `application/pdf`, shown inline under the original filename.
pub async fn get_document_content(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(document_id): Path<String>,
) -> Result<(HeaderMap, Vec<u8>), AppError> {
    let documents = state.documents.clone();
    let doc = blocking(move || documents.get_content(&document_id)).await?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/pdf"));
    headers.insert(header::CONTENT_DISPOSITION, content_disposition(&doc.filename));

    Ok((headers, doc.content))
}

/// GET /list_documents
pub async fn list_documents(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<Json<Vec<Document>>, AppError> {
    let documents = state.documents.clone();
    let docs = blocking(move || documents.list_all()).await?;
    Ok(Json(docs))
}

/// `inline; filename="..."`, falling back to bare `inline` when the name
/// cannot be carried in a header.
fn content_disposition(filename: &str) -> HeaderValue {
    let escaped = filename.replace(['"', '\\'], "_");
    HeaderValue::from_str(&format!("inline; filename=\"{}\"", escaped))
        .unwrap_or_else(|_| HeaderValue::from_static("inline"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition() {
        assert_eq!(
            content_disposition("report.pdf"),
            "inline; filename=\"report.pdf\""
        );
        assert_eq!(
            content_disposition("a\"b.pdf"),
            "inline; filename=\"a_b.pdf\""
        );
        assert_eq!(content_disposition("bad\nname.pdf"), "inline");
    }
}
