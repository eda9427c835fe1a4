#[allow(unused_imports)] // referenced by name in #[utoipa::path] responses
use crate::api::error::ErrorBody;
use crate::api::error::AppError;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::Response,
};
use tokio_util::io::ReaderStream;

#[utoipa::path(
    get,
    path = "/api/files/{filename}",
    params(
        ("filename" = String, Path, description = "Generated name returned by the upload")
    ),
    responses(
        (status = 200, description = "Raw file bytes", content_type = "application/octet-stream"),
        (status = 404, description = "Unknown file", body = ErrorBody)
    ),
    tag = "files"
)]
pub async fn download_file(
    State(state): State<crate::AppState>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let object = state
        .storage
        .open(&filename)
        .await?
        .ok_or(AppError::NotFound)?;

    tracing::info!("📤 Serving {} ({} bytes)", filename, object.size_bytes);

    let body = Body::from_stream(ReaderStream::new(object.file));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime::APPLICATION_OCTET_STREAM.as_ref())
        .header(header::CONTENT_LENGTH, object.size_bytes)
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header(header::X_CONTENT_TYPE_OPTIONS, "nosniff")
        .body(body)
        .map_err(|e| AppError::Internal(e.to_string()))
}
