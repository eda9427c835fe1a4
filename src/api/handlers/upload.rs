#[allow(unused_imports)] // referenced by name in #[utoipa::path] responses
use crate::api::error::ErrorBody;
use crate::api::error::AppError;
use crate::models::StoredFile;
use crate::utils::validation::validate_extension;
use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::io::StreamReader;
use utoipa::ToSchema;

pub const MSG_UPLOAD_OK: &str = "Fichier uploadé avec succès";

/// Multipart field carrying the IFC file
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadedFileInfo {
    pub filename: String,
    #[serde(rename = "originalname")]
    pub original_name: String,
    pub size: u64,
    pub path: String,
    pub url: String,
}

impl From<StoredFile> for UploadedFileInfo {
    fn from(stored: StoredFile) -> Self {
        Self {
            filename: stored.generated_name,
            original_name: stored.original_name,
            size: stored.size_bytes,
            path: stored.storage_path,
            url: stored.retrieval_url,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub success: bool,
    pub file: UploadedFileInfo,
    pub message: String,
}

#[utoipa::path(
    post,
    path = "/api/upload",
    request_body(content = Multipart, description = "IFC file in the `file` field"),
    responses(
        (status = 200, description = "File stored", body = UploadResponse),
        (status = 400, description = "No file or not an IFC file", body = ErrorBody),
        (status = 413, description = "File too large", body = ErrorBody),
        (status = 500, description = "Storage failure", body = ErrorBody)
    ),
    tag = "files"
)]
pub async fn upload_file(
    State(state): State<crate::AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!("Upload without multipart body: {}", e);
        AppError::MissingFile
    })?;

    let mut stored = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        let err_msg = e.to_string();
        if err_msg.contains("length limit exceeded") {
            AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
        } else {
            AppError::BadRequest(err_msg)
        }
    })? {
        if field.name() != Some(FILE_FIELD) || stored.is_some() {
            continue;
        }

        let Some(original_name) = field.file_name().map(str::to_string) else {
            continue;
        };

        // Reject before a single byte reaches the disk
        validate_extension(&original_name)
            .map_err(|_| AppError::InvalidExtension(original_name.clone()))?;

        let reader = StreamReader::new(field.map_err(std::io::Error::other));

        stored = Some(
            state
                .storage
                .store_stream(&original_name, Box::pin(reader))
                .await?,
        );
    }

    let stored = stored.ok_or(AppError::MissingFile)?;

    tracing::info!(
        "📦 Upload complete: {} -> {}",
        stored.original_name,
        stored.retrieval_url
    );

    Ok(Json(UploadResponse {
        success: true,
        file: stored.into(),
        message: MSG_UPLOAD_OK.to_string(),
    }))
}
