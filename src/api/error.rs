use crate::services::proxy::ProxyError;
use crate::services::storage::StoreError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

pub const MSG_INVALID_EXTENSION: &str = "Seuls les fichiers IFC sont autorisés";
pub const MSG_MISSING_FILE: &str = "Aucun fichier fourni";
pub const MSG_MISSING_URL: &str = "URL manquante";
pub const MSG_NOT_FOUND: &str = "Fichier non trouvé";
pub const MSG_UPLOAD_FAILED: &str = "Erreur lors de l'upload du fichier";
pub const MSG_UPSTREAM_FAILED: &str = "Erreur lors de la récupération du fichier";
pub const MSG_INTERNAL: &str = "Erreur interne du serveur";

/// JSON body of every error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid extension: {0}")]
    InvalidExtension(String),

    #[error("No file provided")]
    MissingFile,

    #[error("Missing url parameter")]
    MissingUrl,

    #[error("File not found")]
    NotFound,

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidExtension(name) => AppError::InvalidExtension(name),
            StoreError::TooLarge { .. } => AppError::PayloadTooLarge(err.to_string()),
            StoreError::Io(e) => AppError::Io(e),
        }
    }
}

impl From<ProxyError> for AppError {
    fn from(err: ProxyError) -> Self {
        AppError::Upstream(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match self {
            AppError::InvalidExtension(name) => {
                tracing::warn!("Rejected upload with invalid extension: {}", name);
                (StatusCode::BAD_REQUEST, MSG_INVALID_EXTENSION, None)
            }
            AppError::MissingFile => (StatusCode::BAD_REQUEST, MSG_MISSING_FILE, None),
            AppError::MissingUrl => (StatusCode::BAD_REQUEST, MSG_MISSING_URL, None),
            AppError::NotFound => (StatusCode::NOT_FOUND, MSG_NOT_FOUND, None),
            AppError::Upstream(msg) => {
                tracing::error!("Upstream error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, MSG_UPSTREAM_FAILED, Some(msg))
            }
            AppError::Io(e) => {
                tracing::error!("Storage I/O error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    MSG_UPLOAD_FAILED,
                    Some(e.to_string()),
                )
            }
            AppError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, MSG_UPLOAD_FAILED, Some(msg))
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, MSG_UPLOAD_FAILED, Some(msg)),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, MSG_INTERNAL, Some(msg))
            }
            AppError::Anyhow(e) => {
                tracing::error!("Anyhow error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, MSG_INTERNAL, Some(e.to_string()))
            }
        };

        let body = Json(ErrorBody {
            error: error.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_client_errors_have_no_details() {
        let (status, body) = render(AppError::MissingUrl).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, serde_json::json!({ "error": "URL manquante" }));

        let (status, body) = render(AppError::NotFound).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, serde_json::json!({ "error": "Fichier non trouvé" }));

        let (status, body) = render(AppError::MissingFile).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Aucun fichier fourni");
    }

    #[tokio::test]
    async fn test_store_errors_map_to_status() {
        let (status, body) =
            render(StoreError::InvalidExtension("a.txt".to_string()).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], MSG_INVALID_EXTENSION);

        let (status, _) = render(StoreError::TooLarge { max: 1 }.into()).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only disk");
        let (status, body) = render(StoreError::Io(io).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], MSG_UPLOAD_FAILED);
        assert_eq!(body["details"], "read-only disk");
    }

    #[tokio::test]
    async fn test_upstream_error_carries_details() {
        let (status, body) = render(ProxyError::TooLarge { limit: 10 }.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], MSG_UPSTREAM_FAILED);
        assert!(body["details"].as_str().unwrap().contains("10 byte"));
    }
}
