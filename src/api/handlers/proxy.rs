#[allow(unused_imports)] // referenced by name in #[utoipa::path] responses
use crate::api::error::ErrorBody;
use crate::api::error::AppError;
use axum::{
    body::Body,
    extract::{Query, State},
    http::header,
    response::Response,
};
use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProxyQuery {
    /// Remote http(s) URL of the IFC file
    pub url: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/proxy",
    params(ProxyQuery),
    responses(
        (status = 200, description = "Proxied remote bytes with the upstream content type"),
        (status = 400, description = "Missing url parameter", body = ErrorBody),
        (status = 500, description = "Upstream fetch failed", body = ErrorBody)
    ),
    tag = "files"
)]
pub async fn proxy_file(
    State(state): State<crate::AppState>,
    Query(query): Query<ProxyQuery>,
) -> Result<Response, AppError> {
    let target = query
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or(AppError::MissingUrl)?;

    let upstream = state.proxy.fetch(target.trim()).await?;

    if !upstream.status.is_success() {
        tracing::warn!("Upstream {} answered {}", target, upstream.status);
    }

    let mut builder = Response::builder()
        .status(upstream.status)
        .header(header::CONTENT_TYPE, upstream.content_type)
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*");

    if let Some(len) = upstream.content_length {
        builder = builder.header(header::CONTENT_LENGTH, len);
    }

    builder
        .body(Body::from_stream(upstream.body))
        .map_err(|e| AppError::Internal(e.to_string()))
}
