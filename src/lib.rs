pub mod api;
pub mod client;
pub mod config;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::ViewerConfig;
use crate::services::proxy::ProxyService;
use crate::services::storage::{LocalStorageService, StorageService};
use crate::api::middleware::request_id::REQUEST_ID_HEADER;
use axum::{
    Router,
    http::{HeaderValue, Method, Request, Response, header},
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Room for multipart boundaries and headers on top of the file itself
const MULTIPART_OVERHEAD: usize = 10 * 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::upload::upload_file,
        api::handlers::files::download_file,
        api::handlers::proxy::proxy_file,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::upload::UploadResponse,
            api::handlers::upload::UploadedFileInfo,
            api::handlers::health::HealthResponse,
            api::error::ErrorBody,
        )
    ),
    tags(
        (name = "files", description = "IFC upload, retrieval and remote proxy"),
        (name = "system", description = "Liveness")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn StorageService>,
    pub proxy: Arc<ProxyService>,
    pub config: ViewerConfig,
}

impl AppState {
    /// Builds the local-disk upload store and the proxy client from `config`.
    pub fn from_config(config: ViewerConfig) -> anyhow::Result<Self> {
        let storage = Arc::new(LocalStorageService::new(
            config.upload_dir.clone(),
            config.max_file_size as u64,
        ));
        let proxy = Arc::new(ProxyService::new(
            config.proxy_timeout(),
            config.proxy_max_bytes,
        )?);

        Ok(Self {
            storage,
            proxy,
            config,
        })
    }
}

/// CORS for the upload and health routes: only the configured origins.
fn restricted_cors(config: &ViewerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Files and proxied bytes must be readable by the viewer from any origin.
fn open_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET])
}

pub fn create_app(state: AppState) -> Router {
    let restricted = Router::new()
        .route("/api/upload", post(api::handlers::upload::upload_file))
        .route("/api/health", get(api::handlers::health::health_check))
        .layer(restricted_cors(&state.config));

    let open = Router::new()
        .route(
            "/api/files/:filename",
            get(api::handlers::files::download_file),
        )
        .route("/api/proxy", get(api::handlers::proxy::proxy_file))
        .layer(open_cors());

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            let request_id = request
                .headers()
                .get(&REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri().path(),
                request_id = %request_id,
            )
        })
        .on_request(|request: &Request<_>, _span: &tracing::Span| {
            tracing::info!("📥 {} {}", request.method(), request.uri().path());
        })
        .on_response(
            |response: &Response<_>, latency: std::time::Duration, _span: &tracing::Span| {
                tracing::info!(
                    "📤 Finished in {:?} with status {}",
                    latency,
                    response.status()
                );
            },
        );

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(restricted)
        .merge(open)
        .layer(from_fn(api::middleware::metrics::metrics_middleware))
        .layer(trace_layer)
        // Outside the trace layer so the span records generated ids too
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(axum::extract::DefaultBodyLimit::max(
            state
                .config
                .max_file_size
                .saturating_add(MULTIPART_OVERHEAD),
        ))
        .with_state(state)
}
