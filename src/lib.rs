pub mod api;
pub mod config;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::UploadConfig;
use crate::services::auth::AuthGate;
use crate::services::upload_service::UploadService;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::Method,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::upload::upload_files,
        api::handlers::limits::get_limits,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            models::StoredFile,
            models::UploadResponse,
            models::LimitsResponse,
            models::UploadForm,
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "uploads", description = "File upload endpoints"),
        (name = "system", description = "Liveness")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<UploadConfig>,
    pub uploads: Arc<UploadService>,
    pub auth: AuthGate,
}

impl AppState {
    pub fn new(config: UploadConfig) -> Self {
        Self {
            uploads: Arc::new(UploadService::new(&config)),
            auth: AuthGate::new(config.upload_token.clone()),
            config: Arc::new(config),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let mut router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/healthz", get(api::handlers::health::health_check))
        .route("/limits", get(api::handlers::limits::get_limits));

    // Without a shared secret the write path does not exist at all
    if state.auth.is_configured() {
        router = router.route(
            "/upload",
            post(api::handlers::upload::upload_files)
                // Size is enforced per part while streaming
                .layer(DefaultBodyLimit::disable())
                .layer(from_fn_with_state(
                    state.clone(),
                    api::middleware::auth::auth_middleware,
                )),
        );
    } else {
        tracing::warn!("No upload token configured, /upload is disabled");
    }

    router
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get(api::middleware::request_id::REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    tracing::info!("📥 {} {}", request.method(), request.uri());
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::info!(
                            "📤 Finished in {:?} with status {}",
                            latency,
                            response.status()
                        );
                    },
                ),
        )
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET])
                .allow_headers(Any),
        )
        .with_state(state)
}
