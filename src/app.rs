use crate::{
    logging::{access_log, log_payloads},
    models::AppState,
    routes::{download, upload},
};

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::{Json, Router};

use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;

async fn healthz() -> Json<&'static str> {
    Json("ok")
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn build_app(state: AppState) -> Router {
    // Staged uploads, so a review page can show the images it is confirming.
    let static_service = ServeDir::new(state.staging.dir().to_path_buf());
    let body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes());

    // Request-ID middleware comes first so everything downstream
    // has access to the x-request-id header.
    let request_id_layer = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id());

    Router::new()
        .route("/healthz", get(healthz))
        .route("/upload", post(upload::upload_images))
        .route("/download_report", post(download::download_report))
        .nest_service("/static", static_service)
        .layer(body_limit)
        .with_state(state)
        .layer(from_fn(log_payloads))
        .layer(from_fn(access_log))
        .layer(request_id_layer)
        .layer(cors_layer())
}
