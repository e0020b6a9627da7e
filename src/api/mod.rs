pub mod consumption;
pub mod dashboard;
pub mod devices;
pub mod error;
pub mod predictions;

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{config::Config, state::AppState};

pub fn router(state: AppState, cfg: &Config) -> Router {
    let api = Router::new()
        .route("/devices", get(devices::list_devices).post(devices::create_device))
        .route(
            "/devices/:id",
            get(devices::get_device)
                .put(devices::update_device)
                .delete(devices::delete_device),
        )
        .route("/devices/sync", post(devices::sync_devices))
        .route("/consumption", post(consumption::add_record))
        .route("/consumption/total", get(consumption::get_total_consumption))
        .route("/consumption/:device_id", get(consumption::get_device_consumption))
        .route("/consumption/sync/:device_id", post(consumption::sync_consumption))
        .route("/predictions/energy", get(predictions::get_energy_predictions))
        .route("/predictions/peak", get(predictions::get_peak_predictions))
        .route("/predictions/train", post(predictions::train_models))
        .route("/predictions/generate", post(predictions::generate_predictions))
        .route("/predictions/all", get(predictions::get_all_predictions))
        .route(
            "/predictions/device/:id/summary",
            get(predictions::get_device_summary),
        )
        .route("/predictions/peak/summary", get(predictions::get_peak_summary))
        .route("/dashboard/overview", get(dashboard::overview));

    let mut router = Router::new()
        .nest("/api", api)
        .route("/healthz", get(healthz))
        .with_state(state);

    if cfg.server.enable_cors {
        use tower_http::cors::{Any, CorsLayer};
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::PUT,
                axum::http::Method::DELETE,
            ])
            .allow_headers([axum::http::header::CONTENT_TYPE]);
        router = router.layer(cors);
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(axum::extract::DefaultBodyLimit::max(1024 * 1024))
                .layer(TimeoutLayer::new(Duration::from_secs(
                    cfg.server.request_timeout_secs,
                ))),
        )
        .layer(TraceLayer::new_for_http())
}

pub async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}
