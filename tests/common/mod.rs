#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use gridwatch::config::{
    CollectorConfig, Config, DbConfig, JobsConfig, PredictorConfig, ServerConfig,
};
use gridwatch::state::AppState;

/// Build a config wired to an in-memory database and a caller supplied
/// vendor URL. Models land in a temp dir owned by the test.
pub fn test_config(vendor_url: &str, models_dir: &TempDir) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            enable_cors: false,
            request_timeout_secs: 30,
        },
        db: DbConfig {
            url: "sqlite::memory:".to_string(),
        },
        collector: CollectorConfig {
            base_url: vendor_url.to_string(),
            http_timeout_seconds: 5,
        },
        predictor: PredictorConfig {
            models_dir: models_dir.path().to_string_lossy().into_owned(),
            min_device_samples: 24,
            min_peak_samples: 48,
        },
        jobs: JobsConfig {
            enabled: false,
            device_sync_hour: 1,
            consumption_sync_minute: 5,
            training_hour: 2,
            prediction_every_hours: 6,
            prediction_minute: 30,
            prediction_days_ahead: 2,
        },
    }
}

pub async fn test_app(vendor_url: &str) -> (AppState, Router, TempDir) {
    let models_dir = TempDir::new().expect("temp dir");
    let cfg = test_config(vendor_url, &models_dir);
    let state = AppState::new(cfg.clone()).await.expect("app state");
    let router = gridwatch::api::router(state.clone(), &cfg);
    (state, router, models_dir)
}

/// One request against the router; returns status and parsed JSON body
/// (`Value::Null` for empty bodies).
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let request = match body {
        Some(json) => Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .expect("request"),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request"),
    };

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, json)
}
