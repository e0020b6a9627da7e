use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

use crate::{
    api::error::ApiError,
    collector::{MeterApiClient, SyncReport},
    domain::{parse_iso_timestamp, ConsumptionRecord, ConsumptionTotal},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TotalQuery {
    /// Comma separated device ids, e.g. `device_ids=1,2,3`.
    pub device_ids: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddRecordRequest {
    pub device_id: i64,
    #[validate(range(min = 0.0))]
    pub voltage: f64,
    #[validate(range(min = 0.0))]
    pub current: f64,
    #[validate(range(min = 0.0))]
    pub time_on: f64,
    #[validate(range(min = 0.0))]
    pub active_energy: f64,
    pub reading_timestamp: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SyncConsumptionRequest {
    pub api_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SyncConsumptionResponse {
    pub message: String,
    pub report: SyncReport,
}

fn parse_bound(label: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>, ApiError> {
    match raw {
        Some(s) => parse_iso_timestamp(s)
            .map(Some)
            .map_err(|e| ApiError::BadRequest(format!("invalid {}: {}", label, e))),
        None => Ok(None),
    }
}

fn parse_device_ids(raw: Option<&str>) -> Result<Option<Vec<i64>>, ApiError> {
    match raw {
        Some(csv) => {
            let ids = csv
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<i64>()
                        .map_err(|_| ApiError::BadRequest(format!("invalid device id: {}", s)))
                })
                .collect::<Result<Vec<i64>, ApiError>>()?;
            Ok(Some(ids))
        }
        None => Ok(None),
    }
}

/// GET /api/consumption/:device_id
pub async fn get_device_consumption(
    State(state): State<AppState>,
    Path(device_id): Path<i64>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<ConsumptionRecord>>, ApiError> {
    if state.repos.devices.find_by_id(device_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("device {} not found", device_id)));
    }
    let start = parse_bound("start_date", query.start_date.as_deref())?;
    let end = parse_bound("end_date", query.end_date.as_deref())?;
    let records = state
        .repos
        .consumption
        .find_for_device(device_id, start, end)
        .await?;
    Ok(Json(records))
}

/// GET /api/consumption/total
pub async fn get_total_consumption(
    State(state): State<AppState>,
    Query(query): Query<TotalQuery>,
) -> Result<Json<Vec<ConsumptionTotal>>, ApiError> {
    let ids = parse_device_ids(query.device_ids.as_deref())?;
    let start = parse_bound("start_date", query.start_date.as_deref())?;
    let end = parse_bound("end_date", query.end_date.as_deref())?;
    let totals = state
        .repos
        .consumption
        .totals_by_device(ids.as_deref(), start, end)
        .await?;
    Ok(Json(totals))
}

/// POST /api/consumption
pub async fn add_record(
    State(state): State<AppState>,
    Json(req): Json<AddRecordRequest>,
) -> Result<(StatusCode, Json<ConsumptionRecord>), ApiError> {
    req.validate()?;
    if state.repos.devices.find_by_id(req.device_id).await?.is_none() {
        return Err(ApiError::NotFound(format!(
            "device {} not found",
            req.device_id
        )));
    }
    let ts = parse_iso_timestamp(&req.reading_timestamp)
        .map_err(|e| ApiError::BadRequest(format!("invalid reading_timestamp: {}", e)))?;
    let record = state
        .repos
        .consumption
        .insert(
            req.device_id,
            req.voltage,
            req.current,
            req.time_on,
            req.active_energy,
            ts,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// POST /api/consumption/sync/:device_id
pub async fn sync_consumption(
    State(state): State<AppState>,
    Path(device_id): Path<i64>,
    body: Option<Json<SyncConsumptionRequest>>,
) -> Result<Json<SyncConsumptionResponse>, ApiError> {
    if state.repos.devices.find_by_id(device_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("device {} not found", device_id)));
    }

    let override_url = body.and_then(|Json(req)| req.api_url);
    let report = match override_url {
        Some(url) => {
            let api = MeterApiClient::new(
                url,
                Duration::from_secs(state.cfg.collector.http_timeout_seconds),
            )
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            state
                .collector
                .sync_device_consumption_via(&api, device_id)
                .await
                .map_err(|e| ApiError::UpstreamError(e.to_string()))?
        }
        None => state
            .collector
            .sync_device_consumption(device_id)
            .await
            .map_err(|e| ApiError::UpstreamError(e.to_string()))?,
    };

    Ok(Json(SyncConsumptionResponse {
        message: "consumption sync complete".to_string(),
        report,
    }))
}
