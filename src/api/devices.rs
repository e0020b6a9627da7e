use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

use crate::{
    api::error::ApiError,
    collector::MeterApiClient,
    domain::Device,
    repo::devices::DeviceUpdate,
    state::AppState,
};

/// Request to register a device manually.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateDeviceRequest {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    pub meter_number: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub rated_power: String,
    pub relay_status: Option<String>,
}

/// Partial update; omitted fields keep their current value.
#[derive(Debug, Deserialize)]
pub struct UpdateDeviceRequest {
    pub name: Option<String>,
    pub meter_number: Option<String>,
    pub rated_power: Option<String>,
    pub relay_status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SyncDevicesRequest {
    pub api_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SyncDevicesResponse {
    pub message: String,
    pub devices_synced: usize,
}

/// GET /api/devices
pub async fn list_devices(State(state): State<AppState>) -> Result<Json<Vec<Device>>, ApiError> {
    let devices = state.repos.devices.list_all().await?;
    Ok(Json(devices))
}

/// GET /api/devices/:id
pub async fn get_device(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Device>, ApiError> {
    let device = state
        .repos
        .devices
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("device {} not found", id)))?;
    Ok(Json(device))
}

/// POST /api/devices
pub async fn create_device(
    State(state): State<AppState>,
    Json(req): Json<CreateDeviceRequest>,
) -> Result<(StatusCode, Json<Device>), ApiError> {
    req.validate()?;
    let device = state
        .repos
        .devices
        .insert(&req.name, req.meter_number.as_deref(), &req.rated_power, req.relay_status.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(device)))
}

/// PUT /api/devices/:id
pub async fn update_device(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateDeviceRequest>,
) -> Result<Json<Device>, ApiError> {
    let update = DeviceUpdate {
        name: req.name,
        meter_number: req.meter_number,
        rated_power: req.rated_power,
        relay_status: req.relay_status,
    };
    let device = state
        .repos
        .devices
        .update(id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("device {} not found", id)))?;
    Ok(Json(device))
}

/// DELETE /api/devices/:id
pub async fn delete_device(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let deleted = state.repos.devices.delete(id).await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("device {} not found", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/devices/sync - pull device metadata from the vendor API.
pub async fn sync_devices(
    State(state): State<AppState>,
    body: Option<Json<SyncDevicesRequest>>,
) -> Result<Json<SyncDevicesResponse>, ApiError> {
    let override_url = body.and_then(|Json(req)| req.api_url);

    let synced = match override_url {
        Some(url) => {
            let api = MeterApiClient::new(
                url,
                Duration::from_secs(state.cfg.collector.http_timeout_seconds),
            )
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            state
                .collector
                .sync_devices_via(&api)
                .await
                .map_err(|e| ApiError::UpstreamError(e.to_string()))?
        }
        None => state
            .collector
            .sync_devices()
            .await
            .map_err(|e| ApiError::UpstreamError(e.to_string()))?,
    };

    Ok(Json(SyncDevicesResponse {
        message: "device sync complete".to_string(),
        devices_synced: synced,
    }))
}
