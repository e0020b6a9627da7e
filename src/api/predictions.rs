use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    api::error::ApiError,
    domain::{EnergyPrediction, PeakDemandPrediction},
    forecast::{AllPredictions, DeviceSummary, PeakSummary},
    ml::{GenerationReport, ModelMetadata, TrainingReport},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct EnergyQuery {
    pub device_id: Option<i64>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct PeakQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct AllPredictionsQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Comma separated device ids.
    pub device_ids: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TrainRequest {
    /// Train a single device model; omit to train everything.
    pub device_id: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum TrainResponse {
    Single {
        message: String,
        device_id: i64,
        metadata: ModelMetadata,
    },
    All {
        message: String,
        report: TrainingReport,
    },
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    pub days_ahead: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub message: String,
    pub report: GenerationReport,
}

/// GET /api/predictions/energy
pub async fn get_energy_predictions(
    State(state): State<AppState>,
    Query(query): Query<EnergyQuery>,
) -> Result<Json<Vec<EnergyPrediction>>, ApiError> {
    let rows = state
        .repos
        .predictions
        .energy_predictions(query.device_id, query.date)
        .await?;
    Ok(Json(rows))
}

/// GET /api/predictions/peak
pub async fn get_peak_predictions(
    State(state): State<AppState>,
    Query(query): Query<PeakQuery>,
) -> Result<Json<Vec<PeakDemandPrediction>>, ApiError> {
    let rows = state.repos.predictions.peak_predictions(query.date).await?;
    Ok(Json(rows))
}

/// POST /api/predictions/train
pub async fn train_models(
    State(state): State<AppState>,
    body: Option<Json<TrainRequest>>,
) -> Result<Json<TrainResponse>, ApiError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();

    match req.device_id {
        Some(device_id) => {
            if state.repos.devices.find_by_id(device_id).await?.is_none() {
                return Err(ApiError::NotFound(format!("device {} not found", device_id)));
            }
            let metadata = state
                .forecaster
                .train_device_model(device_id)
                .await
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            Ok(Json(TrainResponse::Single {
                message: "model trained".to_string(),
                device_id,
                metadata,
            }))
        }
        None => {
            let report = state.forecaster.train_all().await?;
            if !report.peak_trained && report.devices_trained == 0 {
                return Err(ApiError::BadRequest(
                    "no models could be trained: not enough stored readings".to_string(),
                ));
            }
            Ok(Json(TrainResponse::All {
                message: "training pass complete".to_string(),
                report,
            }))
        }
    }
}

/// POST /api/predictions/generate
pub async fn generate_predictions(
    State(state): State<AppState>,
    body: Option<Json<GenerateRequest>>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let days_ahead = body
        .map(|Json(r)| r)
        .unwrap_or_default()
        .days_ahead
        .unwrap_or(1);
    let report = state.forecaster.generate_predictions(days_ahead).await?;
    Ok(Json(GenerateResponse {
        message: "prediction generation complete".to_string(),
        report,
    }))
}

/// GET /api/predictions/all
pub async fn get_all_predictions(
    State(state): State<AppState>,
    Query(query): Query<AllPredictionsQuery>,
) -> Result<Json<AllPredictions>, ApiError> {
    let device_ids = match query.device_ids.as_deref() {
        Some(csv) => Some(
            csv.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<i64>()
                        .map_err(|_| ApiError::BadRequest(format!("invalid device id: {}", s)))
                })
                .collect::<Result<Vec<i64>, ApiError>>()?,
        ),
        None => None,
    };
    let view = state
        .summaries
        .all_predictions(query.start_date, query.end_date, device_ids.as_deref())
        .await?;
    Ok(Json(view))
}

/// GET /api/predictions/device/:id/summary
pub async fn get_device_summary(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<DateRangeQuery>,
) -> Result<Json<DeviceSummary>, ApiError> {
    let summary = state
        .summaries
        .device_summary(id, query.start_date, query.end_date)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("device {} not found", id)))?;
    Ok(Json(summary))
}

/// GET /api/predictions/peak/summary
pub async fn get_peak_summary(
    State(state): State<AppState>,
    Query(query): Query<DateRangeQuery>,
) -> Result<Json<PeakSummary>, ApiError> {
    let summary = state
        .summaries
        .peak_summary(query.start_date, query.end_date)
        .await?;
    Ok(Json(summary))
}
