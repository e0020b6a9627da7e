//! Feature engineering for the forecasting models.
//!
//! Feature order is part of the model contract: training and prediction must
//! build vectors through the same functions.

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};

/// Features of the per-device energy model.
pub const ENERGY_FEATURES: [&str; 6] =
    ["hour", "day_of_week", "month", "time_on", "current", "voltage"];

/// Features of the network peak demand model.
pub const PEAK_FEATURES: [&str; 3] = ["hour", "day_of_week", "month"];

/// Assumed operating point when forecasting hours that have not happened yet.
pub const ASSUMED_TIME_ON_MIN: f64 = 120.0;
pub const ASSUMED_CURRENT_A: f64 = 0.5;
pub const ASSUMED_VOLTAGE_V: f64 = 220.0;

/// Energy model features from an observed reading.
pub fn energy_features_from_reading(
    timestamp: DateTime<Utc>,
    time_on: f64,
    current: f64,
    voltage: f64,
) -> Vec<f64> {
    vec![
        timestamp.hour() as f64,
        timestamp.weekday().num_days_from_monday() as f64,
        timestamp.month() as f64,
        time_on,
        current,
        voltage,
    ]
}

/// Energy model features for a future (date, hour) using the assumed
/// operating point.
pub fn energy_features_for_forecast(date: NaiveDate, hour: u32) -> Vec<f64> {
    vec![
        hour as f64,
        date.weekday().num_days_from_monday() as f64,
        date.month() as f64,
        ASSUMED_TIME_ON_MIN,
        ASSUMED_CURRENT_A,
        ASSUMED_VOLTAGE_V,
    ]
}

/// Peak model calendar features.
pub fn peak_features(date: NaiveDate, hour: u32) -> Vec<f64> {
    vec![
        hour as f64,
        date.weekday().num_days_from_monday() as f64,
        date.month() as f64,
    ]
}

/// Instantaneous power draw of a reading, kW.
pub fn power_kw(voltage: f64, current: f64) -> f64 {
    voltage * current / 1000.0
}
