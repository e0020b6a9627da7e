//! Core records stored by the monitor: devices, meter readings and forecasts.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A monitored appliance or meter.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Device {
    pub id: i64,
    pub name: String,
    pub meter_number: Option<String>,
    /// Free-form rated power as reported by the vendor, e.g. "100 W".
    pub rated_power: String,
    /// "ON"/"OFF" when the device has a controllable relay.
    pub relay_status: Option<String>,
    pub date_added: DateTime<Utc>,
}

/// One timestamped electrical reading for a device.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConsumptionRecord {
    pub id: i64,
    pub device_id: i64,
    pub voltage: f64,
    pub current: f64,
    /// Minutes the device was drawing power during the interval.
    pub time_on: f64,
    /// kWh consumed during the interval.
    pub active_energy: f64,
    pub reading_timestamp: DateTime<Utc>,
}

/// Hourly per-device energy forecast, keyed by target date and hour.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EnergyPrediction {
    pub id: i64,
    pub device_id: i64,
    pub device_name: Option<String>,
    /// Forecast energy use for the hour, kWh.
    pub predicted_energy: f64,
    pub prediction_date: NaiveDate,
    /// Hour of day, 0-23.
    pub prediction_hour: i64,
    pub created_at: DateTime<Utc>,
}

/// Hourly network-wide peak demand forecast.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PeakDemandPrediction {
    pub id: i64,
    /// Forecast aggregate power draw for the hour, kW.
    pub predicted_peak_demand: f64,
    pub prediction_date: NaiveDate,
    pub prediction_hour: i64,
    pub created_at: DateTime<Utc>,
}

/// Total consumption over a period for one device.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ConsumptionTotal {
    pub device_id: i64,
    pub total_energy: f64,
}

/// Parse an ISO-8601 timestamp, accepting both offset forms and the
/// vendor's trailing-`Z` / naive variants. Naive timestamps are read as
/// UTC; a bare date reads as midnight UTC.
pub fn parse_iso_timestamp(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .or_else(|_| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d").map(|d| d.and_time(NaiveTime::MIN))
        })
        .with_context(|| format!("unparseable timestamp: {s:?}"))?;
    Ok(naive.and_utc())
}

/// Parse a free-form rated power label ("100 W", "1.5 kW") into watts.
/// Unparseable input maps to 0.0 rather than an error - vendor data is dirty.
pub fn parse_power_string(power: &str) -> f64 {
    let lower = power.trim().to_lowercase();
    let numeric: String = lower
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    let value: f64 = match numeric.parse() {
        Ok(v) => v,
        Err(_) => return 0.0,
    };

    if lower.contains("mw") {
        value * 1_000_000.0
    } else if lower.contains("kw") {
        value * 1000.0
    } else {
        value
    }
}
