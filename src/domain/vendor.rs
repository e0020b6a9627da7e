//! Wire DTOs for the vendor meter API. Field names follow the vendor's JSON
//! (`Device`, `Rated_Power`, `Reading_Time_Stamp`, ...); numerics arrive as
//! either JSON numbers or formatted strings, so deserialization is lenient.

use serde::{Deserialize, Deserializer};

/// A device as listed by `all-devices-registered`.
#[derive(Debug, Clone, Deserialize)]
pub struct VendorDevice {
    pub id: i64,
    #[serde(rename = "Device")]
    pub name: String,
    #[serde(rename = "MeterNumber", default)]
    pub meter_number: Option<String>,
    #[serde(rename = "Rated_Power")]
    pub rated_power: String,
    #[serde(rename = "Relay_Status", default)]
    pub relay_status: Option<String>,
    #[serde(rename = "DateAdded", default)]
    pub date_added: Option<String>,
}

/// A reading as listed by `all-records-per-device/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct VendorRecord {
    pub id: i64,
    #[serde(rename = "Voltage", deserialize_with = "lenient_f64")]
    pub voltage: f64,
    #[serde(rename = "Current", deserialize_with = "lenient_f64")]
    pub current: f64,
    #[serde(rename = "TimeOn", deserialize_with = "lenient_f64")]
    pub time_on: f64,
    #[serde(rename = "ActiveEnergy", deserialize_with = "lenient_f64")]
    pub active_energy: f64,
    #[serde(rename = "Reading_Time_Stamp")]
    pub reading_timestamp: String,
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        Text(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(v) => Ok(v),
        NumberOrString::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
