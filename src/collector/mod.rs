//! Vendor meter API client and sync loops.
//!
//! The vendor exposes two read-only JSON endpoints: the registered device
//! list and the full reading history per device. Sync pulls both into the
//! local store; readings keep their vendor ids so re-syncing is idempotent.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::domain::{parse_iso_timestamp, VendorDevice, VendorRecord};
use crate::repo::Repositories;

#[async_trait]
pub trait MeterApi: Send + Sync {
    async fn fetch_devices(&self) -> Result<Vec<VendorDevice>>;
    async fn fetch_device_records(&self, device_id: i64) -> Result<Vec<VendorRecord>>;
}

/// reqwest-backed client for the vendor meter API.
#[derive(Clone)]
pub struct MeterApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl MeterApiClient {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("gridwatch/0.1"));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self { base_url, client })
    }

    pub fn devices_url(&self) -> String {
        format!("{}/all-devices-registered/", self.base_url.trim_end_matches('/'))
    }

    pub fn records_url(&self, device_id: i64) -> String {
        format!(
            "{}/all-records-per-device/{}",
            self.base_url.trim_end_matches('/'),
            device_id
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;
        let status = resp.status();
        let body = resp.text().await.context("reading vendor response failed")?;
        if !status.is_success() {
            anyhow::bail!("vendor API error: HTTP {status}: {body}");
        }
        serde_json::from_str(&body).context("vendor JSON parse failed")
    }
}

#[async_trait]
impl MeterApi for MeterApiClient {
    async fn fetch_devices(&self) -> Result<Vec<VendorDevice>> {
        self.get_json(&self.devices_url()).await
    }

    async fn fetch_device_records(&self, device_id: i64) -> Result<Vec<VendorRecord>> {
        self.get_json(&self.records_url(device_id)).await
    }
}

/// Outcome of one consumption sync pass.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct SyncReport {
    pub devices_seen: usize,
    pub records_added: usize,
    pub records_skipped: usize,
    pub failures: usize,
}

pub struct Collector {
    api: Arc<dyn MeterApi>,
    repos: Arc<Repositories>,
}

impl Collector {
    pub fn new(api: Arc<dyn MeterApi>, repos: Arc<Repositories>) -> Self {
        Self { api, repos }
    }

    /// Pull the vendor device list and upsert every entry under its vendor
    /// id. Returns the number of devices synced.
    pub async fn sync_devices(&self) -> Result<usize> {
        self.sync_devices_via(self.api.as_ref()).await
    }

    /// Same as [`sync_devices`](Self::sync_devices) but against a caller
    /// supplied client, used when a request overrides the vendor URL.
    pub async fn sync_devices_via(&self, api: &dyn MeterApi) -> Result<usize> {
        let devices = api.fetch_devices().await?;
        for device in &devices {
            let date_added = match device.date_added.as_deref() {
                Some(raw) => match parse_iso_timestamp(raw) {
                    Ok(ts) => Some(ts),
                    Err(e) => {
                        warn!(device_id = device.id, error = %e, "bad DateAdded, keeping stored value");
                        None
                    }
                },
                None => None,
            };
            self.repos
                .devices
                .upsert_from_vendor(
                    device.id,
                    &device.name,
                    device.meter_number.as_deref(),
                    &device.rated_power,
                    device.relay_status.as_deref(),
                    date_added,
                )
                .await?;
        }
        info!(count = devices.len(), "device sync complete");
        Ok(devices.len())
    }

    /// Pull one device's reading history; only rows with unseen vendor ids
    /// are inserted. Malformed rows are skipped with a warning.
    pub async fn sync_device_consumption(&self, device_id: i64) -> Result<SyncReport> {
        self.sync_device_consumption_via(self.api.as_ref(), device_id)
            .await
    }

    /// Same sync against a caller supplied client, used when a request
    /// overrides the vendor URL.
    pub async fn sync_device_consumption_via(
        &self,
        api: &dyn MeterApi,
        device_id: i64,
    ) -> Result<SyncReport> {
        let records = api.fetch_device_records(device_id).await?;
        let mut report = SyncReport {
            devices_seen: 1,
            ..Default::default()
        };
        for record in records {
            let ts = match parse_iso_timestamp(&record.reading_timestamp) {
                Ok(ts) => ts,
                Err(e) => {
                    warn!(record_id = record.id, error = %e, "skipping malformed reading");
                    report.records_skipped += 1;
                    continue;
                }
            };
            let added = self
                .repos
                .consumption
                .insert_synced(
                    record.id,
                    device_id,
                    record.voltage,
                    record.current,
                    record.time_on,
                    record.active_energy,
                    ts,
                )
                .await?;
            if added {
                report.records_added += 1;
            } else {
                report.records_skipped += 1;
            }
        }
        info!(
            device_id,
            added = report.records_added,
            skipped = report.records_skipped,
            "consumption sync complete"
        );
        Ok(report)
    }

    /// Sync every listed device sequentially. A failing device is logged and
    /// counted but does not abort the rest of the loop.
    pub async fn sync_all_consumption(&self, device_ids: &[i64]) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        for &device_id in device_ids {
            match self.sync_device_consumption(device_id).await {
                Ok(r) => {
                    report.devices_seen += 1;
                    report.records_added += r.records_added;
                    report.records_skipped += r.records_skipped;
                }
                Err(e) => {
                    warn!(device_id, error = %e, "consumption sync failed for device");
                    report.failures += 1;
                }
            }
        }
        Ok(report)
    }

    /// Sync pass used by the hourly job: device ids come from the vendor
    /// list, matching what the vendor currently reports.
    pub async fn sync_all_from_vendor_list(&self) -> Result<SyncReport> {
        let ids: Vec<i64> = self
            .api
            .fetch_devices()
            .await?
            .into_iter()
            .map(|d| d.id)
            .collect();
        self.sync_all_consumption(&ids).await
    }
}
