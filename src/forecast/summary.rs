//! Aggregated forecast views for dashboard and mobile clients.
//!
//! Stored forecast rows are flat (one row per device, date and hour); the
//! clients want them nested by date and rolled up into daily totals, hourly
//! patterns and peaks. The builders here are pure functions over fetched
//! rows; `SummaryService` wires them to the repositories.

use anyhow::Result;
use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::{Device, EnergyPrediction, PeakDemandPrediction};
use crate::repo::Repositories;

const DEFAULT_RANGE_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize)]
pub struct HourlyEnergy {
    pub predicted_energy: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HourlyPeak {
    pub predicted_peak_demand: f64,
    pub created_at: DateTime<Utc>,
}

/// Per-day rollup inside [`AllPredictions`].
#[derive(Debug, Clone, Serialize)]
pub struct DailySummary {
    /// Total predicted energy per device, kWh.
    pub total_energy: BTreeMap<i64, f64>,
    /// Highest hourly peak demand of the day, kW.
    pub peak_demand: f64,
    /// Hour of that peak.
    pub peak_hour: i64,
}

/// Every stored forecast in a date range, nested date -> device -> hour.
#[derive(Debug, Clone, Serialize)]
pub struct AllPredictions {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub devices: BTreeMap<i64, Device>,
    pub energy_predictions: BTreeMap<NaiveDate, BTreeMap<i64, BTreeMap<i64, HourlyEnergy>>>,
    pub peak_demand_predictions: BTreeMap<NaiveDate, BTreeMap<i64, HourlyPeak>>,
    pub daily_summaries: BTreeMap<NaiveDate, DailySummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyDevicePrediction {
    pub total: f64,
    pub hourly: BTreeMap<i64, f64>,
}

/// Forecast rollup for a single device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSummary {
    pub device: Device,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub daily_predictions: BTreeMap<NaiveDate, DailyDevicePrediction>,
    /// Average predicted energy per hour of day across the range.
    pub hourly_patterns: BTreeMap<i64, f64>,
    pub total_predicted_energy: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyPeak {
    pub peak_demand: f64,
    pub peak_hour: i64,
    pub hourly: BTreeMap<i64, f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverallPeak {
    pub demand: f64,
    pub date: Option<NaiveDate>,
    pub hour: Option<i64>,
}

/// Peak demand rollup across a date range.
#[derive(Debug, Clone, Serialize)]
pub struct PeakSummary {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub daily_peaks: BTreeMap<NaiveDate, DailyPeak>,
    pub hourly_patterns: BTreeMap<i64, f64>,
    pub overall_peak: OverallPeak,
}

/// Headline numbers for the dashboard landing view.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardOverview {
    pub date: NaiveDate,
    pub devices_count: usize,
    pub today_predicted_energy: f64,
    pub tomorrow_predicted_energy: f64,
    pub energy_change_percentage: f64,
    pub peak_demand: f64,
    pub peak_hour: i64,
    pub devices: Vec<Device>,
    /// Today's forecast, hour -> device -> kWh.
    pub hourly_predictions: BTreeMap<i64, BTreeMap<i64, f64>>,
}

/// Fill in the original's defaults: start today, end a week later.
pub fn resolve_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> (NaiveDate, NaiveDate) {
    let start = start.unwrap_or_else(|| Local::now().date_naive());
    let end = end.unwrap_or(start + Duration::days(DEFAULT_RANGE_DAYS));
    (start, end)
}

pub fn build_all_predictions(
    start: NaiveDate,
    end: NaiveDate,
    devices: Vec<Device>,
    energy: Vec<EnergyPrediction>,
    peaks: Vec<PeakDemandPrediction>,
) -> AllPredictions {
    let mut result = AllPredictions {
        start_date: start,
        end_date: end,
        devices: devices.into_iter().map(|d| (d.id, d)).collect(),
        energy_predictions: BTreeMap::new(),
        peak_demand_predictions: BTreeMap::new(),
        daily_summaries: BTreeMap::new(),
    };

    for pred in energy {
        result
            .energy_predictions
            .entry(pred.prediction_date)
            .or_default()
            .entry(pred.device_id)
            .or_default()
            .insert(
                pred.prediction_hour,
                HourlyEnergy {
                    predicted_energy: pred.predicted_energy,
                    created_at: pred.created_at,
                },
            );
    }

    for pred in peaks {
        result
            .peak_demand_predictions
            .entry(pred.prediction_date)
            .or_default()
            .insert(
                pred.prediction_hour,
                HourlyPeak {
                    predicted_peak_demand: pred.predicted_peak_demand,
                    created_at: pred.created_at,
                },
            );
    }

    for (date, per_device) in &result.energy_predictions {
        let mut summary = DailySummary {
            total_energy: BTreeMap::new(),
            peak_demand: 0.0,
            peak_hour: 0,
        };
        for (device_id, hours) in per_device {
            let total: f64 = hours.values().map(|h| h.predicted_energy).sum();
            summary.total_energy.insert(*device_id, total);
        }
        if let Some(day_peaks) = result.peak_demand_predictions.get(date) {
            if let Some((hour, peak)) = day_peaks.iter().max_by(|a, b| {
                a.1.predicted_peak_demand
                    .total_cmp(&b.1.predicted_peak_demand)
            }) {
                summary.peak_demand = peak.predicted_peak_demand;
                summary.peak_hour = *hour;
            }
        }
        result.daily_summaries.insert(*date, summary);
    }

    result
}

pub fn build_device_summary(
    device: Device,
    start: NaiveDate,
    end: NaiveDate,
    predictions: Vec<EnergyPrediction>,
) -> DeviceSummary {
    let mut summary = DeviceSummary {
        device,
        start_date: start,
        end_date: end,
        daily_predictions: BTreeMap::new(),
        hourly_patterns: (0..24).map(|h| (h, 0.0)).collect(),
        total_predicted_energy: 0.0,
    };

    for pred in predictions {
        let daily = summary
            .daily_predictions
            .entry(pred.prediction_date)
            .or_insert_with(|| DailyDevicePrediction {
                total: 0.0,
                hourly: BTreeMap::new(),
            });
        daily.hourly.insert(pred.prediction_hour, pred.predicted_energy);
        daily.total += pred.predicted_energy;
        *summary
            .hourly_patterns
            .entry(pred.prediction_hour)
            .or_insert(0.0) += pred.predicted_energy;
        summary.total_predicted_energy += pred.predicted_energy;
    }

    let days_count = ((end - start).num_days() + 1).max(1) as f64;
    for value in summary.hourly_patterns.values_mut() {
        *value /= days_count;
    }
    summary
}

pub fn build_peak_summary(
    start: NaiveDate,
    end: NaiveDate,
    predictions: Vec<PeakDemandPrediction>,
) -> PeakSummary {
    let mut summary = PeakSummary {
        start_date: start,
        end_date: end,
        daily_peaks: BTreeMap::new(),
        hourly_patterns: (0..24).map(|h| (h, 0.0)).collect(),
        overall_peak: OverallPeak {
            demand: 0.0,
            date: None,
            hour: None,
        },
    };

    for pred in predictions {
        let daily = summary
            .daily_peaks
            .entry(pred.prediction_date)
            .or_insert_with(|| DailyPeak {
                peak_demand: 0.0,
                peak_hour: 0,
                hourly: BTreeMap::new(),
            });
        daily
            .hourly
            .insert(pred.prediction_hour, pred.predicted_peak_demand);
        *summary
            .hourly_patterns
            .entry(pred.prediction_hour)
            .or_insert(0.0) += pred.predicted_peak_demand;

        if pred.predicted_peak_demand > daily.peak_demand {
            daily.peak_demand = pred.predicted_peak_demand;
            daily.peak_hour = pred.prediction_hour;
        }
        if pred.predicted_peak_demand > summary.overall_peak.demand {
            summary.overall_peak.demand = pred.predicted_peak_demand;
            summary.overall_peak.date = Some(pred.prediction_date);
            summary.overall_peak.hour = Some(pred.prediction_hour);
        }
    }

    let days_count = ((end - start).num_days() + 1).max(1) as f64;
    for value in summary.hourly_patterns.values_mut() {
        *value /= days_count;
    }
    summary
}

/// Fetches forecast rows and produces the aggregated views.
pub struct SummaryService {
    repos: Arc<Repositories>,
}

impl SummaryService {
    pub fn new(repos: Arc<Repositories>) -> Self {
        Self { repos }
    }

    pub async fn all_predictions(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        device_ids: Option<&[i64]>,
    ) -> Result<AllPredictions> {
        let (start, end) = resolve_range(start, end);
        let devices = self.repos.devices.list_all().await?;
        let energy = self
            .repos
            .predictions
            .energy_predictions_in_range(start, end, device_ids)
            .await?;
        let peaks = self
            .repos
            .predictions
            .peak_predictions_in_range(start, end)
            .await?;
        Ok(build_all_predictions(start, end, devices, energy, peaks))
    }

    /// `None` when the device does not exist.
    pub async fn device_summary(
        &self,
        device_id: i64,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Option<DeviceSummary>> {
        let (start, end) = resolve_range(start, end);
        let Some(device) = self.repos.devices.find_by_id(device_id).await? else {
            return Ok(None);
        };
        let predictions = self
            .repos
            .predictions
            .energy_predictions_in_range(start, end, Some(&[device_id]))
            .await?;
        Ok(Some(build_device_summary(device, start, end, predictions)))
    }

    pub async fn peak_summary(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<PeakSummary> {
        let (start, end) = resolve_range(start, end);
        let predictions = self
            .repos
            .predictions
            .peak_predictions_in_range(start, end)
            .await?;
        Ok(build_peak_summary(start, end, predictions))
    }

    pub async fn dashboard_overview(&self) -> Result<DashboardOverview> {
        let today = Local::now().date_naive();
        let tomorrow = today + Duration::days(1);

        let devices = self.repos.devices.list_all().await?;
        let today_view = self
            .all_predictions(Some(today), Some(today), None)
            .await?;
        let tomorrow_view = self
            .all_predictions(Some(tomorrow), Some(tomorrow), None)
            .await?;
        let peak = self.peak_summary(Some(today), Some(today)).await?;

        let today_total = daily_total(&today_view, today);
        let tomorrow_total = daily_total(&tomorrow_view, tomorrow);
        let energy_change_percentage = if today_total > 0.0 {
            (tomorrow_total - today_total) / today_total.max(1.0) * 100.0
        } else {
            0.0
        };

        let mut hourly_predictions: BTreeMap<i64, BTreeMap<i64, f64>> = BTreeMap::new();
        if let Some(per_device) = today_view.energy_predictions.get(&today) {
            for (device_id, hours) in per_device {
                for (hour, value) in hours {
                    hourly_predictions
                        .entry(*hour)
                        .or_default()
                        .insert(*device_id, value.predicted_energy);
                }
            }
        }

        Ok(DashboardOverview {
            date: today,
            devices_count: devices.len(),
            today_predicted_energy: today_total,
            tomorrow_predicted_energy: tomorrow_total,
            energy_change_percentage,
            peak_demand: peak.overall_peak.demand,
            peak_hour: peak.overall_peak.hour.unwrap_or(0),
            devices,
            hourly_predictions,
        })
    }
}

fn daily_total(view: &AllPredictions, date: NaiveDate) -> f64 {
    view.daily_summaries
        .get(&date)
        .map(|s| s.total_energy.values().sum())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn device(id: i64, name: &str) -> Device {
        Device {
            id,
            name: name.to_string(),
            meter_number: None,
            rated_power: "100 W".to_string(),
            relay_status: Some("OFF".to_string()),
            date_added: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn energy(device_id: i64, date: NaiveDate, hour: i64, kwh: f64) -> EnergyPrediction {
        EnergyPrediction {
            id: 0,
            device_id,
            device_name: None,
            predicted_energy: kwh,
            prediction_date: date,
            prediction_hour: hour,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn peak(date: NaiveDate, hour: i64, kw: f64) -> PeakDemandPrediction {
        PeakDemandPrediction {
            id: 0,
            predicted_peak_demand: kw,
            prediction_date: date,
            prediction_hour: hour,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn all_predictions_nests_and_totals() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let view = build_all_predictions(
            date,
            date,
            vec![device(1, "Fridge"), device(2, "Geyser")],
            vec![
                energy(1, date, 0, 0.1),
                energy(1, date, 1, 0.2),
                energy(2, date, 0, 1.0),
            ],
            vec![peak(date, 0, 1.5), peak(date, 1, 2.5)],
        );

        let day = &view.daily_summaries[&date];
        assert!((day.total_energy[&1] - 0.3).abs() < 1e-12);
        assert!((day.total_energy[&2] - 1.0).abs() < 1e-12);
        assert_eq!(day.peak_hour, 1);
        assert!((day.peak_demand - 2.5).abs() < 1e-12);
        assert_eq!(view.energy_predictions[&date][&1].len(), 2);
        assert_eq!(view.devices.len(), 2);
    }

    #[test]
    fn device_summary_averages_hourly_patterns_over_days() {
        let d1 = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();
        let summary = build_device_summary(
            device(1, "Fridge"),
            d1,
            d2,
            vec![energy(1, d1, 8, 0.4), energy(1, d2, 8, 0.2)],
        );

        assert!((summary.total_predicted_energy - 0.6).abs() < 1e-12);
        assert!((summary.daily_predictions[&d1].total - 0.4).abs() < 1e-12);
        // Two days in range: pattern is the mean.
        assert!((summary.hourly_patterns[&8] - 0.3).abs() < 1e-12);
        assert_eq!(summary.hourly_patterns[&9], 0.0);
    }

    #[test]
    fn peak_summary_tracks_daily_and_overall_peaks() {
        let d1 = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();
        let summary = build_peak_summary(
            d1,
            d2,
            vec![peak(d1, 18, 3.0), peak(d1, 19, 2.0), peak(d2, 7, 5.0)],
        );

        assert_eq!(summary.daily_peaks[&d1].peak_hour, 18);
        assert!((summary.daily_peaks[&d1].peak_demand - 3.0).abs() < 1e-12);
        assert_eq!(summary.overall_peak.date, Some(d2));
        assert_eq!(summary.overall_peak.hour, Some(7));
        assert!((summary.overall_peak.demand - 5.0).abs() < 1e-12);
    }

    #[test]
    fn empty_range_produces_empty_views() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let view = build_all_predictions(date, date, vec![], vec![], vec![]);
        assert!(view.daily_summaries.is_empty());

        let peak_view = build_peak_summary(date, date, vec![]);
        assert_eq!(peak_view.overall_peak.demand, 0.0);
        assert!(peak_view.overall_peak.date.is_none());
    }
}
