//! Background jobs: vendor sync, model training and forecast generation.
//!
//! Four fixed-schedule jobs run as detached tokio tasks, each sleeping
//! until its next local-time fire point:
//!   - device sync, daily at `device_sync_hour`
//!   - consumption sync, hourly at `consumption_sync_minute`
//!   - model training, daily at `training_hour`
//!   - prediction generation, every `prediction_every_hours` hours at
//!     `prediction_minute`

use chrono::{DateTime, Duration as ChronoDuration, Local, TimeZone, Timelike};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

use crate::config::JobsConfig;
use crate::state::AppState;

/// Run/error bookkeeping per job.
#[derive(Debug, Clone, Default)]
pub struct TaskStatus {
    pub last_run: Option<DateTime<Local>>,
    pub last_success: Option<DateTime<Local>>,
    pub last_error: Option<String>,
    pub run_count: u64,
    pub success_count: u64,
    pub error_count: u64,
}

pub struct JobScheduler {
    state: AppState,
    cfg: JobsConfig,
    device_sync_status: Arc<RwLock<TaskStatus>>,
    consumption_sync_status: Arc<RwLock<TaskStatus>>,
    training_status: Arc<RwLock<TaskStatus>>,
    prediction_status: Arc<RwLock<TaskStatus>>,
}

impl JobScheduler {
    pub fn new(state: AppState) -> Arc<Self> {
        let cfg = state.cfg.jobs.clone();
        Arc::new(Self {
            state,
            cfg,
            device_sync_status: Arc::new(RwLock::new(TaskStatus::default())),
            consumption_sync_status: Arc::new(RwLock::new(TaskStatus::default())),
            training_status: Arc::new(RwLock::new(TaskStatus::default())),
            prediction_status: Arc::new(RwLock::new(TaskStatus::default())),
        })
    }

    /// Spawn all four jobs as detached tasks.
    pub fn spawn(self: Arc<Self>) {
        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.run_device_sync_job().await });

        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.run_consumption_sync_job().await });

        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.run_training_job().await });

        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.run_prediction_job().await });

        info!(
            device_sync_hour = self.cfg.device_sync_hour,
            consumption_sync_minute = self.cfg.consumption_sync_minute,
            training_hour = self.cfg.training_hour,
            prediction_every_hours = self.cfg.prediction_every_hours,
            "background jobs started"
        );
    }

    async fn run_device_sync_job(&self) {
        loop {
            self.sleep_until(next_daily_at(Local::now(), self.cfg.device_sync_hour))
                .await;
            self.run_once("device sync", &self.device_sync_status, || async {
                self.state.collector.sync_devices().await.map(|_| ())
            })
            .await;
        }
    }

    async fn run_consumption_sync_job(&self) {
        loop {
            self.sleep_until(next_hourly_at(Local::now(), self.cfg.consumption_sync_minute))
                .await;
            self.run_once(
                "consumption sync",
                &self.consumption_sync_status,
                || async {
                    self.state
                        .collector
                        .sync_all_from_vendor_list()
                        .await
                        .map(|_| ())
                },
            )
            .await;
        }
    }

    async fn run_training_job(&self) {
        loop {
            self.sleep_until(next_daily_at(Local::now(), self.cfg.training_hour))
                .await;
            self.run_once("model training", &self.training_status, || async {
                self.state.forecaster.train_all().await.map(|_| ())
            })
            .await;
        }
    }

    async fn run_prediction_job(&self) {
        loop {
            self.sleep_until(next_every_hours_at(
                Local::now(),
                self.cfg.prediction_every_hours,
                self.cfg.prediction_minute,
            ))
            .await;
            self.run_once("prediction generation", &self.prediction_status, || async {
                self.state
                    .forecaster
                    .generate_predictions(self.cfg.prediction_days_ahead)
                    .await
                    .map(|_| ())
            })
            .await;
        }
    }

    async fn sleep_until(&self, fire_at: DateTime<Local>) {
        let wait = (fire_at - Local::now())
            .to_std()
            .unwrap_or(Duration::from_secs(1));
        sleep(wait).await;
    }

    async fn run_once<F, Fut>(&self, name: &str, status: &Arc<RwLock<TaskStatus>>, job: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let started = Local::now();
        {
            let mut s = status.write().await;
            s.last_run = Some(started);
            s.run_count += 1;
        }
        info!(job = name, "running scheduled job");

        match job().await {
            Ok(()) => {
                let mut s = status.write().await;
                s.last_success = Some(started);
                s.success_count += 1;
                s.last_error = None;
                info!(job = name, "scheduled job complete");
            }
            Err(e) => {
                let mut s = status.write().await;
                s.error_count += 1;
                s.last_error = Some(e.to_string());
                error!(job = name, error = %e, "scheduled job failed");
            }
        }
    }
}

/// Next occurrence of `hour`:00 strictly after `now`.
pub fn next_daily_at(now: DateTime<Local>, hour: u32) -> DateTime<Local> {
    let today = now.date_naive().and_hms_opt(hour, 0, 0);
    let candidate = today.and_then(|t| Local.from_local_datetime(&t).single());
    match candidate {
        Some(t) if t > now => t,
        _ => {
            let tomorrow = (now.date_naive() + ChronoDuration::days(1))
                .and_hms_opt(hour, 0, 0)
                .and_then(|t| Local.from_local_datetime(&t).single());
            tomorrow.unwrap_or(now + ChronoDuration::days(1))
        }
    }
}

/// Next occurrence of `minute` past the hour strictly after `now`.
pub fn next_hourly_at(now: DateTime<Local>, minute: u32) -> DateTime<Local> {
    let this_hour = now
        .date_naive()
        .and_hms_opt(now.hour(), minute, 0)
        .and_then(|t| Local.from_local_datetime(&t).single());
    match this_hour {
        Some(t) if t > now => t,
        Some(t) => t + ChronoDuration::hours(1),
        None => now + ChronoDuration::hours(1),
    }
}

/// Next hour divisible by `every_hours`, at `minute` past, strictly after
/// `now`. With `every_hours = 6` and `minute = 30` the fire points are
/// 00:30, 06:30, 12:30 and 18:30. Intervals beyond a day collapse to one
/// daily fire at `00:minute`.
pub fn next_every_hours_at(now: DateTime<Local>, every_hours: u32, minute: u32) -> DateTime<Local> {
    let every = every_hours.clamp(1, 24);
    let mut hour = (now.hour() / every) * every;
    loop {
        let candidate = if hour < 24 {
            now.date_naive()
                .and_hms_opt(hour, minute, 0)
                .and_then(|t| Local.from_local_datetime(&t).single())
        } else {
            (now.date_naive() + ChronoDuration::days(1))
                .and_hms_opt(hour - 24, minute, 0)
                .and_then(|t| Local.from_local_datetime(&t).single())
        };
        if let Some(t) = candidate {
            if t > now {
                return t;
            }
        }
        hour += every;
    }
}
