use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::collector::{Collector, MeterApiClient};
use crate::config::Config;
use crate::forecast::SummaryService;
use crate::ml::Forecaster;
use crate::repo::Repositories;

/// Shared handles threaded through handlers and background jobs.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    pub repos: Arc<Repositories>,
    pub collector: Arc<Collector>,
    pub forecaster: Arc<Forecaster>,
    pub summaries: Arc<SummaryService>,
}

impl AppState {
    pub async fn new(cfg: Config) -> Result<Self> {
        let repos = Arc::new(Repositories::connect(&cfg.db.url).await?);

        let api = Arc::new(MeterApiClient::new(
            cfg.collector.base_url.clone(),
            Duration::from_secs(cfg.collector.http_timeout_seconds),
        )?);
        let collector = Arc::new(Collector::new(api, repos.clone()));
        let forecaster = Arc::new(Forecaster::new(repos.clone(), &cfg.predictor));
        let summaries = Arc::new(SummaryService::new(repos.clone()));

        Ok(Self {
            cfg,
            repos,
            collector,
            forecaster,
            summaries,
        })
    }
}
