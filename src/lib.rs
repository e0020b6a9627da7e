pub mod api;
pub mod collector;
pub mod config;
pub mod domain;
pub mod forecast;
pub mod jobs;
pub mod ml;
pub mod repo;
pub mod state;
pub mod telemetry;
