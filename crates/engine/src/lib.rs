//! # GeoWatch Engine
//!
//! Runs the change pipeline over many assets.
//!
//! This crate provides:
//! - `EngineConfig`: TOML configuration for every pipeline stage
//! - `BatchRunner`: per-asset fetch, align, extract, fuse, classify and
//!   anomaly checks, isolated per asset
//! - `SignalPipeline`: the three extractors on their own threads with a deadline
//! - `ProcessingMode`: sequential or rayon-parallel execution
//! - `MockImagerySource`: seeded synthetic imagery for offline runs

pub mod batch;
pub mod config;
pub mod forecasting;
pub mod mock;
pub mod pipeline;
pub mod strategy;

pub use batch::{AssetOutcome, AssetReport, BatchRunner, BatchSummary, CancelToken};
pub use config::{BatchConfig, EngineConfig};
pub use forecasting::{collect_histories, forecast_assets, scan_anomalies, train_from_history, ForecastRun};
pub use mock::MockImagerySource;
pub use pipeline::SignalPipeline;
pub use strategy::{num_cpus, ParallelStrategy, ProcessingMode};
