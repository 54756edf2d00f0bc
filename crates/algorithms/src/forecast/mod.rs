//! Temporal forecasting over per-asset change-score histories
//!
//! Ridge regression over a fixed feature schema predicts the next change
//! score (`growth`) or the next confidence-weighted score (`threat_score`).

mod features;
mod model;
mod registry;
mod ridge;

pub use features::{scored_points, window_features, ForecastTarget, ScoredPoint, FEATURE_NAMES, SCHEMA_VERSION};
pub use model::{
    forecast, growth_hotspots, train_model, FeatureRange, Forecast, ForecastModel, ForecastParams, GrowthTrend,
    Prediction, SkippedAsset, TrainingReport,
};
pub use registry::ModelRegistry;
pub use ridge::{fit_ridge, RidgeFit};
