//! Versioned forecast models: training, inference and persistence

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use geowatch_core::{AssetId, ChangeObservation, Error, Result};
use serde::{Deserialize, Serialize};

use super::features::{scored_points, window_features, ForecastTarget, ScoredPoint, FEATURE_NAMES, SCHEMA_VERSION};
use super::ridge::{fit_ridge, RidgeFit};

/// Parameters for training and inference
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastParams {
    /// Trailing scored observations per feature vector
    pub window: usize,
    /// Scored points an asset needs to train on or be forecast
    pub min_history: usize,
    pub ridge_lambda: f64,
}

impl Default for ForecastParams {
    fn default() -> Self {
        Self {
            window: 4,
            min_history: 6,
            ridge_lambda: 1e-3,
        }
    }
}

impl ForecastParams {
    pub fn validate(&self) -> Result<()> {
        if self.window < 2 {
            return Err(Error::Config(format!("forecast.window must be >= 2, got {}", self.window)));
        }
        if self.min_history <= self.window {
            return Err(Error::Config(format!(
                "forecast.min_history ({}) must exceed forecast.window ({})",
                self.min_history, self.window
            )));
        }
        if self.ridge_lambda.is_nan() || self.ridge_lambda <= 0.0 {
            return Err(Error::Config("forecast.ridge_lambda must be positive".into()));
        }
        Ok(())
    }
}

/// Observed range of one feature during training
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRange {
    pub min: f64,
    pub max: f64,
}

/// An immutable ridge-regression snapshot for one target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastModel {
    pub target: ForecastTarget,
    pub version: u64,
    pub schema_version: u32,
    pub feature_names: Vec<String>,
    pub window: usize,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub feature_means: Vec<f64>,
    pub feature_stds: Vec<f64>,
    pub feature_ranges: Vec<FeatureRange>,
    pub trained_from: DateTime<Utc>,
    pub trained_to: DateTime<Utc>,
    pub trained_at: DateTime<Utc>,
    pub sample_count: usize,
    pub asset_count: usize,
    pub rmse: f64,
}

/// Raw model output with the features that fell outside the training range
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub value: f64,
    pub extrapolated: Vec<String>,
}

impl ForecastModel {
    fn fit(&self) -> RidgeFit {
        RidgeFit {
            coefficients: self.coefficients.clone(),
            intercept: self.intercept,
            means: self.feature_means.clone(),
            stds: self.feature_stds.clone(),
        }
    }

    /// Predict from a feature vector, clamped to [0, 1]
    pub fn predict(&self, features: &[f64]) -> Prediction {
        let extrapolated = features
            .iter()
            .zip(self.feature_ranges.iter())
            .zip(self.feature_names.iter())
            .filter(|((x, r), _)| **x < r.min - 1e-12 || **x > r.max + 1e-12)
            .map(|(_, name)| name.clone())
            .collect();

        Prediction {
            value: self.fit().predict(features).clamp(0.0, 1.0),
            extrapolated,
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let model: ForecastModel = serde_json::from_str(&fs::read_to_string(path)?)?;
        if model.schema_version != SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "model schema v{} is not supported (expected v{})",
                model.schema_version, SCHEMA_VERSION
            )));
        }
        Ok(model)
    }
}

/// An asset left out of training
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedAsset {
    pub asset_id: AssetId,
    pub points: usize,
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub model: Arc<ForecastModel>,
    pub skipped: Vec<SkippedAsset>,
}

/// Train a model for `target` over the histories of many assets.
///
/// Assets with fewer than `min_history` scored points are skipped and
/// reported. Fails with `InsufficientHistory` when no asset qualifies.
pub fn train_model(
    target: ForecastTarget,
    histories: &[(AssetId, Vec<ChangeObservation>)],
    params: &ForecastParams,
    version: u64,
) -> Result<TrainingReport> {
    params.validate()?;

    let mut samples = Vec::new();
    let mut targets = Vec::new();
    let mut skipped = Vec::new();
    let mut asset_count = 0;
    let mut span: Option<(DateTime<Utc>, DateTime<Utc>)> = None;

    for (asset_id, history) in histories {
        let points = scored_points(history);
        if points.len() < params.min_history {
            skipped.push(SkippedAsset {
                asset_id: asset_id.clone(),
                points: points.len(),
            });
            continue;
        }

        asset_count += 1;
        for i in params.window..points.len() {
            samples.push(window_features(&points[i - params.window..i]));
            targets.push(target.value_at(&points[i]));
        }

        let (first, last) = (points[0].observed_at, points[points.len() - 1].observed_at);
        span = Some(match span {
            Some((lo, hi)) => (lo.min(first), hi.max(last)),
            None => (first, last),
        });
    }

    let Some((trained_from, trained_to)) = span else {
        let best = skipped.iter().max_by_key(|s| s.points);
        return Err(Error::InsufficientHistory {
            asset_id: best.map(|s| s.asset_id.clone()).unwrap_or_else(|| AssetId::new("*")),
            points: best.map(|s| s.points).unwrap_or(0),
            required: params.min_history,
        });
    };

    let fit = fit_ridge(&samples, &targets, params.ridge_lambda)?;

    let mut feature_ranges = vec![
        FeatureRange {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        };
        FEATURE_NAMES.len()
    ];
    for s in &samples {
        for (r, x) in feature_ranges.iter_mut().zip(s) {
            r.min = r.min.min(*x);
            r.max = r.max.max(*x);
        }
    }

    let sq_err: f64 = samples
        .iter()
        .zip(&targets)
        .map(|(s, y)| (fit.predict(s) - y).powi(2))
        .sum();
    let rmse = (sq_err / samples.len() as f64).sqrt();

    let model = ForecastModel {
        target,
        version,
        schema_version: SCHEMA_VERSION,
        feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        window: params.window,
        coefficients: fit.coefficients,
        intercept: fit.intercept,
        feature_means: fit.means,
        feature_stds: fit.stds,
        feature_ranges,
        trained_from,
        trained_to,
        trained_at: Utc::now(),
        sample_count: samples.len(),
        asset_count,
        rmse,
    };

    Ok(TrainingReport {
        model: Arc::new(model),
        skipped,
    })
}

/// Growth category of a prediction relative to the last observed score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthTrend {
    Rapid,
    Moderate,
    Slow,
    Stable,
}

impl GrowthTrend {
    pub fn from_delta(delta: f64) -> Self {
        if delta >= 0.06 {
            GrowthTrend::Rapid
        } else if delta >= 0.03 {
            GrowthTrend::Moderate
        } else if delta >= 0.01 {
            GrowthTrend::Slow
        } else {
            GrowthTrend::Stable
        }
    }
}

/// A forecast for one asset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub asset_id: AssetId,
    pub target: ForecastTarget,
    pub model_version: u64,
    pub predicted: f64,
    /// Target value at the most recent scored point
    pub last_value: f64,
    pub last_observed_at: DateTime<Utc>,
    pub trend: GrowthTrend,
    /// Features outside the training range; empty when the model interpolates
    pub extrapolated: Vec<String>,
}

impl Forecast {
    pub fn delta(&self) -> f64 {
        self.predicted - self.last_value
    }

    pub fn is_extrapolation(&self) -> bool {
        !self.extrapolated.is_empty()
    }
}

/// Forecast the next value of `model.target` for one asset history
pub fn forecast(
    model: &ForecastModel,
    asset_id: &AssetId,
    history: &[ChangeObservation],
    params: &ForecastParams,
) -> Result<Forecast> {
    let points: Vec<ScoredPoint> = scored_points(history);
    let required = params.min_history.max(model.window + 1);
    if points.len() < required {
        return Err(Error::InsufficientHistory {
            asset_id: asset_id.clone(),
            points: points.len(),
            required,
        });
    }

    let window = &points[points.len() - model.window..];
    let prediction = model.predict(&window_features(window));
    let last = window[window.len() - 1];
    let last_value = model.target.value_at(&last);

    Ok(Forecast {
        asset_id: asset_id.clone(),
        target: model.target,
        model_version: model.version,
        predicted: prediction.value,
        last_value,
        last_observed_at: last.observed_at,
        trend: GrowthTrend::from_delta(prediction.value - last_value),
        extrapolated: prediction.extrapolated,
    })
}

/// The `top_n` forecasts with the largest predicted increase
pub fn growth_hotspots(forecasts: &[Forecast], top_n: usize) -> Vec<Forecast> {
    let mut ranked: Vec<Forecast> = forecasts.to_vec();
    ranked.sort_by(|a, b| b.delta().total_cmp(&a.delta()));
    ranked.truncate(top_n);
    ranked
}
