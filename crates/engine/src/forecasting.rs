//! Forecasting and anomaly scans over the recorded history

use geowatch_algorithms::anomaly::AnomalyDetector;
use geowatch_algorithms::forecast::{Forecast, ForecastParams, ForecastTarget, ModelRegistry, TrainingReport};
use geowatch_core::{AnomalyFlag, AssetId, ChangeObservation, Error, HistoryStore, Result};
use tracing::{debug, info};

/// Every asset's full history, in asset id order
pub fn collect_histories(history: &dyn HistoryStore) -> Result<Vec<(AssetId, Vec<ChangeObservation>)>> {
    history
        .asset_ids()?
        .into_iter()
        .map(|id| {
            let observations = history.read_all(&id)?;
            Ok((id, observations))
        })
        .collect()
}

/// Train and publish a new `target` model from everything in `history`
pub fn train_from_history(
    registry: &ModelRegistry,
    target: ForecastTarget,
    history: &dyn HistoryStore,
    params: &ForecastParams,
) -> Result<TrainingReport> {
    let histories = collect_histories(history)?;
    let report = registry.train(target, &histories, params)?;

    for skipped in &report.skipped {
        debug!(
            "{}: {} scored points, {} required, left out of training",
            skipped.asset_id, skipped.points, params.min_history
        );
    }
    info!(
        "Trained {} model v{} on {} samples from {} assets (rmse {:.4})",
        target, report.model.version, report.model.sample_count, report.model.asset_count, report.model.rmse
    );
    Ok(report)
}

/// Forecasts plus the assets that had too little history
#[derive(Debug, Clone, Default)]
pub struct ForecastRun {
    pub forecasts: Vec<Forecast>,
    pub insufficient: Vec<(AssetId, usize)>,
}

/// Forecast every asset in `history` with the published `target` model.
///
/// Assets below `min_history` are reported, not errors.
pub fn forecast_assets(
    registry: &ModelRegistry,
    target: ForecastTarget,
    history: &dyn HistoryStore,
    params: &ForecastParams,
) -> Result<ForecastRun> {
    if registry.current(target).is_none() {
        return Err(Error::Algorithm(format!("no published {target} model")));
    }

    let mut run = ForecastRun::default();
    for (asset_id, observations) in collect_histories(history)? {
        match registry.forecast(target, &asset_id, &observations, params) {
            Ok(forecast) => run.forecasts.push(forecast),
            Err(Error::InsufficientHistory { points, .. }) => {
                debug!("{}: {} scored points, not forecast", asset_id, points);
                run.insufficient.push((asset_id, points));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(run)
}

/// Anomaly flags over every asset's full history
pub fn scan_anomalies(history: &dyn HistoryStore, detector: &AnomalyDetector) -> Result<Vec<AnomalyFlag>> {
    let mut flags = Vec::new();
    for (asset_id, observations) in collect_histories(history)? {
        flags.extend(detector.detect(&asset_id, &observations));
    }
    Ok(flags)
}
