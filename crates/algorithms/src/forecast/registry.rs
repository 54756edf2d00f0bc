//! Published forecast models
//!
//! Each target has one published snapshot behind an `Arc`. Training a new
//! version never blocks readers: forecasts keep using the snapshot they
//! cloned, and publishing just swaps the pointer. Older versions stay
//! retrievable until [`ModelRegistry::supersede`] drops them.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use geowatch_core::{AssetId, ChangeObservation, Error, Result};
use parking_lot::{Mutex, MutexGuard, RwLock};

use super::features::ForecastTarget;
use super::model::{forecast, train_model, Forecast, ForecastModel, ForecastParams, TrainingReport};

#[derive(Debug)]
pub struct ModelRegistry {
    published: RwLock<HashMap<ForecastTarget, Arc<ForecastModel>>>,
    retained: RwLock<BTreeMap<(ForecastTarget, u64), Arc<ForecastModel>>>,
    training: [Mutex<()>; 2],
    next_version: AtomicU64,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            published: RwLock::new(HashMap::new()),
            retained: RwLock::new(BTreeMap::new()),
            training: [Mutex::new(()), Mutex::new(())],
            next_version: AtomicU64::new(1),
        }
    }

    /// Claim the training slot for `target`.
    ///
    /// Fails with `TrainingInProgress` while another run holds it.
    pub fn reserve(&self, target: ForecastTarget) -> Result<MutexGuard<'_, ()>> {
        self.training[target.index()]
            .try_lock()
            .ok_or_else(|| Error::TrainingInProgress(target.to_string()))
    }

    /// Train and publish a new version for `target`
    pub fn train(
        &self,
        target: ForecastTarget,
        histories: &[(AssetId, Vec<ChangeObservation>)],
        params: &ForecastParams,
    ) -> Result<TrainingReport> {
        let _slot = self.reserve(target)?;
        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        let report = train_model(target, histories, params, version)?;
        self.publish_arc(Arc::clone(&report.model));
        Ok(report)
    }

    /// Publish an externally built or loaded model
    pub fn publish(&self, model: ForecastModel) -> Arc<ForecastModel> {
        let model = Arc::new(model);
        self.publish_arc(Arc::clone(&model));
        model
    }

    fn publish_arc(&self, model: Arc<ForecastModel>) {
        self.next_version.fetch_max(model.version + 1, Ordering::SeqCst);
        self.retained
            .write()
            .insert((model.target, model.version), Arc::clone(&model));
        self.published.write().insert(model.target, model);
    }

    /// Currently published snapshot
    pub fn current(&self, target: ForecastTarget) -> Option<Arc<ForecastModel>> {
        self.published.read().get(&target).cloned()
    }

    /// A retained version
    pub fn get(&self, target: ForecastTarget, version: u64) -> Option<Arc<ForecastModel>> {
        self.retained.read().get(&(target, version)).cloned()
    }

    /// Retained versions for `target`, ascending
    pub fn versions(&self, target: ForecastTarget) -> Vec<u64> {
        self.retained
            .read()
            .keys()
            .filter(|(t, _)| *t == target)
            .map(|(_, v)| *v)
            .collect()
    }

    /// Drop every retained version of `target` except the published one.
    ///
    /// Returns how many versions were released. Callers still holding an
    /// `Arc` keep their snapshot alive.
    pub fn supersede(&self, target: ForecastTarget) -> usize {
        let current = self.current(target).map(|m| m.version);
        let mut retained = self.retained.write();
        let before = retained.len();
        retained.retain(|(t, v), _| *t != target || Some(*v) == current);
        before - retained.len()
    }

    /// Forecast with the published model for `target`
    pub fn forecast(
        &self,
        target: ForecastTarget,
        asset_id: &AssetId,
        history: &[ChangeObservation],
        params: &ForecastParams,
    ) -> Result<Forecast> {
        let model = self
            .current(target)
            .ok_or_else(|| Error::Algorithm(format!("no published {target} model")))?;
        forecast(&model, asset_id, history, params)
    }
}
