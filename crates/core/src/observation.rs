//! Fused change observations, the per-asset time series

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::asset::AssetId;
use crate::signal::{SignalKind, SignalResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    Scored,
    /// No signal was valid; the observation carries no score
    InsufficientData,
}

/// One fused change measurement between two acquisitions of an asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeObservation {
    pub asset_id: AssetId,
    pub baseline_at: DateTime<Utc>,
    /// Acquisition time of the later image
    pub observed_at: DateTime<Utc>,
    pub status: ChangeStatus,
    /// Fused score in [0, 1], absent when insufficient
    pub change_score: Option<f64>,
    pub confidence: f64,
    pub signals: Vec<SignalResult>,
    pub dominant_signal: Option<SignalKind>,
    pub disagreement: bool,
}

impl ChangeObservation {
    #[allow(clippy::too_many_arguments)]
    pub fn scored(
        asset_id: AssetId,
        baseline_at: DateTime<Utc>,
        observed_at: DateTime<Utc>,
        change_score: f64,
        confidence: f64,
        signals: Vec<SignalResult>,
        dominant_signal: Option<SignalKind>,
        disagreement: bool,
    ) -> Self {
        Self {
            asset_id,
            baseline_at,
            observed_at,
            status: ChangeStatus::Scored,
            change_score: Some(change_score.clamp(0.0, 1.0)),
            confidence: confidence.clamp(0.0, 1.0),
            signals,
            dominant_signal,
            disagreement,
        }
    }

    pub fn insufficient(
        asset_id: AssetId,
        baseline_at: DateTime<Utc>,
        observed_at: DateTime<Utc>,
        signals: Vec<SignalResult>,
    ) -> Self {
        Self {
            asset_id,
            baseline_at,
            observed_at,
            status: ChangeStatus::InsufficientData,
            change_score: None,
            confidence: 0.0,
            signals,
            dominant_signal: None,
            disagreement: false,
        }
    }

    pub fn is_scored(&self) -> bool {
        self.status == ChangeStatus::Scored && self.change_score.is_some()
    }

    pub fn signal(&self, kind: SignalKind) -> Option<&SignalResult> {
        self.signals.iter().find(|s| s.kind == kind)
    }

    pub fn valid_signal_count(&self) -> usize {
        self.signals.iter().filter(|s| s.is_valid()).count()
    }
}
