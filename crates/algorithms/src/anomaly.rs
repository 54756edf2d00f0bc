//! Per-asset anomaly detection
//!
//! Each scored point is compared with the rolling baseline of the points
//! before it. Flagged points stay out of later baselines, so one burst of
//! activity cannot drag the baseline toward itself. A run of
//! `readmit_after` flags in the same direction is a new level: the
//! baseline restarts from that run.
//!
//! Until `min_baseline` points have accumulated, a point is scored against
//! the other unflagged points among the asset's first `window` points.

use std::collections::VecDeque;

use geowatch_core::{AnomalyDirection, AnomalyFlag, AnomalySeverity, AssetId, ChangeObservation};
use serde::{Deserialize, Serialize};

/// Parameters for anomaly detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyParams {
    /// Preceding non-anomalous points in the baseline
    pub window: usize,
    /// Baseline points required before anything is scored
    pub min_baseline: usize,
    /// Floor for the baseline standard deviation
    pub min_std: f64,
    /// Deviation, in floored standard deviations, that raises a flag
    pub threshold: f64,
    /// Consecutive same-direction flags after which the baseline moves
    pub readmit_after: usize,
}

impl Default for AnomalyParams {
    fn default() -> Self {
        Self {
            window: 8,
            min_baseline: 3,
            min_std: 0.02,
            threshold: 3.0,
            readmit_after: 3,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnomalyDetector {
    params: AnomalyParams,
}

impl AnomalyDetector {
    pub fn new(params: AnomalyParams) -> Self {
        Self { params }
    }

    /// Flag anomalous points in one asset's history.
    ///
    /// Observations of other assets and unscored observations are ignored.
    /// The history need not be sorted.
    pub fn detect(&self, asset_id: &AssetId, history: &[ChangeObservation]) -> Vec<AnomalyFlag> {
        let p = &self.params;
        let min_baseline = p.min_baseline.max(1);
        let mut points: Vec<&ChangeObservation> = history
            .iter()
            .filter(|o| &o.asset_id == asset_id && o.is_scored())
            .collect();
        points.sort_by_key(|o| o.observed_at);
        let scores: Vec<f64> = points.iter().filter_map(|o| o.change_score).collect();

        let mut baseline: VecDeque<f64> = VecDeque::with_capacity(p.window + 1);
        let mut flagged = vec![false; scores.len()];
        let mut run: Vec<f64> = Vec::new();
        let mut run_direction = None;
        let mut flags = Vec::new();

        for (i, (obs, &x)) in points.iter().zip(&scores).enumerate() {
            let reference: Vec<f64> = if baseline.len() >= min_baseline {
                baseline.iter().copied().collect()
            } else {
                (0..scores.len().min(p.window.max(min_baseline + 1)))
                    .filter(|&j| j != i && !flagged[j])
                    .map(|j| scores[j])
                    .collect()
            };

            let deviation = (reference.len() >= min_baseline)
                .then(|| mean_std(&reference, p.min_std))
                .map(|(mean, std)| (mean, std, (x - mean).abs() / std))
                .filter(|&(_, _, score)| score >= p.threshold);

            let Some((mean, std, score)) = deviation else {
                run.clear();
                run_direction = None;
                push_bounded(&mut baseline, x, p.window);
                continue;
            };

            let direction = if x >= mean {
                AnomalyDirection::Spike
            } else {
                AnomalyDirection::Drop
            };
            flagged[i] = true;
            flags.push(AnomalyFlag {
                asset_id: asset_id.clone(),
                observed_at: obs.observed_at,
                value: x,
                score,
                direction,
                severity: if score >= 2.0 * p.threshold {
                    AnomalySeverity::High
                } else {
                    AnomalySeverity::Moderate
                },
                baseline_mean: mean,
                baseline_std: std,
            });

            if run_direction != Some(direction) {
                run.clear();
                run_direction = Some(direction);
            }
            run.push(x);
            if run.len() >= p.readmit_after.max(1) {
                baseline.clear();
                for &v in &run {
                    push_bounded(&mut baseline, v, p.window);
                }
                run.clear();
                run_direction = None;
            }
        }

        flags
    }
}

/// Mean and population standard deviation, the latter floored at `min_std`
fn mean_std(values: &[f64], min_std: f64) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt().max(min_std))
}

fn push_bounded(baseline: &mut VecDeque<f64>, value: f64, window: usize) {
    baseline.push_back(value);
    if baseline.len() > window.max(1) {
        baseline.pop_front();
    }
}
