//! Fusion & scoring
//!
//! Combines the per-signal magnitudes of one aligned pair into a single
//! bounded change score with a confidence. Weights depend on the asset
//! category; only valid signals contribute.

use geowatch_core::{Asset, AssetCategory, CategoryTable, ChangeObservation, SignalKind, SignalResult};
use serde::{Deserialize, Serialize};

use crate::align::AlignedPair;

/// Per-signal weights for one asset category
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalWeights {
    pub ndvi: f64,
    pub structural: f64,
    pub texture: f64,
}

impl SignalWeights {
    pub fn new(ndvi: f64, structural: f64, texture: f64) -> Self {
        Self {
            ndvi,
            structural,
            texture,
        }
    }

    pub fn weight(&self, kind: SignalKind) -> f64 {
        match kind {
            SignalKind::Ndvi => self.ndvi,
            SignalKind::Structural => self.structural,
            SignalKind::Texture => self.texture,
        }
    }

    /// Configured weight mass over all signals
    pub fn total(&self) -> f64 {
        self.ndvi + self.structural + self.texture
    }
}

/// Default weights. Built structures lean on the structural signal,
/// vegetated surroundings (rail corridors, border strips) on NDVI.
pub fn default_weights() -> CategoryTable<SignalWeights> {
    CategoryTable::from_fn(|category| match category {
        AssetCategory::Bridge => SignalWeights::new(0.2, 0.5, 0.3),
        AssetCategory::Airport => SignalWeights::new(0.3, 0.4, 0.3),
        AssetCategory::PowerPlant => SignalWeights::new(0.2, 0.4, 0.4),
        AssetCategory::Railway => SignalWeights::new(0.3, 0.4, 0.3),
        AssetCategory::Military => SignalWeights::new(0.2, 0.5, 0.3),
        AssetCategory::BorderControl => SignalWeights::new(0.4, 0.3, 0.3),
        AssetCategory::Other => SignalWeights::new(1.0, 1.0, 1.0),
    })
}

/// Parameters for fusion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionParams {
    pub weights: CategoryTable<SignalWeights>,
    /// Magnitude spread at which valid signals are considered in disagreement
    pub disagreement_threshold: f64,
    /// Confidence multiplier applied on disagreement
    pub disagreement_penalty: f64,
    /// Cloud cover above which confidence starts to drop
    pub cloud_soft_threshold: f64,
    /// Confidence lost at 100% cloud cover
    pub cloud_penalty: f64,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            weights: default_weights(),
            disagreement_threshold: 0.5,
            disagreement_penalty: 0.5,
            cloud_soft_threshold: 0.3,
            cloud_penalty: 0.5,
        }
    }
}

/// Outcome of fusing one set of signals
#[derive(Debug, Clone, PartialEq)]
pub struct FusedScore {
    /// `None` when no signal was valid
    pub score: Option<f64>,
    pub confidence: f64,
    pub dominant_signal: Option<SignalKind>,
    pub disagreement: bool,
}

/// Fuse signal results for an asset of `category`.
///
/// `cloud_cover` is the cover of the cloudier acquisition.
pub fn fuse_signals(
    category: AssetCategory,
    signals: &[SignalResult],
    cloud_cover: f64,
    params: &FusionParams,
) -> FusedScore {
    let weights = params.weights.get(category);
    let total_mass = weights.total();

    let valid: Vec<(SignalKind, f64, f64)> = signals
        .iter()
        .filter_map(|s| s.magnitude().map(|m| (s.kind, m, weights.weight(s.kind))))
        .filter(|&(_, _, w)| w > 0.0)
        .collect();

    let valid_mass: f64 = valid.iter().map(|&(_, _, w)| w).sum();
    if valid.is_empty() || valid_mass <= 0.0 || total_mass <= 0.0 {
        return FusedScore {
            score: None,
            confidence: 0.0,
            dominant_signal: None,
            disagreement: false,
        };
    }

    let (min_mag, max_mag) = valid
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, m, _)| (lo.min(m), hi.max(m)));
    let disagreement = valid.len() > 1 && max_mag - min_mag >= params.disagreement_threshold;

    let mut confidence = (valid_mass / total_mass).min(1.0);

    let (score, dominant) = if disagreement {
        // Missed detections cost more than false alarms: trust the loudest signal
        confidence *= params.disagreement_penalty;
        let loudest = valid
            .iter()
            .fold(None::<(SignalKind, f64)>, |best, &(k, m, _)| match best {
                Some((_, bm)) if bm >= m => best,
                _ => Some((k, m)),
            });
        (max_mag, loudest.map(|(k, _)| k))
    } else {
        let weighted: f64 = valid.iter().map(|&(_, m, w)| w * m).sum();
        let dominant = valid
            .iter()
            .fold(None::<(SignalKind, f64)>, |best, &(k, m, w)| match best {
                Some((_, bc)) if bc >= w * m => best,
                _ => Some((k, w * m)),
            });
        (weighted / valid_mass, dominant.map(|(k, _)| k))
    };

    let soft = params.cloud_soft_threshold;
    if cloud_cover > soft && soft < 1.0 {
        let excess = ((cloud_cover - soft) / (1.0 - soft)).min(1.0);
        confidence *= (1.0 - params.cloud_penalty * excess).max(0.0);
    }

    FusedScore {
        score: Some(score.clamp(0.0, 1.0)),
        confidence: confidence.clamp(0.0, 1.0),
        dominant_signal: dominant,
        disagreement,
    }
}

/// Fuse the signals of one aligned pair into a [`ChangeObservation`].
///
/// Zero valid signals produce an `insufficient_data` observation, not an error.
pub fn fuse(asset: &Asset, pair: &AlignedPair, signals: Vec<SignalResult>, params: &FusionParams) -> ChangeObservation {
    let fused = fuse_signals(asset.category, &signals, pair.max_cloud_cover(), params);
    let baseline_at = pair.before.acquired_at;
    let observed_at = pair.after.acquired_at;

    match fused.score {
        Some(score) => ChangeObservation::scored(
            asset.id.clone(),
            baseline_at,
            observed_at,
            score,
            fused.confidence,
            signals,
            fused.dominant_signal,
            fused.disagreement,
        ),
        None => ChangeObservation::insufficient(asset.id.clone(), baseline_at, observed_at, signals),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geowatch_core::{InvalidReason, SignalMetrics};

    fn valid(kind: SignalKind, magnitude: f64) -> SignalResult {
        SignalResult::valid(kind, magnitude, magnitude, SignalMetrics::default())
    }

    fn invalid(kind: SignalKind) -> SignalResult {
        SignalResult::invalid(kind, InvalidReason::NonFinite)
    }

    #[test]
    fn test_weighted_mean_over_valid() {
        let signals = [
            valid(SignalKind::Ndvi, 0.4),
            valid(SignalKind::Structural, 0.6),
            invalid(SignalKind::Texture),
        ];
        let fused = fuse_signals(AssetCategory::Military, &signals, 0.0, &FusionParams::default());

        assert_relative_eq!(fused.score.unwrap(), (0.2 * 0.4 + 0.5 * 0.6) / 0.7, epsilon = 1e-12);
        assert_relative_eq!(fused.confidence, 0.7, epsilon = 1e-12);
        assert_eq!(fused.dominant_signal, Some(SignalKind::Structural));
        assert!(!fused.disagreement);
    }

    #[test]
    fn test_all_invalid_is_insufficient() {
        let signals: Vec<SignalResult> = SignalKind::ALL.iter().map(|&k| invalid(k)).collect();
        let fused = fuse_signals(AssetCategory::Bridge, &signals, 0.0, &FusionParams::default());
        assert_eq!(fused.score, None);
        assert_eq!(fused.confidence, 0.0);
        assert_eq!(fused.dominant_signal, None);
    }

    #[test]
    fn test_disagreement_takes_max() {
        let signals = [
            valid(SignalKind::Ndvi, 0.05),
            valid(SignalKind::Structural, 0.9),
            valid(SignalKind::Texture, 0.1),
        ];
        let fused = fuse_signals(AssetCategory::Bridge, &signals, 0.0, &FusionParams::default());
        assert!(fused.disagreement);
        assert_relative_eq!(fused.score.unwrap(), 0.9);
        assert_relative_eq!(fused.confidence, 0.5, epsilon = 1e-12);
        assert_eq!(fused.dominant_signal, Some(SignalKind::Structural));
    }

    #[test]
    fn test_confidence_non_increasing_when_signals_drop() {
        let params = FusionParams::default();
        for category in AssetCategory::ALL {
            let mut previous = f64::INFINITY;
            for valid_count in (0..=3).rev() {
                let signals: Vec<SignalResult> = SignalKind::ALL
                    .iter()
                    .enumerate()
                    .map(|(i, &k)| if i < valid_count { valid(k, 0.3) } else { invalid(k) })
                    .collect();
                let fused = fuse_signals(category, &signals, 0.0, &params);
                assert!(
                    fused.confidence <= previous + 1e-12,
                    "{category}: confidence rose to {} with {valid_count} valid",
                    fused.confidence
                );
                previous = fused.confidence;
            }
        }
    }

    #[test]
    fn test_cloud_penalty() {
        let signals: Vec<SignalResult> = SignalKind::ALL.iter().map(|&k| valid(k, 0.3)).collect();
        let params = FusionParams::default();

        let clear = fuse_signals(AssetCategory::Airport, &signals, 0.3, &params);
        assert_relative_eq!(clear.confidence, 1.0, epsilon = 1e-12);

        // Halfway from soft threshold to overcast: 1 - 0.5 * 0.5
        let hazy = fuse_signals(AssetCategory::Airport, &signals, 0.65, &params);
        assert_relative_eq!(hazy.confidence, 0.75, epsilon = 1e-12);
        assert_eq!(hazy.score, clear.score);
    }
}
