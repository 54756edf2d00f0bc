//! Geography-aware threat classification
//!
//! Maps a fused change observation to a threat level using per-category
//! bands scaled by zone and sensitivity, then escalates on newly mapped
//! construction nearby and de-escalates low-confidence measurements.

mod bands;
mod zones;

pub use bands::{default_bands, Sensitivity, ThreatBands};
pub use zones::{haversine_km, ReferenceSite, ZoneMultipliers, ZoneParams};

use geowatch_core::{
    Asset, CategoryTable, ChangeObservation, ClassificationResult, GeoZone, OsmContext, PriorityRank, RationaleFactor,
    ThreatLevel,
};
use serde::{Deserialize, Serialize};

/// Parameters for classification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierParams {
    pub bands: CategoryTable<ThreatBands>,
    pub sensitivity: Sensitivity,
    pub zones: ZoneParams,
    /// New OSM features closer than this escalate by one band
    pub new_feature_radius_m: f64,
    /// Confidence below which the level is lowered by one band
    pub min_trust_confidence: f64,
    /// Criticality at or above which the rationale flags the asset
    pub high_criticality: f64,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            bands: default_bands(),
            sensitivity: Sensitivity::Medium,
            zones: ZoneParams::default(),
            new_feature_radius_m: 500.0,
            min_trust_confidence: 0.5,
            high_criticality: 0.8,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Classifier {
    params: ClassifierParams,
}

impl Classifier {
    pub fn new(params: ClassifierParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ClassifierParams {
        &self.params
    }

    /// Zone of an asset from the configured reference sites
    pub fn zone_of(&self, asset: &Asset) -> GeoZone {
        self.params.zones.zone_of(asset)
    }

    /// Classify one observation of `asset` in `zone`.
    ///
    /// For a fixed category, zone, confidence and context the level never
    /// decreases as the change score grows.
    pub fn classify(
        &self,
        observation: &ChangeObservation,
        asset: &Asset,
        context: Option<&OsmContext>,
        zone: GeoZone,
    ) -> ClassificationResult {
        let (threat_level, rationale) = match observation.change_score {
            Some(score) if observation.is_scored() => self.level(observation, score, asset, context, zone),
            _ => (ThreatLevel::None, vec![RationaleFactor::InsufficientData]),
        };

        ClassificationResult {
            asset_id: asset.id.clone(),
            observed_at: observation.observed_at,
            threat_level,
            priority: PriorityRank {
                threat: threat_level,
                criticality: asset.criticality,
                confidence: observation.confidence,
                observed_at: observation.observed_at,
            },
            zone,
            change_score: observation.change_score,
            rationale,
        }
    }

    fn level(
        &self,
        observation: &ChangeObservation,
        score: f64,
        asset: &Asset,
        context: Option<&OsmContext>,
        zone: GeoZone,
    ) -> (ThreatLevel, Vec<RationaleFactor>) {
        let params = &self.params;
        let zone_multiplier = params.zones.multipliers.get(zone);
        let sensitivity = params.sensitivity.multiplier();
        let bands = params
            .bands
            .get(asset.category)
            .scaled(zone_multiplier * sensitivity);

        let (mut level, threshold) = bands.level_for(score);
        let mut rationale = vec![RationaleFactor::ScoreBand {
            score,
            level,
            threshold,
        }];
        if zone_multiplier != 1.0 {
            rationale.push(RationaleFactor::ZoneAdjustment {
                zone,
                multiplier: zone_multiplier,
            });
        }
        if sensitivity != 1.0 {
            rationale.push(RationaleFactor::Sensitivity {
                multiplier: sensitivity,
            });
        }

        if score > 0.0
            && let Some(feature) = context.and_then(|c| {
                c.new_constructive_within(params.new_feature_radius_m)
                    .min_by(|a, b| a.distance_m.total_cmp(&b.distance_m))
            })
        {
            level = level.raise();
            rationale.push(RationaleFactor::NewFeature {
                feature_id: feature.id,
                kind: feature.kind,
                distance_m: feature.distance_m,
            });
        }

        if observation.confidence < params.min_trust_confidence {
            // Never drop a detected change below low
            if level > ThreatLevel::Low {
                level = level.lower();
            }
            rationale.push(RationaleFactor::LowConfidence {
                confidence: observation.confidence,
                min_trust: params.min_trust_confidence,
            });
        }

        if let Some(signal) = observation.dominant_signal {
            rationale.push(RationaleFactor::DominantSignal { signal });
        }
        if observation.disagreement {
            rationale.push(RationaleFactor::SignalDisagreement);
        }
        if zone == GeoZone::Border {
            rationale.push(RationaleFactor::BorderProximity);
        }
        if asset.criticality >= params.high_criticality {
            rationale.push(RationaleFactor::HighCriticality {
                criticality: asset.criticality,
            });
        }

        (level, rationale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use geo::polygon;
    use geowatch_core::{AssetCategory, AssetId, FeatureKind, OsmFeature, SignalKind};

    fn asset(category: AssetCategory, criticality: f64) -> Asset {
        Asset::new(
            "asset-1",
            "Test",
            category,
            polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)],
            criticality,
        )
    }

    fn observation(score: f64, confidence: f64) -> ChangeObservation {
        let t = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        ChangeObservation::scored(
            AssetId::new("asset-1"),
            t,
            t,
            score,
            confidence,
            Vec::new(),
            Some(SignalKind::Structural),
            false,
        )
    }

    fn context_with_new_road(distance_m: f64) -> OsmContext {
        OsmContext::from_snapshots(
            &[],
            vec![OsmFeature {
                id: 7,
                kind: FeatureKind::Road,
                distance_m,
            }],
            3.0,
            None,
        )
    }

    #[test]
    fn test_military_scenario_is_high() {
        let classifier = Classifier::default();
        let result = classifier.classify(
            &observation(0.543, 0.7),
            &asset(AssetCategory::Military, 0.9),
            None,
            GeoZone::Interior,
        );
        assert_eq!(result.threat_level, ThreatLevel::High);
        assert!(result.rationale.contains(&RationaleFactor::HighCriticality { criticality: 0.9 }));
    }

    #[test]
    fn test_insufficient_is_none() {
        let t = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        let obs = ChangeObservation::insufficient(AssetId::new("asset-1"), t, t, Vec::new());
        let result = Classifier::default().classify(&obs, &asset(AssetCategory::Bridge, 0.5), None, GeoZone::Border);
        assert_eq!(result.threat_level, ThreatLevel::None);
        assert_eq!(result.rationale, vec![RationaleFactor::InsufficientData]);
    }

    #[test]
    fn test_border_zone_lowers_bands() {
        let classifier = Classifier::default();
        let a = asset(AssetCategory::Bridge, 0.5);
        let interior = classifier.classify(&observation(0.45, 0.9), &a, None, GeoZone::Interior);
        let border = classifier.classify(&observation(0.45, 0.9), &a, None, GeoZone::Border);
        assert_eq!(interior.threat_level, ThreatLevel::Medium);
        assert_eq!(border.threat_level, ThreatLevel::High);
        assert!(border.rationale.contains(&RationaleFactor::BorderProximity));
    }

    #[test]
    fn test_new_feature_escalates_only_within_radius() {
        let classifier = Classifier::default();
        let a = asset(AssetCategory::Bridge, 0.5);
        let obs = observation(0.4, 0.9);

        let near = classifier.classify(&obs, &a, Some(&context_with_new_road(120.0)), GeoZone::Interior);
        let far = classifier.classify(&obs, &a, Some(&context_with_new_road(2000.0)), GeoZone::Interior);
        assert_eq!(far.threat_level, ThreatLevel::Medium);
        assert_eq!(near.threat_level, ThreatLevel::High);

        let quiet = classifier.classify(&observation(0.0, 0.9), &a, Some(&context_with_new_road(120.0)), GeoZone::Interior);
        assert_eq!(quiet.threat_level, ThreatLevel::None);
    }

    #[test]
    fn test_low_trust_never_drops_to_none() {
        let classifier = Classifier::default();
        let a = asset(AssetCategory::Bridge, 0.5);

        let low = classifier.classify(&observation(0.25, 0.2), &a, None, GeoZone::Interior);
        assert_eq!(low.threat_level, ThreatLevel::Low);

        let high = classifier.classify(&observation(0.55, 0.2), &a, None, GeoZone::Interior);
        assert_eq!(high.threat_level, ThreatLevel::Medium);
    }

    #[test]
    fn test_threat_monotone_in_score() {
        let sensitivities = [Sensitivity::Low, Sensitivity::Medium, Sensitivity::High];
        let contexts = [None, Some(context_with_new_road(100.0))];
        for sensitivity in sensitivities {
            let classifier = Classifier::new(ClassifierParams {
                sensitivity,
                ..Default::default()
            });
            for category in AssetCategory::ALL {
                let a = asset(category, 0.5);
                for zone in [GeoZone::Border, GeoZone::Strategic, GeoZone::Urban, GeoZone::Interior] {
                    for confidence in [0.2, 0.9] {
                        for ctx in &contexts {
                            let mut previous = ThreatLevel::None;
                            for step in 0..=100 {
                                let score = step as f64 / 100.0;
                                let level = classifier
                                    .classify(&observation(score, confidence), &a, ctx.as_ref(), zone)
                                    .threat_level;
                                assert!(
                                    level >= previous,
                                    "{category}/{zone}: {previous} -> {level} at score {score}"
                                );
                                previous = level;
                            }
                        }
                    }
                }
            }
        }
    }
}
