//! Geographic context: OSM surroundings and zone classes

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// OSM feature classes relevant to escalation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Road,
    Building,
    Infrastructure,
    Other,
}

impl FeatureKind {
    /// Whether a newly mapped feature of this kind indicates construction
    pub fn is_constructive(&self) -> bool {
        !matches!(self, FeatureKind::Other)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OsmFeature {
    pub id: u64,
    pub kind: FeatureKind,
    /// Distance from the asset footprint in meters
    pub distance_m: f64,
}

/// OSM surroundings of an asset at the time of an analysis
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OsmContext {
    /// Mapped features per square kilometer around the asset
    pub feature_density: f64,
    pub land_use: Option<String>,
    pub features: Vec<OsmFeature>,
    /// Features absent from the previous context
    pub new_features: Vec<OsmFeature>,
}

impl OsmContext {
    /// Build a context by diffing the current feature set against the previous one
    pub fn from_snapshots(
        previous: &[OsmFeature],
        current: Vec<OsmFeature>,
        feature_density: f64,
        land_use: Option<String>,
    ) -> Self {
        let known: HashSet<u64> = previous.iter().map(|f| f.id).collect();
        let new_features = current
            .iter()
            .filter(|f| !known.contains(&f.id))
            .cloned()
            .collect();

        Self {
            feature_density,
            land_use,
            features: current,
            new_features,
        }
    }

    /// New roads, buildings or infrastructure within `radius_m` of the asset
    pub fn new_constructive_within(&self, radius_m: f64) -> impl Iterator<Item = &OsmFeature> {
        self.new_features
            .iter()
            .filter(move |f| f.kind.is_constructive() && f.distance_m <= radius_m)
    }
}

/// Geographic zone class of an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeoZone {
    Border,
    Strategic,
    Urban,
    Interior,
}

impl GeoZone {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeoZone::Border => "border",
            GeoZone::Strategic => "strategic",
            GeoZone::Urban => "urban",
            GeoZone::Interior => "interior",
        }
    }
}

impl fmt::Display for GeoZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(id: u64, kind: FeatureKind, distance_m: f64) -> OsmFeature {
        OsmFeature { id, kind, distance_m }
    }

    #[test]
    fn test_snapshot_diff() {
        let previous = vec![feature(1, FeatureKind::Road, 100.0)];
        let current = vec![
            feature(1, FeatureKind::Road, 100.0),
            feature(2, FeatureKind::Building, 300.0),
            feature(3, FeatureKind::Other, 50.0),
            feature(4, FeatureKind::Infrastructure, 900.0),
        ];
        let ctx = OsmContext::from_snapshots(&previous, current, 12.0, None);

        assert_eq!(ctx.new_features.len(), 3);
        let near: Vec<u64> = ctx.new_constructive_within(500.0).map(|f| f.id).collect();
        assert_eq!(near, vec![2]);
    }
}
