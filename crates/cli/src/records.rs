//! Input files: asset lists and OSM contexts

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use geo_types::{Coord, LineString, Polygon};
use geowatch_core::{Asset, AssetCategory, AssetId, OsmContext};
use serde::Deserialize;

/// One asset as written in an asset file
#[derive(Debug, Clone, Deserialize)]
pub struct AssetRecord {
    pub id: String,
    pub name: String,
    pub category: AssetCategory,
    #[serde(default = "default_criticality")]
    pub criticality: f64,
    /// Exterior ring as `[x, y]` pairs (lon, lat)
    pub footprint: Vec<[f64; 2]>,
}

fn default_criticality() -> f64 {
    0.5
}

impl AssetRecord {
    pub fn into_asset(self) -> Result<Asset> {
        if self.footprint.len() < 3 {
            bail!("asset {}: footprint needs at least 3 vertices, got {}", self.id, self.footprint.len());
        }
        let ring: LineString<f64> = self.footprint.iter().map(|&[x, y]| Coord { x, y }).collect();
        // Polygon::new closes the ring
        let footprint = Polygon::new(ring, vec![]);
        Ok(Asset::new(self.id, self.name, self.category, footprint, self.criticality))
    }
}

/// Parse a JSON array of asset records
pub fn parse_assets(text: &str) -> Result<Vec<Asset>> {
    let records: Vec<AssetRecord> = serde_json::from_str(text).context("invalid asset file")?;
    let mut seen = std::collections::HashSet::new();
    records
        .into_iter()
        .map(|r| {
            if !seen.insert(r.id.clone()) {
                bail!("duplicate asset id {}", r.id);
            }
            r.into_asset()
        })
        .collect()
}

pub fn read_assets(path: &Path) -> Result<Vec<Asset>> {
    let text = fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    parse_assets(&text).with_context(|| format!("in {}", path.display()))
}

/// OSM contexts keyed by asset id
pub fn read_contexts(path: &Path) -> Result<HashMap<AssetId, OsmContext>> {
    let text = fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid context file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assets() {
        let assets = parse_assets(
            r#"[
                {"id": "br-1", "name": "Bridge", "category": "bridge", "criticality": 0.7,
                 "footprint": [[30.0, 50.0], [30.01, 50.0], [30.01, 50.01], [30.0, 50.01]]},
                {"id": "pp-1", "name": "Plant", "category": "power_plant",
                 "footprint": [[31.0, 49.0], [31.02, 49.0], [31.02, 49.02]]}
            ]"#,
        )
        .unwrap();

        assert_eq!(assets.len(), 2);
        assert_eq!(assets[0].category, AssetCategory::Bridge);
        assert_eq!(assets[1].criticality, 0.5);
        assert!(assets[0].footprint.exterior().is_closed());
        let extent = assets[0].bounding_extent().unwrap();
        assert!((extent.width() - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_bad_records() {
        assert!(parse_assets(r#"[{"id": "x", "name": "X", "category": "castle", "footprint": []}]"#).is_err());
        assert!(parse_assets(r#"[{"id": "x", "name": "X", "category": "other", "footprint": [[0, 0], [1, 1]]}]"#).is_err());

        let dup = r#"[
            {"id": "a", "name": "A", "category": "other", "footprint": [[0, 0], [1, 0], [1, 1]]},
            {"id": "a", "name": "B", "category": "other", "footprint": [[0, 0], [1, 0], [1, 1]]}
        ]"#;
        assert!(parse_assets(dup).unwrap_err().to_string().contains("duplicate"));
    }
}
