//! Monitored assets and category-keyed tables

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use geo::{BoundingRect, Centroid, Polygon};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;
use crate::raster::Extent;

/// Stable identifier of a monitored asset
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Kind of infrastructure an asset represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetCategory {
    Bridge,
    Airport,
    PowerPlant,
    Railway,
    Military,
    BorderControl,
    Other,
}

impl AssetCategory {
    /// Every category, in table order
    pub const ALL: [AssetCategory; 7] = [
        AssetCategory::Bridge,
        AssetCategory::Airport,
        AssetCategory::PowerPlant,
        AssetCategory::Railway,
        AssetCategory::Military,
        AssetCategory::BorderControl,
        AssetCategory::Other,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetCategory::Bridge => "bridge",
            AssetCategory::Airport => "airport",
            AssetCategory::PowerPlant => "power_plant",
            AssetCategory::Railway => "railway",
            AssetCategory::Military => "military",
            AssetCategory::BorderControl => "border_control",
            AssetCategory::Other => "other",
        }
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        AssetCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| Error::InvalidParameter {
                name: "category",
                value: s.to_string(),
                reason: "expected one of bridge, airport, power_plant, railway, military, border_control, other".into(),
            })
    }
}

/// A fixed geographic asset under monitoring.
///
/// Assets are created by ingestion and only ever read by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub id: AssetId,
    pub name: String,
    pub category: AssetCategory,
    /// Monitored extent in the imagery CRS (lon/lat degrees for zone lookups)
    pub footprint: Polygon<f64>,
    /// Relative importance in [0, 1], used to order assets for review
    pub criticality: f64,
}

impl Asset {
    pub fn new(
        id: impl Into<AssetId>,
        name: impl Into<String>,
        category: AssetCategory,
        footprint: Polygon<f64>,
        criticality: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            footprint,
            criticality: criticality.clamp(0.0, 1.0),
        }
    }

    /// Bounding box of the footprint, `None` for an empty polygon
    pub fn bounding_extent(&self) -> Option<Extent> {
        self.footprint
            .bounding_rect()
            .map(|r| Extent::new(r.min().x, r.min().y, r.max().x, r.max().y))
    }

    /// Footprint centroid as (x, y)
    pub fn centroid(&self) -> Option<(f64, f64)> {
        self.footprint.centroid().map(|p| (p.x(), p.y()))
    }
}

impl From<String> for AssetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A value for every [`AssetCategory`].
///
/// Deserializes from a map keyed by category name and refuses to load when
/// any category is missing, so weight and threshold tables never fall back
/// to silent defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTable<T> {
    entries: [T; 7],
}

impl<T> CategoryTable<T> {
    /// Build a table by evaluating `f` for each category
    pub fn from_fn(f: impl FnMut(AssetCategory) -> T) -> Self {
        Self {
            entries: AssetCategory::ALL.map(f),
        }
    }

    pub fn get(&self, category: AssetCategory) -> &T {
        &self.entries[category.index()]
    }

    pub fn get_mut(&mut self, category: AssetCategory) -> &mut T {
        &mut self.entries[category.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (AssetCategory, &T)> {
        AssetCategory::ALL.into_iter().zip(self.entries.iter())
    }
}

impl<T: Serialize> Serialize for CategoryTable<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter().map(|(c, v)| (c.as_str(), v)))
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for CategoryTable<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut map = BTreeMap::<AssetCategory, T>::deserialize(deserializer)?;

        let missing: Vec<&str> = AssetCategory::ALL
            .iter()
            .filter(|c| !map.contains_key(c))
            .map(|c| c.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(D::Error::custom(format!(
                "category table is missing entries for: {}",
                missing.join(", ")
            )));
        }

        let entries: Vec<T> = AssetCategory::ALL
            .iter()
            .filter_map(|c| map.remove(c))
            .collect();
        let entries: [T; 7] = entries
            .try_into()
            .map_err(|_| D::Error::custom("category table has the wrong number of entries"))?;

        Ok(Self { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square_footprint() -> Polygon<f64> {
        polygon![
            (x: 77.0, y: 28.0),
            (x: 77.1, y: 28.0),
            (x: 77.1, y: 28.1),
            (x: 77.0, y: 28.1),
            (x: 77.0, y: 28.0),
        ]
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("Power Plant".parse::<AssetCategory>().unwrap(), AssetCategory::PowerPlant);
        assert_eq!("border-control".parse::<AssetCategory>().unwrap(), AssetCategory::BorderControl);
        assert!("harbour".parse::<AssetCategory>().is_err());
    }

    #[test]
    fn test_asset_geometry() {
        let asset = Asset::new("a-1", "Yamuna Bridge", AssetCategory::Bridge, square_footprint(), 1.7);
        assert_eq!(asset.criticality, 1.0);

        let extent = asset.bounding_extent().unwrap();
        assert!((extent.width() - 0.1).abs() < 1e-12);

        let (cx, cy) = asset.centroid().unwrap();
        assert!((cx - 77.05).abs() < 1e-9);
        assert!((cy - 28.05).abs() < 1e-9);
    }

    #[derive(Deserialize)]
    struct Wrapper {
        table: CategoryTable<f64>,
    }

    #[test]
    fn test_category_table_requires_every_category() {
        let partial = r#"
            [table]
            bridge = 1.0
            airport = 2.0
        "#;
        let err = toml::from_str::<Wrapper>(partial).err().unwrap().to_string();
        assert!(err.contains("power_plant"), "unexpected error: {err}");
    }

    #[test]
    fn test_category_table_roundtrip() {
        let table = CategoryTable::from_fn(|c| c as usize as f64);
        let text = toml::to_string(&std::collections::BTreeMap::from([("table", &table)])).unwrap();
        let back: Wrapper = toml::from_str(&text).unwrap();
        assert_eq!(back.table, table);
        assert_eq!(*back.table.get(AssetCategory::Military), 4.0);
    }
}
