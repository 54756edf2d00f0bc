//! Seeded synthetic imagery for offline runs and tests
//!
//! Every asset gets a vegetated field crossed by a road. Acquisitions
//! differ by sensor noise and a cloud bank masking the top of the tile. Construction can be injected per asset: from its start
//! date on, a bright bare-soil block appears in the middle of the tile.

use std::collections::HashMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use geowatch_core::sources::ImagerySource;
use geowatch_core::{Asset, AssetId, Band, GeoTransform, ImageryObservation, Raster, Result, TimeRange};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

const SENSOR: &str = "mock";
/// Upper bound on acquisitions per request
const MAX_ACQUISITIONS: usize = 512;

/// Deterministic [`ImagerySource`]: the same seed, asset and range always
/// produce the same tiles
#[derive(Debug, Clone)]
pub struct MockImagerySource {
    seed: u64,
    grid: usize,
    revisit_days: i64,
    max_cloud_cover: f64,
    panchromatic: bool,
    open_ended_count: usize,
    construction: HashMap<AssetId, DateTime<Utc>>,
}

impl MockImagerySource {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            grid: 32,
            revisit_days: 10,
            max_cloud_cover: 0.3,
            panchromatic: true,
            open_ended_count: 8,
            construction: HashMap::new(),
        }
    }

    /// Cells along the longer side of the footprint (at least 3)
    pub fn with_grid(mut self, grid: usize) -> Self {
        self.grid = grid.max(3);
        self
    }

    pub fn with_revisit_days(mut self, days: i64) -> Self {
        self.revisit_days = days.max(1);
        self
    }

    /// Acquisition cloud cover is drawn uniformly from `[0, max)`
    pub fn with_max_cloud_cover(mut self, max: f64) -> Self {
        self.max_cloud_cover = max.clamp(0.0, 1.0);
        self
    }

    pub fn with_panchromatic(mut self, panchromatic: bool) -> Self {
        self.panchromatic = panchromatic;
        self
    }

    /// Acquisitions produced when the requested range has no end
    pub fn with_open_ended_count(mut self, count: usize) -> Self {
        self.open_ended_count = count;
        self
    }

    /// Build on `asset_id` from `start` onward
    pub fn with_construction(mut self, asset_id: impl Into<AssetId>, start: DateTime<Utc>) -> Self {
        self.construction.insert(asset_id.into(), start);
        self
    }

    fn asset_seed(&self, asset_id: &AssetId) -> u64 {
        // FNV-1a over the id, mixed with the source seed
        asset_id
            .as_str()
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325 ^ self.seed, |h, b| (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3))
    }

    fn render(&self, asset: &Asset, site: &Site, index: usize, acquired_at: DateTime<Utc>) -> Result<ImageryObservation> {
        let mut rng = StdRng::seed_from_u64(site.seed ^ (index as u64 + 1).wrapping_mul(0x9e37_79b9_7f4a_7c15));
        let cloud_cover = if self.max_cloud_cover > 0.0 {
            rng.gen_range(0.0..self.max_cloud_cover)
        } else {
            0.0
        };
        let cloud_rows = (cloud_cover * site.rows as f64).round() as usize;
        let built = self
            .construction
            .get(&asset.id)
            .is_some_and(|start| acquired_at >= *start);

        let (rows, cols) = (site.rows, site.cols);
        let (b_rows, b_cols) = ((rows / 4).max(1), (cols / 4).max(1));
        let (b_top, b_left) = ((rows - b_rows) / 2, (cols - b_cols) / 2);

        let n = rows * cols;
        let mut red = Vec::with_capacity(n);
        let mut nir = Vec::with_capacity(n);
        for row in 0..rows {
            for col in 0..cols {
                if row < cloud_rows {
                    red.push(f64::NAN);
                    nir.push(f64::NAN);
                    continue;
                }
                let building = built && (b_top..b_top + b_rows).contains(&row) && (b_left..b_left + b_cols).contains(&col);
                let (r, v) = if building {
                    (0.35, 0.38)
                } else if col == site.road_col {
                    (0.3, 0.35)
                } else {
                    (site.field_red, site.field_nir)
                };
                red.push(r + rng.gen_range(-0.0015..0.0015));
                nir.push(v + rng.gen_range(-0.0015..0.0015));
            }
        }

        let pan: Vec<f64> = red.iter().zip(&nir).map(|(r, v)| 0.5 * (r + v)).collect();

        let mut observation = ImageryObservation::new(SENSOR, acquired_at, site.transform, cloud_cover)
            .with_band(Band::Red, Raster::from_vec(red, rows, cols)?)?
            .with_band(Band::Nir, Raster::from_vec(nir, rows, cols)?)?;
        if self.panchromatic {
            observation = observation.with_band(Band::Panchromatic, Raster::from_vec(pan, rows, cols)?)?;
        }
        Ok(observation)
    }
}

impl Default for MockImagerySource {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Per-asset scene layout, fixed across acquisitions
struct Site {
    seed: u64,
    rows: usize,
    cols: usize,
    transform: GeoTransform,
    road_col: usize,
    field_red: f64,
    field_nir: f64,
}

impl ImagerySource for MockImagerySource {
    fn fetch_observations(&self, asset: &Asset, range: TimeRange) -> Vec<ImageryObservation> {
        let Some(extent) = asset.bounding_extent().filter(|e| e.width() > 0.0 && e.height() > 0.0) else {
            debug!("asset {} has an empty footprint, no mock imagery", asset.id);
            return Vec::new();
        };

        let seed = self.asset_seed(&asset.id);
        let mut layout = StdRng::seed_from_u64(seed);
        let cell = extent.width().max(extent.height()) / self.grid as f64;
        let rows = ((extent.height() / cell).ceil() as usize).max(3);
        let cols = ((extent.width() / cell).ceil() as usize).max(3);
        let site = Site {
            seed,
            rows,
            cols,
            transform: GeoTransform::for_extent(&extent, cell),
            road_col: layout.gen_range(1..cols / 3 + 1),
            field_red: layout.gen_range(0.04..0.07),
            field_nir: layout.gen_range(0.40..0.50),
        };

        let start = range
            .start
            .unwrap_or_else(|| Utc.with_ymd_and_hms(2024, 1, 1, 10, 30, 0).single().unwrap_or_default());
        let step = Duration::days(self.revisit_days);

        (0..MAX_ACQUISITIONS)
            .map(|k| (k, start + step * k as i32))
            .take_while(|&(k, at)| match range.end {
                Some(end) => at < end,
                None => k < self.open_ended_count,
            })
            .filter_map(|(k, at)| match self.render(asset, &site, k, at) {
                Ok(observation) => Some(observation),
                Err(e) => {
                    warn!("mock acquisition {} for {} failed: {}", k, asset.id, e);
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::polygon;
    use geowatch_core::AssetCategory;

    fn asset(id: &str) -> Asset {
        Asset::new(
            id,
            "Test",
            AssetCategory::Bridge,
            polygon![(x: 10.0, y: 50.0), (x: 10.02, y: 50.0), (x: 10.02, y: 50.01), (x: 10.0, y: 50.01), (x: 10.0, y: 50.0)],
            0.5,
        )
    }

    fn range() -> TimeRange {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        TimeRange::new(start, start + Duration::days(60))
    }

    #[test]
    fn test_same_seed_same_tiles() {
        let a = MockImagerySource::new(7).fetch_observations(&asset("b-1"), range());
        let b = MockImagerySource::new(7).fetch_observations(&asset("b-1"), range());
        assert_eq!(a.len(), 6);
        assert_eq!(a.len(), b.len());

        // Cloud rows are NaN, so compare bit patterns
        let bits = |o: &ImageryObservation| -> Vec<(Band, Vec<u64>)> {
            o.bands()
                .map(|(band, r)| (band, r.data().iter().map(|v| v.to_bits()).collect()))
                .collect()
        };
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.acquired_at, y.acquired_at);
            assert_eq!(x.cloud_cover, y.cloud_cover);
            assert_eq!(x.transform(), y.transform());
            assert_eq!(bits(x), bits(y));
        }
        assert!(a.iter().any(|o| o.band(Band::Red).unwrap().data().iter().any(|v| v.is_nan())));
    }

    #[test]
    fn test_different_assets_differ() {
        let source = MockImagerySource::new(7);
        let a = source.fetch_observations(&asset("b-1"), range());
        let b = source.fetch_observations(&asset("b-2"), range());
        assert_ne!(a[0].band(Band::Nir), b[0].band(Band::Nir));
    }

    #[test]
    fn test_grid_covers_footprint() {
        let obs = MockImagerySource::new(1).with_grid(40).fetch_observations(&asset("b-1"), range());
        let first = &obs[0];
        assert_eq!(first.shape(), Some((20, 40)));
        assert!(first.has_band(Band::Panchromatic));
        let extent = first.extent().unwrap();
        assert!(extent.min_x <= 10.0 && extent.max_x >= 10.02 - 1e-9);
        assert!(extent.min_y <= 50.0 + 1e-9 && extent.max_y >= 50.01);
    }

    #[test]
    fn test_construction_appears_from_start_date() {
        let start = Utc.with_ymd_and_hms(2024, 1, 25, 0, 0, 0).unwrap();
        let source = MockImagerySource::new(3)
            .with_max_cloud_cover(0.0)
            .with_construction("b-1", start);
        let obs = source.fetch_observations(&asset("b-1"), range());

        let centre = |o: &ImageryObservation| o.band(Band::Red).unwrap().get(8, 16).unwrap();
        assert!(obs[0].acquired_at < start && centre(&obs[0]) < 0.1);
        assert!(obs[3].acquired_at >= start && centre(&obs[3]) > 0.3);
    }

    #[test]
    fn test_open_ended_range_and_empty_footprint() {
        let source = MockImagerySource::new(0).with_open_ended_count(4);
        assert_eq!(source.fetch_observations(&asset("b-1"), TimeRange::unbounded()).len(), 4);

        let empty = Asset::new("e", "Empty", AssetCategory::Other, geo_types::Polygon::new(geo_types::LineString::new(vec![]), vec![]), 0.1);
        assert!(source.fetch_observations(&empty, range()).is_empty());
    }
}
