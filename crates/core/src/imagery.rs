//! Imagery observations delivered by an acquisition collaborator

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::raster::{Extent, GeoTransform, Raster};

/// Spectral band carried by an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Red,
    Nir,
    Panchromatic,
}

impl Band {
    pub fn as_str(&self) -> &'static str {
        match self {
            Band::Red => "red",
            Band::Nir => "nir",
            Band::Panchromatic => "panchromatic",
        }
    }
}

/// One acquisition of an asset footprint.
///
/// All bands share the observation's north-up transform and grid shape.
/// Cells that are cloud-masked or outside the scene hold NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageryObservation {
    pub sensor: String,
    pub acquired_at: DateTime<Utc>,
    pub cloud_cover: f64,
    transform: GeoTransform,
    shape: Option<(usize, usize)>,
    bands: BTreeMap<Band, Raster<f64>>,
}

impl ImageryObservation {
    pub fn new(
        sensor: impl Into<String>,
        acquired_at: DateTime<Utc>,
        transform: GeoTransform,
        cloud_cover: f64,
    ) -> Self {
        Self {
            sensor: sensor.into(),
            acquired_at,
            cloud_cover: cloud_cover.clamp(0.0, 1.0),
            transform,
            shape: None,
            bands: BTreeMap::new(),
        }
    }

    /// Attach a band. The first band fixes the grid shape; later bands must match it.
    pub fn with_band(mut self, band: Band, mut raster: Raster<f64>) -> Result<Self> {
        if let Some((rows, cols)) = self.shape
            && raster.shape() != (rows, cols)
        {
            return Err(Error::SizeMismatch {
                er: rows,
                ec: cols,
                ar: raster.rows(),
                ac: raster.cols(),
            });
        }
        if raster.is_empty() {
            return Err(Error::InvalidDimensions {
                width: raster.cols(),
                height: raster.rows(),
            });
        }

        self.shape = Some(raster.shape());
        raster.set_transform(self.transform);
        self.bands.insert(band, raster);
        Ok(self)
    }

    pub fn band(&self, band: Band) -> Option<&Raster<f64>> {
        self.bands.get(&band)
    }

    pub fn has_band(&self, band: Band) -> bool {
        self.bands.contains_key(&band)
    }

    pub fn bands(&self) -> impl Iterator<Item = (Band, &Raster<f64>)> {
        self.bands.iter().map(|(b, r)| (*b, r))
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Ground resolution, the transform's cell size
    pub fn resolution(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Grid shape (rows, cols), `None` before any band is attached
    pub fn shape(&self) -> Option<(usize, usize)> {
        self.shape
    }

    /// Covered extent, `None` before any band is attached
    pub fn extent(&self) -> Option<Extent> {
        self.shape.map(|(rows, cols)| self.transform.extent(rows, cols))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn observation() -> ImageryObservation {
        ImageryObservation::new(
            "sentinel-2",
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
            GeoTransform::new(100.0, 200.0, 10.0, -10.0),
            0.05,
        )
    }

    #[test]
    fn test_bands_share_shape() {
        let obs = observation()
            .with_band(Band::Red, Raster::filled(4, 6, 0.1))
            .unwrap()
            .with_band(Band::Nir, Raster::filled(4, 6, 0.4))
            .unwrap();

        assert_eq!(obs.shape(), Some((4, 6)));
        assert!(obs.has_band(Band::Nir));
        assert!(!obs.has_band(Band::Panchromatic));

        let extent = obs.extent().unwrap();
        assert_eq!(extent, Extent::new(100.0, 160.0, 160.0, 200.0));
        assert_eq!(obs.band(Band::Red).unwrap().transform(), obs.transform());
    }

    #[test]
    fn test_mismatched_band_rejected() {
        let result = observation()
            .with_band(Band::Red, Raster::filled(4, 6, 0.1))
            .unwrap()
            .with_band(Band::Nir, Raster::filled(5, 6, 0.4));
        assert!(matches!(result, Err(Error::SizeMismatch { .. })));
    }
}
