//! Tile alignment
//!
//! Brings two acquisitions of one asset onto a shared north-up grid clipped
//! to the buffered footprint, at the coarser of the two resolutions. Finer
//! imagery is block-mean resampled; nothing is ever upsampled.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use geowatch_core::raster::{GeoTransform, Raster};
use geowatch_core::{AlignmentError, Asset, Band, ImageryObservation};
use serde::{Deserialize, Serialize};

use crate::imagery::build_output;
use crate::maybe_rayon::*;

/// Parameters for tile alignment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentParams {
    /// Margin added around the footprint bounding box, in CRS units
    pub buffer: f64,
    /// Largest accepted coarse/fine resolution ratio
    pub max_resolution_ratio: f64,
}

impl Default for AlignmentParams {
    fn default() -> Self {
        Self {
            buffer: 0.0,
            max_resolution_ratio: 4.0,
        }
    }
}

/// One side of an aligned pair
#[derive(Debug, Clone)]
pub struct AlignedView {
    pub sensor: String,
    pub acquired_at: DateTime<Utc>,
    pub cloud_cover: f64,
    bands: BTreeMap<Band, Raster<f64>>,
}

impl AlignedView {
    pub fn new(sensor: impl Into<String>, acquired_at: DateTime<Utc>, cloud_cover: f64) -> Self {
        Self {
            sensor: sensor.into(),
            acquired_at,
            cloud_cover,
            bands: BTreeMap::new(),
        }
    }

    pub fn with_band(mut self, band: Band, raster: Raster<f64>) -> Self {
        self.bands.insert(band, raster);
        self
    }

    pub fn band(&self, band: Band) -> Option<&Raster<f64>> {
        self.bands.get(&band)
    }

    pub fn has_band(&self, band: Band) -> bool {
        self.bands.contains_key(&band)
    }
}

/// Two co-registered views of one footprint, earlier first
#[derive(Debug, Clone)]
pub struct AlignedPair {
    pub before: AlignedView,
    pub after: AlignedView,
    pub transform: GeoTransform,
    pub rows: usize,
    pub cols: usize,
}

impl AlignedPair {
    /// Build a pair directly from rasters already on one grid.
    ///
    /// Bands missing from either side simply stay absent.
    pub fn from_views(before: AlignedView, after: AlignedView, transform: GeoTransform, rows: usize, cols: usize) -> Self {
        Self {
            before,
            after,
            transform,
            rows,
            cols,
        }
    }

    /// The same band on both sides, if both carry it
    pub fn band_pair(&self, band: Band) -> Option<(&Raster<f64>, &Raster<f64>)> {
        Some((self.before.band(band)?, self.after.band(band)?))
    }

    /// Cloud cover of the cloudier acquisition
    pub fn max_cloud_cover(&self) -> f64 {
        self.before.cloud_cover.max(self.after.cloud_cover)
    }

    pub fn cell_count(&self) -> usize {
        self.rows * self.cols
    }
}

/// Co-register two observations of `asset`.
///
/// The inputs are only read; the returned pair owns resampled copies.
pub fn align_pair(
    asset: &Asset,
    first: &ImageryObservation,
    second: &ImageryObservation,
    params: &AlignmentParams,
) -> Result<AlignedPair, AlignmentError> {
    let (before, after) = if second.acquired_at < first.acquired_at {
        (second, first)
    } else {
        (first, second)
    };

    for obs in [before, after] {
        if obs.band_count() == 0 {
            return Err(AlignmentError::NoBands(obs.sensor.clone()));
        }
        if !obs.transform().is_north_up() {
            return Err(AlignmentError::NotNorthUp(obs.sensor.clone()));
        }
    }

    let fine = before.resolution().min(after.resolution());
    let coarse = before.resolution().max(after.resolution());
    let ratio = coarse / fine;
    if !ratio.is_finite() || ratio > params.max_resolution_ratio {
        return Err(AlignmentError::ResolutionDisparity {
            ratio,
            max: params.max_resolution_ratio,
        });
    }

    let footprint = asset
        .bounding_extent()
        .ok_or(AlignmentError::EmptyFootprint)?
        .buffered(params.buffer);

    let mut common = footprint;
    for obs in [before, after] {
        common = obs
            .extent()
            .and_then(|e| e.intersection(&common))
            .ok_or_else(|| AlignmentError::NoOverlap {
                sensor: obs.sensor.clone(),
            })?;
    }

    let cols = (common.width() / coarse + 1e-9).floor() as usize;
    let rows = (common.height() / coarse + 1e-9).floor() as usize;
    if rows == 0 || cols == 0 {
        return Err(AlignmentError::NoOverlap {
            sensor: after.sensor.clone(),
        });
    }

    let target = GeoTransform::new(common.min_x, common.max_y, coarse, -coarse);

    Ok(AlignedPair {
        before: resample_view(before, &target, rows, cols),
        after: resample_view(after, &target, rows, cols),
        transform: target,
        rows,
        cols,
    })
}

fn resample_view(obs: &ImageryObservation, target: &GeoTransform, rows: usize, cols: usize) -> AlignedView {
    let bands = obs
        .bands()
        .filter_map(|(band, raster)| {
            block_mean(raster, obs.transform(), target, rows, cols)
                .ok()
                .map(|r| (band, r))
        })
        .collect();

    AlignedView {
        sensor: obs.sensor.clone(),
        acquired_at: obs.acquired_at,
        cloud_cover: obs.cloud_cover,
        bands,
    }
}

/// Block-mean resample `raster` onto `target`.
///
/// Each target cell averages the valid source cells whose centers fall in
/// it. Cells with no valid source are NaN.
pub fn block_mean(
    raster: &Raster<f64>,
    source: &GeoTransform,
    target: &GeoTransform,
    rows: usize,
    cols: usize,
) -> geowatch_core::Result<Raster<f64>> {
    let (src_rows, src_cols) = raster.shape();
    let cell = target.cell_size();
    let (ox, oy) = (source.origin_x, source.origin_y);
    let (pw, ph) = (source.pixel_width, -source.pixel_height);

    // Index of the first source cell whose center is at or past `offset` cells
    let first_center = |offset: f64, limit: usize| -> usize {
        let idx = (offset - 0.5 - 1e-9).ceil();
        idx.clamp(0.0, limit as f64) as usize
    };

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];

            let top = target.origin_y - row as f64 * cell;
            let r0 = first_center((oy - top) / ph, src_rows);
            let r1 = first_center((oy - (top - cell)) / ph, src_rows);

            for (col, out) in row_data.iter_mut().enumerate() {
                let left = target.origin_x + col as f64 * cell;
                let c0 = first_center((left - ox) / pw, src_cols);
                let c1 = first_center((left + cell - ox) / pw, src_cols);

                let mut sum = 0.0;
                let mut count = 0usize;
                for r in r0..r1 {
                    for c in c0..c1 {
                        let v = unsafe { raster.get_unchecked(r, c) };
                        if !raster.is_nodata(v) {
                            sum += v;
                            count += 1;
                        }
                    }
                }

                if count > 0 {
                    *out = sum / count as f64;
                }
            }

            row_data
        })
        .collect();

    let mut output = build_output(raster, rows, cols, data)?;
    output.set_transform(*target);
    Ok(output)
}
