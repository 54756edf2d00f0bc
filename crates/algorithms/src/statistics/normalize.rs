//! Radiometric normalization
//!
//! Both transforms remove a gain/offset difference between acquisitions so
//! that downstream operators compare structure, not illumination.

use geowatch_core::raster::Raster;
use geowatch_core::Result;

use crate::imagery::build_output;

const FLAT_STD: f64 = 1e-12;

/// Z-score normalize a band over its valid cells.
///
/// `z = (v - mean) / std`. A flat band (std ~ 0) maps every valid cell to 0.
pub fn zscore(raster: &Raster<f64>) -> Result<Raster<f64>> {
    let stats = raster.statistics();
    let (rows, cols) = raster.shape();

    let (Some(mean), Some(std)) = (stats.mean, stats.std_dev) else {
        return build_output(raster, rows, cols, vec![f64::NAN; rows * cols]);
    };

    let data: Vec<f64> = raster
        .data()
        .iter()
        .map(|&v| {
            if raster.is_nodata(v) {
                f64::NAN
            } else if std < FLAT_STD {
                0.0
            } else {
                (v - mean) / std
            }
        })
        .collect();

    build_output(raster, rows, cols, data)
}

/// Divide a band by its mean over valid cells.
///
/// Bands whose mean is ~ 0 are returned centered instead (`v - mean`).
pub fn mean_normalize(raster: &Raster<f64>) -> Result<Raster<f64>> {
    let (rows, cols) = raster.shape();
    let Some(mean) = raster.statistics().mean else {
        return build_output(raster, rows, cols, vec![f64::NAN; rows * cols]);
    };

    let data: Vec<f64> = raster
        .data()
        .iter()
        .map(|&v| {
            if raster.is_nodata(v) {
                f64::NAN
            } else if mean.abs() < FLAT_STD {
                v - mean
            } else {
                v / mean
            }
        })
        .collect();

    build_output(raster, rows, cols, data)
}
