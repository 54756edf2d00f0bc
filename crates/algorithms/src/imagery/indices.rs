//! Normalized-difference indices and per-pixel band arithmetic
//!
//! All functions operate on single-band `f64` rasters sharing one grid.
//! NaN marks masked cells in both inputs and outputs.

use ndarray::Array2;
use crate::maybe_rayon::*;
use geowatch_core::raster::Raster;
use geowatch_core::{Error, Result};

/// Normalized difference of two bands:
///
/// `(band_a - band_b) / (band_a + band_b)`
///
/// Result is in [-1, 1] for non-negative reflectances. Cells where the sum
/// vanishes or either band is masked are NaN.
pub fn normalized_difference(band_a: &Raster<f64>, band_b: &Raster<f64>) -> Result<Raster<f64>> {
    check_dimensions(band_a, band_b)?;

    let (rows, cols) = band_a.shape();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let a = unsafe { band_a.get_unchecked(row, col) };
                let b = unsafe { band_b.get_unchecked(row, col) };

                if band_a.is_nodata(a) || band_b.is_nodata(b) {
                    continue;
                }

                let sum = a + b;
                if sum.abs() < 1e-10 {
                    continue;
                }

                *out = (a - b) / sum;
            }
            row_data
        })
        .collect();

    build_output(band_a, rows, cols, data)
}

/// Normalized Difference Vegetation Index
///
/// `NDVI = (NIR - Red) / (NIR + Red)`
///
/// - Dense vegetation: 0.6 to 0.9
/// - Bare soil, concrete: 0.0 to 0.2
/// - Water: below 0
pub fn ndvi(nir: &Raster<f64>, red: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(nir, red)
}

/// Per-pixel mean of two bands, NaN where either is masked
pub fn band_mean(band_a: &Raster<f64>, band_b: &Raster<f64>) -> Result<Raster<f64>> {
    check_dimensions(band_a, band_b)?;

    let (rows, cols) = band_a.shape();
    let data: Vec<f64> = band_a
        .data()
        .iter()
        .zip(band_b.data().iter())
        .map(|(&a, &b)| {
            if band_a.is_nodata(a) || band_b.is_nodata(b) {
                f64::NAN
            } else {
                0.5 * (a + b)
            }
        })
        .collect();

    build_output(band_a, rows, cols, data)
}

pub(crate) fn check_dimensions(a: &Raster<f64>, b: &Raster<f64>) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(Error::SizeMismatch {
            er: a.rows(),
            ec: a.cols(),
            ar: b.rows(),
            ac: b.cols(),
        });
    }
    Ok(())
}

pub(crate) fn build_output(
    template: &Raster<f64>,
    rows: usize,
    cols: usize,
    data: Vec<f64>,
) -> Result<Raster<f64>> {
    let mut output = template.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    Ok(output)
}
