//! Focal (moving window) standard deviation
//!
//! Local variability is the per-pixel texture proxy: flat surfaces have a
//! low focal std, built-up or disturbed surfaces a high one.

use crate::maybe_rayon::*;
use geowatch_core::raster::Raster;
use geowatch_core::{Error, Result};

use crate::imagery::build_output;

/// Parameters for focal statistics
#[derive(Debug, Clone)]
pub struct FocalParams {
    /// Window radius (actual window size = 2*radius + 1)
    pub radius: usize,
    /// Minimum valid cells in a window for a defined output
    pub min_count: usize,
}

impl Default for FocalParams {
    fn default() -> Self {
        Self {
            radius: 1,
            min_count: 3,
        }
    }
}

/// Population standard deviation over a square window.
///
/// Masked cells stay masked; windows are truncated at the raster edge.
pub fn focal_std(raster: &Raster<f64>, params: &FocalParams) -> Result<Raster<f64>> {
    if params.radius == 0 {
        return Err(Error::Algorithm("Focal radius must be > 0".into()));
    }

    let (rows, cols) = raster.shape();
    let r = params.radius as isize;

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];

            for (col, out) in row_data.iter_mut().enumerate() {
                let center = unsafe { raster.get_unchecked(row, col) };
                if center.is_nan() {
                    continue;
                }

                let mut sum = 0.0;
                let mut sum_sq = 0.0;
                let mut count = 0usize;

                for dr in -r..=r {
                    for dc in -r..=r {
                        let nr = row as isize + dr;
                        let nc = col as isize + dc;
                        if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
                            continue;
                        }
                        let v = unsafe { raster.get_unchecked(nr as usize, nc as usize) };
                        if v.is_nan() {
                            continue;
                        }
                        sum += v;
                        sum_sq += v * v;
                        count += 1;
                    }
                }

                if count < params.min_count.max(1) {
                    continue;
                }

                let n = count as f64;
                let mean = sum / n;
                *out = (sum_sq / n - mean * mean).max(0.0).sqrt();
            }

            row_data
        })
        .collect();

    build_output(raster, rows, cols, output_data)
}
