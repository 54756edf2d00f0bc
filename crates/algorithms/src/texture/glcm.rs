//! Gray-Level Co-occurrence Matrix (GLCM) entropy
//!
//! Builds one symmetric GLCM over a whole tile from 4 directions
//! (0°, 45°, 90°, 135°) and reports its normalized entropy. Values are
//! quantized over a caller-supplied range so two acquisitions can share
//! the same gray levels.

use geowatch_core::raster::Raster;
use geowatch_core::{Error, Result};

/// Parameters for GLCM computation
#[derive(Debug, Clone)]
pub struct GlcmParams {
    /// Number of quantization levels (default: 16)
    pub levels: usize,
    /// Distance for co-occurrence (default: 1)
    pub distance: usize,
}

impl Default for GlcmParams {
    fn default() -> Self {
        Self {
            levels: 16,
            distance: 1,
        }
    }
}

/// Normalized GLCM entropy of a tile, in [0, 1].
///
/// Entropy `-Σ p ln p` is divided by its maximum `ln(levels²)`. Returns
/// `Ok(None)` when no pair of valid neighbors exists.
///
/// # Arguments
/// * `raster` - Input band, NaN cells ignored
/// * `range` - (min, max) used for quantization
/// * `params` - Levels and co-occurrence distance
pub fn glcm_entropy(raster: &Raster<f64>, range: (f64, f64), params: &GlcmParams) -> Result<Option<f64>> {
    if params.levels < 2 {
        return Err(Error::Algorithm("GLCM levels must be >= 2".into()));
    }
    if params.distance == 0 {
        return Err(Error::Algorithm("GLCM distance must be > 0".into()));
    }

    let (rows, cols) = raster.shape();
    let n = params.levels;
    let d = params.distance as isize;
    let (vmin, vmax) = range;
    let span = vmax - vmin;

    // Direction offsets: 0°, 45°, 90°, 135°
    let directions: [(isize, isize); 4] = [(0, d), (-d, d), (-d, 0), (-d, -d)];

    let mut glcm = vec![0.0_f64; n * n];
    let mut total = 0.0_f64;

    for (dr, dc) in directions {
        for r1 in 0..rows as isize {
            for c1 in 0..cols as isize {
                let r2 = r1 + dr;
                let c2 = c1 + dc;
                if r2 < 0 || c2 < 0 || r2 as usize >= rows || c2 as usize >= cols {
                    continue;
                }

                let v1 = unsafe { raster.get_unchecked(r1 as usize, c1 as usize) };
                let v2 = unsafe { raster.get_unchecked(r2 as usize, c2 as usize) };
                if !v1.is_finite() || !v2.is_finite() {
                    continue;
                }

                let i = quantize(v1, vmin, span, n);
                let j = quantize(v2, vmin, span, n);
                glcm[i * n + j] += 1.0;
                glcm[j * n + i] += 1.0; // Symmetric
                total += 2.0;
            }
        }
    }

    if total < 1.0 {
        return Ok(None);
    }

    let entropy: f64 = glcm
        .iter()
        .filter(|&&c| c > 0.0)
        .map(|&c| {
            let p = c / total;
            -p * p.ln()
        })
        .sum();

    let max_entropy = ((n * n) as f64).ln();
    Ok(Some((entropy / max_entropy).clamp(0.0, 1.0)))
}

fn quantize(value: f64, vmin: f64, span: f64, n_levels: usize) -> usize {
    if span <= 0.0 {
        return 0;
    }
    let normalized = ((value - vmin) / span).clamp(0.0, 1.0);
    let level = (normalized * (n_levels - 1) as f64).round() as usize;
    level.min(n_levels - 1)
}
