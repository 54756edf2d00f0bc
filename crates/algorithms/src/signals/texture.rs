//! Texture-delta: change in surface heterogeneity
//!
//! Tile-level GLCM entropy gives the signed value; per-pixel focal standard
//! deviation on the mean-normalized band gives the changed fraction.

use geowatch_core::raster::Raster;
use geowatch_core::{Band, InvalidReason, SignalKind, SignalMetrics, SignalResult};

use super::{check_cloud_cover, check_coverage, check_grid, failed, Extracted, SignalParams};
use crate::align::AlignedPair;
use crate::imagery::build_output;
use crate::statistics::{focal_std, mean_normalize, FocalParams};
use crate::texture::{glcm_entropy, GlcmParams};

const TEXTURE_BANDS: [Band; 3] = [Band::Panchromatic, Band::Nir, Band::Red];

pub(super) fn extract(pair: &AlignedPair, params: &SignalParams) -> Extracted {
    check_cloud_cover(pair, params)?;
    check_grid(pair, 3)?;

    let (before, after) = TEXTURE_BANDS
        .iter()
        .find_map(|&b| pair.band_pair(b))
        .ok_or_else(|| InvalidReason::MissingBand {
            band: "panchromatic, nir or red".into(),
        })?;

    // Restrict both sides to the cells valid at both times
    let (before, after, range, count) = joint_valid(before, after).map_err(failed)?;
    check_coverage(count, pair.cell_count(), params)?;

    let glcm = GlcmParams {
        levels: params.texture_levels,
        distance: 1,
    };
    let entropy_before = glcm_entropy(&before, range, &glcm).map_err(failed)?;
    let entropy_after = glcm_entropy(&after, range, &glcm).map_err(failed)?;
    let (Some(entropy_before), Some(entropy_after)) = (entropy_before, entropy_after) else {
        return Err(InvalidReason::InsufficientCoverage {
            valid_fraction: count as f64 / pair.cell_count() as f64,
            required: params.min_valid_fraction,
        });
    };

    let focal = FocalParams {
        radius: params.focal_radius.max(1),
        ..Default::default()
    };
    let local_before = focal_std(&mean_normalize(&before).map_err(failed)?, &focal).map_err(failed)?;
    let local_after = focal_std(&mean_normalize(&after).map_err(failed)?, &focal).map_err(failed)?;

    let mut compared = 0usize;
    let mut changed = 0usize;
    for (&b, &a) in local_before.data().iter().zip(local_after.data().iter()) {
        if b.is_finite() && a.is_finite() {
            compared += 1;
            changed += usize::from((a - b).abs() > params.pixel_threshold);
        }
    }

    let value = entropy_after - entropy_before;
    let metrics = SignalMetrics {
        before: entropy_before,
        after: entropy_after,
        changed_fraction: if compared == 0 { 0.0 } else { changed as f64 / compared as f64 },
    };

    Ok(SignalResult::valid(
        SignalKind::Texture,
        value,
        (value.abs() / params.texture_scale).min(1.0),
        metrics,
    ))
}

type JointValid = (Raster<f64>, Raster<f64>, (f64, f64), usize);

/// Mask both bands to their common valid cells and find the shared value range
fn joint_valid(before: &Raster<f64>, after: &Raster<f64>) -> geowatch_core::Result<JointValid> {
    let (rows, cols) = before.shape();
    let mut vmin = f64::INFINITY;
    let mut vmax = f64::NEG_INFINITY;
    let mut count = 0usize;
    let mut masked_before = Vec::with_capacity(rows * cols);
    let mut masked_after = Vec::with_capacity(rows * cols);

    for (&b, &a) in before.data().iter().zip(after.data().iter()) {
        if before.is_nodata(b) || after.is_nodata(a) {
            masked_before.push(f64::NAN);
            masked_after.push(f64::NAN);
            continue;
        }
        count += 1;
        vmin = vmin.min(b.min(a));
        vmax = vmax.max(b.max(a));
        masked_before.push(b);
        masked_after.push(a);
    }

    Ok((
        build_output(before, rows, cols, masked_before)?,
        build_output(after, rows, cols, masked_after)?,
        (vmin, vmax),
        count,
    ))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::SignalExtractor;
    use super::*;

    fn smooth(rows: usize, cols: usize) -> Raster<f64> {
        make_band(rows, cols, |_, _| 0.3)
    }

    /// Construction rubble: a pseudo-random pattern over the whole tile
    fn rough(rows: usize, cols: usize) -> Raster<f64> {
        make_band(rows, cols, |r, c| 0.1 + 0.4 * (((r * 31 + c * 17) * 2654435761) % 101) as f64 / 101.0)
    }

    #[test]
    fn test_roughening_raises_entropy() {
        let p = pair(
            view(1, 0.0, vec![(Band::Nir, smooth(10, 10))]),
            view(30, 0.0, vec![(Band::Nir, rough(10, 10))]),
            10,
            10,
        );
        let r = SignalExtractor::Texture.extract(&p, &SignalParams::default());

        let value = r.value().unwrap();
        assert!(value > 0.2, "entropy should rise sharply, got {}", value);
        assert!(value <= 1.0);
        assert_eq!(r.magnitude().unwrap(), 1.0);
        assert!(r.metrics().unwrap().changed_fraction > 0.5);
    }

    #[test]
    fn test_value_stays_in_range() {
        let p = pair(
            view(1, 0.0, vec![(Band::Red, rough(10, 10))]),
            view(30, 0.0, vec![(Band::Red, smooth(10, 10))]),
            10,
            10,
        );
        let r = SignalExtractor::Texture.extract(&p, &SignalParams::default());
        let value = r.value().unwrap();
        assert!((-1.0..0.0).contains(&value), "got {}", value);
    }

    #[test]
    fn test_needs_a_shared_band() {
        let p = pair(
            view(1, 0.0, vec![(Band::Nir, smooth(5, 5))]),
            view(30, 0.0, vec![(Band::Red, smooth(5, 5))]),
            5,
            5,
        );
        let r = SignalExtractor::Texture.extract(&p, &SignalParams::default());
        assert!(matches!(r.invalid_reason(), Some(InvalidReason::MissingBand { .. })));
    }
}
