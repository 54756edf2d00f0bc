//! Structural-delta: appearance or removal of edges (buildings, roads, revetments)

use std::borrow::Cow;

use geowatch_core::raster::Raster;
use geowatch_core::{Band, InvalidReason, SignalKind, SignalMetrics, SignalResult};

use super::{check_cloud_cover, check_coverage, check_grid, failed, Extracted, SignalParams};
use crate::align::{AlignedPair, AlignedView};
use crate::imagery::band_mean;
use crate::statistics::zscore;
use crate::texture::{edge_mask, sobel_edge};

/// Panchromatic when both sides have it, else the red/NIR mean
fn structural_band<'a>(pair: &'a AlignedPair) -> Result<(Cow<'a, Raster<f64>>, Cow<'a, Raster<f64>>), InvalidReason> {
    if let Some((before, after)) = pair.band_pair(Band::Panchromatic) {
        return Ok((Cow::Borrowed(before), Cow::Borrowed(after)));
    }

    let visible = |view: &AlignedView| -> Result<Raster<f64>, InvalidReason> {
        match (view.band(Band::Red), view.band(Band::Nir)) {
            (Some(red), Some(nir)) => band_mean(red, nir).map_err(failed),
            _ => Err(InvalidReason::MissingBand {
                band: "panchromatic or red+nir".into(),
            }),
        }
    };

    Ok((Cow::Owned(visible(&pair.before)?), Cow::Owned(visible(&pair.after)?)))
}

/// Edge density change on illumination-normalized bands.
pub(super) fn extract(pair: &AlignedPair, params: &SignalParams) -> Extracted {
    check_cloud_cover(pair, params)?;
    check_grid(pair, 3)?;
    let (before, after) = structural_band(pair)?;

    let gradient_before = sobel_edge(&zscore(&before).map_err(failed)?).map_err(failed)?;
    let gradient_after = sobel_edge(&zscore(&after).map_err(failed)?).map_err(failed)?;

    let edges_before = edge_mask(&gradient_before, params.edge_threshold);
    let edges_after = edge_mask(&gradient_after, params.edge_threshold);

    let mut count = 0usize;
    let mut count_before = 0usize;
    let mut count_after = 0usize;
    let mut flipped = 0usize;

    for (b, a) in edges_before.iter().zip(edges_after.iter()) {
        let (Some(b), Some(a)) = (b, a) else { continue };
        count += 1;
        count_before += usize::from(*b);
        count_after += usize::from(*a);
        flipped += usize::from(b != a);
    }

    // Sobel leaves the outer ring undefined
    let interior = (pair.rows - 2) * (pair.cols - 2);
    check_coverage(count, interior, params)?;

    let n = count as f64;
    let metrics = SignalMetrics {
        before: count_before as f64 / n,
        after: count_after as f64 / n,
        changed_fraction: flipped as f64 / n,
    };

    Ok(SignalResult::valid(
        SignalKind::Structural,
        metrics.after - metrics.before,
        (metrics.changed_fraction / params.structural_scale).min(1.0),
        metrics,
    ))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::SignalExtractor;
    use super::*;

    /// Faintly textured field crossed by a road at col 2, optionally with a
    /// bright building at rows/cols 4..8
    fn scene(building: bool, gain: f64, offset: f64) -> Raster<f64> {
        make_band(12, 12, |r, c| {
            let mut lit = 0.2 + 0.002 * ((r * 7 + c * 3) % 5) as f64;
            if c == 2 {
                lit = 0.5;
            }
            if building && (4..8).contains(&r) && (4..8).contains(&c) {
                lit = 0.6;
            }
            offset + gain * lit
        })
    }

    #[test]
    fn test_new_building_adds_edges() {
        let before = view(1, 0.0, vec![(Band::Panchromatic, scene(false, 1.0, 0.0))]);
        let after = view(30, 0.0, vec![(Band::Panchromatic, scene(true, 1.0, 0.0))]);
        let r = SignalExtractor::Structural.extract(&pair(before, after, 12, 12), &SignalParams::default());

        let value = r.value().unwrap();
        assert!(value > 0.0, "edge density should rise, got {}", value);
        assert!(r.metrics().unwrap().changed_fraction > 0.1);
        assert!(r.magnitude().unwrap() > 0.4);
    }

    #[test]
    fn test_illumination_change_is_ignored() {
        let before = view(1, 0.0, vec![(Band::Panchromatic, scene(true, 1.0, 0.0))]);
        let after = view(30, 0.0, vec![(Band::Panchromatic, scene(true, 1.8, 0.05))]);
        let r = SignalExtractor::Structural.extract(&pair(before, after, 12, 12), &SignalParams::default());

        assert!(r.value().unwrap().abs() < 1e-12);
        assert!(r.magnitude().unwrap() < 1e-12);
    }

    #[test]
    fn test_falls_back_to_red_nir_mean() {
        let bands = |building| {
            vec![
                (Band::Red, scene(building, 1.0, 0.0)),
                (Band::Nir, scene(building, 1.0, 0.1)),
            ]
        };
        let r = SignalExtractor::Structural.extract(
            &pair(view(1, 0.0, bands(false)), view(30, 0.0, bands(true)), 12, 12),
            &SignalParams::default(),
        );
        assert!(r.is_valid());
        assert!(r.value().unwrap() > 0.0);
    }

    #[test]
    fn test_small_grid_and_missing_bands() {
        let tiny = vec![(Band::Panchromatic, make_band(2, 2, |_, _| 0.3))];
        let r = SignalExtractor::Structural.extract(
            &pair(view(1, 0.0, tiny.clone()), view(30, 0.0, tiny), 2, 2),
            &SignalParams::default(),
        );
        assert_eq!(r.invalid_reason(), Some(&InvalidReason::GridTooSmall { rows: 2, cols: 2 }));

        let red_only = vec![(Band::Red, make_band(5, 5, |_, _| 0.3))];
        let r = SignalExtractor::Structural.extract(
            &pair(view(1, 0.0, red_only.clone()), view(30, 0.0, red_only), 5, 5),
            &SignalParams::default(),
        );
        assert!(matches!(r.invalid_reason(), Some(InvalidReason::MissingBand { .. })));
    }
}
