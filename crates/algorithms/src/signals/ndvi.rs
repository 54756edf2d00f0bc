//! NDVI-delta: vegetation loss or regrowth between acquisitions

use geowatch_core::{Band, SignalKind, SignalMetrics, SignalResult};

use super::{check_cloud_cover, check_coverage, failed, require_band, Extracted, SignalParams};
use crate::align::AlignedPair;
use crate::imagery::ndvi;

/// Mean ΔNDVI over cells valid at both times.
///
/// Negative values mean vegetation loss (clearing, construction), positive
/// values regrowth.
pub(super) fn extract(pair: &AlignedPair, params: &SignalParams) -> Extracted {
    check_cloud_cover(pair, params)?;
    let (red_before, red_after) = require_band(pair, Band::Red)?;
    let (nir_before, nir_after) = require_band(pair, Band::Nir)?;

    let before = ndvi(nir_before, red_before).map_err(failed)?;
    let after = ndvi(nir_after, red_after).map_err(failed)?;

    let mut count = 0usize;
    let mut changed = 0usize;
    let mut sum_before = 0.0;
    let mut sum_after = 0.0;

    for (&b, &a) in before.data().iter().zip(after.data().iter()) {
        if !b.is_finite() || !a.is_finite() {
            continue;
        }
        count += 1;
        sum_before += b;
        sum_after += a;
        if (a - b).abs() > params.pixel_threshold {
            changed += 1;
        }
    }

    check_coverage(count, pair.cell_count(), params)?;

    let n = count as f64;
    let metrics = SignalMetrics {
        before: sum_before / n,
        after: sum_after / n,
        changed_fraction: changed as f64 / n,
    };
    let value = metrics.after - metrics.before;

    Ok(SignalResult::valid(
        SignalKind::Ndvi,
        value,
        (value.abs() / params.ndvi_scale).min(1.0),
        metrics,
    ))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::SignalExtractor;
    use super::*;
    use approx::assert_relative_eq;
    use geowatch_core::InvalidReason;

    fn vegetated(rows: usize, cols: usize) -> Vec<(Band, geowatch_core::Raster<f64>)> {
        // NDVI = (0.5 - 0.1) / 0.6
        vec![
            (Band::Red, make_band(rows, cols, |_, _| 0.1)),
            (Band::Nir, make_band(rows, cols, |_, _| 0.5)),
        ]
    }

    #[test]
    fn test_clearing_is_negative() {
        // Right half cleared to bare soil, NDVI 0
        let cleared = vec![
            (Band::Red, make_band(6, 6, |_, _| 0.1)),
            (Band::Nir, make_band(6, 6, |_, c| if c >= 3 { 0.1 } else { 0.5 })),
        ];
        let p = pair(view(1, 0.0, vegetated(6, 6)), view(30, 0.0, cleared), 6, 6);
        let r = SignalExtractor::Ndvi.extract(&p, &SignalParams::default());

        let full = 0.4 / 0.6;
        assert_relative_eq!(r.value().unwrap(), -full / 2.0, epsilon = 1e-12);
        assert_relative_eq!(r.magnitude().unwrap(), full / 2.0, epsilon = 1e-12);

        let m = r.metrics().unwrap();
        assert_relative_eq!(m.before, full, epsilon = 1e-12);
        assert_relative_eq!(m.changed_fraction, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_missing_nir() {
        let only_red = vec![(Band::Red, make_band(6, 6, |_, _| 0.1))];
        let p = pair(view(1, 0.0, vegetated(6, 6)), view(30, 0.0, only_red), 6, 6);
        let r = SignalExtractor::Ndvi.extract(&p, &SignalParams::default());
        assert_eq!(
            r.invalid_reason(),
            Some(&InvalidReason::MissingBand { band: "nir".into() })
        );
    }

    #[test]
    fn test_mostly_masked() {
        let masked = vec![
            (Band::Red, make_band(6, 6, |r, _| if r == 0 { 0.1 } else { f64::NAN })),
            (Band::Nir, make_band(6, 6, |_, _| 0.5)),
        ];
        let p = pair(view(1, 0.0, vegetated(6, 6)), view(30, 0.0, masked), 6, 6);
        let r = SignalExtractor::Ndvi.extract(&p, &SignalParams::default());
        assert!(matches!(r.invalid_reason(), Some(InvalidReason::InsufficientCoverage { .. })));
    }
}
