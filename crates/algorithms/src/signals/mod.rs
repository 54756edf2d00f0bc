//! Change signal extractors
//!
//! The extractor set is closed: NDVI-delta, structural-delta and
//! texture-delta. Every extractor maps an [`AlignedPair`] to a
//! [`SignalResult`] and reports problems as `Invalid` outcomes, never as
//! errors or panics.

mod ndvi;
mod structural;
mod texture;

use geowatch_core::raster::Raster;
use geowatch_core::{Band, InvalidReason, SignalKind, SignalResult};
use serde::{Deserialize, Serialize};

use crate::align::AlignedPair;

/// Tunables shared by the extractors
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalParams {
    /// Observations cloudier than this are unusable
    pub cloud_usability_threshold: f64,
    /// Minimum share of cells valid in both views
    pub min_valid_fraction: f64,
    /// Per-pixel change threshold for `changed_fraction` (NDVI units, focal std units)
    pub pixel_threshold: f64,
    /// |ΔNDVI| mapping to full magnitude
    pub ndvi_scale: f64,
    /// Sobel magnitude on z-scored bands above which a cell is an edge
    pub edge_threshold: f64,
    /// Edge-flip fraction mapping to full magnitude
    pub structural_scale: f64,
    /// GLCM gray levels
    pub texture_levels: usize,
    /// |Δentropy| mapping to full magnitude
    pub texture_scale: f64,
    /// Focal window radius for local variability
    pub focal_radius: usize,
}

impl Default for SignalParams {
    fn default() -> Self {
        Self {
            cloud_usability_threshold: 0.6,
            min_valid_fraction: 0.25,
            pixel_threshold: 0.1,
            ndvi_scale: 1.0,
            edge_threshold: 2.0,
            structural_scale: 0.25,
            texture_levels: 16,
            texture_scale: 0.25,
            focal_radius: 1,
        }
    }
}

/// The closed set of change signal extractors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalExtractor {
    Ndvi,
    Structural,
    Texture,
}

impl SignalExtractor {
    pub const ALL: [SignalExtractor; 3] = [
        SignalExtractor::Ndvi,
        SignalExtractor::Structural,
        SignalExtractor::Texture,
    ];

    pub fn kind(&self) -> SignalKind {
        match self {
            SignalExtractor::Ndvi => SignalKind::Ndvi,
            SignalExtractor::Structural => SignalKind::Structural,
            SignalExtractor::Texture => SignalKind::Texture,
        }
    }

    /// Measure this signal on an aligned pair
    pub fn extract(&self, pair: &AlignedPair, params: &SignalParams) -> SignalResult {
        let outcome = match self {
            SignalExtractor::Ndvi => ndvi::extract(pair, params),
            SignalExtractor::Structural => structural::extract(pair, params),
            SignalExtractor::Texture => texture::extract(pair, params),
        };
        outcome.unwrap_or_else(|reason| SignalResult::invalid(self.kind(), reason))
    }
}

/// Run every extractor sequentially, in [`SignalExtractor::ALL`] order
pub fn extract_all(pair: &AlignedPair, params: &SignalParams) -> Vec<SignalResult> {
    SignalExtractor::ALL
        .iter()
        .map(|e| e.extract(pair, params))
        .collect()
}

type Extracted = std::result::Result<SignalResult, InvalidReason>;

fn check_cloud_cover(pair: &AlignedPair, params: &SignalParams) -> Result<(), InvalidReason> {
    let cover = pair.max_cloud_cover();
    if cover > params.cloud_usability_threshold {
        return Err(InvalidReason::CloudCover {
            cover,
            threshold: params.cloud_usability_threshold,
        });
    }
    Ok(())
}

fn require_band(pair: &AlignedPair, band: Band) -> Result<(&Raster<f64>, &Raster<f64>), InvalidReason> {
    pair.band_pair(band).ok_or_else(|| InvalidReason::MissingBand {
        band: band.as_str().to_string(),
    })
}

fn check_grid(pair: &AlignedPair, min: usize) -> Result<(), InvalidReason> {
    if pair.rows < min || pair.cols < min {
        return Err(InvalidReason::GridTooSmall {
            rows: pair.rows,
            cols: pair.cols,
        });
    }
    Ok(())
}

fn check_coverage(valid: usize, total: usize, params: &SignalParams) -> Result<(), InvalidReason> {
    let valid_fraction = if total == 0 { 0.0 } else { valid as f64 / total as f64 };
    if valid == 0 || valid_fraction < params.min_valid_fraction {
        return Err(InvalidReason::InsufficientCoverage {
            valid_fraction,
            required: params.min_valid_fraction,
        });
    }
    Ok(())
}

fn failed(err: geowatch_core::Error) -> InvalidReason {
    InvalidReason::Failed {
        message: err.to_string(),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_extract_all_reports_every_kind() {
        let red = make_band(8, 8, |_, _| 0.1);
        let nir = make_band(8, 8, |_, _| 0.5);
        let before = view(1, 0.0, vec![(Band::Red, red.clone()), (Band::Nir, nir.clone())]);
        let after = view(20, 0.0, vec![(Band::Red, red), (Band::Nir, nir)]);

        let results = extract_all(&pair(before, after, 8, 8), &SignalParams::default());
        let kinds: Vec<SignalKind> = results.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, SignalKind::ALL.to_vec());

        for r in &results {
            assert!(r.is_valid(), "{:?} should be valid", r);
            assert!(r.magnitude().unwrap().abs() < 1e-9, "unchanged scene, got {:?}", r);
        }
    }

    #[test]
    fn test_cloudy_pair_is_invalid_for_all() {
        let red = make_band(8, 8, |_, _| 0.1);
        let nir = make_band(8, 8, |_, _| 0.5);
        let before = view(1, 0.9, vec![(Band::Red, red.clone()), (Band::Nir, nir.clone())]);
        let after = view(20, 0.0, vec![(Band::Red, red), (Band::Nir, nir)]);

        for r in extract_all(&pair(before, after, 8, 8), &SignalParams::default()) {
            assert!(matches!(r.invalid_reason(), Some(InvalidReason::CloudCover { .. })));
        }
    }
}
