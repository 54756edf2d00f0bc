//! # GeoWatch Algorithms
//!
//! The change detection and classification core.
//!
//! ## Pipeline stages
//!
//! - **align**: co-register two acquisitions on a shared grid
//! - **signals**: NDVI-delta, structural-delta and texture-delta extractors
//! - **fusion**: weighted, confidence-aware change score
//! - **classify**: geography-aware threat level and priority rank
//! - **forecast**: ridge-regression growth / threat forecasting
//! - **anomaly**: rolling-baseline anomaly flags
//!
//! ## Raster operators
//!
//! - **imagery**: NDVI and band arithmetic
//! - **texture**: Sobel edges and GLCM entropy
//! - **statistics**: normalization and focal standard deviation

pub(crate) mod maybe_rayon;

pub mod align;
pub mod anomaly;
pub mod classify;
pub mod forecast;
pub mod fusion;
pub mod imagery;
pub mod signals;
pub mod statistics;
pub mod texture;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::align::{align_pair, AlignedPair, AlignedView, AlignmentParams};
    pub use crate::anomaly::{AnomalyDetector, AnomalyParams};
    pub use crate::classify::{Classifier, ClassifierParams, Sensitivity, ThreatBands};
    pub use crate::forecast::{ForecastParams, ForecastTarget, ModelRegistry};
    pub use crate::fusion::{fuse, FusionParams, SignalWeights};
    pub use crate::signals::{extract_all, SignalExtractor, SignalParams};
    pub use geowatch_core::prelude::*;
}
