//! Raster statistics used by the change signals
//!
//! - **Normalization**: z-score and mean-ratio rescaling
//! - **Focal**: moving-window standard deviation

mod focal;
mod normalize;

pub use focal::{focal_std, FocalParams};
pub use normalize::{mean_normalize, zscore};
