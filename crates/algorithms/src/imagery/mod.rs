//! Spectral indices computed from aligned bands

mod indices;

pub use indices::{band_mean, ndvi, normalized_difference};
pub(crate) use indices::build_output;
