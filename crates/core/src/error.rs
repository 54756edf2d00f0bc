//! Error types for GeoWatch

use thiserror::Error;

use crate::asset::AssetId;

/// Main error type for GeoWatch operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Alignment failed: {0}")]
    Alignment(#[from] AlignmentError),

    #[error("Insufficient history for asset {asset_id}: {points} scored points, {required} required")]
    InsufficientHistory {
        asset_id: AssetId,
        points: usize,
        required: usize,
    },

    #[error("Training already in progress for target {0}")]
    TrainingInProgress(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

/// Reasons a pair of observations cannot be co-registered.
///
/// Alignment failures are fatal for one observation pair only; the batch
/// skips the pair and continues.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlignmentError {
    #[error("observation `{sensor}` does not overlap the buffered footprint")]
    NoOverlap { sensor: String },

    #[error("resolution ratio {ratio:.2} exceeds the maximum of {max:.2}")]
    ResolutionDisparity { ratio: f64, max: f64 },

    #[error("observation `{0}` is not north-up")]
    NotNorthUp(String),

    #[error("observation `{0}` carries no bands")]
    NoBands(String),

    #[error("asset footprint is empty")]
    EmptyFootprint,
}

/// Result type alias for GeoWatch operations
pub type Result<T> = std::result::Result<T, Error>;
