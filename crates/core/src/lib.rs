//! # GeoWatch Core
//!
//! Core types, rasters and storage for the GeoWatch asset change detection engine.
//!
//! This crate provides:
//! - `Raster<T>`: Generic raster grid type with an affine `GeoTransform`
//! - `Asset`, `ImageryObservation`: the read-only inputs of an analysis
//! - `SignalResult`, `ChangeObservation`, `ClassificationResult`, `AnomalyFlag`:
//!   the records the engine produces and owns
//! - `HistoryStore`: the append-only per-asset observation history
//! - Collaborator traits for assets, imagery, OSM context and result sinks

pub mod anomaly;
pub mod asset;
pub mod context;
pub mod error;
pub mod history;
pub mod imagery;
pub mod observation;
pub mod raster;
pub mod signal;
pub mod sources;
pub mod threat;
pub mod time;

pub use anomaly::{AnomalyDirection, AnomalyFlag, AnomalySeverity};
pub use asset::{Asset, AssetCategory, AssetId, CategoryTable};
pub use context::{FeatureKind, GeoZone, OsmContext, OsmFeature};
pub use error::{AlignmentError, Error, Result};
pub use history::{HistoryStore, InMemoryHistory, JsonlHistory};
pub use imagery::{Band, ImageryObservation};
pub use observation::{ChangeObservation, ChangeStatus};
pub use raster::{Extent, GeoTransform, Raster, RasterElement};
pub use signal::{InvalidReason, SignalKind, SignalMetrics, SignalOutcome, SignalResult};
pub use threat::{review_order, ClassificationResult, PriorityRank, RationaleFactor, ThreatLevel};
pub use time::TimeRange;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::asset::{Asset, AssetCategory, AssetId, CategoryTable};
    pub use crate::error::{AlignmentError, Error, Result};
    pub use crate::imagery::{Band, ImageryObservation};
    pub use crate::observation::{ChangeObservation, ChangeStatus};
    pub use crate::raster::{Extent, GeoTransform, Raster, RasterElement};
    pub use crate::signal::{InvalidReason, SignalKind, SignalMetrics, SignalResult};
    pub use crate::threat::{ClassificationResult, ThreatLevel};
    pub use crate::time::TimeRange;
}
