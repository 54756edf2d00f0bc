//! Boundaries to the external collaborators
//!
//! Asset ingestion, image acquisition, OSM fetching and result delivery all
//! live outside the engine. It only sees these traits.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::anomaly::AnomalyFlag;
use crate::asset::{Asset, AssetId};
use crate::context::OsmContext;
use crate::error::Result;
use crate::imagery::ImageryObservation;
use crate::threat::ClassificationResult;
use crate::time::TimeRange;

/// Supplies the monitored assets. Calling `assets` again restarts iteration.
pub trait AssetSource: Send + Sync {
    fn assets(&self) -> Box<dyn Iterator<Item = Asset> + '_>;
}

/// Supplies imagery for an asset footprint.
///
/// Acquisition failures are the collaborator's concern: it returns whatever
/// it could obtain, possibly nothing.
pub trait ImagerySource: Send + Sync {
    fn fetch_observations(&self, asset: &Asset, range: TimeRange) -> Vec<ImageryObservation>;
}

/// Supplies OSM surroundings, if known
pub trait ContextSource: Send + Sync {
    fn osm_context(&self, asset: &Asset) -> Option<OsmContext>;
}

/// Something the engine hands to downstream consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "record", rename_all = "snake_case")]
pub enum Published {
    Classification(ClassificationResult),
    Anomaly(AnomalyFlag),
}

/// Receives classifications and anomaly flags
pub trait ResultSink: Send + Sync {
    fn publish(&self, item: Published) -> Result<()>;
}

/// A fixed, in-memory asset list
#[derive(Debug, Clone, Default)]
pub struct StaticAssets(pub Vec<Asset>);

impl AssetSource for StaticAssets {
    fn assets(&self) -> Box<dyn Iterator<Item = Asset> + '_> {
        Box::new(self.0.iter().cloned())
    }
}

/// Context source that never knows anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContext;

impl ContextSource for NoContext {
    fn osm_context(&self, _asset: &Asset) -> Option<OsmContext> {
        None
    }
}

/// Precomputed OSM contexts keyed by asset id
#[derive(Debug, Clone, Default)]
pub struct StaticContext(pub HashMap<AssetId, OsmContext>);

impl ContextSource for StaticContext {
    fn osm_context(&self, asset: &Asset) -> Option<OsmContext> {
        self.0.get(&asset.id).cloned()
    }
}

/// Collects everything published, in arrival order
#[derive(Debug, Default)]
pub struct CollectingSink {
    items: Mutex<Vec<Published>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> Vec<Published> {
        self.items.lock().clone()
    }

    pub fn classifications(&self) -> Vec<ClassificationResult> {
        self.items
            .lock()
            .iter()
            .filter_map(|p| match p {
                Published::Classification(c) => Some(c.clone()),
                Published::Anomaly(_) => None,
            })
            .collect()
    }

    pub fn anomalies(&self) -> Vec<AnomalyFlag> {
        self.items
            .lock()
            .iter()
            .filter_map(|p| match p {
                Published::Anomaly(a) => Some(a.clone()),
                Published::Classification(_) => None,
            })
            .collect()
    }
}

impl ResultSink for CollectingSink {
    fn publish(&self, item: Published) -> Result<()> {
        self.items.lock().push(item);
        Ok(())
    }
}

/// Appends published records to a JSON Lines file
#[derive(Debug)]
pub struct JsonlSink {
    writer: Mutex<BufWriter<File>>,
}

impl JsonlSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl ResultSink for JsonlSink {
    fn publish(&self, item: Published) -> Result<()> {
        let line = serde_json::to_string(&item)?;
        let mut writer = self.writer.lock();
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}
