//! Append-only per-asset observation history
//!
//! Observations live in an arena keyed by asset id, each series kept
//! sorted by `observed_at` so time-range reads are two binary searches.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};

use crate::asset::AssetId;
use crate::error::Result;
use crate::observation::ChangeObservation;
use crate::time::TimeRange;

/// Storage for change observations.
///
/// Appends may arrive concurrently from many pipelines. Reads return owned
/// snapshots ordered by `observed_at`.
pub trait HistoryStore: Send + Sync {
    fn append(&self, observation: ChangeObservation) -> Result<()>;

    fn read(&self, asset_id: &AssetId, range: TimeRange) -> Result<Vec<ChangeObservation>>;

    fn asset_ids(&self) -> Result<Vec<AssetId>>;

    fn read_all(&self, asset_id: &AssetId) -> Result<Vec<ChangeObservation>> {
        self.read(asset_id, TimeRange::unbounded())
    }
}

/// In-memory history
#[derive(Debug, Default)]
pub struct InMemoryHistory {
    series: RwLock<HashMap<AssetId, Vec<ChangeObservation>>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.series.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, observation: ChangeObservation) {
        let mut series = self.series.write();
        let points = series.entry(observation.asset_id.clone()).or_default();
        // Equal timestamps keep arrival order
        let at = points.partition_point(|o| o.observed_at <= observation.observed_at);
        points.insert(at, observation);
    }
}

impl HistoryStore for InMemoryHistory {
    fn append(&self, observation: ChangeObservation) -> Result<()> {
        self.insert(observation);
        Ok(())
    }

    fn read(&self, asset_id: &AssetId, range: TimeRange) -> Result<Vec<ChangeObservation>> {
        let series = self.series.read();
        let Some(points) = series.get(asset_id) else {
            return Ok(Vec::new());
        };

        let lo = match range.start {
            Some(start) => points.partition_point(|o| o.observed_at < start),
            None => 0,
        };
        let hi = match range.end {
            Some(end) => points.partition_point(|o| o.observed_at < end),
            None => points.len(),
        };

        Ok(points[lo..hi.max(lo)].to_vec())
    }

    fn asset_ids(&self) -> Result<Vec<AssetId>> {
        let mut ids: Vec<AssetId> = self.series.read().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

/// History persisted as JSON Lines, one observation per line.
///
/// The whole file is loaded into memory on open; appends go to both.
/// An unterminated last line that does not parse is the remains of an
/// interrupted append and is cut off on open.
#[derive(Debug)]
pub struct JsonlHistory {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
    memory: InMemoryHistory,
}

impl JsonlHistory {
    /// Open (or create) a history file and load its contents
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let memory = InMemoryHistory::new();
        let mut torn_at = None;
        let mut unterminated = false;

        if path.exists() {
            let bytes = fs::read(&path)?;
            let mut offset = 0;
            for segment in bytes.split_inclusive(|b| *b == b'\n') {
                let start = offset;
                offset += segment.len();
                let terminated = segment.ends_with(b"\n");
                let line = segment.trim_ascii();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_slice::<ChangeObservation>(line) {
                    Ok(observation) => {
                        memory.insert(observation);
                        unterminated = !terminated;
                    }
                    // Only the last segment can lack its newline
                    Err(_) if !terminated => torn_at = Some(start as u64),
                    Err(e) => return Err(e.into()),
                }
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if let Some(len) = torn_at {
            file.set_len(len)?;
        } else if unterminated {
            file.write_all(b"\n")?;
        }

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
            memory,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for JsonlHistory {
    fn append(&self, observation: ChangeObservation) -> Result<()> {
        let line = serde_json::to_string(&observation)?;

        let mut writer = self.writer.lock();
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        self.memory.insert(observation);
        Ok(())
    }

    fn read(&self, asset_id: &AssetId, range: TimeRange) -> Result<Vec<ChangeObservation>> {
        self.memory.read(asset_id, range)
    }

    fn asset_ids(&self) -> Result<Vec<AssetId>> {
        self.memory.asset_ids()
    }
}
