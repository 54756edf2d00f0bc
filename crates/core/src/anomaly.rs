//! Anomaly flags raised against an asset's own baseline

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::asset::AssetId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyDirection {
    Spike,
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalySeverity {
    Moderate,
    High,
}

/// A history point that deviates from the preceding rolling baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyFlag {
    pub asset_id: AssetId,
    pub observed_at: DateTime<Utc>,
    pub value: f64,
    /// Deviation in (floored) standard deviations
    pub score: f64,
    pub direction: AnomalyDirection,
    pub severity: AnomalySeverity,
    pub baseline_mean: f64,
    pub baseline_std: f64,
}

impl AnomalyFlag {
    /// Human-readable explanation
    pub fn reason(&self) -> String {
        let verb = match self.direction {
            AnomalyDirection::Spike => "above",
            AnomalyDirection::Drop => "below",
        };
        format!(
            "change score {:.3} is {:.1} std {} baseline {:.3} ± {:.3}",
            self.value, self.score, verb, self.baseline_mean, self.baseline_std
        )
    }
}

impl fmt::Display for AnomalyFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {} @ {}: {}", self.severity, self.asset_id, self.observed_at, self.reason())
    }
}
