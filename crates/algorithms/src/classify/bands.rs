//! Threat bands per asset category and sensitivity presets

use std::fmt;
use std::str::FromStr;

use geowatch_core::{AssetCategory, CategoryTable, Error, ThreatLevel};
use serde::{Deserialize, Serialize};

/// Ascending change-score thresholds for low, medium, high and critical
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThreatBands {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl ThreatBands {
    pub fn new(low: f64, medium: f64, high: f64, critical: f64) -> Self {
        Self {
            low,
            medium,
            high,
            critical,
        }
    }

    /// Bands multiplied by `factor`
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            low: self.low * factor,
            medium: self.medium * factor,
            high: self.high * factor,
            critical: self.critical * factor,
        }
    }

    /// Highest level whose threshold `score` reaches, with that threshold.
    ///
    /// Below `low` the level is none and the threshold reported is `low`.
    pub fn level_for(&self, score: f64) -> (ThreatLevel, f64) {
        [
            (ThreatLevel::Critical, self.critical),
            (ThreatLevel::High, self.high),
            (ThreatLevel::Medium, self.medium),
            (ThreatLevel::Low, self.low),
        ]
        .into_iter()
        .find(|&(_, t)| score >= t)
        .unwrap_or((ThreatLevel::None, self.low))
    }

    /// Thresholds must be strictly ascending within (0, 1]
    pub fn validate(&self) -> Result<(), String> {
        let t = [self.low, self.medium, self.high, self.critical];
        if !t.iter().all(|v| *v > 0.0 && *v <= 1.0) {
            return Err(format!("thresholds must lie in (0, 1], got {:?}", t));
        }
        if !t.windows(2).all(|w| w[0] < w[1]) {
            return Err(format!("thresholds must be strictly ascending, got {:?}", t));
        }
        Ok(())
    }
}

/// Default bands. Military sites and power plants escalate earliest.
pub fn default_bands() -> CategoryTable<ThreatBands> {
    CategoryTable::from_fn(|category| match category {
        AssetCategory::Bridge => ThreatBands::new(0.2, 0.35, 0.5, 0.7),
        AssetCategory::Airport => ThreatBands::new(0.2, 0.35, 0.5, 0.7),
        AssetCategory::PowerPlant => ThreatBands::new(0.15, 0.3, 0.45, 0.65),
        AssetCategory::Railway => ThreatBands::new(0.25, 0.4, 0.55, 0.75),
        AssetCategory::Military => ThreatBands::new(0.1, 0.25, 0.4, 0.6),
        AssetCategory::BorderControl => ThreatBands::new(0.15, 0.3, 0.45, 0.65),
        AssetCategory::Other => ThreatBands::new(0.3, 0.45, 0.6, 0.8),
    })
}

/// Detection sensitivity preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
    Low,
    #[default]
    Medium,
    High,
}

impl Sensitivity {
    /// Band multiplier: higher sensitivity lowers every threshold
    pub fn multiplier(&self) -> f64 {
        match self {
            Sensitivity::Low => 1.25,
            Sensitivity::Medium => 1.0,
            Sensitivity::High => 0.75,
        }
    }
}

impl fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Sensitivity::Low => "low",
            Sensitivity::Medium => "medium",
            Sensitivity::High => "high",
        })
    }
}

impl FromStr for Sensitivity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Sensitivity::Low),
            "medium" => Ok(Sensitivity::Medium),
            "high" => Ok(Sensitivity::High),
            other => Err(Error::InvalidParameter {
                name: "sensitivity",
                value: other.to_string(),
                reason: "expected low, medium or high".into(),
            }),
        }
    }
}
