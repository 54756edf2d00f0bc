//! Threat levels, priority ranking and classification records

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::asset::AssetId;
use crate::context::{FeatureKind, GeoZone};
use crate::signal::SignalKind;

/// Ordinal urgency, ascending
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl ThreatLevel {
    pub const ALL: [ThreatLevel; 5] = [
        ThreatLevel::None,
        ThreatLevel::Low,
        ThreatLevel::Medium,
        ThreatLevel::High,
        ThreatLevel::Critical,
    ];

    /// One band up, capped at critical
    pub fn raise(self) -> Self {
        match self {
            ThreatLevel::None => ThreatLevel::Low,
            ThreatLevel::Low => ThreatLevel::Medium,
            ThreatLevel::Medium => ThreatLevel::High,
            ThreatLevel::High | ThreatLevel::Critical => ThreatLevel::Critical,
        }
    }

    /// One band down, floored at none
    pub fn lower(self) -> Self {
        match self {
            ThreatLevel::None | ThreatLevel::Low => ThreatLevel::None,
            ThreatLevel::Medium => ThreatLevel::Low,
            ThreatLevel::High => ThreatLevel::Medium,
            ThreatLevel::Critical => ThreatLevel::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatLevel::None => "none",
            ThreatLevel::Low => "low",
            ThreatLevel::Medium => "medium",
            ThreatLevel::High => "high",
            ThreatLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One contributing factor of a classification, in the order applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "factor", rename_all = "snake_case")]
pub enum RationaleFactor {
    InsufficientData,
    ScoreBand {
        score: f64,
        level: ThreatLevel,
        threshold: f64,
    },
    ZoneAdjustment {
        zone: GeoZone,
        multiplier: f64,
    },
    Sensitivity {
        multiplier: f64,
    },
    NewFeature {
        feature_id: u64,
        kind: FeatureKind,
        distance_m: f64,
    },
    LowConfidence {
        confidence: f64,
        min_trust: f64,
    },
    DominantSignal {
        signal: SignalKind,
    },
    SignalDisagreement,
    BorderProximity,
    HighCriticality {
        criticality: f64,
    },
}

impl fmt::Display for RationaleFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RationaleFactor::InsufficientData => f.write_str("no valid change signal"),
            RationaleFactor::ScoreBand {
                score,
                level,
                threshold,
            } => write!(f, "score {score:.3} reaches {level} band ({threshold:.3})"),
            RationaleFactor::ZoneAdjustment { zone, multiplier } => {
                write!(f, "{zone} zone scales bands by {multiplier:.2}")
            }
            RationaleFactor::Sensitivity { multiplier } => {
                write!(f, "sensitivity scales bands by {multiplier:.2}")
            }
            RationaleFactor::NewFeature {
                feature_id,
                kind,
                distance_m,
            } => write!(f, "new {kind:?} #{feature_id} at {distance_m:.0} m"),
            RationaleFactor::LowConfidence {
                confidence,
                min_trust,
            } => write!(f, "confidence {confidence:.2} below {min_trust:.2}"),
            RationaleFactor::DominantSignal { signal } => write!(f, "dominant signal: {signal}"),
            RationaleFactor::SignalDisagreement => f.write_str("signals disagree"),
            RationaleFactor::BorderProximity => f.write_str("near international border"),
            RationaleFactor::HighCriticality { criticality } => {
                write!(f, "high criticality asset ({criticality:.2})")
            }
        }
    }
}

/// Review priority of a classification.
///
/// Greater means more urgent: higher threat first, then higher asset
/// criticality, then higher confidence, then the more recent observation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriorityRank {
    pub threat: ThreatLevel,
    pub criticality: f64,
    pub confidence: f64,
    pub observed_at: DateTime<Utc>,
}

impl Ord for PriorityRank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.threat
            .cmp(&other.threat)
            .then_with(|| self.criticality.total_cmp(&other.criticality))
            .then_with(|| self.confidence.total_cmp(&other.confidence))
            .then_with(|| self.observed_at.cmp(&other.observed_at))
    }
}

impl PartialOrd for PriorityRank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PriorityRank {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PriorityRank {}

/// Threat classification of one change observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub asset_id: AssetId,
    pub observed_at: DateTime<Utc>,
    pub threat_level: ThreatLevel,
    pub priority: PriorityRank,
    pub zone: GeoZone,
    pub change_score: Option<f64>,
    pub rationale: Vec<RationaleFactor>,
}

/// Sort classifications most urgent first. Equal ranks keep their input order.
pub fn review_order(results: &mut [ClassificationResult]) {
    results.sort_by(|a, b| b.priority.cmp(&a.priority));
}
