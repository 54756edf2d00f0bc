//! Per-signal change measurements

use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed set of change signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Ndvi,
    Structural,
    Texture,
}

impl SignalKind {
    pub const ALL: [SignalKind; 3] = [SignalKind::Ndvi, SignalKind::Structural, SignalKind::Texture];

    /// Declared range of the signed `value`
    pub fn value_range(&self) -> (f64, f64) {
        match self {
            SignalKind::Ndvi => (-2.0, 2.0),
            SignalKind::Structural | SignalKind::Texture => (-1.0, 1.0),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Ndvi => "ndvi",
            SignalKind::Structural => "structural",
            SignalKind::Texture => "texture",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed metric triple reported by every extractor
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SignalMetrics {
    /// Signal metric at the earlier time point
    pub before: f64,
    /// Signal metric at the later time point
    pub after: f64,
    /// Share of jointly valid pixels that changed, in [0, 1]
    pub changed_fraction: f64,
}

/// Why a signal could not be measured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum InvalidReason {
    MissingBand { band: String },
    CloudCover { cover: f64, threshold: f64 },
    InsufficientCoverage { valid_fraction: f64, required: f64 },
    GridTooSmall { rows: usize, cols: usize },
    NonFinite,
    TimedOut { after_ms: u64 },
    Failed { message: String },
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::MissingBand { band } => write!(f, "missing {band} band"),
            InvalidReason::CloudCover { cover, threshold } => {
                write!(f, "cloud cover {cover:.2} above {threshold:.2}")
            }
            InvalidReason::InsufficientCoverage {
                valid_fraction,
                required,
            } => write!(f, "valid fraction {valid_fraction:.2} below {required:.2}"),
            InvalidReason::GridTooSmall { rows, cols } => write!(f, "grid {rows}x{cols} too small"),
            InvalidReason::NonFinite => f.write_str("non-finite result"),
            InvalidReason::TimedOut { after_ms } => write!(f, "timed out after {after_ms} ms"),
            InvalidReason::Failed { message } => write!(f, "failed: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SignalOutcome {
    Valid {
        value: f64,
        magnitude: f64,
        metrics: SignalMetrics,
    },
    Invalid {
        reason: InvalidReason,
    },
}

/// Result of one extractor on one aligned pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalResult {
    pub kind: SignalKind,
    pub outcome: SignalOutcome,
}

impl SignalResult {
    /// Build a valid result, clamping into the declared ranges.
    ///
    /// Any non-finite input turns the result invalid instead.
    pub fn valid(kind: SignalKind, value: f64, magnitude: f64, metrics: SignalMetrics) -> Self {
        let finite = value.is_finite()
            && magnitude.is_finite()
            && metrics.before.is_finite()
            && metrics.after.is_finite()
            && metrics.changed_fraction.is_finite();
        if !finite {
            return Self::invalid(kind, InvalidReason::NonFinite);
        }

        let (lo, hi) = kind.value_range();
        Self {
            kind,
            outcome: SignalOutcome::Valid {
                value: value.clamp(lo, hi),
                magnitude: magnitude.clamp(0.0, 1.0),
                metrics: SignalMetrics {
                    changed_fraction: metrics.changed_fraction.clamp(0.0, 1.0),
                    ..metrics
                },
            },
        }
    }

    pub fn invalid(kind: SignalKind, reason: InvalidReason) -> Self {
        Self {
            kind,
            outcome: SignalOutcome::Invalid { reason },
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self.outcome, SignalOutcome::Valid { .. })
    }

    pub fn value(&self) -> Option<f64> {
        match self.outcome {
            SignalOutcome::Valid { value, .. } => Some(value),
            SignalOutcome::Invalid { .. } => None,
        }
    }

    pub fn magnitude(&self) -> Option<f64> {
        match self.outcome {
            SignalOutcome::Valid { magnitude, .. } => Some(magnitude),
            SignalOutcome::Invalid { .. } => None,
        }
    }

    pub fn metrics(&self) -> Option<&SignalMetrics> {
        match &self.outcome {
            SignalOutcome::Valid { metrics, .. } => Some(metrics),
            SignalOutcome::Invalid { .. } => None,
        }
    }

    pub fn invalid_reason(&self) -> Option<&InvalidReason> {
        match &self.outcome {
            SignalOutcome::Valid { .. } => None,
            SignalOutcome::Invalid { reason } => Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_is_clamped() {
        let r = SignalResult::valid(
            SignalKind::Structural,
            1.7,
            -0.2,
            SignalMetrics {
                before: 0.1,
                after: 0.9,
                changed_fraction: 1.3,
            },
        );
        assert_eq!(r.value(), Some(1.0));
        assert_eq!(r.magnitude(), Some(0.0));
        assert_eq!(r.metrics().unwrap().changed_fraction, 1.0);
    }

    #[test]
    fn test_nan_becomes_invalid() {
        let r = SignalResult::valid(SignalKind::Ndvi, f64::NAN, 0.5, SignalMetrics::default());
        assert!(!r.is_valid());
        assert_eq!(r.invalid_reason(), Some(&InvalidReason::NonFinite));
    }

    #[test]
    fn test_serde_shape() {
        let r = SignalResult::invalid(SignalKind::Texture, InvalidReason::TimedOut { after_ms: 250 });
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["kind"], "texture");
        assert_eq!(json["outcome"]["status"], "invalid");
        assert_eq!(json["outcome"]["reason"]["code"], "timed_out");

        let back: SignalResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, r);
    }
}
