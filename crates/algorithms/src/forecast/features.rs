//! Feature schema v1 over a trailing window of scored observations

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use geowatch_core::{ChangeObservation, Error};
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

/// Feature names, in vector order
pub const FEATURE_NAMES: [&str; 4] = ["last_score", "window_mean", "window_slope", "mean_confidence"];

/// A scored history point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredPoint {
    pub observed_at: DateTime<Utc>,
    pub score: f64,
    pub confidence: f64,
}

/// What a model predicts for the next observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastTarget {
    /// Next change score
    Growth,
    /// Next change score weighted by its confidence
    ThreatScore,
}

impl ForecastTarget {
    pub const ALL: [ForecastTarget; 2] = [ForecastTarget::Growth, ForecastTarget::ThreatScore];

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// Target value observed at `point`
    pub fn value_at(&self, point: &ScoredPoint) -> f64 {
        match self {
            ForecastTarget::Growth => point.score,
            ForecastTarget::ThreatScore => point.score * point.confidence,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastTarget::Growth => "growth",
            ForecastTarget::ThreatScore => "threat_score",
        }
    }
}

impl fmt::Display for ForecastTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForecastTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "growth" => Ok(ForecastTarget::Growth),
            "threat_score" | "threat" => Ok(ForecastTarget::ThreatScore),
            other => Err(Error::InvalidParameter {
                name: "target",
                value: other.to_string(),
                reason: "expected growth or threat_score".into(),
            }),
        }
    }
}

/// Scored points of a history, oldest first
pub fn scored_points(history: &[ChangeObservation]) -> Vec<ScoredPoint> {
    let mut points: Vec<ScoredPoint> = history
        .iter()
        .filter(|o| o.is_scored())
        .filter_map(|o| {
            o.change_score.map(|score| ScoredPoint {
                observed_at: o.observed_at,
                score,
                confidence: o.confidence,
            })
        })
        .collect();
    points.sort_by_key(|p| p.observed_at);
    points
}

/// Feature vector for a window of points, in [`FEATURE_NAMES`] order
pub fn window_features(window: &[ScoredPoint]) -> Vec<f64> {
    if window.is_empty() {
        return vec![0.0; FEATURE_NAMES.len()];
    }

    let n = window.len() as f64;
    let scores: Vec<f64> = window.iter().map(|p| p.score).collect();
    let last = scores[scores.len() - 1];
    let mean = scores.iter().sum::<f64>() / n;
    let mean_confidence = window.iter().map(|p| p.confidence).sum::<f64>() / n;

    vec![last, mean, ols_slope(&scores), mean_confidence]
}

/// OLS slope of values against their index, per period
fn ols_slope(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if values.len() < 2 {
        return 0.0;
    }
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n;

    let (sxy, sxx) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(sxy, sxx), (i, y)| {
            let dx = i as f64 - x_mean;
            (sxy + dx * (y - y_mean), sxx + dx * dx)
        });

    sxy / sxx
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone};

    fn points(scores: &[f64]) -> Vec<ScoredPoint> {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        scores
            .iter()
            .enumerate()
            .map(|(i, &score)| ScoredPoint {
                observed_at: t0 + Duration::days(30 * i as i64),
                score,
                confidence: 0.5 + 0.1 * i as f64,
            })
            .collect()
    }

    #[test]
    fn test_window_features() {
        let f = window_features(&points(&[0.1, 0.15, 0.2, 0.25]));
        assert_relative_eq!(f[0], 0.25);
        assert_relative_eq!(f[1], 0.175, epsilon = 1e-12);
        assert_relative_eq!(f[2], 0.05, epsilon = 1e-12);
        assert_relative_eq!(f[3], 0.65, epsilon = 1e-12);
    }

    #[test]
    fn test_target_values() {
        let p = points(&[0.5])[0];
        assert_eq!(ForecastTarget::Growth.value_at(&p), 0.5);
        assert_relative_eq!(ForecastTarget::ThreatScore.value_at(&p), 0.25);
        assert_eq!("threat-score".parse::<ForecastTarget>().unwrap(), ForecastTarget::ThreatScore);
    }
}
