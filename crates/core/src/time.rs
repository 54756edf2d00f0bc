//! Time ranges for history and imagery queries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Half-open time interval `[start, end)`; a missing bound is unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Everything at or after `start`
    pub fn since(start: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start.is_none_or(|s| t >= s) && self.end.is_none_or(|e| t < e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_half_open() {
        let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let range = TimeRange::new(a, b);

        assert!(range.contains(a));
        assert!(!range.contains(b));
        assert!(TimeRange::unbounded().contains(b));
        assert!(TimeRange::since(b).contains(b));
        assert!(!TimeRange::since(b).contains(a));
    }
}
