// libs/shared/utils/src/time.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Half-open time interval `[start, end)`.
///
/// Back-to-back ranges share an endpoint but do not overlap. Callers are
/// responsible for validating `end > start` before constructing one; the
/// range itself is a pure value with no failure modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Build the range `[start, start + minutes)`.
    pub fn from_duration(start: DateTime<Utc>, minutes: i32) -> Self {
        Self {
            start,
            end: start + Duration::minutes(minutes as i64),
        }
    }

    /// Two half-open ranges overlap iff each starts before the other ends.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether `instant` falls inside `[start, end)`.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}
