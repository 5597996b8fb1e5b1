//! Millisecond time ranges.
//!
//! All pipeline timing is expressed in milliseconds. Conversion to the
//! authoring backend's native unit happens only when a bundle is written.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open `[start, end)` interval in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct TimeRange {
    /// Start offset in milliseconds
    pub start: u64,
    /// End offset in milliseconds (exclusive)
    pub end: u64,
}

impl TimeRange {
    /// Create a new range. Does not check ordering; see [`TimeRange::is_valid`].
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// `end > start`. `start >= 0` holds by construction.
    pub fn is_valid(&self) -> bool {
        self.end > self.start
    }

    /// Length of the range in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}ms, {}ms)", self.start, self.end)
    }
}
