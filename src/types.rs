//! Shared primitive IDs and match-related enums.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Monotonic player identifier.
pub type PlayerId = u64;
/// Monotonic match identifier.
pub type MatchId = u64;
/// Round number, starting at 1 within an event.
pub type RoundNumber = u32;
/// Wall-clock timestamp used for created/completed stamps.
pub type Timestamp = DateTime<Utc>;

/// Match format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// One player per side.
    Singles,
    /// Two players per side.
    Doubles,
}

impl MatchKind {
    /// Players on each side of the net.
    pub fn team_size(self) -> usize {
        match self {
            MatchKind::Singles => 1,
            MatchKind::Doubles => 2,
        }
    }

    /// Players needed to fill one court.
    pub fn players_per_match(self) -> usize {
        self.team_size() * 2
    }

    /// Lowercase label, as used in snapshots.
    pub fn as_str(self) -> &'static str {
        match self {
            MatchKind::Singles => "singles",
            MatchKind::Doubles => "doubles",
        }
    }
}
