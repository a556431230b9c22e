//! Player record and its per-match bookkeeping.

use serde::{Deserialize, Serialize};

use crate::types::PlayerId;

/// Authoritative player record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Stable player identifier.
    pub id: PlayerId,
    /// Display name, trimmed.
    pub name: String,
    /// Current rating, rounded after every completed match.
    pub rating: f64,
    /// Completed matches, always `wins + losses`.
    #[serde(default)]
    pub matches_played: u32,
    /// Completed matches won.
    #[serde(default)]
    pub wins: u32,
    /// Completed matches lost.
    #[serde(default)]
    pub losses: u32,
    /// Everyone this player has partnered in doubles, deduplicated.
    #[serde(default)]
    pub partners: Vec<PlayerId>,
    /// Everyone this player has faced, deduplicated.
    #[serde(default)]
    pub opponents: Vec<PlayerId>,
}

impl Player {
    /// Player with no matches yet.
    pub fn new(id: PlayerId, name: impl Into<String>, rating: f64) -> Self {
        Self {
            id,
            name: name.into(),
            rating,
            matches_played: 0,
            wins: 0,
            losses: 0,
            partners: Vec::new(),
            opponents: Vec::new(),
        }
    }

    /// Fraction of matches won, `None` before the first match.
    pub fn win_rate(&self) -> Option<f64> {
        if self.matches_played == 0 {
            return None;
        }
        Some(f64::from(self.wins) / f64::from(self.matches_played))
    }

    /// True when `other` was ever on the opposite side.
    pub fn has_faced(&self, other: PlayerId) -> bool {
        self.opponents.contains(&other)
    }

    /// True when `other` was ever a doubles partner.
    pub fn has_partnered(&self, other: PlayerId) -> bool {
        self.partners.contains(&other)
    }

    /// Applies one finished match: new rating, counters, and the legacy
    /// partner/opponent lists.
    pub(crate) fn record_result(
        &mut self,
        new_rating: f64,
        won: bool,
        partners: &[PlayerId],
        opponents: &[PlayerId],
    ) {
        self.rating = new_rating;
        self.matches_played += 1;
        if won {
            self.wins += 1;
        } else {
            self.losses += 1;
        }
        for &partner in partners {
            if partner != self.id && !self.partners.contains(&partner) {
                self.partners.push(partner);
            }
        }
        for &opponent in opponents {
            if !self.opponents.contains(&opponent) {
                self.opponents.push(opponent);
            }
        }
    }
}
