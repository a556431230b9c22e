//! Match records: lineup, score, and per-player rating changes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::ValidationError,
    types::{MatchId, MatchKind, PlayerId, RoundNumber, Timestamp},
};

/// Who plays on which side. Kind-specific invariants hold by construction:
/// singles has two distinct players, doubles four.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Lineup {
    /// One player per side.
    Singles {
        /// Team 1 player.
        team1: PlayerId,
        /// Team 2 player.
        team2: PlayerId,
    },
    /// Two players per side.
    Doubles {
        /// Team 1 pair.
        team1: [PlayerId; 2],
        /// Team 2 pair.
        team2: [PlayerId; 2],
    },
}

impl Lineup {
    /// Singles lineup; the two players must differ.
    pub fn singles(team1: PlayerId, team2: PlayerId) -> Result<Self, ValidationError> {
        if team1 == team2 {
            return Err(ValidationError::DuplicatePlayer(team1));
        }
        Ok(Self::Singles { team1, team2 })
    }

    /// Doubles lineup; all four players must differ.
    pub fn doubles(team1: [PlayerId; 2], team2: [PlayerId; 2]) -> Result<Self, ValidationError> {
        let all = [team1[0], team1[1], team2[0], team2[1]];
        for (idx, id) in all.iter().enumerate() {
            if all[..idx].contains(id) {
                return Err(ValidationError::DuplicatePlayer(*id));
            }
        }
        Ok(Self::Doubles { team1, team2 })
    }

    /// Builds a lineup from loosely shaped team lists, checking that their
    /// lengths match `kind`.
    pub fn from_teams(
        kind: MatchKind,
        team1: &[PlayerId],
        team2: &[PlayerId],
    ) -> Result<Self, ValidationError> {
        let incomplete = || ValidationError::IncompleteTeam {
            expected: kind.team_size(),
            team1: team1.len(),
            team2: team2.len(),
        };
        match kind {
            MatchKind::Singles => match (team1, team2) {
                ([a], [b]) => Self::singles(*a, *b),
                _ => Err(incomplete()),
            },
            MatchKind::Doubles => match (team1, team2) {
                ([a, b], [c, d]) => Self::doubles([*a, *b], [*c, *d]),
                _ => Err(incomplete()),
            },
        }
    }

    /// Singles or doubles, from the shape.
    pub fn kind(&self) -> MatchKind {
        match self {
            Lineup::Singles { .. } => MatchKind::Singles,
            Lineup::Doubles { .. } => MatchKind::Doubles,
        }
    }

    /// Team 1, in slot order.
    pub fn team1(&self) -> &[PlayerId] {
        match self {
            Lineup::Singles { team1, .. } => std::slice::from_ref(team1),
            Lineup::Doubles { team1, .. } => team1,
        }
    }

    /// Team 2, in slot order.
    pub fn team2(&self) -> &[PlayerId] {
        match self {
            Lineup::Singles { team2, .. } => std::slice::from_ref(team2),
            Lineup::Doubles { team2, .. } => team2,
        }
    }

    /// All players, team 1 first, in slot order.
    pub fn players(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.team1().iter().chain(self.team2()).copied()
    }

    /// True when `id` plays on either side.
    pub fn contains(&self, id: PlayerId) -> bool {
        self.players().any(|p| p == id)
    }

    /// Slot index of `id` in [`Lineup::players`] order.
    pub fn slot_of(&self, id: PlayerId) -> Option<usize> {
        self.players().position(|p| p == id)
    }

    /// Puts `id` into slot `slot`. Caller keeps the players distinct.
    pub(crate) fn set_slot(&mut self, slot: usize, id: PlayerId) {
        match self {
            Lineup::Singles { team1, team2 } => match slot {
                0 => *team1 = id,
                _ => *team2 = id,
            },
            Lineup::Doubles { team1, team2 } => match slot {
                0 | 1 => team1[slot] = id,
                _ => team2[(slot - 2).min(1)] = id,
            },
        }
    }

    /// Teammates of `id`, excluding `id`.
    pub fn partners_of(&self, id: PlayerId) -> Vec<PlayerId> {
        if self.team1().contains(&id) {
            self.team1().iter().copied().filter(|p| *p != id).collect()
        } else if self.team2().contains(&id) {
            self.team2().iter().copied().filter(|p| *p != id).collect()
        } else {
            Vec::new()
        }
    }

    /// Players on the other side from `id`.
    pub fn opponents_of(&self, id: PlayerId) -> &[PlayerId] {
        if self.team1().contains(&id) {
            self.team2()
        } else if self.team2().contains(&id) {
            self.team1()
        } else {
            &[]
        }
    }
}

/// Final score. Never tied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    /// Points for team 1.
    pub team1: u32,
    /// Points for team 2.
    pub team2: u32,
}

impl Score {
    /// Validates raw user input: both present, non-negative, unequal.
    pub fn new(score1: i64, score2: i64) -> Result<Self, ValidationError> {
        if score1 < 0 || score2 < 0 {
            return Err(ValidationError::NegativeScore);
        }
        let team1 = u32::try_from(score1).map_err(|_| ValidationError::ScoreOutOfRange(score1))?;
        let team2 = u32::try_from(score2).map_err(|_| ValidationError::ScoreOutOfRange(score2))?;
        if team1 == team2 {
            return Err(ValidationError::TiedScore);
        }
        Ok(Self { team1, team2 })
    }

    /// True when team 1 scored more.
    pub fn team1_won(&self) -> bool {
        self.team1 > self.team2
    }
}

/// Rating movement of one player in one match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingChange {
    /// Rating before the match.
    pub old: f64,
    /// Rating after the match, rounded.
    pub new: f64,
    /// Rounded team delta.
    pub delta: f64,
}

/// Lifecycle position of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    /// Scheduled, lineup still editable.
    Pending,
    /// Scored and archived; immutable.
    Completed,
}

/// A scheduled or finished match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MatchRepr", into = "MatchRepr")]
pub struct Match {
    /// Unique match identifier.
    pub id: MatchId,
    /// Who plays where.
    pub lineup: Lineup,
    /// Generation round; `None` for manually entered matches.
    pub round: Option<RoundNumber>,
    /// Final score; present exactly when completed.
    pub score: Option<Score>,
    /// Per-player rating movement, filled in when scored.
    pub rating_changes: BTreeMap<PlayerId, RatingChange>,
    /// When the match was scheduled or entered.
    pub created_at: Timestamp,
    /// When the score was recorded.
    pub completed_at: Option<Timestamp>,
    /// Entered by hand rather than generated.
    pub is_manual: bool,
}

impl Match {
    /// Unscored, generated match.
    pub fn new_pending(
        id: MatchId,
        lineup: Lineup,
        round: Option<RoundNumber>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            lineup,
            round,
            score: None,
            rating_changes: BTreeMap::new(),
            created_at,
            completed_at: None,
            is_manual: false,
        }
    }

    /// Singles or doubles.
    pub fn kind(&self) -> MatchKind {
        self.lineup.kind()
    }

    /// Pending until a score is set.
    pub fn status(&self) -> MatchStatus {
        if self.score.is_some() {
            MatchStatus::Completed
        } else {
            MatchStatus::Pending
        }
    }

    /// True once scored.
    pub fn is_completed(&self) -> bool {
        self.status() == MatchStatus::Completed
    }

    /// True when `id` plays in this match.
    pub fn involves(&self, id: PlayerId) -> bool {
        self.lineup.contains(id)
    }
}

/// Flat wire shape: `type`, `team1`/`team2` arrays, `score1`/`score2`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MatchRepr {
    id: MatchId,
    #[serde(rename = "type")]
    kind: MatchKind,
    team1: Vec<PlayerId>,
    team2: Vec<PlayerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    round: Option<RoundNumber>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    score1: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    score2: Option<u32>,
    #[serde(default)]
    completed: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    rating_changes: BTreeMap<PlayerId, RatingChange>,
    created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completed_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    is_manual: bool,
}

impl From<Match> for MatchRepr {
    fn from(m: Match) -> Self {
        Self {
            id: m.id,
            kind: m.lineup.kind(),
            team1: m.lineup.team1().to_vec(),
            team2: m.lineup.team2().to_vec(),
            round: m.round,
            score1: m.score.map(|s| s.team1),
            score2: m.score.map(|s| s.team2),
            completed: m.score.is_some(),
            rating_changes: m.rating_changes,
            created_at: m.created_at,
            completed_at: m.completed_at,
            is_manual: m.is_manual,
        }
    }
}

impl TryFrom<MatchRepr> for Match {
    type Error = ValidationError;

    fn try_from(repr: MatchRepr) -> Result<Self, Self::Error> {
        let lineup = Lineup::from_teams(repr.kind, &repr.team1, &repr.team2)?;
        let score = if repr.completed {
            let (Some(s1), Some(s2)) = (repr.score1, repr.score2) else {
                return Err(ValidationError::MissingScore);
            };
            Some(Score::new(i64::from(s1), i64::from(s2))?)
        } else {
            None
        };
        let completed_at = match score {
            Some(_) => repr.completed_at.or(Some(repr.created_at)),
            None => None,
        };
        Ok(Self {
            id: repr.id,
            lineup,
            round: repr.round,
            score,
            rating_changes: repr.rating_changes,
            created_at: repr.created_at,
            completed_at,
            is_manual: repr.is_manual,
        })
    }
}
