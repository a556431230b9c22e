//! Error taxonomy surfaced by every state operation.

use thiserror::Error;

use crate::types::{MatchId, PlayerId, RoundNumber};

/// Rejected input. The state is never modified when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Name is blank after trimming.
    #[error("player name must not be empty")]
    EmptyName,

    /// Another player already has this name, ignoring case.
    #[error("player already exists: {0}")]
    DuplicateName(String),

    /// Rating is NaN or infinite.
    #[error("rating must be a finite number, got {0}")]
    InvalidRating(f64),

    /// Not enough players to fill one court.
    #[error("need at least {required} players for {kind}, got {actual}")]
    RosterTooSmall {
        /// Match kind label.
        kind: &'static str,
        /// Players one match needs.
        required: usize,
        /// Players supplied.
        actual: usize,
    },

    /// Requested round count outside `1..=max`.
    #[error("number of rounds must be between 1 and {max}, got {actual}")]
    RoundCountOutOfRange {
        /// Configured upper bound.
        max: u32,
        /// Requested count.
        actual: u32,
    },

    /// The requested rounds would run past the largest round number.
    #[error("cannot number {requested} more round(s) after round {last_used}")]
    RoundNumberOverflow {
        /// Highest round number already in use.
        last_used: RoundNumber,
        /// Rounds asked for.
        requested: u32,
    },

    /// Requested court count outside `1..=max`.
    #[error("number of courts must be between 1 and {max}, got {actual}")]
    CourtCountOutOfRange {
        /// Configured upper bound.
        max: usize,
        /// Requested count.
        actual: usize,
    },

    /// A score was not supplied.
    #[error("both scores are required")]
    MissingScore,

    /// A score is below zero.
    #[error("scores cannot be negative")]
    NegativeScore,

    /// A score does not fit the stored integer width.
    #[error("score {0} is out of range")]
    ScoreOutOfRange(i64),

    /// Both sides scored the same.
    #[error("scores cannot be equal, every match needs a winner")]
    TiedScore,

    /// The same player is listed twice in one lineup or roster.
    #[error("player {0} appears more than once")]
    DuplicatePlayer(PlayerId),

    /// A team size does not match the match kind.
    #[error("each team needs {expected} player(s), got {team1} and {team2}")]
    IncompleteTeam {
        /// Players per team for the kind.
        expected: usize,
        /// Players given for team 1.
        team1: usize,
        /// Players given for team 2.
        team2: usize,
    },

    /// The player is booked in another match of the same round and no
    /// one can take their place there.
    #[error("player {player} is already scheduled in match {match_id}")]
    PlayerAlreadyScheduled {
        /// The double-booked player.
        player: PlayerId,
        /// The match that already holds them.
        match_id: MatchId,
    },

    /// A tuning value is out of its allowed range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Snapshot payload that cannot be imported.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatError {
    /// A required top-level array is absent or not an array.
    #[error("invalid data format: missing {0} array")]
    MissingArray(&'static str),

    /// The payload does not parse.
    #[error("invalid data format: {0}")]
    Malformed(String),

    /// A match or roster entry names a player the snapshot lacks.
    #[error("snapshot references unknown player {0}")]
    DanglingPlayer(PlayerId),
}

impl From<serde_json::Error> for FormatError {
    fn from(value: serde_json::Error) -> Self {
        Self::Malformed(value.to_string())
    }
}

/// What a [`crate::core::state::MatchmakingState`] operation can fail with.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Input rejected before any change.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No player with this id.
    #[error("player not found: {0}")]
    PlayerNotFound(PlayerId),

    /// No match with this id.
    #[error("match not found: {0}")]
    MatchNotFound(MatchId),

    /// The match was already scored.
    #[error("match {0} is already completed")]
    AlreadyCompleted(MatchId),

    /// Snapshot could not be imported.
    #[error(transparent)]
    Format(#[from] FormatError),
}

impl CoreError {
    /// True for the not-found family.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::PlayerNotFound(_) | Self::MatchNotFound(_))
    }
}

/// Failure to load a [`crate::config::MatchmakingConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for this layout.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Parsed values failed validation.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Result of a state operation.
pub type CoreResult<T> = std::result::Result<T, CoreError>;
