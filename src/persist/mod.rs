pub mod sqlite;

use crate::{
    config::MatchmakingConfig,
    core::state::{MatchmakingState, StateSnapshot},
    error::{CoreError, FormatError},
};

/// Failure to read or write a snapshot.
#[derive(Debug)]
pub enum PersistError {
    /// Database error.
    Sqlite(rusqlite::Error),
    /// Envelope could not be encoded or decoded.
    Serde(serde_json::Error),
    /// The stored snapshot was rejected on restore.
    Core(CoreError),
    /// Envelope written by an incompatible version.
    UnsupportedFormat(u16),
}

impl std::fmt::Display for PersistError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite error: {err}"),
            Self::Serde(err) => write!(f, "serialization error: {err}"),
            Self::Core(err) => write!(f, "state error: {err}"),
            Self::UnsupportedFormat(v) => write!(f, "unsupported snapshot format version: {v}"),
        }
    }
}

impl std::error::Error for PersistError {}

impl From<rusqlite::Error> for PersistError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}

impl From<CoreError> for PersistError {
    fn from(value: CoreError) -> Self {
        Self::Core(value)
    }
}

impl From<FormatError> for PersistError {
    fn from(value: FormatError) -> Self {
        Self::Core(CoreError::Format(value))
    }
}

/// Result of a persistence call.
pub type PersistResult<T> = Result<T, PersistError>;

/// Whole-state load/save injected by the host.
pub trait SnapshotStore {
    /// Latest saved snapshot, if any.
    fn load(&self) -> PersistResult<Option<StateSnapshot>>;
    /// Stores `snapshot` as the newest one.
    fn save(&mut self, snapshot: &StateSnapshot) -> PersistResult<()>;
}

/// Restores state from `store`, or starts empty when nothing was saved.
pub fn load_state(
    store: &dyn SnapshotStore,
    config: MatchmakingConfig,
) -> PersistResult<MatchmakingState> {
    match store.load()? {
        Some(snapshot) => Ok(MatchmakingState::from_snapshot(snapshot, config)?),
        None => Ok(MatchmakingState::new(config)),
    }
}

/// Saves a full export of `state`.
pub fn save_state(store: &mut dyn SnapshotStore, state: &MatchmakingState) -> PersistResult<()> {
    store.save(&state.export_snapshot())
}
