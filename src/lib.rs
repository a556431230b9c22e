//! Round-robin pairing and Elo ratings for social badminton sessions.
//!
//! # Examples
//!
//! ```
//! use rand::{SeedableRng, rngs::StdRng};
//! use shuttle_pairing::{
//!     config::MatchmakingConfig,
//!     core::state::MatchmakingState,
//!     types::MatchKind,
//! };
//!
//! let mut state = MatchmakingState::new(MatchmakingConfig::default());
//! let alice = state.add_player("Alice", Some(1500.0)).expect("add alice");
//! let bob = state.add_player("Bob", None).expect("add bob");
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let round = state
//!     .generate_rounds(&[alice.id, bob.id], MatchKind::Singles, 1, 1, &mut rng)
//!     .expect("generate");
//! assert_eq!(round.len(), 1);
//!
//! let outcome = state.record_score(round[0].id, 21, 15).expect("score");
//! assert_eq!(outcome.archived_match.round, Some(1));
//! assert!(state.pending_matches().is_empty());
//! ```
//!
//! Persisting through SQLite:
//! ```no_run
//! use shuttle_pairing::{
//!     config::MatchmakingConfig,
//!     persist::{load_state, save_state, sqlite::SqliteSnapshotStore},
//! };
//!
//! let mut store = SqliteSnapshotStore::open("pairing.db").expect("open sqlite");
//! let mut state = load_state(&store, MatchmakingConfig::default()).expect("load");
//! state.add_player("Carol", None).expect("add");
//! save_state(&mut store, &state).expect("save");
//! ```

#![deny(missing_docs)]

/// Matchmaking state aggregate and injected clock.
pub mod core;
/// Tunable constants and TOML loading.
pub mod config;
/// Error taxonomy.
pub mod error;
/// Pairwise opponent/partner history.
pub mod ledger;
/// Match records and lineups.
pub mod matches;
/// Whole-state persistence seam and SQLite store.
pub mod persist;
/// Player records.
pub mod player;
/// Elo rating model.
pub mod rating;
/// Round generation and orchestration.
pub mod schedule;
/// Shared primitive types and enums.
pub mod types;
