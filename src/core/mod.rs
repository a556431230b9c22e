//! Authoritative in-memory state and its injected collaborators.

/// Time source abstraction.
pub mod clock;
/// Matchmaking state aggregate and match lifecycle.
pub mod state;
