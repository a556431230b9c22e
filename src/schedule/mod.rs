//! Matchmaking: round generation and multi-round orchestration.

/// Single-round group formation and team splitting.
pub mod generator;
/// Multi-round driver and the recent-rounds window.
pub mod orchestrator;
/// Injectable random source.
pub mod random;
