//! Elo-style rating model with team-level updates.

use std::collections::BTreeMap;

use crate::{
    config::K_FACTOR,
    matches::{Lineup, RatingChange},
    types::PlayerId,
};

/// Probability that a side rated `rating_a` beats one rated `rating_b`.
pub fn expected_score(rating_a: f64, rating_b: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf((rating_b - rating_a) / 400.0))
}

/// Arithmetic mean of member ratings.
pub fn team_rating(ratings: &[f64]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    ratings.iter().sum::<f64>() / ratings.len() as f64
}

/// Nearest integer, halves toward positive infinity, so `-16.5` becomes
/// `-16` and `16.5` becomes `17`.
fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// Rating update rule, parameterised by K.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingModel {
    /// Maximum points a single match can move a team.
    pub k_factor: f64,
}

impl Default for RatingModel {
    fn default() -> Self {
        Self { k_factor: K_FACTOR }
    }
}

impl RatingModel {
    /// Model with the given K.
    pub fn new(k_factor: f64) -> Self {
        Self { k_factor }
    }

    /// Unrounded deltas `(team1, team2)`. Every member of a team moves by
    /// its team's delta; results are binary, margin is ignored.
    pub fn apply_result(&self, team1: &[f64], team2: &[f64], team1_won: bool) -> (f64, f64) {
        let r1 = team_rating(team1);
        let r2 = team_rating(team2);
        let (actual1, actual2) = if team1_won { (1.0, 0.0) } else { (0.0, 1.0) };
        let delta1 = self.k_factor * (actual1 - expected_score(r1, r2));
        let delta2 = self.k_factor * (actual2 - expected_score(r2, r1));
        (delta1, delta2)
    }

    /// Per-player changes for a finished match. New ratings are rounded to
    /// the nearest integer, halves upward; the recorded delta is the team
    /// delta rounded the same way.
    pub fn rating_changes(
        &self,
        lineup: &Lineup,
        rating_of: impl Fn(PlayerId) -> f64,
        team1_won: bool,
    ) -> BTreeMap<PlayerId, RatingChange> {
        let team1: Vec<f64> = lineup.team1().iter().map(|id| rating_of(*id)).collect();
        let team2: Vec<f64> = lineup.team2().iter().map(|id| rating_of(*id)).collect();
        let (delta1, delta2) = self.apply_result(&team1, &team2, team1_won);

        let mut out = BTreeMap::new();
        let sides = [(lineup.team1(), delta1), (lineup.team2(), delta2)];
        for (ids, delta) in sides {
            for &id in ids {
                let old = rating_of(id);
                out.insert(
                    id,
                    RatingChange {
                        old,
                        new: round_half_up(old + delta),
                        delta: round_half_up(delta),
                    },
                );
            }
        }
        out
    }
}
