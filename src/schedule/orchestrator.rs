//! Drives the round generator across consecutive rounds, threading the
//! sitting-out set and a short window of recently generated rounds.

use std::{collections::VecDeque, ops::RangeInclusive};

use crate::{
    config::MatchmakingConfig,
    error::ValidationError,
    matches::Lineup,
    types::{MatchKind, PlayerId, RoundNumber},
};

use super::{
    generator::{GeneratedRound, RoundGenerator, RoundRequest},
    random::RandomSource,
};

/// The last few generated rounds, oldest first. Used to forbid immediate
/// repeats for matches that have not been played yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentRounds {
    capacity: usize,
    rounds: VecDeque<(RoundNumber, Vec<Lineup>)>,
}

impl RecentRounds {
    /// Empty window holding at most `capacity` rounds. Zero disables it.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            rounds: VecDeque::with_capacity(capacity),
        }
    }

    /// Appends a round, evicting the oldest beyond capacity.
    pub fn push(&mut self, round: RoundNumber, lineups: Vec<Lineup>) {
        if self.capacity == 0 {
            return;
        }
        self.rounds.push_back((round, lineups));
        while self.rounds.len() > self.capacity {
            self.rounds.pop_front();
        }
    }

    /// Rounds currently held.
    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    /// True when no round is held.
    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    /// Held round numbers, oldest first.
    pub fn rounds(&self) -> impl Iterator<Item = RoundNumber> + '_ {
        self.rounds.iter().map(|(r, _)| *r)
    }

    /// True when `a` and `b` shared a court in `round`.
    pub fn met_in(&self, a: PlayerId, b: PlayerId, round: RoundNumber) -> bool {
        self.rounds
            .iter()
            .filter(|(r, _)| *r == round)
            .flat_map(|(_, lineups)| lineups)
            .any(|l| l.contains(a) && l.contains(b))
    }

    /// Rounds in the window where `a` faced `b`.
    pub fn opponent_rounds(&self, a: PlayerId, b: PlayerId) -> Vec<RoundNumber> {
        self.rounds_where(|l| l.opponents_of(a).contains(&b))
    }

    /// Rounds in the window where `a` partnered `b`.
    pub fn partner_rounds(&self, a: PlayerId, b: PlayerId) -> Vec<RoundNumber> {
        self.rounds_where(|l| a != b && l.partners_of(a).contains(&b))
    }

    fn rounds_where(&self, pred: impl Fn(&Lineup) -> bool) -> Vec<RoundNumber> {
        self.rounds
            .iter()
            .flat_map(|(r, lineups)| lineups.iter().filter(|l| pred(l)).map(move |_| *r))
            .collect()
    }
}

/// A validated multi-round generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundPlan {
    /// Singles or doubles.
    pub kind: MatchKind,
    /// Consecutive rounds to generate.
    pub round_count: u32,
    /// Upper bound on matches per round.
    pub courts_per_round: usize,
}

impl RoundPlan {
    /// Checks bounds and roster size before anything is generated.
    pub fn validate(
        &self,
        roster_len: usize,
        config: &MatchmakingConfig,
    ) -> Result<(), ValidationError> {
        if self.round_count < 1 || self.round_count > config.max_rounds {
            return Err(ValidationError::RoundCountOutOfRange {
                max: config.max_rounds,
                actual: self.round_count,
            });
        }
        if self.courts_per_round < 1 || self.courts_per_round > config.max_courts {
            return Err(ValidationError::CourtCountOutOfRange {
                max: config.max_courts,
                actual: self.courts_per_round,
            });
        }
        let required = self.kind.players_per_match();
        if roster_len < required {
            return Err(ValidationError::RosterTooSmall {
                kind: self.kind.as_str(),
                required,
                actual: roster_len,
            });
        }
        Ok(())
    }

    /// Round numbers filled when the plan starts at `start_round`.
    pub fn rounds(&self, start_round: RoundNumber) -> Result<RangeInclusive<RoundNumber>, ValidationError> {
        let last = start_round
            .checked_add(self.round_count.saturating_sub(1))
            .ok_or(ValidationError::RoundNumberOverflow {
                last_used: start_round.saturating_sub(1),
                requested: self.round_count,
            })?;
        Ok(start_round..=last)
    }
}

/// Runs rounds strictly in sequence; each round reads the window the
/// previous one wrote.
pub struct Orchestrator<'a> {
    generator: RoundGenerator<'a>,
}

impl<'a> Orchestrator<'a> {
    /// Wraps a configured generator.
    pub fn new(generator: RoundGenerator<'a>) -> Self {
        Self { generator }
    }

    /// Generates every round of `plan`, numbered from `start_round`.
    pub fn run<R: RandomSource + ?Sized>(
        &self,
        players: &[PlayerId],
        plan: &RoundPlan,
        start_round: RoundNumber,
        mut window: RecentRounds,
        rng: &mut R,
    ) -> Result<Vec<GeneratedRound>, ValidationError> {
        let mut sat_out: Vec<PlayerId> = Vec::new();
        let mut out = Vec::with_capacity(plan.round_count as usize);

        for round in plan.rounds(start_round)? {
            let request = RoundRequest {
                kind: plan.kind,
                candidates: players,
                round,
                sat_out_previous: &sat_out,
                recent: &window,
                max_courts: plan.courts_per_round,
            };
            let generated = self.generator.generate(&request, rng);
            log::debug!(
                "round {round}: {} match(es), {} sitting out",
                generated.lineups.len(),
                generated.sitting_out.len()
            );

            window.push(round, generated.lineups.clone());
            sat_out = generated.sitting_out.clone();
            out.push(generated);
        }
        Ok(out)
    }
}
