//! One round of pairings: seeded, probabilistic group formation followed by
//! skill-balanced team splitting for doubles.

use hashbrown::{HashMap, HashSet};

use crate::{
    config::MatchmakingConfig,
    error::ValidationError,
    ledger::HistoryLedger,
    matches::Lineup,
    player::Player,
    rating::expected_score,
    types::{MatchKind, PlayerId, RoundNumber},
};

use super::{orchestrator::RecentRounds, random::RandomSource};

/// Inputs for a single round.
#[derive(Debug, Clone, Copy)]
pub struct RoundRequest<'a> {
    /// Singles or doubles.
    pub kind: MatchKind,
    /// Everyone available this round, in roster order.
    pub candidates: &'a [PlayerId],
    /// Number of the round being generated.
    pub round: RoundNumber,
    /// Players who sat out the previous round; they seed groups first.
    pub sat_out_previous: &'a [PlayerId],
    /// Recently generated rounds not yet in the ledger.
    pub recent: &'a RecentRounds,
    /// Upper bound on matches this round.
    pub max_courts: usize,
}

/// Lineups for one round plus whoever was left over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedRound {
    /// Round number.
    pub round: RoundNumber,
    /// One lineup per court used.
    pub lineups: Vec<Lineup>,
    /// Candidates left without a court.
    pub sitting_out: Vec<PlayerId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupFailure {
    /// Every remaining candidate was hard-excluded for the seed.
    NoCandidates,
    /// The finished group exceeded the hard spread cap.
    SpreadCap,
}

/// Doubles team strength: `2/3` of the stronger member plus `1/3` of the
/// weaker one.
pub fn composite_rating(a: f64, b: f64) -> f64 {
    let (high, low) = if a >= b { (a, b) } else { (b, a) };
    high * 2.0 / 3.0 + low / 3.0
}

/// Picks the split of four players into two teams that minimises the gap
/// between the teams' composite ratings. Ties keep the earliest split.
pub fn best_team_split(
    group: [PlayerId; 4],
    rating_of: impl Fn(PlayerId) -> f64,
) -> Result<Lineup, ValidationError> {
    let [a, b, c, d] = group;
    let splits = [([a, b], [c, d]), ([a, c], [b, d]), ([a, d], [b, c])];

    let gap = |(t1, t2): &([PlayerId; 2], [PlayerId; 2])| {
        let c1 = composite_rating(rating_of(t1[0]), rating_of(t1[1]));
        let c2 = composite_rating(rating_of(t2[0]), rating_of(t2[1]));
        (c1 - c2).abs()
    };

    let mut best = splits[0];
    let mut best_gap = gap(&best);
    for split in &splits[1..] {
        let g = gap(split);
        if g < best_gap {
            best = *split;
            best_gap = g;
        }
    }
    Lineup::doubles(best.0, best.1)
}

/// Builds single rounds against a fixed view of players, ledger and config.
pub struct RoundGenerator<'a> {
    players: &'a HashMap<PlayerId, Player>,
    ledger: &'a HistoryLedger,
    config: &'a MatchmakingConfig,
}

impl<'a> RoundGenerator<'a> {
    /// Borrows everything a round reads.
    pub fn new(
        players: &'a HashMap<PlayerId, Player>,
        ledger: &'a HistoryLedger,
        config: &'a MatchmakingConfig,
    ) -> Self {
        Self {
            players,
            ledger,
            config,
        }
    }

    /// Current rating, or the configured starting rating for unknown ids.
    pub fn rating_of(&self, id: PlayerId) -> f64 {
        self.players
            .get(&id)
            .map(|p| p.rating)
            .unwrap_or(self.config.initial_rating)
    }

    /// Builds up to `max_courts` matches. Fewer is a normal outcome: seeds
    /// that cannot complete a group are skipped for this round.
    pub fn generate<R: RandomSource + ?Sized>(
        &self,
        request: &RoundRequest<'_>,
        rng: &mut R,
    ) -> GeneratedRound {
        let group_size = request.kind.players_per_match();

        let mut seen = HashSet::new();
        let mut pool: Vec<PlayerId> = request
            .candidates
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();
        let mut priority: Vec<PlayerId> = request
            .sat_out_previous
            .iter()
            .copied()
            .filter(|id| pool.contains(id))
            .collect();
        let mut exhausted: HashSet<PlayerId> = HashSet::new();
        let mut lineups = Vec::new();

        while lineups.len() < request.max_courts && pool.len() >= group_size {
            let Some(seed) = self.choose_seed(&pool, &priority, &exhausted, rng) else {
                break;
            };
            priority.retain(|id| *id != seed);

            let mut outcome = Err(GroupFailure::NoCandidates);
            for _ in 0..self.config.group_attempts {
                outcome = self.form_group(seed, &pool, request, rng);
                if !matches!(outcome, Err(GroupFailure::SpreadCap)) {
                    break;
                }
            }

            let lineup = match outcome {
                Ok(group) => match self.lineup_for(request.kind, &group) {
                    Ok(lineup) => lineup,
                    Err(err) => {
                        log::debug!("round {}: discarding group {group:?}: {err}", request.round);
                        exhausted.insert(seed);
                        continue;
                    }
                },
                Err(failure) => {
                    log::debug!(
                        "round {}: seed {seed} sits out this round ({failure:?})",
                        request.round
                    );
                    exhausted.insert(seed);
                    continue;
                }
            };

            pool.retain(|id| !lineup.contains(*id));
            priority.retain(|id| !lineup.contains(*id));
            lineups.push(lineup);
        }

        GeneratedRound {
            round: request.round,
            lineups,
            sitting_out: pool,
        }
    }

    /// Cost of adding `candidate` to a group seeded by `group[0]`. Lower is
    /// better; `None` means the candidate is hard-excluded.
    pub fn candidate_cost(
        &self,
        kind: MatchKind,
        group: &[PlayerId],
        candidate: PlayerId,
        round: RoundNumber,
        recent: &RecentRounds,
    ) -> Option<f64> {
        let seed = *group.first()?;
        if self.is_hard_excluded(seed, candidate, round, recent) {
            return None;
        }
        let cfg = self.config;

        let seed_rating = self.rating_of(seed);
        let candidate_rating = self.rating_of(candidate);
        let deviation = expected_score(seed_rating, candidate_rating) - 0.5;
        let skill = 1.0 - (-(deviation * deviation) / (2.0 * cfg.skill_sigma * cfg.skill_sigma)).exp();

        let mut opponent = 0.0;
        let mut partner = 0.0;
        for &member in group {
            opponent += self.opponent_history(member, candidate, round, recent);
            if kind == MatchKind::Doubles {
                partner += self.partner_history(member, candidate, round, recent);
            }
        }

        let (low, high) = group
            .iter()
            .map(|id| self.rating_of(*id))
            .fold((candidate_rating, candidate_rating), |(lo, hi), r| (lo.min(r), hi.max(r)));
        let spread = (high - low - cfg.spread_tolerance).max(0.0);

        Some(
            cfg.skill_weight * skill
                + cfg.partner_weight * partner
                + cfg.opponent_weight * opponent
                + cfg.spread_weight * spread,
        )
    }

    fn choose_seed<R: RandomSource + ?Sized>(
        &self,
        pool: &[PlayerId],
        priority: &[PlayerId],
        exhausted: &HashSet<PlayerId>,
        rng: &mut R,
    ) -> Option<PlayerId> {
        let fresh_priority: Vec<PlayerId> = priority
            .iter()
            .copied()
            .filter(|id| !exhausted.contains(id))
            .collect();
        if !fresh_priority.is_empty() {
            return Some(fresh_priority[rng.pick_index(fresh_priority.len())]);
        }

        let rest: Vec<PlayerId> = pool
            .iter()
            .copied()
            .filter(|id| !exhausted.contains(id))
            .collect();
        if rest.is_empty() {
            return None;
        }
        Some(rest[rng.pick_index(rest.len())])
    }

    fn form_group<R: RandomSource + ?Sized>(
        &self,
        seed: PlayerId,
        pool: &[PlayerId],
        request: &RoundRequest<'_>,
        rng: &mut R,
    ) -> Result<Vec<PlayerId>, GroupFailure> {
        let size = request.kind.players_per_match();
        let mut group = vec![seed];
        while group.len() < size {
            let next = self
                .sample_candidate(&group, pool, request, rng)
                .ok_or(GroupFailure::NoCandidates)?;
            group.push(next);
        }

        if self.config.enforce_spread_cap {
            let ratings: Vec<f64> = group.iter().map(|id| self.rating_of(*id)).collect();
            let high = ratings.iter().copied().fold(f64::MIN, f64::max);
            let low = ratings.iter().copied().fold(f64::MAX, f64::min);
            if high - low > self.config.spread_cap() {
                log::debug!(
                    "round {}: group {group:?} spans {:.0} points, over the cap",
                    request.round,
                    high - low
                );
                return Err(GroupFailure::SpreadCap);
            }
        }
        Ok(group)
    }

    /// Softmax over negative cost.
    fn sample_candidate<R: RandomSource + ?Sized>(
        &self,
        group: &[PlayerId],
        pool: &[PlayerId],
        request: &RoundRequest<'_>,
        rng: &mut R,
    ) -> Option<PlayerId> {
        let scored: Vec<(PlayerId, f64)> = pool
            .iter()
            .copied()
            .filter(|id| !group.contains(id))
            .filter_map(|id| {
                self.candidate_cost(request.kind, group, id, request.round, request.recent)
                    .map(|cost| (id, cost))
            })
            .collect();
        if scored.is_empty() {
            return None;
        }

        let min_cost = scored.iter().map(|(_, c)| *c).fold(f64::INFINITY, f64::min);
        let weights: Vec<f64> = scored
            .iter()
            .map(|(_, c)| (-self.config.alpha * (c - min_cost)).exp())
            .collect();
        let total: f64 = weights.iter().sum();

        let mut target = rng.next_unit() * total;
        for ((id, _), w) in scored.iter().zip(&weights) {
            if target < *w {
                return Some(*id);
            }
            target -= w;
        }
        scored.last().map(|(id, _)| *id)
    }

    fn is_hard_excluded(
        &self,
        seed: PlayerId,
        candidate: PlayerId,
        round: RoundNumber,
        recent: &RecentRounds,
    ) -> bool {
        let Some(previous) = round.checked_sub(1).filter(|r| *r > 0) else {
            return false;
        };
        recent.met_in(seed, candidate, previous) || self.ledger.get(seed, candidate).met_in(previous)
    }

    fn decay(&self, round: RoundNumber, last: RoundNumber) -> f64 {
        let age = f64::from(round.saturating_sub(last));
        0.5_f64.powf(age / self.config.history_half_life)
    }

    /// Ledger plus in-session window. Pairs only known from the players'
    /// legacy opponent lists count once, aged as if met in round 0.
    fn opponent_history(
        &self,
        a: PlayerId,
        b: PlayerId,
        round: RoundNumber,
        recent: &RecentRounds,
    ) -> f64 {
        let hist = self.ledger.get(a, b);
        let mut penalty = match hist.last_opponent_round {
            Some(last) => f64::from(hist.opponent_count) * self.decay(round, last),
            None if self.players.get(&a).is_some_and(|p| p.has_faced(b)) => self.decay(round, 0),
            None => 0.0,
        };
        for r in recent.opponent_rounds(a, b) {
            penalty += self.decay(round, r);
        }
        penalty
    }

    fn partner_history(
        &self,
        a: PlayerId,
        b: PlayerId,
        round: RoundNumber,
        recent: &RecentRounds,
    ) -> f64 {
        let hist = self.ledger.get(a, b);
        let mut penalty = match hist.last_partner_round {
            Some(last) => f64::from(hist.partner_count) * self.decay(round, last),
            None if self.players.get(&a).is_some_and(|p| p.has_partnered(b)) => {
                self.decay(round, 0)
            }
            None => 0.0,
        };
        for r in recent.partner_rounds(a, b) {
            penalty += self.decay(round, r);
        }
        penalty
    }

    fn lineup_for(&self, kind: MatchKind, group: &[PlayerId]) -> Result<Lineup, ValidationError> {
        match (kind, group) {
            (MatchKind::Singles, [seed, opponent]) => Lineup::singles(*seed, *opponent),
            (MatchKind::Doubles, [a, b, c, d]) => {
                best_team_split([*a, *b, *c, *d], |id| self.rating_of(id))
            }
            _ => Err(ValidationError::IncompleteTeam {
                expected: kind.team_size(),
                team1: group.len().min(kind.team_size()),
                team2: group.len().saturating_sub(kind.team_size()),
            }),
        }
    }
}
