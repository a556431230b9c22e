use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    config::MatchmakingConfig,
    error::{CoreError, CoreResult, FormatError, ValidationError},
    ledger::{HistoryLedger, LedgerSource, LedgerTables, deserialize_complete_tables},
    matches::{Lineup, Match, Score},
    player::Player,
    rating::RatingModel,
    schedule::{
        generator::RoundGenerator,
        orchestrator::{Orchestrator, RecentRounds, RoundPlan},
        random::RandomSource,
    },
    types::{MatchId, MatchKind, PlayerId, RoundNumber, Timestamp},
};

use super::clock::{Clock, SystemClock};

/// Snapshot layout version written by [`MatchmakingState::export_snapshot`].
pub const SNAPSHOT_FORMAT_VERSION: u16 = 1;

fn default_format_version() -> u16 {
    SNAPSHOT_FORMAT_VERSION
}

/// Whole-state export. `ledger` is optional; it is rebuilt from
/// `match_history` when absent, partial, or out of step with the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    /// Layout version; payloads without one are read as the current version.
    #[serde(default = "default_format_version")]
    pub format_version: u16,
    /// When the snapshot was taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_date: Option<Timestamp>,
    /// Players in insertion order.
    pub players: Vec<Player>,
    /// Unplayed matches.
    #[serde(default)]
    pub pending_matches: Vec<Match>,
    /// Archived matches, oldest first.
    pub match_history: Vec<Match>,
    /// Current event roster.
    #[serde(default)]
    pub event_players: Vec<PlayerId>,
    /// Saved ledger tables; `None` when missing or incomplete.
    #[serde(
        default,
        deserialize_with = "deserialize_complete_tables",
        skip_serializing_if = "Option::is_none"
    )]
    pub ledger: Option<LedgerTables>,
}

impl StateSnapshot {
    /// Parses a JSON snapshot. `players` and `matchHistory` must be present
    /// and be arrays.
    pub fn from_json(text: &str) -> Result<Self, FormatError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Same as [`StateSnapshot::from_json`] for an already parsed document.
    pub fn from_value(value: Value) -> Result<Self, FormatError> {
        for key in ["players", "matchHistory"] {
            if !value.get(key).is_some_and(Value::is_array) {
                return Err(FormatError::MissingArray(key));
            }
        }
        let snapshot: Self = serde_json::from_value(value)?;
        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(FormatError::Malformed(format!(
                "unsupported snapshot format version: {}",
                snapshot.format_version
            )));
        }
        Ok(snapshot)
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, FormatError> {
        serde_json::to_string_pretty(self).map_err(FormatError::from)
    }
}

/// What a successful score submission changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    /// Participants after the rating update.
    pub updated_players: Vec<Player>,
    /// The match as archived in history.
    pub archived_match: Match,
}

/// Players, pending matches, the immutable history log, the event roster
/// and the derived ledger. Every operation validates first and only then
/// mutates, so a failed call leaves the state exactly as it was.
#[derive(Debug)]
pub struct MatchmakingState {
    config: MatchmakingConfig,
    players: HashMap<PlayerId, Player>,
    player_order: Vec<PlayerId>,
    pending: Vec<Match>,
    history: Vec<Match>,
    event_players: Vec<PlayerId>,
    ledger: HistoryLedger,
    next_player_id: PlayerId,
    next_match_id: MatchId,
    clock: Box<dyn Clock>,
}

impl Default for MatchmakingState {
    fn default() -> Self {
        Self::new(MatchmakingConfig::default())
    }
}

impl MatchmakingState {
    /// Empty state using the system clock.
    pub fn new(config: MatchmakingConfig) -> Self {
        Self {
            config,
            players: HashMap::new(),
            player_order: Vec::new(),
            pending: Vec::new(),
            history: Vec::new(),
            event_players: Vec::new(),
            ledger: HistoryLedger::new(),
            next_player_id: 1,
            next_match_id: 1,
            clock: Box::new(SystemClock),
        }
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Restores state, resolving the ledger once: persisted tables are used
    /// as-is, otherwise the ledger is replayed from history.
    pub fn from_snapshot(snapshot: StateSnapshot, config: MatchmakingConfig) -> CoreResult<Self> {
        let mut state = Self::new(config);

        for player in snapshot.players {
            if state.players.contains_key(&player.id) {
                return Err(FormatError::Malformed(format!("duplicate player id {}", player.id)).into());
            }
            state.player_order.push(player.id);
            state.players.insert(player.id, player);
        }

        for id in &snapshot.event_players {
            if !state.players.contains_key(id) {
                return Err(FormatError::DanglingPlayer(*id).into());
            }
        }
        for m in &snapshot.pending_matches {
            if m.is_completed() {
                return Err(FormatError::Malformed(format!(
                    "pending match {} is already completed",
                    m.id
                ))
                .into());
            }
            if let Some(missing) = m.lineup.players().find(|p| !state.players.contains_key(p)) {
                return Err(FormatError::DanglingPlayer(missing).into());
            }
        }
        if let Some(m) = snapshot.match_history.iter().find(|m| !m.is_completed()) {
            return Err(FormatError::Malformed(format!("history match {} has no score", m.id)).into());
        }

        state.ledger = LedgerSource::detect(snapshot.ledger, &snapshot.match_history).resolve();

        state.next_player_id = state.player_order.iter().max().map_or(1, |id| id + 1);
        state.next_match_id = snapshot
            .pending_matches
            .iter()
            .chain(&snapshot.match_history)
            .map(|m| m.id)
            .max()
            .map_or(1, |id| id + 1);

        let mut seen = HashSet::new();
        state.event_players = snapshot
            .event_players
            .into_iter()
            .filter(|id| seen.insert(*id))
            .collect();
        state.pending = snapshot.pending_matches;
        state.history = snapshot.match_history;
        Ok(state)
    }

    /// Everything needed to restore this state, ledger included.
    pub fn export_snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            export_date: Some(self.clock.now()),
            players: self.players().cloned().collect(),
            pending_matches: self.pending.clone(),
            match_history: self.history.clone(),
            event_players: self.event_players.clone(),
            ledger: Some(self.ledger.to_tables()),
        }
    }

    /// Replaces the whole state with `blob`. On any error the current state
    /// is left untouched.
    pub fn import_snapshot(&mut self, blob: &str) -> CoreResult<()> {
        let snapshot = StateSnapshot::from_json(blob)?;
        self.import(snapshot)
    }

    /// Replaces the whole state with an already parsed snapshot, keeping
    /// the current config and clock.
    pub fn import(&mut self, snapshot: StateSnapshot) -> CoreResult<()> {
        let restored = Self::from_snapshot(snapshot, self.config.clone())?;
        let clock = std::mem::replace(&mut self.clock, Box::new(SystemClock));
        *self = restored;
        self.clock = clock;
        log::info!(
            "imported snapshot: {} players, {} pending, {} archived",
            self.players.len(),
            self.pending.len(),
            self.history.len()
        );
        Ok(())
    }

    /// Active tuning.
    pub fn config(&self) -> &MatchmakingConfig {
        &self.config
    }

    /// Players in insertion order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.player_order.iter().filter_map(|id| self.players.get(id))
    }

    /// Looks a player up by id.
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Case-insensitive lookup by trimmed name.
    pub fn player_by_name(&self, name: &str) -> Option<&Player> {
        let needle = name.trim().to_lowercase();
        self.players().find(|p| p.name.to_lowercase() == needle)
    }

    /// Unplayed matches, in creation order.
    pub fn pending_matches(&self) -> &[Match] {
        &self.pending
    }

    /// Archived matches, in completion order.
    pub fn history(&self) -> &[Match] {
        &self.history
    }

    /// Current event roster.
    pub fn event_players(&self) -> &[PlayerId] {
        &self.event_players
    }

    /// Pairwise history of scored, round-tagged matches.
    pub fn ledger(&self) -> &HistoryLedger {
        &self.ledger
    }

    /// Finds a match among pending and archived ones.
    pub fn get_match(&self, id: MatchId) -> Option<&Match> {
        self.pending
            .iter()
            .chain(&self.history)
            .find(|m| m.id == id)
    }

    /// Players sorted by rating, highest first, then by name.
    pub fn leaderboard(&self) -> Vec<&Player> {
        let mut out: Vec<&Player> = self.players().collect();
        out.sort_by(|a, b| {
            b.rating
                .total_cmp(&a.rating)
                .then_with(|| a.name.cmp(&b.name))
        });
        out
    }

    /// Highest round among pending and archived matches, 0 when none.
    pub fn max_round(&self) -> RoundNumber {
        self.pending
            .iter()
            .chain(&self.history)
            .filter_map(|m| m.round)
            .max()
            .unwrap_or(0)
    }

    /// Roster players with no pending match in `round`.
    pub fn sitting_out(&self, round: RoundNumber) -> Vec<PlayerId> {
        self.event_players
            .iter()
            .copied()
            .filter(|id| {
                !self
                    .pending
                    .iter()
                    .any(|m| m.round == Some(round) && m.involves(*id))
            })
            .collect()
    }

    /// Adds a player with a trimmed, unique name. `initial_rating` defaults
    /// to the configured starting rating.
    pub fn add_player(&mut self, name: &str, initial_rating: Option<f64>) -> CoreResult<Player> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.player_by_name(name).is_some() {
            return Err(ValidationError::DuplicateName(name.to_string()).into());
        }
        let rating = initial_rating.unwrap_or(self.config.initial_rating);
        if !rating.is_finite() {
            return Err(ValidationError::InvalidRating(rating).into());
        }

        let id = self.next_player_id;
        self.next_player_id += 1;
        let player = Player::new(id, name, rating);
        self.player_order.push(id);
        self.players.insert(id, player.clone());
        log::info!("added player {id} ({name}, {rating})");
        Ok(player)
    }

    /// Removes the player, drops them from the roster and purges pending
    /// matches that reference them. Archived matches are not touched.
    pub fn delete_player(&mut self, id: PlayerId) -> CoreResult<Player> {
        let player = self.players.remove(&id).ok_or(CoreError::PlayerNotFound(id))?;
        self.player_order.retain(|p| *p != id);
        self.event_players.retain(|p| *p != id);
        let before = self.pending.len();
        self.pending.retain(|m| !m.involves(id));
        log::info!(
            "deleted player {id}, purged {} pending match(es)",
            before - self.pending.len()
        );
        Ok(player)
    }

    /// Adds a player to the event roster; adding twice is a no-op.
    pub fn add_to_event(&mut self, id: PlayerId) -> CoreResult<()> {
        if !self.players.contains_key(&id) {
            return Err(CoreError::PlayerNotFound(id));
        }
        if !self.event_players.contains(&id) {
            self.event_players.push(id);
        }
        Ok(())
    }

    /// Takes a player off the event roster.
    pub fn remove_from_event(&mut self, id: PlayerId) -> CoreResult<()> {
        let pos = self
            .event_players
            .iter()
            .position(|p| *p == id)
            .ok_or(CoreError::PlayerNotFound(id))?;
        self.event_players.remove(pos);
        Ok(())
    }

    /// Empties the event roster.
    pub fn clear_event(&mut self) {
        self.event_players.clear();
    }

    /// Generates `round_count` consecutive rounds numbered after every
    /// existing round. The ledger is not touched: only scored matches feed
    /// it. A round may hold fewer matches than `courts_per_round`.
    pub fn generate_rounds<R: RandomSource + ?Sized>(
        &mut self,
        player_ids: &[PlayerId],
        kind: MatchKind,
        round_count: u32,
        courts_per_round: usize,
        rng: &mut R,
    ) -> CoreResult<Vec<Match>> {
        let mut seen = HashSet::new();
        for &id in player_ids {
            if !self.players.contains_key(&id) {
                return Err(CoreError::PlayerNotFound(id));
            }
            if !seen.insert(id) {
                return Err(ValidationError::DuplicatePlayer(id).into());
            }
        }
        let plan = RoundPlan {
            kind,
            round_count,
            courts_per_round,
        };
        plan.validate(player_ids.len(), &self.config)?;

        let last_used = self.max_round();
        let start_round = last_used
            .checked_add(1)
            .ok_or(ValidationError::RoundNumberOverflow {
                last_used,
                requested: round_count,
            })?;
        let last_round = *plan.rounds(start_round)?.end();
        let window = self.recent_window(start_round);
        let generator = RoundGenerator::new(&self.players, &self.ledger, &self.config);
        let rounds = Orchestrator::new(generator).run(player_ids, &plan, start_round, window, rng)?;

        let now = self.clock.now();
        let mut created = Vec::new();
        for generated in rounds {
            for lineup in generated.lineups {
                let id = self.next_match_id;
                self.next_match_id += 1;
                created.push(Match::new_pending(id, lineup, Some(generated.round), now));
            }
        }
        self.pending.extend(created.iter().cloned());
        log::info!(
            "generated {} {} match(es) for rounds {start_round}..={last_round}",
            created.len(),
            kind.as_str()
        );
        Ok(created)
    }

    /// [`MatchmakingState::generate_rounds`] over the current event roster.
    pub fn generate_event_rounds<R: RandomSource + ?Sized>(
        &mut self,
        kind: MatchKind,
        round_count: u32,
        courts_per_round: usize,
        rng: &mut R,
    ) -> CoreResult<Vec<Match>> {
        let roster = self.event_players.clone();
        self.generate_rounds(&roster, kind, round_count, courts_per_round, rng)
    }

    /// Scores a pending match: applies the rating model, archives an
    /// immutable copy and feeds the ledger when the match has a round.
    pub fn record_score(
        &mut self,
        match_id: MatchId,
        score1: i64,
        score2: i64,
    ) -> CoreResult<ScoreOutcome> {
        if self.history.iter().any(|m| m.id == match_id) {
            return Err(CoreError::AlreadyCompleted(match_id));
        }
        let idx = self
            .pending
            .iter()
            .position(|m| m.id == match_id)
            .ok_or(CoreError::MatchNotFound(match_id))?;
        let score = Score::new(score1, score2)?;
        self.ensure_known(&self.pending[idx].lineup)?;

        let m = self.pending.remove(idx);
        Ok(self.complete(m, score))
    }

    /// Records a match that was played without being generated. It carries
    /// no round, so it moves ratings but never the ledger.
    pub fn record_manual_match(
        &mut self,
        kind: MatchKind,
        team1: &[PlayerId],
        team2: &[PlayerId],
        score1: i64,
        score2: i64,
    ) -> CoreResult<ScoreOutcome> {
        let lineup = Lineup::from_teams(kind, team1, team2)?;
        let score = Score::new(score1, score2)?;
        self.ensure_known(&lineup)?;

        let id = self.next_match_id;
        self.next_match_id += 1;
        let mut m = Match::new_pending(id, lineup, None, self.clock.now());
        m.is_manual = true;
        Ok(self.complete(m, score))
    }

    /// Replaces the lineup of a pending match. A player taken from another
    /// pending match of the same round trades places with a player dropped
    /// from the edited match, preferring whoever held the same slot, so
    /// nobody is double-booked within a round.
    pub fn edit_pending_match(
        &mut self,
        match_id: MatchId,
        team1: &[PlayerId],
        team2: &[PlayerId],
        kind: MatchKind,
    ) -> CoreResult<Match> {
        if self.history.iter().any(|m| m.id == match_id) {
            return Err(CoreError::AlreadyCompleted(match_id));
        }
        let idx = self
            .pending
            .iter()
            .position(|m| m.id == match_id)
            .ok_or(CoreError::MatchNotFound(match_id))?;
        let lineup = Lineup::from_teams(kind, team1, team2)?;
        self.ensure_known(&lineup)?;

        let edited = &self.pending[idx];
        let round = edited.round;
        let old_slots: Vec<PlayerId> = edited.lineup.players().collect();
        let mut displaced: Vec<PlayerId> = old_slots
            .iter()
            .copied()
            .filter(|p| !lineup.contains(*p))
            .collect();
        let mut staged = self.pending.clone();

        for (slot, player) in lineup.players().enumerate() {
            if old_slots.contains(&player) {
                continue;
            }
            let Some(other) = staged
                .iter()
                .position(|m| m.id != match_id && m.round == round && m.involves(player))
            else {
                continue;
            };

            let free = |d: &PlayerId| !staged[other].involves(*d);
            let pick = old_slots
                .get(slot)
                .and_then(|prev| displaced.iter().position(|d| d == prev))
                .filter(|&i| free(&displaced[i]))
                .or_else(|| displaced.iter().position(free));
            let (Some(pick), Some(other_slot)) = (pick, staged[other].lineup.slot_of(player)) else {
                return Err(ValidationError::PlayerAlreadyScheduled {
                    player,
                    match_id: staged[other].id,
                }
                .into());
            };
            let replacement = displaced.remove(pick);
            staged[other].lineup.set_slot(other_slot, replacement);
        }

        staged[idx].lineup = lineup;
        let updated = staged[idx].clone();
        self.pending = staged;
        Ok(updated)
    }

    /// Removes an unplayed match and returns it.
    pub fn delete_pending_match(&mut self, match_id: MatchId) -> CoreResult<Match> {
        if self.history.iter().any(|m| m.id == match_id) {
            return Err(CoreError::AlreadyCompleted(match_id));
        }
        let idx = self
            .pending
            .iter()
            .position(|m| m.id == match_id)
            .ok_or(CoreError::MatchNotFound(match_id))?;
        Ok(self.pending.remove(idx))
    }

    /// Drops every unplayed match; returns how many were removed.
    pub fn delete_all_pending(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    /// Recomputes the ledger from the history log.
    pub fn rebuild_ledger(&mut self) {
        self.ledger = HistoryLedger::rebuild(&self.history);
    }

    fn ensure_known(&self, lineup: &Lineup) -> CoreResult<()> {
        match lineup.players().find(|p| !self.players.contains_key(p)) {
            Some(missing) => Err(CoreError::PlayerNotFound(missing)),
            None => Ok(()),
        }
    }

    /// Pending matches from the rounds just before `start_round`, so a new
    /// session does not repeat pairings that are still waiting to be played.
    fn recent_window(&self, start_round: RoundNumber) -> RecentRounds {
        let capacity = self.config.recent_rounds_window;
        let mut window = RecentRounds::new(capacity);
        let first = start_round
            .saturating_sub(RoundNumber::try_from(capacity).unwrap_or(RoundNumber::MAX))
            .max(1);
        for round in first..start_round {
            let lineups: Vec<Lineup> = self
                .pending
                .iter()
                .filter(|m| m.round == Some(round))
                .map(|m| m.lineup.clone())
                .collect();
            if !lineups.is_empty() {
                window.push(round, lineups);
            }
        }
        window
    }

    /// Infallible tail of scoring; every check has already passed.
    fn complete(&mut self, mut m: Match, score: Score) -> ScoreOutcome {
        let team1_won = score.team1_won();
        let model = RatingModel::new(self.config.k_factor);
        let changes = model.rating_changes(
            &m.lineup,
            |id| self.players.get(&id).map_or(self.config.initial_rating, |p| p.rating),
            team1_won,
        );

        let mut updated_players = Vec::new();
        for id in m.lineup.players() {
            let Some(change) = changes.get(&id) else {
                continue;
            };
            let won = m.lineup.team1().contains(&id) == team1_won;
            let partners = m.lineup.partners_of(id);
            let opponents = m.lineup.opponents_of(id).to_vec();
            if let Some(player) = self.players.get_mut(&id) {
                player.record_result(change.new, won, &partners, &opponents);
                updated_players.push(player.clone());
            }
        }

        m.score = Some(score);
        m.rating_changes = changes;
        m.completed_at = Some(self.clock.now());

        if let Some(round) = m.round {
            self.ledger.record_match(&m.lineup, round);
        }
        log::info!(
            "match {} completed {}-{}, round {:?}",
            m.id,
            score.team1,
            score.team2,
            m.round
        );
        self.history.push(m.clone());

        ScoreOutcome {
            updated_players,
            archived_match: m,
        }
    }
}
