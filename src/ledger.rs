//! Pairwise opponent/partner history, maintained incrementally as matches
//! are scored and rebuildable from the match history log.
//!
//! Counts are additive and "last round" fields merge with `max(existing,
//! incoming)`, so replaying the same log in any order yields the same ledger.

use std::collections::BTreeMap;

use hashbrown::HashMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    matches::{Lineup, Match},
    types::{PlayerId, RoundNumber},
};

/// Unordered pair of distinct players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    low: PlayerId,
    high: PlayerId,
}

impl PairKey {
    /// Key for the pair `{a, b}`; argument order does not matter.
    pub fn new(a: PlayerId, b: PlayerId) -> Self {
        Self {
            low: a.min(b),
            high: a.max(b),
        }
    }

    /// The two players, lower id first.
    pub fn players(&self) -> (PlayerId, PlayerId) {
        (self.low, self.high)
    }
}

/// Everything the ledger knows about one pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PairHistory {
    /// Completed matches on opposite sides.
    pub opponent_count: u32,
    /// Latest round they faced each other.
    pub last_opponent_round: Option<RoundNumber>,
    /// Completed doubles matches on the same side.
    pub partner_count: u32,
    /// Latest round they partnered.
    pub last_partner_round: Option<RoundNumber>,
}

impl PairHistory {
    /// True when the pair met in `round`, on either side of the net.
    pub fn met_in(&self, round: RoundNumber) -> bool {
        self.last_opponent_round == Some(round) || self.last_partner_round == Some(round)
    }
}

fn merge_round(existing: Option<RoundNumber>, incoming: RoundNumber) -> Option<RoundNumber> {
    Some(existing.map_or(incoming, |r| r.max(incoming)))
}

/// Pairwise history derived from round-tagged completed matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryLedger {
    pairs: HashMap<PairKey, PairHistory>,
}

impl HistoryLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replays every completed, round-tagged match in round order.
    /// Matches without a round never reach the ledger.
    pub fn rebuild(history: &[Match]) -> Self {
        let mut rounded: Vec<(RoundNumber, &Lineup)> = history
            .iter()
            .filter(|m| m.is_completed())
            .filter_map(|m| m.round.map(|r| (r, &m.lineup)))
            .collect();
        rounded.sort_by_key(|(round, _)| *round);

        let mut ledger = Self::new();
        for (round, lineup) in rounded {
            ledger.record_match(lineup, round);
        }
        ledger
    }

    /// Records every match of one round.
    pub fn record_round(&mut self, matches: &[Match], round: RoundNumber) {
        for m in matches {
            self.record_match(&m.lineup, round);
        }
    }

    /// Singles: one opponent pair. Doubles: two partner pairs and four
    /// opponent pairs.
    pub fn record_match(&mut self, lineup: &Lineup, round: RoundNumber) {
        for &a in lineup.team1() {
            for &b in lineup.team2() {
                self.bump_opponents(a, b, round);
            }
        }
        for team in [lineup.team1(), lineup.team2()] {
            for (idx, &a) in team.iter().enumerate() {
                for &b in &team[idx + 1..] {
                    self.bump_partners(a, b, round);
                }
            }
        }
    }

    /// History of the pair, all zero when they never met.
    pub fn get(&self, a: PlayerId, b: PlayerId) -> PairHistory {
        self.pairs.get(&PairKey::new(a, b)).copied().unwrap_or_default()
    }

    /// Times `a` and `b` faced each other.
    pub fn opponent_count(&self, a: PlayerId, b: PlayerId) -> u32 {
        self.get(a, b).opponent_count
    }

    /// Times `a` and `b` partnered.
    pub fn partner_count(&self, a: PlayerId, b: PlayerId) -> u32 {
        self.get(a, b).partner_count
    }

    /// Latest round `a` faced `b`.
    pub fn last_opponent_round(&self, a: PlayerId, b: PlayerId) -> Option<RoundNumber> {
        self.get(a, b).last_opponent_round
    }

    /// Latest round `a` partnered `b`.
    pub fn last_partner_round(&self, a: PlayerId, b: PlayerId) -> Option<RoundNumber> {
        self.get(a, b).last_partner_round
    }

    /// True when every pair of `lineup` is recorded as having met, on the
    /// same sides, in `round` or later.
    pub fn covers(&self, lineup: &Lineup, round: RoundNumber) -> bool {
        let opponents = lineup.team1().iter().all(|&a| {
            lineup.team2().iter().all(|&b| {
                let hist = self.get(a, b);
                hist.opponent_count > 0 && hist.last_opponent_round.is_some_and(|r| r >= round)
            })
        });
        let partners = [lineup.team1(), lineup.team2()].into_iter().all(|team| match team {
            [a, b] => {
                let hist = self.get(*a, *b);
                hist.partner_count > 0 && hist.last_partner_round.is_some_and(|r| r >= round)
            }
            _ => true,
        });
        opponents && partners
    }

    /// Number of pairs that ever met.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True when no pair has met yet.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Every recorded pair, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&PairKey, &PairHistory)> {
        self.pairs.iter()
    }

    /// Symmetric nested tables, the persisted form.
    pub fn to_tables(&self) -> LedgerTables {
        let mut tables = LedgerTables::default();
        for (key, hist) in &self.pairs {
            let (a, b) = key.players();
            for (p, q) in [(a, b), (b, a)] {
                if hist.opponent_count > 0 {
                    tables.opponent_count.entry(p).or_default().insert(q, hist.opponent_count);
                }
                if let Some(r) = hist.last_opponent_round {
                    tables.last_opponent_round.entry(p).or_default().insert(q, r);
                }
                if hist.partner_count > 0 {
                    tables.partner_count.entry(p).or_default().insert(q, hist.partner_count);
                }
                if let Some(r) = hist.last_partner_round {
                    tables.last_partner_round.entry(p).or_default().insert(q, r);
                }
            }
        }
        tables
    }

    /// Inverse of [`HistoryLedger::to_tables`]. Asymmetric input is merged
    /// by taking the larger value of `[p][q]` and `[q][p]`.
    pub fn from_tables(tables: &LedgerTables) -> Self {
        let mut ledger = Self::new();
        for (p, row) in &tables.opponent_count {
            for (q, n) in row {
                if let Some(hist) = ledger.entry(*p, *q) {
                    hist.opponent_count = hist.opponent_count.max(*n);
                }
            }
        }
        for (p, row) in &tables.last_opponent_round {
            for (q, r) in row {
                if let Some(hist) = ledger.entry(*p, *q) {
                    hist.last_opponent_round = merge_round(hist.last_opponent_round, *r);
                }
            }
        }
        for (p, row) in &tables.partner_count {
            for (q, n) in row {
                if let Some(hist) = ledger.entry(*p, *q) {
                    hist.partner_count = hist.partner_count.max(*n);
                }
            }
        }
        for (p, row) in &tables.last_partner_round {
            for (q, r) in row {
                if let Some(hist) = ledger.entry(*p, *q) {
                    hist.last_partner_round = merge_round(hist.last_partner_round, *r);
                }
            }
        }
        ledger
    }

    fn entry(&mut self, a: PlayerId, b: PlayerId) -> Option<&mut PairHistory> {
        if a == b {
            return None;
        }
        Some(self.pairs.entry(PairKey::new(a, b)).or_default())
    }

    fn bump_opponents(&mut self, a: PlayerId, b: PlayerId, round: RoundNumber) {
        if let Some(hist) = self.entry(a, b) {
            hist.opponent_count += 1;
            hist.last_opponent_round = merge_round(hist.last_opponent_round, round);
        }
    }

    fn bump_partners(&mut self, a: PlayerId, b: PlayerId, round: RoundNumber) {
        if let Some(hist) = self.entry(a, b) {
            hist.partner_count += 1;
            hist.last_partner_round = merge_round(hist.last_partner_round, round);
        }
    }
}

type Table<T> = BTreeMap<PlayerId, BTreeMap<PlayerId, T>>;

/// Persisted ledger layout: `table[p][q]`, symmetric. All four tables are
/// required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerTables {
    /// Times `p` faced `q`.
    pub opponent_count: Table<u32>,
    /// Latest round in which `p` faced `q`.
    pub last_opponent_round: Table<RoundNumber>,
    /// Times `p` partnered `q`.
    pub partner_count: Table<u32>,
    /// Latest round in which `p` partnered `q`.
    pub last_partner_round: Table<RoundNumber>,
}

/// Saved ledger as found on disk, where any table may be missing.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTables {
    opponent_count: Option<Table<u32>>,
    last_opponent_round: Option<Table<RoundNumber>>,
    partner_count: Option<Table<u32>>,
    last_partner_round: Option<Table<RoundNumber>>,
}

/// Reads an optional saved ledger. One that lacks any of its four tables
/// is reported as absent, so it is rebuilt from history.
pub fn deserialize_complete_tables<'de, D>(deserializer: D) -> Result<Option<LedgerTables>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(stored) = Option::<StoredTables>::deserialize(deserializer)? else {
        return Ok(None);
    };
    match (
        stored.opponent_count,
        stored.last_opponent_round,
        stored.partner_count,
        stored.last_partner_round,
    ) {
        (
            Some(opponent_count),
            Some(last_opponent_round),
            Some(partner_count),
            Some(last_partner_round),
        ) => Ok(Some(LedgerTables {
            opponent_count,
            last_opponent_round,
            partner_count,
            last_partner_round,
        })),
        _ => {
            log::warn!("saved ledger is missing a table, discarding it");
            Ok(None)
        }
    }
}

/// Where the ledger comes from when state is loaded; decided once.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerSource<'a> {
    /// Saved tables that agree with the history log.
    Persisted(HistoryLedger),
    /// No usable saved ledger; replay this history log.
    NeedsRebuild(&'a [Match]),
}

impl<'a> LedgerSource<'a> {
    /// Saved tables are trusted only when they record every round-tagged
    /// completed match of `history`. Anything else is rebuilt.
    pub fn detect(persisted: Option<LedgerTables>, history: &'a [Match]) -> Self {
        let Some(tables) = persisted else {
            return Self::NeedsRebuild(history);
        };
        let ledger = HistoryLedger::from_tables(&tables);
        let consistent = history
            .iter()
            .filter(|m| m.is_completed())
            .all(|m| m.round.is_none_or(|round| ledger.covers(&m.lineup, round)));
        if consistent {
            Self::Persisted(ledger)
        } else {
            Self::NeedsRebuild(history)
        }
    }

    /// The ledger to run with.
    pub fn resolve(self) -> HistoryLedger {
        match self {
            LedgerSource::Persisted(ledger) => ledger,
            LedgerSource::NeedsRebuild(history) => {
                log::warn!(
                    "ledger missing or incomplete, rebuilding from {} archived matches",
                    history.len()
                );
                HistoryLedger::rebuild(history)
            }
        }
    }
}
