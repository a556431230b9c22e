use hashbrown::HashSet;
use proptest::prelude::*;
use rand::{SeedableRng, rngs::StdRng};

use shuttle_pairing::{
    core::state::MatchmakingState,
    ledger::HistoryLedger,
    types::{MatchKind, PlayerId},
};

#[derive(Debug, Clone)]
enum Action {
    Generate { doubles: bool, rounds: u8, courts: u8 },
    Score { target: u8, winner_first: bool },
    DeletePending { target: u8 },
    DeletePlayer { target: u8 },
    AddPlayer { rating: u16 },
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        3 => (any::<bool>(), 1u8..4, 1u8..4)
            .prop_map(|(doubles, rounds, courts)| Action::Generate { doubles, rounds, courts }),
        5 => (0u8..16, any::<bool>())
            .prop_map(|(target, winner_first)| Action::Score { target, winner_first }),
        1 => (0u8..16).prop_map(|target| Action::DeletePending { target }),
        1 => (0u8..16).prop_map(|target| Action::DeletePlayer { target }),
        1 => (1200u16..1800).prop_map(|rating| Action::AddPlayer { rating }),
    ]
}

fn pick<T: Copy>(items: &[T], target: u8) -> Option<T> {
    if items.is_empty() {
        return None;
    }
    Some(items[usize::from(target) % items.len()])
}

fn assert_invariants(state: &MatchmakingState) -> Result<(), TestCaseError> {
    for p in state.players() {
        prop_assert_eq!(p.matches_played, p.wins + p.losses);
        prop_assert!(p.rating.is_finite());
    }

    for m in state.history() {
        let score = m.score.expect("archived match has a score");
        prop_assert_ne!(score.team1, score.team2);
    }

    let mut seen: HashSet<(u32, PlayerId)> = HashSet::new();
    for m in state.pending_matches() {
        prop_assert!(m.score.is_none());
        let Some(round) = m.round else { continue };
        for id in m.lineup.players() {
            prop_assert!(seen.insert((round, id)), "player {} twice in round {}", id, round);
        }
    }

    prop_assert_eq!(state.ledger(), &HistoryLedger::rebuild(state.history()));
    Ok(())
}

proptest! {
    #[test]
    fn random_sessions_preserve_state_invariants(
        seed in any::<u64>(),
        actions in prop::collection::vec(action_strategy(), 1..60),
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut state = MatchmakingState::default();
        for i in 0..8 {
            state
                .add_player(&format!("P{i}"), Some(1400.0 + 30.0 * f64::from(i)))
                .expect("seed player");
        }
        let mut extra = 0u32;

        for action in actions {
            match action {
                Action::Generate { doubles, rounds, courts } => {
                    let kind = if doubles { MatchKind::Doubles } else { MatchKind::Singles };
                    let ids: Vec<PlayerId> = state.players().map(|p| p.id).collect();
                    let before = state.pending_matches().len();
                    match state.generate_rounds(&ids, kind, u32::from(rounds), usize::from(courts), &mut rng) {
                        Ok(created) => {
                            prop_assert_eq!(state.pending_matches().len(), before + created.len());
                            prop_assert!(created.len() <= usize::from(rounds) * usize::from(courts));
                        }
                        Err(_) => prop_assert_eq!(state.pending_matches().len(), before),
                    }
                }
                Action::Score { target, winner_first } => {
                    let ids: Vec<_> = state.pending_matches().iter().map(|m| m.id).collect();
                    if let Some(id) = pick(&ids, target) {
                        let (s1, s2) = if winner_first { (21, 15) } else { (17, 21) };
                        let outcome = state.record_score(id, s1, s2).expect("score pending match");
                        prop_assert_eq!(outcome.archived_match.id, id);
                        prop_assert!(state.pending_matches().iter().all(|m| m.id != id));
                    }
                }
                Action::DeletePending { target } => {
                    let ids: Vec<_> = state.pending_matches().iter().map(|m| m.id).collect();
                    if let Some(id) = pick(&ids, target) {
                        state.delete_pending_match(id).expect("delete pending");
                    }
                }
                Action::DeletePlayer { target } => {
                    let ids: Vec<_> = state.players().map(|p| p.id).collect();
                    if let Some(id) = pick(&ids, target) {
                        let history_len = state.history().len();
                        state.delete_player(id).expect("delete player");
                        prop_assert_eq!(state.history().len(), history_len);
                        prop_assert!(state.pending_matches().iter().all(|m| !m.involves(id)));
                    }
                }
                Action::AddPlayer { rating } => {
                    extra += 1;
                    state
                        .add_player(&format!("X{extra}"), Some(f64::from(rating)))
                        .expect("add player");
                }
            }
            assert_invariants(&state)?;
        }
    }
}
