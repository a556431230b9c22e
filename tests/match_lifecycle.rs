use chrono::DateTime;
use rand::{SeedableRng, rngs::StdRng};

use shuttle_pairing::{
    config::MatchmakingConfig,
    core::{clock::FixedClock, state::MatchmakingState},
    error::{CoreError, ValidationError},
    matches::MatchStatus,
    types::{MatchKind, PlayerId},
};

fn state() -> MatchmakingState {
    let _ = env_logger::builder().is_test(true).try_init();
    let now = DateTime::from_timestamp(1_700_000_000, 0).expect("timestamp");
    MatchmakingState::new(MatchmakingConfig::default()).with_clock(FixedClock(now))
}

fn add(state: &mut MatchmakingState, names: &[&str]) -> Vec<PlayerId> {
    names
        .iter()
        .map(|name| state.add_player(name, None).expect("add player").id)
        .collect()
}

#[test]
fn scoring_a_generated_match_moves_ratings_and_archives_it() {
    let mut state = state();
    let ids = add(&mut state, &["Alice", "Bob"]);
    let mut rng = StdRng::seed_from_u64(1);
    let created = state
        .generate_rounds(&ids, MatchKind::Singles, 1, 1, &mut rng)
        .expect("generate");
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].status(), MatchStatus::Pending);

    let winner = created[0].lineup.team1()[0];
    let loser = created[0].lineup.team2()[0];
    let outcome = state.record_score(created[0].id, 21, 15).expect("score");

    assert_eq!(outcome.updated_players.len(), 2);
    assert_eq!(state.player(winner).expect("winner").rating, 1516.0);
    assert_eq!(state.player(loser).expect("loser").rating, 1484.0);
    assert_eq!(state.player(winner).and_then(|p| p.win_rate()), Some(1.0));
    assert_eq!(state.player(loser).and_then(|p| p.win_rate()), Some(0.0));
    assert_eq!(outcome.archived_match.rating_changes[&winner].delta, 16.0);
    assert!(outcome.archived_match.completed_at.is_some());
    assert!(state.pending_matches().is_empty());
    assert_eq!(state.history().len(), 1);
    assert_eq!(state.ledger().opponent_count(winner, loser), 1);
    assert_eq!(state.ledger().last_opponent_round(winner, loser), Some(1));

    let carol = state.add_player("Carol", None).expect("add carol");
    assert_eq!(carol.win_rate(), None);
    let carol = carol.id;
    let next = state
        .generate_rounds(&[winner, loser, carol], MatchKind::Singles, 1, 1, &mut rng)
        .expect("generate");
    assert!(next.iter().all(|m| m.round == Some(2)));
    assert!(next.iter().all(|m| !(m.involves(winner) && m.involves(loser))));
}

#[test]
fn invalid_scores_leave_the_match_pending() {
    let mut state = state();
    let ids = add(&mut state, &["Alice", "Bob"]);
    let mut rng = StdRng::seed_from_u64(2);
    let id = state
        .generate_rounds(&ids, MatchKind::Singles, 1, 1, &mut rng)
        .expect("generate")[0]
        .id;

    assert_eq!(
        state.record_score(id, 21, 21),
        Err(CoreError::Validation(ValidationError::TiedScore))
    );
    assert_eq!(
        state.record_score(id, -1, 21),
        Err(CoreError::Validation(ValidationError::NegativeScore))
    );
    assert_eq!(state.pending_matches().len(), 1);
    assert!(state.history().is_empty());
    assert!(state.players().all(|p| p.rating == 1500.0 && p.matches_played == 0));
    assert!(state.ledger().is_empty());
}

#[test]
fn completed_and_unknown_matches_are_rejected() {
    let mut state = state();
    let ids = add(&mut state, &["Alice", "Bob"]);
    let mut rng = StdRng::seed_from_u64(3);
    let id = state
        .generate_rounds(&ids, MatchKind::Singles, 1, 1, &mut rng)
        .expect("generate")[0]
        .id;

    state.record_score(id, 21, 10).expect("score");
    assert_eq!(state.record_score(id, 21, 10), Err(CoreError::AlreadyCompleted(id)));
    assert_eq!(state.delete_pending_match(id), Err(CoreError::AlreadyCompleted(id)));

    let err = state.record_score(999, 21, 10).expect_err("unknown match");
    assert_eq!(err, CoreError::MatchNotFound(999));
    assert!(err.is_not_found());
}

#[test]
fn win_loss_counters_stay_consistent() {
    let mut state = state();
    let ids = add(&mut state, &["A", "B", "C", "D", "E", "F"]);
    let mut rng = StdRng::seed_from_u64(4);
    let created = state
        .generate_rounds(&ids, MatchKind::Doubles, 3, 1, &mut rng)
        .expect("generate");

    for (i, m) in created.iter().enumerate() {
        let (s1, s2) = if i % 2 == 0 { (21, 18) } else { (12, 21) };
        state.record_score(m.id, s1, s2).expect("score");
    }

    let total_played: u32 = state.players().map(|p| p.matches_played).sum();
    assert_eq!(total_played as usize, created.len() * 4);
    for p in state.players() {
        assert_eq!(p.matches_played, p.wins + p.losses);
    }
    assert_eq!(
        state.ledger(),
        &shuttle_pairing::ledger::HistoryLedger::rebuild(state.history())
    );
}

#[test]
fn deleting_a_player_purges_pending_but_keeps_history() {
    let mut state = state();
    let ids = add(&mut state, &["A", "B", "C", "D"]);
    let mut rng = StdRng::seed_from_u64(5);
    let created = state
        .generate_rounds(&ids, MatchKind::Singles, 2, 2, &mut rng)
        .expect("generate");
    let first = created[0].clone();
    state.record_score(first.id, 21, 19).expect("score");
    let history_before = serde_json::to_string(state.history()).expect("serialize");

    let victim = first.lineup.team1()[0];
    state.add_to_event(victim).expect("event");
    state.delete_player(victim).expect("delete");

    assert!(state.player(victim).is_none());
    assert!(state.pending_matches().iter().all(|m| !m.involves(victim)));
    assert!(!state.event_players().contains(&victim));
    assert_eq!(serde_json::to_string(state.history()).expect("serialize"), history_before);
    assert_eq!(state.ledger().opponent_count(victim, first.lineup.team2()[0]), 1);
    assert_eq!(state.delete_player(victim), Err(CoreError::PlayerNotFound(victim)));
}

#[test]
fn editing_a_pending_match_swaps_players_within_the_round() {
    let mut state = state();
    let ids = add(&mut state, &["A", "B", "C", "D"]);
    let mut rng = StdRng::seed_from_u64(6);
    let created = state
        .generate_rounds(&ids, MatchKind::Singles, 1, 2, &mut rng)
        .expect("generate");
    assert_eq!(created.len(), 2);

    let (m1, m2) = (&created[0], &created[1]);
    let p0 = m1.lineup.team1()[0];
    let p1 = m1.lineup.team2()[0];
    let q0 = m2.lineup.team1()[0];
    let q1 = m2.lineup.team2()[0];

    let edited = state
        .edit_pending_match(m1.id, &[p0], &[q0], MatchKind::Singles)
        .expect("edit");
    assert_eq!(edited.lineup.team2(), &[q0]);

    let other = state.get_match(m2.id).expect("other match");
    assert_eq!(other.lineup.team1(), &[p1]);
    assert_eq!(other.lineup.team2(), &[q1]);
}

#[test]
fn editing_can_pull_in_a_player_while_moving_an_existing_one() {
    let mut state = state();
    let ids = add(&mut state, &["A", "B", "C", "D"]);
    let mut rng = StdRng::seed_from_u64(16);
    let created = state
        .generate_rounds(&ids, MatchKind::Singles, 1, 2, &mut rng)
        .expect("generate");
    assert_eq!(created.len(), 2);

    let (m1, m2) = (&created[0], &created[1]);
    let p0 = m1.lineup.team1()[0];
    let p1 = m1.lineup.team2()[0];
    let q0 = m2.lineup.team1()[0];
    let q1 = m2.lineup.team2()[0];

    let edited = state
        .edit_pending_match(m1.id, &[q0], &[p0], MatchKind::Singles)
        .expect("edit");
    assert_eq!(edited.lineup.team1(), &[q0]);
    assert_eq!(edited.lineup.team2(), &[p0]);

    let other = state.get_match(m2.id).expect("other match");
    assert_eq!(other.lineup.team1(), &[p1]);
    assert_eq!(other.lineup.team2(), &[q1]);
    for p in [p0, p1, q0, q1] {
        let booked = state.pending_matches().iter().filter(|m| m.involves(p)).count();
        assert_eq!(booked, 1);
    }
}

#[test]
fn editing_rejects_malformed_lineups_without_changes() {
    let mut state = state();
    let ids = add(&mut state, &["A", "B", "C", "D"]);
    let mut rng = StdRng::seed_from_u64(7);
    let m = state
        .generate_rounds(&ids, MatchKind::Singles, 1, 1, &mut rng)
        .expect("generate")[0]
        .clone();
    let before = state.pending_matches().to_vec();

    let a = m.lineup.team1()[0];
    assert_eq!(
        state.edit_pending_match(m.id, &[a], &[a], MatchKind::Singles),
        Err(CoreError::Validation(ValidationError::DuplicatePlayer(a)))
    );
    assert!(matches!(
        state.edit_pending_match(m.id, &[a], &[], MatchKind::Singles),
        Err(CoreError::Validation(ValidationError::IncompleteTeam { .. }))
    ));
    assert_eq!(
        state.edit_pending_match(m.id, &[a], &[404], MatchKind::Singles),
        Err(CoreError::PlayerNotFound(404))
    );
    assert_eq!(state.pending_matches(), before.as_slice());
}

#[test]
fn manual_matches_rate_players_but_skip_the_ledger() {
    let mut state = state();
    let ids = add(&mut state, &["A", "B", "C", "D"]);

    let outcome = state
        .record_manual_match(MatchKind::Doubles, &ids[..2], &ids[2..], 15, 21)
        .expect("manual");
    assert!(outcome.archived_match.is_manual);
    assert_eq!(outcome.archived_match.round, None);
    assert!(state.ledger().is_empty());
    assert_eq!(state.player(ids[2]).expect("player").rating, 1516.0);
    assert_eq!(state.player(ids[0]).expect("player").partners, vec![ids[1]]);
    assert_eq!(state.max_round(), 0);

    assert!(matches!(
        state.record_manual_match(MatchKind::Doubles, &ids[..1], &ids[2..], 21, 15),
        Err(CoreError::Validation(ValidationError::IncompleteTeam { .. }))
    ));
    assert_eq!(state.history().len(), 1);
}

#[test]
fn player_names_are_trimmed_and_unique() {
    let mut state = state();
    let alice = state.add_player("  Alice ", Some(1620.0)).expect("add");
    assert_eq!(alice.name, "Alice");
    assert_eq!(alice.rating, 1620.0);

    assert_eq!(
        state.add_player("alice", None),
        Err(CoreError::Validation(ValidationError::DuplicateName("alice".into())))
    );
    assert_eq!(
        state.add_player("   ", None),
        Err(CoreError::Validation(ValidationError::EmptyName))
    );
    assert!(matches!(
        state.add_player("Bob", Some(f64::NAN)),
        Err(CoreError::Validation(ValidationError::InvalidRating(_)))
    ));
    assert_eq!(state.players().count(), 1);
    assert_eq!(state.player_by_name("ALICE").map(|p| p.id), Some(alice.id));
}

#[test]
fn leaderboard_orders_by_rating_then_name() {
    let mut state = state();
    state.add_player("Zed", Some(1500.0)).expect("add");
    state.add_player("Amy", Some(1500.0)).expect("add");
    state.add_player("Top", Some(1700.0)).expect("add");

    let names: Vec<&str> = state.leaderboard().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Top", "Amy", "Zed"]);
}

#[test]
fn event_roster_operations() {
    let mut state = state();
    let ids = add(&mut state, &["A", "B", "C"]);
    state.add_to_event(ids[0]).expect("add");
    state.add_to_event(ids[0]).expect("add twice");
    state.add_to_event(ids[2]).expect("add");
    assert_eq!(state.event_players(), &[ids[0], ids[2]]);

    state.remove_from_event(ids[0]).expect("remove");
    assert_eq!(state.event_players(), &[ids[2]]);
    assert_eq!(state.remove_from_event(ids[1]), Err(CoreError::PlayerNotFound(ids[1])));
    assert_eq!(state.add_to_event(77), Err(CoreError::PlayerNotFound(77)));

    state.clear_event();
    assert!(state.event_players().is_empty());
}

#[test]
fn generation_bounds_are_validated_up_front() {
    let mut state = state();
    let ids = add(&mut state, &["A", "B", "C"]);
    let mut rng = StdRng::seed_from_u64(8);

    assert!(matches!(
        state.generate_rounds(&ids, MatchKind::Doubles, 1, 1, &mut rng),
        Err(CoreError::Validation(ValidationError::RosterTooSmall { required: 4, actual: 3, .. }))
    ));
    assert!(matches!(
        state.generate_rounds(&ids, MatchKind::Singles, 0, 1, &mut rng),
        Err(CoreError::Validation(ValidationError::RoundCountOutOfRange { .. }))
    ));
    assert!(matches!(
        state.generate_rounds(&ids, MatchKind::Singles, 1, 0, &mut rng),
        Err(CoreError::Validation(ValidationError::CourtCountOutOfRange { .. }))
    ));
    assert_eq!(
        state.generate_rounds(&[ids[0], ids[0]], MatchKind::Singles, 1, 1, &mut rng),
        Err(CoreError::Validation(ValidationError::DuplicatePlayer(ids[0])))
    );
    assert_eq!(
        state.generate_rounds(&[ids[0], 42], MatchKind::Singles, 1, 1, &mut rng),
        Err(CoreError::PlayerNotFound(42))
    );
    assert!(state.pending_matches().is_empty());
}

#[test]
fn round_numbers_that_would_overflow_are_rejected() {
    let mut state = state();
    let blob = serde_json::json!({
        "players": [
            { "id": 1, "name": "A", "rating": 1500.0 },
            { "id": 2, "name": "B", "rating": 1500.0 },
            { "id": 3, "name": "C", "rating": 1500.0 },
            { "id": 4, "name": "D", "rating": 1500.0 }
        ],
        "pendingMatches": [{
            "id": 1,
            "type": "singles",
            "team1": [3],
            "team2": [4],
            "round": u32::MAX - 1,
            "completed": false,
            "createdAt": "2024-05-01T18:00:00Z"
        }],
        "matchHistory": []
    });
    state.import_snapshot(&blob.to_string()).expect("import");
    assert_eq!(state.max_round(), u32::MAX - 1);
    let mut rng = StdRng::seed_from_u64(10);

    assert_eq!(
        state.generate_rounds(&[1, 2], MatchKind::Singles, 2, 1, &mut rng),
        Err(CoreError::Validation(ValidationError::RoundNumberOverflow {
            last_used: u32::MAX - 1,
            requested: 2,
        }))
    );
    assert_eq!(state.pending_matches().len(), 1);

    let last = state
        .generate_rounds(&[1, 2], MatchKind::Singles, 1, 1, &mut rng)
        .expect("last round number");
    assert_eq!(last.len(), 1);
    assert_eq!(last[0].round, Some(u32::MAX));

    assert_eq!(
        state.generate_rounds(&[1, 2], MatchKind::Singles, 1, 1, &mut rng),
        Err(CoreError::Validation(ValidationError::RoundNumberOverflow {
            last_used: u32::MAX,
            requested: 1,
        }))
    );
}

#[test]
fn pending_matches_can_be_cleared() {
    let mut state = state();
    let ids = add(&mut state, &["A", "B", "C", "D"]);
    let mut rng = StdRng::seed_from_u64(9);
    let created = state
        .generate_rounds(&ids, MatchKind::Singles, 1, 2, &mut rng)
        .expect("generate");

    let removed = state.delete_pending_match(created[0].id).expect("delete");
    assert_eq!(removed.id, created[0].id);
    assert_eq!(state.delete_all_pending(), 1);
    assert!(state.pending_matches().is_empty());
    assert_eq!(state.max_round(), 0);
}
