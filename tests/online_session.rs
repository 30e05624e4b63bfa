//! Two sessions coordinating through one shared in-memory store, under a
//! manual clock: the full room lifecycle, move and signal propagation,
//! staleness rejection, and disconnect detection.

use std::rc::Rc;

use cross_nought::sync::protocol::{encode, MoveMessage, RoomKeys};
use cross_nought::{
    Board, Clock, GameResult, ManualClock, Mark, MemoryStore, Scores, Session, SessionError,
    SessionEvent, SessionStatus, SharedStore,
};

struct Rig {
    store: MemoryStore,
    clock: ManualClock,
    host: Session,
    guest: Session,
}

fn rig() -> Rig {
    let store = MemoryStore::new();
    let clock = ManualClock::starting_at(1_000);
    let host = Session::new(Rc::new(store.handle()), Rc::new(clock.clone()));
    let guest = Session::new(Rc::new(store.handle()), Rc::new(clock.clone()));
    Rig {
        store,
        clock,
        host,
        guest,
    }
}

fn connected_rig() -> (Rig, String) {
    let rig = rig();
    let code = rig.host.create_room("Ada").unwrap();
    rig.guest.join_room(&code, "Grace").unwrap();
    rig.host.drain_events();
    rig.guest.drain_events();
    (rig, code)
}

/// Play the top-row game: X at 0, 1, 2 with O answering at 3, 4.
fn exchange_top_row_game(rig: &Rig) -> GameResult {
    let mut last = GameResult::InProgress;
    for (turn, cell) in [0, 3, 1, 4, 2].into_iter().enumerate() {
        rig.clock.advance(10);
        last = if turn % 2 == 0 {
            rig.host.play(cell).unwrap()
        } else {
            rig.guest.play(cell).unwrap()
        };
    }
    last
}

#[test]
fn handshake_reaches_active_on_both_sides() {
    let rig = rig();

    let code = rig.host.create_room("Ada").unwrap();
    assert_eq!(code.len(), 4);
    assert_eq!(rig.host.status(), SessionStatus::Waiting);
    assert!(rig
        .host
        .drain_events()
        .contains(&SessionEvent::RoomCreated { code: code.clone() }));

    let host_name = rig.guest.join_room(&code, "Grace").unwrap();
    assert_eq!(host_name, "Ada");
    assert_eq!(rig.guest.status(), SessionStatus::Active);
    assert_eq!(rig.guest.room_code(), Some(code.clone()));
    assert_eq!(rig.guest.my_mark(), Some(Mark::O));
    assert_eq!(rig.guest.opponent_name().as_deref(), Some("Ada"));

    // The room-record write reached the host's dispatcher.
    assert_eq!(rig.host.status(), SessionStatus::Active);
    assert_eq!(rig.host.my_mark(), Some(Mark::X));
    assert_eq!(rig.host.opponent_name().as_deref(), Some("Grace"));
    assert!(rig
        .host
        .drain_events()
        .contains(&SessionEvent::OpponentConnected));
}

#[test]
fn join_is_case_insensitive() {
    let rig = rig();
    let code = rig.host.create_room("Ada").unwrap();
    assert!(rig.guest.join_room(&code.to_lowercase(), "Grace").is_ok());
}

#[test]
fn join_unknown_room_fails_cleanly() {
    let rig = rig();
    let err = rig.guest.join_room("ZZ99", "Grace").unwrap_err();
    assert_eq!(err, SessionError::RoomNotFound);
    assert_eq!(rig.guest.status(), SessionStatus::Idle);
}

#[test]
fn moves_propagate_and_boards_converge() {
    let (rig, _code) = connected_rig();

    let result = exchange_top_row_game(&rig);
    assert_eq!(
        result,
        GameResult::Won {
            mark: Mark::X,
            line: [0, 1, 2]
        }
    );

    assert_eq!(rig.host.board(), rig.guest.board());
    assert_eq!(rig.host.scores(), Scores { x: 1, o: 0 });
    assert_eq!(rig.guest.scores(), Scores { x: 1, o: 0 });

    // Both sides saw the same result and score change.
    for session in [&rig.host, &rig.guest] {
        let events = session.drain_events();
        assert!(events.contains(&SessionEvent::GameOver(result)));
        assert!(events.contains(&SessionEvent::ScoreChanged {
            mark: Mark::X,
            score: 1
        }));
    }
}

#[test]
fn out_of_turn_and_inactive_moves_rejected() {
    let (rig, _code) = connected_rig();

    // O cannot open.
    assert!(matches!(
        rig.guest.play(0),
        Err(SessionError::Play(_))
    ));

    rig.clock.advance(10);
    rig.host.play(0).unwrap();
    // X cannot move twice in a row.
    assert!(matches!(rig.host.play(1), Err(SessionError::Play(_))));

    // The rejected attempts left both boards consistent.
    assert_eq!(rig.host.board(), rig.guest.board());
    assert_eq!(rig.host.board().mark_count(), 1);
}

#[test]
fn stale_and_echoed_messages_dropped() {
    let (rig, code) = connected_rig();
    let keys = RoomKeys::new(&code);
    let forger = rig.store.handle();

    rig.clock.advance(10);
    rig.host.play(0).unwrap();
    let board_before = rig.guest.board();

    // Timestamp not newer than the last applied move: dropped.
    let stale = MoveMessage {
        player: Mark::X,
        cell_index: 5,
        board: Board::new(),
        move_number: 2,
        ts: rig.clock.now_ms() - 1,
    };
    forger.set(&keys.moves(), &encode(&stale).unwrap());
    assert_eq!(rig.guest.board(), board_before);

    // The host ignores reflections of its own mark outright.
    let echo = MoveMessage {
        player: Mark::X,
        cell_index: 7,
        board: Board::new(),
        move_number: 3,
        ts: rig.clock.now_ms() + 1_000,
    };
    forger.set(&keys.moves(), &encode(&echo).unwrap());
    assert_eq!(rig.host.board(), board_before);
}

#[test]
fn sequence_gap_adopts_snapshot() {
    let (rig, code) = connected_rig();
    let keys = RoomKeys::new(&code);
    let forger = rig.store.handle();

    rig.clock.advance(10);
    rig.host.play(0).unwrap();

    // Moves 2 and 3 never arrive; move 4 carries the cumulative board.
    let mut board = Board::new();
    board.apply_move(0, Mark::X).unwrap();
    board.apply_move(3, Mark::O).unwrap();
    board.apply_move(1, Mark::X).unwrap();
    let skipped = MoveMessage {
        player: Mark::X,
        cell_index: 1,
        board: board.clone(),
        move_number: 4,
        ts: rig.clock.now_ms() + 50,
    };
    forger.set(&keys.moves(), &encode(&skipped).unwrap());

    assert_eq!(rig.guest.board(), board);
    assert_eq!(rig.guest.current_player(), Mark::O);
    rig.clock.advance(100);
    rig.guest.play(4).unwrap();
    assert_eq!(rig.guest.board().cell(4), Some(Mark::O));
}

#[test]
fn reset_signals_apply_on_both_peers() {
    let (rig, _code) = connected_rig();
    exchange_top_row_game(&rig);
    rig.host.drain_events();
    rig.guest.drain_events();

    rig.clock.advance(10);
    rig.host.request_new_game();
    assert_eq!(rig.host.board().mark_count(), 0);
    assert_eq!(rig.guest.board().mark_count(), 0);
    assert!(rig.host.is_game_active());
    assert!(rig.guest.is_game_active());
    assert!(rig.guest.drain_events().contains(&SessionEvent::NewGame));
    // Scores survive a new game.
    assert_eq!(rig.guest.scores(), Scores { x: 1, o: 0 });

    rig.clock.advance(10);
    rig.guest.request_match_reset();
    assert_eq!(rig.host.scores(), Scores::default());
    assert_eq!(rig.guest.scores(), Scores::default());
    assert!(rig.host.drain_events().contains(&SessionEvent::MatchReset));
}

#[test]
fn leave_signal_disconnects_peer_immediately() {
    let (rig, _code) = connected_rig();

    rig.clock.advance(10);
    rig.guest.leave_room();
    assert_eq!(rig.guest.status(), SessionStatus::Idle);

    assert_eq!(rig.host.status(), SessionStatus::Disconnected);
    let events = rig.host.drain_events();
    assert_eq!(
        events
            .iter()
            .filter(|e| **e == SessionEvent::OpponentDisconnected)
            .count(),
        1
    );
}

#[test]
fn silence_disconnects_exactly_once() {
    let (rig, _code) = connected_rig();

    // The guest vanishes without a leave signal; only the host pumps.
    let mut disconnects = 0;
    for _ in 0..20 {
        rig.clock.advance(1_000);
        rig.host.pump();
        disconnects += rig
            .host
            .drain_events()
            .into_iter()
            .filter(|e| *e == SessionEvent::OpponentDisconnected)
            .count();
    }

    assert_eq!(rig.host.status(), SessionStatus::Disconnected);
    assert_eq!(disconnects, 1);
}

#[test]
fn pumping_peers_stay_connected() {
    let (rig, _code) = connected_rig();

    for _ in 0..30 {
        rig.clock.advance(1_000);
        rig.host.pump();
        rig.guest.pump();
    }
    assert_eq!(rig.host.status(), SessionStatus::Active);
    assert_eq!(rig.guest.status(), SessionStatus::Active);
}

#[test]
fn teardown_removes_all_room_keys() {
    let (rig, code) = connected_rig();
    let keys = RoomKeys::new(&code);

    rig.clock.advance(10);
    exchange_top_row_game(&rig);
    for _ in 0..4 {
        rig.clock.advance(1_000);
        rig.host.pump();
        rig.guest.pump();
    }

    rig.guest.leave_room();
    let observer = rig.store.handle();
    for key in keys.all() {
        assert!(observer.get(&key).is_none(), "{key} survived teardown");
    }
}

#[test]
fn session_start_sweeps_expired_rooms() {
    let store = MemoryStore::new();
    let seeder = store.handle();
    let keys = RoomKeys::new("OLDD");
    seeder.set(
        &keys.room(),
        r#"{"host":"Ada","host_mark":"X","status":"waiting","created":0,"ts":0}"#,
    );
    seeder.set(&keys.heartbeat(), r#"{"mark":"X","ts":0}"#,);

    let clock = ManualClock::starting_at(600_001);
    let _session = Session::new(Rc::new(store.handle()), Rc::new(clock.clone()));

    assert!(seeder.get(&keys.room()).is_none());
    assert!(seeder.get(&keys.heartbeat()).is_none());
}

#[test]
fn full_match_to_five_freezes_until_reset() {
    let (rig, _code) = connected_rig();

    for round in 1..=5u32 {
        let result = exchange_top_row_game(&rig);
        assert!(matches!(result, GameResult::Won { mark: Mark::X, .. }));
        assert_eq!(rig.host.scores().x, round);
        assert_eq!(rig.guest.scores().x, round);

        if round < 5 {
            rig.clock.advance(10);
            rig.host.request_new_game();
            assert!(rig.guest.is_game_active());
        }
    }

    assert!(!rig.host.is_match_active());
    assert!(!rig.guest.is_match_active());
    assert!(rig
        .host
        .drain_events()
        .contains(&SessionEvent::MatchWon(Mark::X)));

    // A finished match cannot spawn more games.
    rig.clock.advance(10);
    rig.host.request_new_game();
    assert!(!rig.host.is_game_active());
    assert!(!rig.guest.is_game_active());

    // Both peers credited the winner once each; last write wins, so the
    // shared slot holds a single row for Ada.
    let standings = rig.host.leaderboard();
    assert_eq!(standings.len(), 1);
    assert_eq!(standings[0].name, "Ada");
}
