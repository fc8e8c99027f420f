//! Integration tests for the UCI handshake and turn-taking state machine.

use std::time::Duration;

use uci_gauntlet::engine::session::{MoveReply, ProtocolSession, SessionState};
use uci_gauntlet::game::moves::{CoordinateMove, MoveHistory};
use uci_gauntlet::HarnessError;

use super::test_helpers::{
    ready_session, spawn_fake, test_session_config, FakeScript, GoReply,
};

fn history(moves: &[&str]) -> MoveHistory {
    moves
        .iter()
        .map(|m| m.parse::<CoordinateMove>().expect("valid move"))
        .collect()
}

// ── Handshake ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn handshake_reaches_ready_after_both_sentinels() {
    let (process, fake) = spawn_fake("A", FakeScript::default());
    let mut session = ProtocolSession::new(process, test_session_config());
    assert_eq!(session.state(), SessionState::Uninitialized);
    assert!(!session.handshake_complete());

    session.initialize().await.expect("handshake");

    assert_eq!(session.state(), SessionState::Ready);
    assert!(session.handshake_complete());

    session.terminate().await;
    let log = fake.join().await;
    assert_eq!(
        log.lines(),
        vec!["uci", "setoption name Hash value 16", "isready", "quit"],
        "handshake must be strictly ordered and half-duplex"
    );
}

#[tokio::test]
async fn non_protocol_lines_are_kept_as_diagnostics() {
    let (mut session, _fake) = ready_session("A", FakeScript::default()).await;

    let diagnostics = session.diagnostics();

    assert!(diagnostics.contains(&"id name Fake".to_owned()));
    assert!(diagnostics.iter().any(|l| l.starts_with("option name Hash")));
    assert!(!diagnostics.contains(&"uciok".to_owned()));
}

#[tokio::test]
async fn missing_uciok_never_reaches_ready() {
    let script = FakeScript {
        answer_uci: false,
        ..FakeScript::default()
    };
    let (process, _fake) = spawn_fake("A", script);
    let mut config = test_session_config();
    config.handshake_timeout = Duration::from_millis(200);
    let mut session = ProtocolSession::new(process, config);

    let err = session.initialize().await.expect_err("uciok never arrives");

    assert!(matches!(err, HarnessError::Protocol(_)), "got {err:?}");
    assert!(err.to_string().contains("uciok"), "got {err}");
    assert_ne!(session.state(), SessionState::Ready);
    assert!(!session.handshake_complete());
}

#[tokio::test]
async fn closed_stream_fails_init_without_hanging() {
    let script = FakeScript {
        close_immediately: true,
        ..FakeScript::default()
    };
    let (process, _fake) = spawn_fake("A", script);
    let mut session = ProtocolSession::new(process, test_session_config());

    let result = tokio::time::timeout(Duration::from_secs(5), session.initialize())
        .await
        .expect("initialize must not hang on a closed stream");

    let err = result.expect_err("closed stream must fail the handshake");
    assert!(matches!(err, HarnessError::Protocol(_)), "got {err:?}");
}

#[tokio::test]
async fn closed_stream_during_banner_wait_is_protocol_error() {
    let script = FakeScript {
        close_immediately: true,
        ..FakeScript::default()
    };
    let (process, _fake) = spawn_fake("A", script);
    let mut config = test_session_config();
    config.banner_tokens = vec!["FutureChamp".to_owned()];
    let mut session = ProtocolSession::new(process, config);

    let err = tokio::time::timeout(Duration::from_secs(5), session.initialize())
        .await
        .expect("initialize must not hang")
        .expect_err("no banner arrives");

    assert!(err.to_string().contains("closed its output"), "got {err}");
}

#[tokio::test]
async fn banner_is_consumed_before_uci() {
    let script = FakeScript {
        banner: Some("FutureChamp 2.1 by Tests. Type 'uci' to begin".to_owned()),
        ..FakeScript::default()
    };
    let (process, fake) = spawn_fake("A", script);
    let mut config = test_session_config();
    config.banner_tokens = vec!["FutureChamp".to_owned(), "Type 'uci'".to_owned()];
    let mut session = ProtocolSession::new(process, config);

    session.initialize().await.expect("handshake with banner");
    assert_eq!(session.state(), SessionState::Ready);

    session.terminate().await;
    assert_eq!(fake.join().await.count("uci"), 1);
}

#[tokio::test]
async fn initialize_twice_is_rejected() {
    let (mut session, _fake) = ready_session("A", FakeScript::default()).await;

    let err = session.initialize().await.expect_err("second handshake");
    assert!(matches!(err, HarnessError::Protocol(_)));
}

// ── Moves ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn request_move_returns_first_token() {
    let (mut session, fake) = ready_session("A", FakeScript::default()).await;

    session.set_position(&MoveHistory::new()).await.expect("position");
    let reply = session.request_move().await.expect("move");

    let MoveReply::Move(text) = reply else {
        panic!("expected a move");
    };
    assert!(text.parse::<CoordinateMove>().is_ok(), "got {text}");
    assert_eq!(session.state(), SessionState::Ready);

    session.terminate().await;
    let log = fake.join().await;
    assert!(log.lines().contains(&"position startpos".to_owned()));
    assert_eq!(log.count("go depth 1"), 1);
}

#[tokio::test]
async fn position_carries_full_history() {
    let (mut session, fake) = ready_session("A", FakeScript::default()).await;

    session
        .set_position(&history(&["e2e4", "e7e5"]))
        .await
        .expect("position");
    session.terminate().await;

    let log = fake.join().await;
    assert!(log
        .lines()
        .contains(&"position startpos moves e2e4 e7e5".to_owned()));
}

#[tokio::test]
async fn none_is_reported_as_no_legal_move() {
    let (mut session, _fake) =
        ready_session("A", FakeScript::replying([GoReply::NoMove])).await;

    let reply = session.request_move().await.expect("reply");
    assert_eq!(reply, MoveReply::NoLegalMove);
}

#[tokio::test]
async fn bare_bestmove_is_missing_move() {
    let (mut session, _fake) =
        ready_session("A", FakeScript::replying([GoReply::Bare])).await;

    let err = session.request_move().await.expect_err("no move token");
    assert!(matches!(err, HarnessError::MissingMove(_)), "got {err:?}");
    assert_eq!(session.state(), SessionState::Ready);
}

#[tokio::test]
async fn silent_engine_times_out_as_missing_move_and_recovers() {
    let (process, fake) = spawn_fake("A", FakeScript::replying([GoReply::Silent]));
    let mut config = test_session_config();
    config.move_timeout = Duration::from_millis(200);
    let mut session = ProtocolSession::new(process, config);
    session.initialize().await.expect("handshake");

    let err = session.request_move().await.expect_err("no bestmove in time");
    assert!(matches!(err, HarnessError::MissingMove(_)), "got {err:?}");

    // The late answer to `stop` was consumed, so the next request is clean.
    let reply = session.request_move().await.expect("second move");
    assert!(matches!(reply, MoveReply::Move(_)));

    session.terminate().await;
    assert_eq!(fake.join().await.count("stop"), 1);
}

#[tokio::test]
async fn hang_up_while_thinking_is_missing_move_then_protocol() {
    let (mut session, _fake) =
        ready_session("A", FakeScript::replying([GoReply::HangUp])).await;

    let err = session.request_move().await.expect_err("stream closed");
    assert!(matches!(err, HarnessError::MissingMove(_)), "got {err:?}");

    let err = session
        .set_position(&MoveHistory::new())
        .await
        .expect_err("stream already closed");
    assert!(matches!(err, HarnessError::Protocol(_)), "got {err:?}");
}

#[tokio::test]
async fn oversized_line_is_protocol_error() {
    let (mut session, _fake) =
        ready_session("A", FakeScript::replying([GoReply::Oversized])).await;

    let err = session.request_move().await.expect_err("line too long");
    assert!(matches!(err, HarnessError::Protocol(_)), "got {err:?}");
    assert!(err.is_fatal());
}

// ── Reset and termination ────────────────────────────────────────────────────

#[tokio::test]
async fn new_game_does_not_repeat_handshake() {
    let (mut session, fake) = ready_session("A", FakeScript::default()).await;

    session.set_position(&MoveHistory::new()).await.expect("position");
    session.request_move().await.expect("game 1 move");
    session.new_game().await.expect("ucinewgame");
    session.set_position(&MoveHistory::new()).await.expect("position");
    session.request_move().await.expect("game 2 move");
    session.terminate().await;

    let log = fake.join().await;
    assert_eq!(log.count("uci"), 1);
    assert_eq!(log.count("isready"), 1);
    assert_eq!(log.count("ucinewgame"), 1);
    assert_eq!(log.count_prefix("go "), 2);
}

#[tokio::test]
async fn terminate_is_idempotent() {
    let (mut session, fake) = ready_session("A", FakeScript::default()).await;

    assert!(session.terminate().await, "first call performs shutdown");
    assert!(!session.terminate().await, "second call is a no-op");
    assert_eq!(session.state(), SessionState::Terminated);

    assert_eq!(fake.join().await.count("quit"), 1);
}

#[tokio::test]
async fn commands_after_terminate_are_rejected() {
    let (mut session, _fake) = ready_session("A", FakeScript::default()).await;
    session.terminate().await;

    let err = session.new_game().await.expect_err("terminated");
    assert!(matches!(err, HarnessError::Protocol(_)));
    let err = session.request_move().await.expect_err("terminated");
    assert!(matches!(err, HarnessError::Protocol(_)));
}
