//! Unit tests for coordinate move notation and move history.

use uci_gauntlet::game::moves::{CoordinateMove, MoveHistory};
use uci_gauntlet::HarnessError;

fn mv(text: &str) -> CoordinateMove {
    text.parse().expect("valid move")
}

#[test]
fn plain_move_parses() {
    let m = mv("e2e4");
    assert_eq!(m.as_str(), "e2e4");
    assert_eq!(m.from_square(), "e2");
    assert_eq!(m.to_square(), "e4");
    assert_eq!(m.promotion(), None);
    assert_eq!(m.to_string(), "e2e4");
}

#[test]
fn promotion_move_parses() {
    let m = mv("e7e8q");
    assert_eq!(m.to_square(), "e8");
    assert_eq!(m.promotion(), Some('q'));
}

#[test]
fn malformed_moves_are_rejected() {
    for text in ["", "e2", "e2e", "e2e4qq", "i2e4", "e9e4", "e2e2", "e7e8k", "E2E4", "(none)"] {
        let err = text
            .parse::<CoordinateMove>()
            .expect_err("malformed move must be rejected");
        assert!(
            matches!(err, HarnessError::IllegalMove(_)),
            "{text:?} gave {err:?}"
        );
    }
}

#[test]
fn history_displays_space_separated() {
    let history: MoveHistory = ["e2e4", "e7e5", "g1f3"].into_iter().map(mv).collect();
    assert_eq!(history.to_string(), "e2e4 e7e5 g1f3");
    assert_eq!(history.len(), 3);
    assert_eq!(history[1].as_str(), "e7e5");
    assert_eq!(history.last().map(CoordinateMove::as_str), Some("g1f3"));
}

#[test]
fn empty_history() {
    let history = MoveHistory::new();
    assert!(history.is_empty());
    assert_eq!(history.to_string(), "");
    assert!(history.get(0).is_none());
}

#[test]
fn history_iterates_in_play_order() {
    let mut history = MoveHistory::new();
    history.push(mv("d2d4"));
    history.push(mv("d7d5"));

    let by_ref: Vec<&str> = history.iter().map(CoordinateMove::as_str).collect();
    assert_eq!(by_ref, vec!["d2d4", "d7d5"]);

    let owned: Vec<String> = history.into_iter().map(|m| m.as_str().to_owned()).collect();
    assert_eq!(owned, vec!["d2d4", "d7d5"]);
}

#[test]
fn history_serializes_as_array() {
    let history: MoveHistory = ["e2e4", "c7c5"].into_iter().map(mv).collect();
    let json = serde_json::to_string(&history).expect("serialize");
    assert_eq!(json, r#"["e2e4","c7c5"]"#);
}
