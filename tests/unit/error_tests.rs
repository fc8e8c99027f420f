//! Unit tests for `HarnessError` display and classification.

use uci_gauntlet::HarnessError;

#[test]
fn display_uses_kind_prefix() {
    let cases = [
        (HarnessError::Config("x".into()), "config: x"),
        (HarnessError::Spawn("x".into()), "spawn: x"),
        (HarnessError::Protocol("x".into()), "protocol: x"),
        (HarnessError::MissingMove("x".into()), "missing move: x"),
        (HarnessError::IllegalMove("x".into()), "illegal move: x"),
        (HarnessError::Crash("x".into()), "crash: x"),
        (HarnessError::Build("x".into()), "build: x"),
        (HarnessError::Io("x".into()), "io: x"),
    ];
    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn per_game_errors_are_not_fatal() {
    assert!(!HarnessError::MissingMove("timeout".into()).is_fatal());
    assert!(!HarnessError::IllegalMove("e2e5".into()).is_fatal());
    assert!(!HarnessError::Crash("exit 3".into()).is_fatal());
}

#[test]
fn infrastructure_errors_are_fatal() {
    assert!(HarnessError::Config("bad".into()).is_fatal());
    assert!(HarnessError::Spawn("missing".into()).is_fatal());
    assert!(HarnessError::Protocol("eof".into()).is_fatal());
    assert!(HarnessError::Build("g++".into()).is_fatal());
    assert!(HarnessError::Io("disk".into()).is_fatal());
}

#[test]
fn toml_errors_convert_to_config() {
    let toml_err = toml::from_str::<toml::Value>("games = ").expect_err("invalid toml");
    let err: HarnessError = toml_err.into();
    assert!(matches!(err, HarnessError::Config(_)));
    assert!(err.to_string().starts_with("config: invalid config"));
}

#[test]
fn io_errors_convert_to_io() {
    let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
    let err: HarnessError = io.into();
    assert_eq!(err.to_string(), "io: pipe closed");
}

#[test]
fn implements_std_error() {
    fn assert_error<E: std::error::Error>(_: &E) {}
    assert_error(&HarnessError::Protocol("closed".into()));
}
