//! Unit tests for the compile step.
//!
//! `sh -c` stands in for a compiler: `build` appends `-o <output> <sources>`,
//! which the script sees as positional parameters `$1 $2 $3`.

use std::path::PathBuf;

use uci_gauntlet::build::{build, probe_compiler, BuildSpec};
use uci_gauntlet::HarnessError;

fn spec(script: &str, dir: &std::path::Path) -> BuildSpec {
    BuildSpec {
        compiler: "sh".to_owned(),
        sources: vec![PathBuf::from("engine.cpp")],
        flags: vec!["-c".to_owned(), script.to_owned(), "cc".to_owned()],
        output: PathBuf::from("engine"),
        working_dir: Some(dir.to_path_buf()),
        link_flags: Vec::new(),
    }
}

#[test]
fn arguments_follow_compiler_convention() {
    let spec = BuildSpec {
        compiler: "g++".to_owned(),
        sources: vec![PathBuf::from("main.cpp"), PathBuf::from("uci.cpp")],
        flags: vec!["-O2".to_owned(), "-static".to_owned()],
        output: PathBuf::from("champ.exe"),
        working_dir: None,
        link_flags: vec!["-lws2_32".to_owned()],
    };

    assert_eq!(
        spec.arguments(),
        vec!["-O2", "-static", "-o", "champ.exe", "main.cpp", "uci.cpp", "-lws2_32"]
    );
}

#[test]
fn output_path_resolves_against_working_dir() {
    let mut spec = spec("true", std::path::Path::new("/work"));
    assert_eq!(spec.output_path(), PathBuf::from("/work/engine"));

    spec.output = PathBuf::from("/abs/engine");
    assert_eq!(spec.output_path(), PathBuf::from("/abs/engine"));
}

#[cfg(unix)]
#[tokio::test]
async fn successful_build_returns_output_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("engine.cpp"), "int main() {}\n").expect("write source");

    let produced = build(&spec("cp \"$3\" \"$2\"", dir.path()))
        .await
        .expect("build must succeed");

    assert_eq!(produced, dir.path().join("engine"));
    assert!(produced.is_file());
}

#[cfg(unix)]
#[tokio::test]
async fn compiler_failure_carries_stderr() {
    let dir = tempfile::tempdir().expect("tempdir");

    let err = build(&spec("echo 'engine.cpp:1: error: boom' >&2; exit 1", dir.path()))
        .await
        .expect_err("build must fail");

    assert!(matches!(err, HarnessError::Build(_)), "got {err:?}");
    assert!(err.to_string().contains("boom"), "got {err}");
}

#[cfg(unix)]
#[tokio::test]
async fn missing_output_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");

    let err = build(&spec("true", dir.path()))
        .await
        .expect_err("no output produced");

    assert!(err.to_string().contains("was not produced"), "got {err}");
}

#[tokio::test]
async fn missing_compiler_is_a_build_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut spec = spec("true", dir.path());
    spec.compiler = "definitely-not-a-compiler-9f2c".to_owned();

    let err = build(&spec).await.expect_err("compiler is missing");
    assert!(matches!(err, HarnessError::Build(_)));
}

#[tokio::test]
async fn empty_sources_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut spec = spec("true", dir.path());
    spec.sources.clear();

    let err = build(&spec).await.expect_err("nothing to compile");
    assert!(err.to_string().contains("no source files"));
}

#[cfg(unix)]
#[tokio::test]
async fn probe_reports_first_version_line() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().expect("tempdir");
    let compiler = dir.path().join("fake-cc");
    std::fs::write(
        &compiler,
        "#!/bin/sh\necho 'fake-cc (GCC) 13.2.0'\necho 'Copyright'\n",
    )
    .expect("write compiler");
    std::fs::set_permissions(&compiler, std::fs::Permissions::from_mode(0o755))
        .expect("chmod");

    let version = probe_compiler(&compiler).await.expect("probe");
    assert_eq!(version, "fake-cc (GCC) 13.2.0");
}

#[tokio::test]
async fn probe_of_missing_compiler_fails() {
    let err = probe_compiler("definitely-not-a-compiler-9f2c")
        .await
        .expect_err("missing compiler");
    assert!(err.to_string().contains("not found"));
}
