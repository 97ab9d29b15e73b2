use crate::common::{TestRepo, repo};
use rstest::rstest;

#[rstest]
fn test_guide_lists_topics(repo: TestRepo) {
    let out = repo.st(&["guide"]);
    out.assert_success();
    for topic in ["workflow", "stacking", "integrating", "lifecycle", "agents"] {
        assert!(out.stdout.contains(topic), "missing {topic}:\n{}", out.stdout);
    }
}

#[rstest]
fn test_guide_alias_shows_topic(repo: TestRepo) {
    let out = repo.st(&["?", "stacking"]);
    out.assert_success();
    assert!(out.stdout.contains("branch.<name>.parent"), "{}", out.stdout);
}

#[rstest]
fn test_guide_unknown_topic(repo: TestRepo) {
    let out = repo.st(&["guide", "nope"]);
    out.assert_exit(1);
    assert!(out.stderr.contains("No guide topic nope"), "{}", out.stderr);
}

#[test]
fn test_guide_works_outside_a_repository() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = std::process::Command::new(env!("CARGO_BIN_EXE_st"));
    crate::common::configure_cli_command(&mut cmd);
    let output = cmd.arg("guide").current_dir(dir.path()).output().unwrap();
    assert!(output.status.success());
}

#[rstest]
#[case::bare(&[])]
#[case::flags_only(&["-v"])]
fn test_no_subcommand_prints_help(repo: TestRepo, #[case] args: &[&str]) {
    let out = repo.st(args);
    out.assert_exit(2);
    assert!(out.stderr.contains("Usage: st"), "{}", out.stderr);
    assert!(out.stderr.contains("local-merge"), "{}", out.stderr);
}
