use crate::common::{TestRepo, repo};
use rstest::rstest;

#[rstest]
fn test_status_lists_default_servers(repo: TestRepo) {
    let out = repo.st(&["mcp", "status"]);
    out.assert_success();

    let lines: Vec<&str> = out.stdout.lines().collect();
    assert_eq!(lines.len(), 3, "{}", out.stdout);
    assert!(lines[0].starts_with("context7"));
    assert!(lines[0].contains("not started"));
    assert!(lines[0].contains("Context7 (Documentation)"));
    assert!(lines[1].starts_with("playwright"));
    assert!(lines[2].starts_with("sequential-thinking"));
}

#[rstest]
fn test_start_unknown_server(repo: TestRepo) {
    let out = repo.st(&["mcp", "start", "nope"]);
    out.assert_exit(1);
    assert!(out.stderr.contains("Unknown MCP server nope"), "{}", out.stderr);
    assert!(out.stderr.contains("context7"), "{}", out.stderr);
}

#[rstest]
fn test_start_and_stop_server(repo: TestRepo) {
    repo.write_config(
        r#"
[mcp.servers.sleeper]
command = "sleep 30"
description = "Sleeps"
"#,
    );

    let out = repo.st(&["mcp", "start"]);
    out.assert_success();
    assert!(out.stderr.contains("Started sleeper"), "{}", out.stderr);

    let pid_file = repo.root_path().join(".mcp/pids/sleeper.pid");
    assert!(pid_file.exists());

    let out = repo.st(&["mcp", "status"]);
    out.assert_success();
    assert!(out.stdout.contains("sleeper  running"), "{}", out.stdout);

    let out = repo.st(&["mcp", "start", "sleeper"]);
    out.assert_success();
    assert!(out.stderr.contains("already running"), "{}", out.stderr);

    let out = repo.st(&["mcp", "stop"]);
    out.assert_success();
    assert!(out.stderr.contains("Stopped sleeper"), "{}", out.stderr);
    assert!(!pid_file.exists());

    let out = repo.st(&["mcp", "status"]);
    assert!(out.stdout.contains("not started"), "{}", out.stdout);
}
